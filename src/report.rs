//! Plain-text listings of an object file, for debugging a build.

use std::fmt::Write as _;

use crate::object::ObjectFile;

const PREVIEW_CHARS: usize = 10;

/// `position/size: unit` for every RAM unit, in order.
pub fn dump_code(obj: &ObjectFile) -> String {
    let mut out = String::new();
    for unit in obj.ram() {
        let pos = unit
            .position()
            .map_or_else(|| "?".to_string(), |p| p.to_string());
        let _ = writeln!(out, "{pos}/{}: {unit}", unit.size_in_bytes());
    }
    out
}

pub fn dump_symbols(obj: &ObjectFile) -> String {
    let mut out = String::new();
    for (name, sym) in obj.symbols().sorted() {
        let _ = writeln!(out, "{:08x}  {:<16}  {name}", sym.position, sym.kind);
    }
    out
}

pub fn dump_constants(obj: &ObjectFile) -> String {
    let mut out = String::new();
    for (name, c) in obj.constants().sorted() {
        let _ = writeln!(out, "{name:<32}  {}", c.value);
    }
    out
}

/// Each canonical label with a short preview of its text, then one line per
/// string that has aliases.
pub fn dump_strings(obj: &ObjectFile) -> String {
    let mut out = String::new();
    let entries = obj.strings().entries();
    for e in entries {
        let mut preview: String = e.content.chars().take(PREVIEW_CHARS).collect();
        if e.content.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        let preview = preview.replace(['\n', '\r'], "_");
        let _ = writeln!(out, "{}: {preview}", e.label);
    }
    out.push('\n');
    for e in entries.iter().filter(|e| !e.aliases.is_empty()) {
        let _ = writeln!(out, "{}: {}", e.label, e.aliases.join(" "));
    }
    out
}
