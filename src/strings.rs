//! String literal pool.
//!
//! Every distinct string is stored once in ROM under a generated canonical
//! label (`_string0`, `_string1`, ...). Callers may attach extra alias labels
//! to the same bytes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceLoc};
use crate::unit::{Data, Label, LabelKind, Unit};

const BASIC_TAG: u8 = 0xE0;
const UNICODE_TAG: u32 = 0xE200_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StringKind {
    /// Basic if every character is ASCII, unicode otherwise.
    #[default]
    Automatic,
    Basic,
    Unicode,
}

/// Encodes `text` as a terminated Glulx string. Basic strings are the tag
/// byte, one byte per character and a zero byte; unicode strings are the tag
/// word, one word per code point and a zero word. Forcing `Basic` on a
/// character above 0xFF fails with that character.
pub fn encode_string(text: &str, kind: StringKind) -> std::result::Result<Vec<u8>, char> {
    let unicode = match kind {
        StringKind::Automatic => text.chars().any(|c| c as u32 > 0x7F),
        StringKind::Basic => false,
        StringKind::Unicode => true,
    };
    if unicode {
        let mut out = Vec::with_capacity((text.chars().count() + 2) * 4);
        out.extend_from_slice(&UNICODE_TAG.to_be_bytes());
        for c in text.chars() {
            out.extend_from_slice(&(c as u32).to_be_bytes());
        }
        out.extend_from_slice(&0u32.to_be_bytes());
        Ok(out)
    } else {
        let mut out = Vec::with_capacity(text.len() + 2);
        out.push(BASIC_TAG);
        for c in text.chars() {
            let b = u8::try_from(c as u32).map_err(|_| c)?;
            out.push(b);
        }
        out.push(0);
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEntry {
    pub label: String,
    pub content: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StringTable {
    entries: Vec<StringEntry>,
    by_content: HashMap<String, usize>,
}

impl StringTable {
    /// Returns the canonical label for `content`, minting one on first use.
    pub fn intern(&mut self, content: &str) -> String {
        if let Some(&idx) = self.by_content.get(content) {
            return self.entries[idx].label.clone();
        }
        let label = format!("_string{}", self.entries.len());
        self.by_content
            .insert(content.to_string(), self.entries.len());
        self.entries.push(StringEntry {
            label: label.clone(),
            content: content.to_string(),
            aliases: Vec::new(),
        });
        label
    }

    /// Interns `content` and makes `label` another name for it.
    pub fn alias(&mut self, label: &str, content: &str) -> String {
        let canonical = self.intern(content);
        let idx = self.by_content[content];
        let aliases = &mut self.entries[idx].aliases;
        if !aliases.iter().any(|a| a == label) {
            aliases.push(label.to_string());
        }
        canonical
    }

    pub fn lookup(&self, content: &str) -> Option<&StringEntry> {
        self.by_content.get(content).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[StringEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends the alias labels, canonical label and encoded bytes of every
    /// string, in the order they were first interned.
    pub fn materialize(&self, segment: &mut Vec<Unit>) -> Result<()> {
        let loc = SourceLoc::default();
        for entry in &self.entries {
            for alias in &entry.aliases {
                segment.push(Unit::new(Label::new(alias, LabelKind::String), loc.clone()));
            }
            segment.push(Unit::new(
                Label::new(&entry.label, LabelKind::String),
                loc.clone(),
            ));
            segment.push(Unit::new(
                Data::string(&entry.content, StringKind::Automatic, &loc)?,
                loc.clone(),
            ));
        }
        Ok(())
    }
}
