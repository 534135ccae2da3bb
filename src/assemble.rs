//! Directive processor: groups tokens into statements and turns each one into
//! units on the object file.
//!
//! A statement that fails is reported and skipped; scanning carries on so a
//! single run reports every error. Any error at all aborts the assembly.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::encoder::Instruction;
use crate::error::{AsmError, Result, SourceLoc};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::mnemonic::Mnemonic;
use crate::object::ObjectFile;
use crate::operand::{Mode, Operand};
use crate::strings::StringKind;
use crate::unit::{Data, Label, LabelKind, VarData};

/// Assembles `path` and everything it includes into `obj`.
pub fn assemble_file(obj: &mut ObjectFile, path: &Path) -> Result<()> {
    let mut asm = Assembler::new(obj);
    asm.include(path, &SourceLoc::default());
    asm.finish()
}

/// Assembles in-memory source. Includes resolve against the directory of
/// `name`.
pub fn assemble_source(obj: &mut ObjectFile, name: &str, source: &str) -> Result<()> {
    let mut asm = Assembler::new(obj);
    let dir = Path::new(name)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    asm.source(name, source, &dir);
    asm.finish()
}

struct Assembler<'a> {
    obj: &'a mut ObjectFile,
    include_stack: Vec<PathBuf>,
    errors: Vec<AsmError>,
}

impl<'a> Assembler<'a> {
    fn new(obj: &'a mut ObjectFile) -> Self {
        Self {
            obj,
            include_stack: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AsmError::Aborted {
                errors: self.errors,
            })
        }
    }

    fn include(&mut self, path: &Path, from: &SourceLoc) {
        let canonical = match path.canonicalize() {
            Ok(p) => p,
            Err(source) => {
                self.read_failed(path, from, source);
                return;
            }
        };
        if self.include_stack.contains(&canonical) {
            self.errors.push(AsmError::syntax(
                from,
                format!("circular include of {}", path.display()),
            ));
            return;
        }
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(source) => {
                self.read_failed(path, from, source);
                return;
            }
        };
        if !self.include_stack.is_empty() {
            info!("including {} from {from}", path.display());
        }
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.include_stack.push(canonical);
        self.source(&path.display().to_string(), &text, &dir);
        self.include_stack.pop();
    }

    /// The root file has no statement to blame; an included one does.
    fn read_failed(&mut self, path: &Path, from: &SourceLoc, source: std::io::Error) {
        let path = path.to_path_buf();
        self.errors.push(if self.include_stack.is_empty() {
            AsmError::Io { path, source }
        } else {
            AsmError::Include {
                loc: from.clone(),
                path,
                source,
            }
        });
    }

    fn source(&mut self, name: &str, text: &str, dir: &Path) {
        let (tokens, lex_errors) = tokenize(name, text);
        debug!(file = name, tokens = tokens.len(), "tokenized");
        self.errors.extend(lex_errors);
        for stmt in tokens.split(|t| t.kind == TokenKind::End) {
            if stmt.is_empty() {
                continue;
            }
            if let Err(e) = self.statement(stmt, dir) {
                self.errors.push(e);
            }
        }
    }

    fn statement(&mut self, stmt: &[Token], dir: &Path) -> Result<()> {
        let loc = stmt[0].loc.clone();
        let head = ident(&stmt[0], "statement")?;
        let args = &stmt[1..];

        match head {
            "stackSize" => {
                arity(head, args, 1, &loc)?;
                let size = int(&args[0], head)?;
                let size = u32::try_from(size).map_err(|_| {
                    AsmError::syntax(&loc, format!("stack size {size} is negative"))
                })?;
                self.obj.set_stack_size(size);
                return Ok(());
            }
            "toROM" | "endROM" => {
                arity(head, args, 0, &loc)?;
                self.obj.toggle_rom(head == "toROM");
                return Ok(());
            }
            "include" => {
                arity(head, args, 1, &loc)?;
                let file = string(&args[0], head)?;
                self.include(&dir.join(file), &loc);
                return Ok(());
            }
            "constant" => {
                arity(head, args, 2, &loc)?;
                let name = ident(&args[0], head)?;
                let value = int(&args[1], head)?;
                self.obj.add_constant(name, value, loc);
                return Ok(());
            }
            _ => {}
        }

        if let Some(name) = head.strip_suffix(':') {
            self.obj.add_unit(Label::general(name), loc)?;
            return match args {
                [] => Ok(()),
                rest => self.statement(rest, dir),
            };
        }

        match head {
            "function" | "stkfunction" => {
                arity(head, args, 2, &loc)?;
                let name = ident(&args[0], head)?;
                let locals = int(&args[1], head)?;
                let locals = u32::try_from(locals).map_err(|_| {
                    AsmError::syntax(&loc, format!("negative local count {locals}"))
                })?;
                let kind = if head == "function" {
                    LabelKind::LocalFunction
                } else {
                    LabelKind::StackFunction
                };
                self.obj.add_unit(Label::function(name, kind, locals), loc)
            }
            "addString" => {
                arity(head, args, 2, &loc)?;
                let label = ident(&args[0], head)?;
                let text = string(&args[1], head)?;
                self.obj.alias_string(label, text);
                Ok(())
            }
            "string" => {
                arity(head, args, 2, &loc)?;
                let label = ident(&args[0], head)?;
                let text = string(&args[1], head)?;
                let data = Data::string(text, StringKind::Automatic, &loc)?;
                self.obj
                    .add_unit(Label::new(label, LabelKind::String), loc.clone())?;
                self.obj.add_unit(data, loc)
            }
            "bytes" => {
                at_least(head, args, 2, &loc)?;
                let width = int(&args[0], head)?;
                let bits = match width {
                    8 | 16 | 32 => width as u32,
                    _ => {
                        return Err(AsmError::syntax(
                            &loc,
                            format!("bytes width must be 8, 16 or 32, not {width}"),
                        ))
                    }
                };
                let label = ident(&args[1], head)?;
                let mut bytes = Vec::new();
                for tok in &args[2..] {
                    let value = fit(int(tok, head)?, bits, &tok.loc)?;
                    bytes.extend_from_slice(&value.to_be_bytes()[4 - (bits / 8) as usize..]);
                }
                self.obj
                    .add_unit(Label::new(label, LabelKind::Data), loc.clone())?;
                self.obj.add_unit(Data::from_bytes(bytes), loc)
            }
            "bytesFixed" => {
                at_least(head, args, 2, &loc)?;
                let label = ident(&args[0], head)?;
                let size = block_size(int(&args[1], head)?, 1, &loc)?;
                let values = &args[2..];
                if values.len() > size {
                    return Err(AsmError::capacity(
                        &loc,
                        format!("bytesFixed holds {size} byte(s) but {} given", values.len()),
                    ));
                }
                let mut bytes = Vec::with_capacity(size);
                for tok in values {
                    bytes.push(fit(int(tok, head)?, 8, &tok.loc)? as u8);
                }
                self.obj
                    .add_unit(Label::new(label, LabelKind::Data), loc.clone())?;
                self.obj.add_unit(Data::padded(size, bytes), loc)
            }
            "words" | "wordsFixed" => {
                let (label, mut table, items) = if head == "words" {
                    at_least(head, args, 1, &loc)?;
                    (ident(&args[0], head)?, VarData::new(), &args[1..])
                } else {
                    at_least(head, args, 2, &loc)?;
                    let count = block_size(int(&args[1], head)?, 4, &loc)?;
                    (ident(&args[0], head)?, VarData::fixed(count), &args[2..])
                };
                for tok in items {
                    let op = self.operand(tok)?;
                    table.push(op, &tok.loc)?;
                }
                self.obj
                    .add_unit(Label::new(label, LabelKind::Data), loc.clone())?;
                self.obj.add_unit(table, loc)
            }
            "_call" | "_glk" => self.call_shortcut(head, args, loc),
            _ => {
                let mnemonic = Mnemonic::lookup(head).ok_or_else(|| {
                    AsmError::syntax(&loc, format!("unknown mnemonic \"{head}\""))
                })?;
                arity(head, args, mnemonic.operands, &loc)?;
                let operands = args
                    .iter()
                    .map(|t| self.operand(t))
                    .collect::<Result<Vec<_>>>()?;
                self.obj
                    .add_unit(Instruction::new(*mnemonic, operands), loc)
            }
        }
    }

    /// `_call FUNC args... DEST` pushes the arguments last to first, then
    /// calls with the argument count. `_glk` does the same with `glk`.
    fn call_shortcut(&mut self, head: &str, args: &[Token], loc: SourceLoc) -> Result<()> {
        at_least(head, args, 2, &loc)?;
        let target = match &args[0].kind {
            TokenKind::Ident(_) | TokenKind::Int(_) => self.operand(&args[0])?,
            other => {
                return Err(AsmError::syntax(
                    &args[0].loc,
                    format!("{head} target must be a name or number, found {}", other.describe()),
                ))
            }
        };
        let (dest, call_args) = match args[1..].split_last() {
            Some((dest, rest)) => (self.operand(dest)?, rest),
            None => return Err(AsmError::internal(&loc, "call shortcut without destination")),
        };
        let copy = lookup("copy", &loc)?;
        for tok in call_args.iter().rev() {
            let value = self.operand(tok)?;
            self.obj.add_unit(
                Instruction::new(copy, vec![value, Operand::stack()]),
                loc.clone(),
            )?;
        }
        let op = lookup(if head == "_call" { "call" } else { "glk" }, &loc)?;
        let argc = Operand::constant(call_args.len() as i32);
        self.obj
            .add_unit(Instruction::new(op, vec![target, argc, dest]), loc)
    }

    fn operand(&mut self, tok: &Token) -> Result<Operand> {
        match &tok.kind {
            TokenKind::Int(v) => Ok(Operand::constant(*v)),
            TokenKind::Str(s) => Ok(Operand::symbol(self.obj.intern_string(s), Mode::Constant)),
            TokenKind::Ident(text) if text.ends_with(':') || text == "*" || text == "#" => Err(
                AsmError::syntax(&tok.loc, format!("\"{text}\" is not a valid operand")),
            ),
            TokenKind::Ident(text) => Ok(Operand::from_ident(text, self.obj.constants())),
            TokenKind::End => Err(AsmError::syntax(&tok.loc, "missing operand")),
        }
    }
}

fn lookup(name: &str, loc: &SourceLoc) -> Result<Mnemonic> {
    Mnemonic::lookup(name)
        .copied()
        .ok_or_else(|| AsmError::internal(loc, format!("opcode table lacks {name}")))
}

fn arity(head: &str, args: &[Token], want: usize, loc: &SourceLoc) -> Result<()> {
    if args.len() != want {
        return Err(AsmError::syntax(
            loc,
            format!(
                "bad operand count for {head}: expected {want}, found {}",
                args.len()
            ),
        ));
    }
    Ok(())
}

fn at_least(head: &str, args: &[Token], min: usize, loc: &SourceLoc) -> Result<()> {
    if args.len() < min {
        return Err(AsmError::syntax(
            loc,
            format!(
                "{head} needs at least {min} operand(s), found {}",
                args.len()
            ),
        ));
    }
    Ok(())
}

fn mismatch(tok: &Token, want: &str, head: &str) -> AsmError {
    AsmError::syntax(
        &tok.loc,
        format!(
            "{head}: expected {want}, found {} `{}`",
            tok.kind.describe(),
            tok.kind
        ),
    )
}

fn ident<'t>(tok: &'t Token, head: &str) -> Result<&'t str> {
    match &tok.kind {
        TokenKind::Ident(s) => Ok(s),
        _ => Err(mismatch(tok, "identifier", head)),
    }
}

fn int(tok: &Token, head: &str) -> Result<i32> {
    match tok.kind {
        TokenKind::Int(v) => Ok(v),
        _ => Err(mismatch(tok, "integer", head)),
    }
}

fn string<'t>(tok: &'t Token, head: &str) -> Result<&'t str> {
    match &tok.kind {
        TokenKind::Str(s) => Ok(s),
        _ => Err(mismatch(tok, "string", head)),
    }
}

/// Largest block a single `bytesFixed` or `wordsFixed` may reserve.
pub const MAX_BLOCK_BYTES: usize = 1 << 24;

/// Checks a reserved item count: negative is a syntax error, more than
/// [`MAX_BLOCK_BYTES`] in total is a capacity error.
fn block_size(count: i32, item_bytes: usize, loc: &SourceLoc) -> Result<usize> {
    let count = usize::try_from(count)
        .map_err(|_| AsmError::syntax(loc, format!("negative size {count}")))?;
    match count.checked_mul(item_bytes) {
        Some(total) if total <= MAX_BLOCK_BYTES => Ok(count),
        _ => Err(AsmError::capacity(
            loc,
            format!("cannot reserve {count} item(s), the limit is {MAX_BLOCK_BYTES} bytes"),
        )),
    }
}

/// Checks `value` fits `bits` as either a signed or an unsigned number.
fn fit(value: i32, bits: u32, loc: &SourceLoc) -> Result<u32> {
    if bits >= 32 {
        return Ok(value as u32);
    }
    let v = i64::from(value);
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << bits) - 1;
    if v < min || v > max {
        return Err(AsmError::capacity(
            loc,
            format!("value {value} does not fit in {bits} bits"),
        ));
    }
    Ok((value as u32) & ((1u32 << bits) - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitKind;
    use pretty_assertions::assert_eq;

    fn assemble(src: &str) -> ObjectFile {
        let mut obj = ObjectFile::default();
        assemble_source(&mut obj, "t.ga", src).unwrap();
        obj
    }

    fn errors(src: &str) -> Vec<AsmError> {
        let mut obj = ObjectFile::default();
        match assemble_source(&mut obj, "t.ga", src) {
            Err(AsmError::Aborted { errors }) => errors,
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn fit_accepts_signed_and_unsigned() {
        let loc = SourceLoc::default();
        assert_eq!(fit(255, 8, &loc).unwrap(), 0xFF);
        assert_eq!(fit(-1, 8, &loc).unwrap(), 0xFF);
        assert_eq!(fit(-128, 8, &loc).unwrap(), 0x80);
        assert!(fit(256, 8, &loc).is_err());
        assert!(fit(-129, 8, &loc).is_err());
        assert_eq!(fit(-1, 32, &loc).unwrap(), u32::MAX);
    }

    #[test]
    fn label_prefix_and_instruction() {
        let obj = assemble("function main 1\nloop: add #0 1 #0\n jump loop\n");
        let names: Vec<_> = obj.ram().iter().map(|u| u.to_string()).collect();
        assert_eq!(names.len(), 5);
        assert!(names[1].starts_with("main: LocalFunction locals=1"));
        assert!(names[2].starts_with("loop: General"));
        assert!(names[3].starts_with("add #0x0/1 0x1/1 #0x0/1"));
        assert!(names[4].starts_with("jump loop/4"));
    }

    #[test]
    fn rom_toggle_and_constants() {
        let obj = assemble("constant K 7\ntoROM\nbytes 16 tbl 1 -2\nendROM\n");
        assert!(!obj.is_to_rom());
        assert_eq!(obj.constants().get("K"), Some(7));
        // signature word, then the table label and its data
        assert_eq!(obj.rom()[1].label().unwrap().name, "tbl");
        let UnitKind::Data(d) = &obj.rom()[2].kind else {
            panic!("expected data");
        };
        assert_eq!(d.bytes(), [0, 1, 0xFF, 0xFE]);
    }

    #[test]
    fn call_shortcut_pushes_arguments_in_reverse() {
        let obj = assemble("_call f 1 2 3 sp\n");
        let lines: Vec<_> = obj.ram()[1..]
            .iter()
            .map(|u| match &u.kind {
                UnitKind::Instruction(i) => i.to_string(),
                other => panic!("{other:?}"),
            })
            .collect();
        assert_eq!(
            lines,
            vec![
                "copy 0x3/1 sp",
                "copy 0x2/1 sp",
                "copy 0x1/1 sp",
                "call f/4 0x3/1 sp",
            ]
        );
    }

    #[test]
    fn string_operands_are_interned() {
        let obj = assemble("streamstr \"hi\"\nstreamstr \"hi\"\naddString greeting \"hi\"\n");
        assert_eq!(obj.strings().len(), 1);
        assert_eq!(obj.strings().entries()[0].aliases, vec!["greeting".to_string()]);
    }

    #[test]
    fn every_bad_statement_is_reported() {
        let errs = errors("nop 1\nfrobnicate\nbytes 12 x 1\nquit\nbytesFixed b 1 1 2\n");
        assert_eq!(errs.len(), 4);
        assert!(matches!(errs[0], AsmError::Syntax { ref loc, .. } if loc.line == 1));
        assert!(errs[1].to_string().contains("unknown mnemonic"));
        assert!(matches!(errs[3], AsmError::CapacityExceeded { .. }));
    }

    #[test]
    fn words_fixed_capacity() {
        let errs = errors("wordsFixed t 2 a b c\n");
        assert!(matches!(errs[0], AsmError::CapacityExceeded { .. }));
        let obj = assemble("words t a 5 \"s\"\n");
        let UnitKind::VarData(v) = &obj.ram().last().unwrap().kind else {
            panic!("expected a word table");
        };
        assert_eq!(v.items().len(), 3);
        assert_eq!(v.items()[2].symbol_name(), Some("_string0"));
    }
}
