//! Line-oriented tokenizer for assembly source.
//!
//! A newline ends a statement and `;` comments run to the end of the line.
//! Integers are decimal, `$` hex, or decimal with a `.` for a 32-bit float
//! stored by its bit pattern. Identifiers may carry a leading `*` or `#` and
//! a trailing `:`.

use std::fmt;

use crate::error::{AsmError, SourceLoc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Int(i32),
    End,
}

impl TokenKind {
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident(_) => "identifier",
            TokenKind::Str(_) => "string",
            TokenKind::Int(_) => "integer",
            TokenKind::End => "end of statement",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "{s}"),
            TokenKind::Str(s) => write!(f, "{s:?}"),
            TokenKind::Int(v) => write!(f, "{v}"),
            TokenKind::End => write!(f, "<end>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLoc,
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '*' | '#' | '_')
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenizes `source`. A malformed token is reported and the rest of its
/// line is skipped, so one pass yields every lexical error in the file.
pub fn tokenize(file: &str, source: &str) -> (Vec<Token>, Vec<AsmError>) {
    let mut lx = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        file,
        tokens: Vec::new(),
        errors: Vec::new(),
    };
    lx.run();
    (lx.tokens, lx.errors)
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    file: &'a str,
    tokens: Vec<Token>,
    errors: Vec<AsmError>,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.file, self.line)
    }

    fn push(&mut self, kind: TokenKind, loc: SourceLoc) {
        self.tokens.push(Token { kind, loc });
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            let loc = self.loc();
            let result = match c {
                '\n' => {
                    self.bump();
                    self.push(TokenKind::End, loc);
                    Ok(())
                }
                ';' => {
                    self.skip_line();
                    Ok(())
                }
                c if c.is_whitespace() => {
                    self.bump();
                    Ok(())
                }
                '"' => self.string(loc),
                '-' | '0'..='9' => self.decimal(loc),
                '$' => self.hex(loc),
                c if is_ident_start(c) => {
                    self.ident(loc);
                    Ok(())
                }
                other => Err(AsmError::syntax(
                    &loc,
                    format!("unexpected character {other:?}"),
                )),
            };
            if let Err(e) = result {
                self.errors.push(e);
                self.skip_line();
            }
        }
        let loc = self.loc();
        self.push(TokenKind::End, loc);
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    fn ident(&mut self, loc: SourceLoc) {
        let mut text = String::new();
        if let Some(c) = self.bump() {
            text.push(c);
        }
        text.push_str(&self.take_while(is_ident_char));
        if self.peek() == Some(':') {
            self.bump();
            text.push(':');
        }
        self.push(TokenKind::Ident(text), loc);
    }

    fn decimal(&mut self, loc: SourceLoc) -> Result<(), AsmError> {
        let mut text = String::new();
        if let Some(c) = self.bump() {
            text.push(c);
        }
        text.push_str(&self.take_while(|c| c.is_ascii_digit() || c == '.'));
        let value = if text.contains('.') {
            let f: f32 = text
                .parse()
                .map_err(|_| AsmError::syntax(&loc, format!("bad float literal {text:?}")))?;
            f.to_bits() as i32
        } else {
            let v: i64 = text
                .parse()
                .map_err(|_| AsmError::syntax(&loc, format!("bad integer literal {text:?}")))?;
            if v < i64::from(i32::MIN) || v > i64::from(u32::MAX) {
                return Err(AsmError::syntax(
                    &loc,
                    format!("integer {text} does not fit 32 bits"),
                ));
            }
            v as i32
        };
        self.push(TokenKind::Int(value), loc);
        Ok(())
    }

    fn hex(&mut self, loc: SourceLoc) -> Result<(), AsmError> {
        self.bump();
        let digits = self.take_while(|c| c.is_ascii_hexdigit());
        let value = u32::from_str_radix(&digits, 16)
            .map_err(|_| AsmError::syntax(&loc, format!("bad hex literal ${digits}")))?;
        self.push(TokenKind::Int(value as i32), loc);
        Ok(())
    }

    fn string(&mut self, loc: SourceLoc) -> Result<(), AsmError> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(AsmError::syntax(&loc, "unterminated string")),
                Some('"') => break,
                Some('\\') => {
                    let esc_loc = self.loc();
                    match self.bump() {
                        Some('0') => {}
                        Some('\\') => text.push('\\'),
                        Some('"') => text.push('"'),
                        Some('n') => text.push('\n'),
                        Some('r') => text.push('\r'),
                        Some('t') => text.push('\t'),
                        Some('x') => {
                            let digits = self.take_while(|c| c.is_ascii_hexdigit());
                            let ch = u32::from_str_radix(&digits, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| {
                                    AsmError::syntax(
                                        &esc_loc,
                                        format!("bad character escape \\x{digits}"),
                                    )
                                })?;
                            text.push(ch);
                        }
                        Some(other) => {
                            return Err(AsmError::syntax(
                                &esc_loc,
                                format!("unknown character escape \\{other}"),
                            ))
                        }
                        None => return Err(AsmError::syntax(&loc, "unterminated string")),
                    }
                }
                Some(c) => text.push(c),
            }
        }
        self.push(TokenKind::Str(text), loc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize("t.ga", src);
        assert!(errors.is_empty(), "{errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Ident(s.to_string())
    }

    #[test]
    fn statement_with_comment() {
        assert_eq!(
            kinds("loop: add #1 $ff sp ; bump\n"),
            vec![
                ident("loop:"),
                ident("add"),
                ident("#1"),
                TokenKind::Int(0xFF),
                ident("sp"),
                TokenKind::End,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("-5 42 $FFFFFFFF 1.5 4294967295"),
            vec![
                TokenKind::Int(-5),
                TokenKind::Int(42),
                TokenKind::Int(-1),
                TokenKind::Int(1.5f32.to_bits() as i32),
                TokenKind::Int(-1),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\\c\n\t\0\x41\xe9""#),
            vec![TokenKind::Str("a\"b\\c\n\tAé".to_string()), TokenKind::End]
        );
    }

    #[test]
    fn errors_skip_to_next_line() {
        let (tokens, errors) = tokenize("t.ga", "quit @ nop\nnop\n\"bad\\q\" x\nquit");
        let lines: Vec<_> = errors
            .iter()
            .map(|e| match e {
                AsmError::Syntax { loc, .. } => loc.line,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(lines, vec![1, 3]);
        let idents: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Ident(s) => Some((s.as_str(), t.loc.line)),
                _ => None,
            })
            .collect();
        assert_eq!(idents, vec![("quit", 1), ("nop", 2), ("quit", 4)]);
    }

    #[test]
    fn unterminated_string() {
        let (_, errors) = tokenize("t.ga", "string s \"open");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("unterminated"));
    }
}
