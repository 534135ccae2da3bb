use std::fmt;

use num_traits::cast;
use serde::{Deserialize, Serialize};

use crate::error::{AsmError, Result, SourceLoc};
use crate::sink::Sink;
use crate::symbols::{ConstantTable, SymbolTable};

/// Value of a `Variable` operand that addresses the top of the stack.
pub const STACK_TOP: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Constant,
    /// Contents of the address.
    Indirect,
    /// Local variable slot; [`STACK_TOP`] pushes or pops the stack.
    Variable,
    /// Contents of an address counted from the start of RAM.
    AfterRom,
}

impl Mode {
    fn nibble_offset(self) -> u8 {
        match self {
            Mode::Constant => 0,
            Mode::Indirect => 4,
            Mode::Variable => 8,
            Mode::AfterRom => 12,
        }
    }

    fn sigil(self) -> &'static str {
        match self {
            Mode::Constant => "",
            Mode::Indirect => "*",
            Mode::Variable => "#",
            Mode::AfterRom => "@",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Literal(i32),
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    mode: Mode,
    value: Value,
    width: u8,
}

impl Operand {
    pub fn literal(value: i32, mode: Mode) -> Self {
        Self {
            mode,
            value: Value::Literal(value),
            width: width_for(mode, value),
        }
    }

    pub fn constant(value: i32) -> Self {
        Self::literal(value, Mode::Constant)
    }

    pub fn stack() -> Self {
        Self::literal(STACK_TOP, Mode::Variable)
    }

    /// A reference to a label or constant that is not known yet. Its width is
    /// fixed at four bytes and stays that way after resolution.
    pub fn symbol(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            mode,
            value: Value::Symbol(name.into()),
            width: 4,
        }
    }

    /// Builds an operand from identifier text: `*name` is indirect, `#name`
    /// is a local variable, `sp` is the stack and anything else a constant.
    /// Known constants and integer literals are substituted right away.
    pub fn from_ident(text: &str, constants: &ConstantTable) -> Self {
        if text == "sp" {
            return Self::stack();
        }
        let (mode, name) = if let Some(rest) = text.strip_prefix('*') {
            (Mode::Indirect, rest)
        } else if let Some(rest) = text.strip_prefix('#') {
            (Mode::Variable, rest)
        } else {
            (Mode::Constant, text)
        };
        if let Some(value) = constants.get(name) {
            return Self::literal(value, mode);
        }
        match name.parse::<i32>() {
            Ok(value) => Self::literal(value, mode),
            Err(_) => Self::symbol(name, mode),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn value(&self) -> Option<i32> {
        match self.value {
            Value::Literal(v) => Some(v),
            Value::Symbol(_) => None,
        }
    }

    pub fn symbol_name(&self) -> Option<&str> {
        match &self.value {
            Value::Symbol(name) => Some(name),
            Value::Literal(_) => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.value, Value::Symbol(_))
    }

    /// Fixes a constant operand at four bytes, whatever its value.
    pub fn widened(mut self) -> Self {
        if self.mode == Mode::Constant {
            self.width = 4;
        }
        self
    }

    pub fn encoded_width(&self) -> u8 {
        self.width
    }

    pub fn addressing_nibble(&self) -> u8 {
        let size_code = match self.width {
            4 => 3,
            w => w,
        };
        size_code + self.mode.nibble_offset()
    }

    /// Replaces a symbolic value with its constant or label position.
    /// Constants win over labels of the same name. The width is left alone.
    pub fn resolve(
        &mut self,
        symbols: &SymbolTable,
        constants: &ConstantTable,
        loc: &SourceLoc,
    ) -> Result<()> {
        let Value::Symbol(name) = &self.value else {
            return Ok(());
        };
        let value = constants
            .get(name)
            .or_else(|| symbols.position(name).map(|p| p as i32))
            .ok_or_else(|| AsmError::UndefinedSymbol {
                loc: loc.clone(),
                name: name.clone(),
            })?;
        self.value = Value::Literal(value);
        Ok(())
    }

    /// The number written to the image, before any branch adjustment.
    /// Local variables are addressed by byte offset, four bytes per slot.
    pub fn machine_value(&self) -> Option<i32> {
        self.value().map(|v| scaled(self.mode, v))
    }

    /// Writes `value` big-endian at this operand's width.
    pub fn write_value<S: Sink + ?Sized>(&self, value: i32, out: &mut S) {
        match self.width {
            0 => {}
            1 => out.put_u8(value as u8),
            2 => out.put_u16(value as u16),
            _ => out.put_u32(value as u32),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mode == Mode::Variable && self.value == Value::Literal(STACK_TOP) {
            return write!(f, "sp");
        }
        match &self.value {
            Value::Literal(v) => write!(f, "{}{v:#x}/{}", self.mode.sigil(), self.width),
            Value::Symbol(name) => write!(f, "{}{name}/{}", self.mode.sigil(), self.width),
        }
    }
}

fn scaled(mode: Mode, value: i32) -> i32 {
    if mode == Mode::Variable && value != STACK_TOP {
        value.wrapping_mul(4)
    } else {
        value
    }
}

fn width_for(mode: Mode, value: i32) -> u8 {
    match mode {
        Mode::Constant => {
            if value == 0 {
                0
            } else if cast::<i32, i8>(value).is_some() {
                1
            } else if cast::<i32, i16>(value).is_some() {
                2
            } else {
                4
            }
        }
        Mode::Variable if value == STACK_TOP => 0,
        _ => {
            let raw = scaled(mode, value) as u32;
            if cast::<u32, u8>(raw).is_some() {
                1
            } else if cast::<u32, u16>(raw).is_some() {
                2
            } else {
                4
            }
        }
    }
}
