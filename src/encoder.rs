//! Instruction encoding.
//!
//! An instruction is laid out as the opcode (1, 2 or 4 bytes), the
//! addressing-mode nibbles packed two per byte, then each operand's value at
//! its encoded width, all big-endian.

use std::fmt;

use crate::error::{AsmError, Result, SourceLoc};
use crate::mnemonic::Mnemonic;
use crate::operand::{Mode, Operand};
use crate::sink::Sink;
use crate::symbols::{ConstantTable, SymbolTable};
use crate::unit::Emit;

/// Glulx branches are relative to the end of the instruction, minus two.
const BRANCH_BIAS: i32 = 2;

pub fn opcode_width(opcode: u32) -> u32 {
    if opcode <= 0x7F {
        1
    } else if opcode <= 0x3FFF {
        2
    } else {
        4
    }
}

pub fn write_opcode<S: Sink + ?Sized>(opcode: u32, out: &mut S) {
    match opcode_width(opcode) {
        1 => out.put_u8(opcode as u8),
        2 => out.put_u16((opcode | 0x8000) as u16),
        _ => out.put_u32(opcode | 0xC000_0000),
    }
}

/// Addressing-mode bytes: first operand in the low nibble, second in the high.
pub fn mode_bytes(operands: &[Operand]) -> Vec<u8> {
    operands
        .chunks(2)
        .map(|pair| {
            let lo = pair[0].addressing_nibble();
            let hi = pair.get(1).map_or(0, Operand::addressing_nibble);
            lo | (hi << 4)
        })
        .collect()
}

/// Offset stored for a branch at `position` of `size` bytes to `target`.
pub fn branch_offset(target: i32, position: u32, size: u32) -> i32 {
    target
        .wrapping_sub(position.wrapping_add(size) as i32)
        .wrapping_add(BRANCH_BIAS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// A branch target written as a constant is stored as an offset, which
    /// can need more room than the target itself, so it always gets four
    /// bytes.
    pub fn new(mnemonic: Mnemonic, mut operands: Vec<Operand>) -> Self {
        if mnemonic.uses_relative_last_operand() {
            if let Some(last) = operands.pop() {
                operands.push(last.widened());
            }
        }
        Self { mnemonic, operands }
    }

    fn is_branch_target(&self, index: usize) -> bool {
        self.mnemonic.uses_relative_last_operand()
            && index + 1 == self.operands.len()
            && self.operands[index].mode() == Mode::Constant
    }

    pub fn opcode(&self) -> u32 {
        self.mnemonic.opcode
    }

    pub fn resolve(
        &mut self,
        symbols: &SymbolTable,
        constants: &ConstantTable,
        loc: &SourceLoc,
    ) -> Result<()> {
        for op in &mut self.operands {
            op.resolve(symbols, constants, loc)?;
        }
        Ok(())
    }

    /// Operand values as written. The constant target of a branch becomes an
    /// offset from the end of the instruction, however it was spelled.
    pub fn encoded_values(&self, position: u32, loc: &SourceLoc) -> Result<Vec<i32>> {
        let size = self.size_in_bytes();
        self.operands
            .iter()
            .enumerate()
            .map(|(i, op)| {
                let value = op.machine_value().ok_or_else(|| {
                    AsmError::internal(
                        loc,
                        format!("{}: operand {op} was never resolved", self.mnemonic.name),
                    )
                })?;
                if self.is_branch_target(i) {
                    Ok(branch_offset(value, position, size))
                } else {
                    Ok(value)
                }
            })
            .collect()
    }
}

impl Emit for Instruction {
    fn size_in_bytes(&self) -> u32 {
        let n = self.operands.len() as u32;
        let operand_bytes: u32 = self
            .operands
            .iter()
            .map(|o| u32::from(o.encoded_width()))
            .sum();
        opcode_width(self.opcode()) + n.div_ceil(2) + operand_bytes
    }

    fn emit<S: Sink>(&self, position: u32, out: &mut S, loc: &SourceLoc) -> Result<()> {
        let values = self.encoded_values(position, loc)?;
        write_opcode(self.opcode(), out);
        out.put_slice(&mode_bytes(&self.operands));
        for (op, value) in self.operands.iter().zip(values) {
            op.write_value(value, out);
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic.name)?;
        for op in &self.operands {
            write!(f, " {op}")?;
        }
        Ok(())
    }
}
