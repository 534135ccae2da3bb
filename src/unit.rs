use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoder::Instruction;
use crate::error::{AsmError, Result, SourceLoc};
use crate::operand::Operand;
use crate::sink::Sink;
use crate::strings::{encode_string, StringKind};
use crate::symbols::{ConstantTable, SymbolTable};

/// Something with a fixed byte size that can write itself into the image.
pub trait Emit {
    fn size_in_bytes(&self) -> u32;
    fn emit<S: Sink>(&self, position: u32, out: &mut S, loc: &SourceLoc) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelKind {
    BuiltIn,
    General,
    Object,
    String,
    StackFunction,
    LocalFunction,
    Data,
}

impl LabelKind {
    pub fn is_function(self) -> bool {
        matches!(self, LabelKind::StackFunction | LabelKind::LocalFunction)
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // padding flags apply to the name
        f.pad(&format!("{self:?}"))
    }
}

const LOCALS_PER_ENTRY: u32 = 255;
const LOCAL_SLOT_BYTES: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub kind: LabelKind,
    pub locals: u32,
}

impl Label {
    pub fn new(name: impl Into<String>, kind: LabelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            locals: 0,
        }
    }

    pub fn general(name: impl Into<String>) -> Self {
        Self::new(name, LabelKind::General)
    }

    /// A function entry point followed by its header: type byte, one
    /// `(4, count)` pair per 255 locals and a `(0, 0)` terminator.
    pub fn function(name: impl Into<String>, kind: LabelKind, locals: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            locals,
        }
    }

    fn local_entries(&self) -> u32 {
        self.locals.div_ceil(LOCALS_PER_ENTRY)
    }
}

impl Emit for Label {
    fn size_in_bytes(&self) -> u32 {
        if !self.kind.is_function() {
            return 0;
        }
        1 + 2 * self.local_entries() + 2
    }

    fn emit<S: Sink>(&self, _position: u32, out: &mut S, _loc: &SourceLoc) -> Result<()> {
        if !self.kind.is_function() {
            return Ok(());
        }
        out.put_u8(if self.kind == LabelKind::StackFunction { 0xC0 } else { 0xC1 });
        let mut left = self.locals;
        while left > 0 {
            let count = left.min(LOCALS_PER_ENTRY);
            out.put_u8(LOCAL_SLOT_BYTES);
            out.put_u8(count as u8);
            left -= count;
        }
        out.put_u8(0);
        out.put_u8(0);
        Ok(())
    }
}

/// Raw bytes of known length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    bytes: Vec<u8>,
}

impl Data {
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
        }
    }

    pub fn word(value: u32) -> Self {
        Self {
            bytes: value.to_be_bytes().to_vec(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// `bytes` zero padded out to at least `min_len`.
    pub fn padded(min_len: usize, mut bytes: Vec<u8>) -> Self {
        if bytes.len() < min_len {
            bytes.resize(min_len, 0);
        }
        Self { bytes }
    }

    pub fn string(text: &str, kind: StringKind, loc: &SourceLoc) -> Result<Self> {
        let bytes = encode_string(text, kind).map_err(|ch| {
            AsmError::capacity(
                loc,
                format!("character {ch:?} does not fit a basic string"),
            )
        })?;
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Emit for Data {
    fn size_in_bytes(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn emit<S: Sink>(&self, _position: u32, out: &mut S, _loc: &SourceLoc) -> Result<()> {
        out.put_slice(&self.bytes);
        Ok(())
    }
}

/// A table of 4-byte words whose entries may be symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarData {
    items: Vec<Operand>,
    capacity: Option<usize>,
}

impl VarData {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table that always occupies `capacity` words.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity: Some(capacity),
        }
    }

    pub fn push(&mut self, item: Operand, loc: &SourceLoc) -> Result<()> {
        if let Some(cap) = self.capacity {
            if self.items.len() >= cap {
                return Err(AsmError::capacity(
                    loc,
                    format!("word table holds {cap} item(s); cannot add more"),
                ));
            }
        }
        self.items.push(item);
        Ok(())
    }

    pub fn items(&self) -> &[Operand] {
        &self.items
    }

    pub fn resolve(
        &mut self,
        symbols: &SymbolTable,
        constants: &ConstantTable,
        loc: &SourceLoc,
    ) -> Result<()> {
        for item in &mut self.items {
            item.resolve(symbols, constants, loc)?;
        }
        Ok(())
    }

    fn words(&self) -> usize {
        self.items.len().max(self.capacity.unwrap_or(0))
    }
}

impl Emit for VarData {
    fn size_in_bytes(&self) -> u32 {
        (self.words() * 4) as u32
    }

    fn emit<S: Sink>(&self, _position: u32, out: &mut S, loc: &SourceLoc) -> Result<()> {
        for item in &self.items {
            let value = item
                .machine_value()
                .ok_or_else(|| AsmError::internal(loc, format!("unresolved word {item}")))?;
            out.put_u32(value as u32);
        }
        for _ in self.items.len()..self.words() {
            out.put_u32(0);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    Instruction(Instruction),
    Label(Label),
    Data(Data),
    VarData(VarData),
}

impl From<Instruction> for UnitKind {
    fn from(v: Instruction) -> Self {
        UnitKind::Instruction(v)
    }
}

impl From<Label> for UnitKind {
    fn from(v: Label) -> Self {
        UnitKind::Label(v)
    }
}

impl From<Data> for UnitKind {
    fn from(v: Data) -> Self {
        UnitKind::Data(v)
    }
}

impl From<VarData> for UnitKind {
    fn from(v: VarData) -> Self {
        UnitKind::VarData(v)
    }
}

/// One positioned element of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub kind: UnitKind,
    pub loc: SourceLoc,
    position: Option<u32>,
}

impl Unit {
    pub fn new(kind: impl Into<UnitKind>, loc: SourceLoc) -> Self {
        Self {
            kind: kind.into(),
            loc,
            position: None,
        }
    }

    pub fn position(&self) -> Option<u32> {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: u32) {
        self.position = Some(position);
    }

    pub fn label(&self) -> Option<&Label> {
        match &self.kind {
            UnitKind::Label(l) => Some(l),
            _ => None,
        }
    }

    pub fn size_in_bytes(&self) -> u32 {
        match &self.kind {
            UnitKind::Instruction(i) => i.size_in_bytes(),
            UnitKind::Label(l) => l.size_in_bytes(),
            UnitKind::Data(d) => d.size_in_bytes(),
            UnitKind::VarData(v) => v.size_in_bytes(),
        }
    }

    pub fn resolve(&mut self, symbols: &SymbolTable, constants: &ConstantTable) -> Result<()> {
        match &mut self.kind {
            UnitKind::Instruction(i) => i.resolve(symbols, constants, &self.loc),
            UnitKind::VarData(v) => v.resolve(symbols, constants, &self.loc),
            UnitKind::Label(_) | UnitKind::Data(_) => Ok(()),
        }
    }

    /// Writes the unit at its assigned position. The sink must already be at
    /// that position, and the unit must write exactly the number of bytes it
    /// reported during layout.
    pub fn emit<S: Sink>(&self, out: &mut S) -> Result<()> {
        let position = self
            .position
            .ok_or_else(|| AsmError::internal(&self.loc, "unit emitted before layout"))?;
        let start = out.offset();
        if start != position as usize {
            return Err(AsmError::internal(
                &self.loc,
                format!("unit placed at {position:#x} but output is at {start:#x}"),
            ));
        }
        match &self.kind {
            UnitKind::Instruction(i) => i.emit(position, out, &self.loc)?,
            UnitKind::Label(l) => l.emit(position, out, &self.loc)?,
            UnitKind::Data(d) => d.emit(position, out, &self.loc)?,
            UnitKind::VarData(v) => v.emit(position, out, &self.loc)?,
        }
        let written = out.offset() - start;
        if written != self.size_in_bytes() as usize {
            return Err(AsmError::internal(
                &self.loc,
                format!(
                    "unit sized {} bytes during layout but wrote {written}",
                    self.size_in_bytes()
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            UnitKind::Instruction(i) => write!(f, "{i}")?,
            UnitKind::Label(l) if l.kind.is_function() => {
                write!(f, "{}: {} locals={}", l.name, l.kind, l.locals)?
            }
            UnitKind::Label(l) => write!(f, "{}: {}", l.name, l.kind)?,
            UnitKind::Data(d) => write!(f, "data [{} bytes]", d.bytes.len())?,
            UnitKind::VarData(v) => {
                write!(f, "words [")?;
                for (i, item) in v.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "] x{}", v.words())?;
            }
        }
        write!(f, " @{}", self.loc)
    }
}
