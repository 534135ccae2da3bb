//! The object file: everything one assembly session accumulates, and the two
//! layout passes that turn it into an image.

use tracing::{debug, info, warn};

use crate::config::AsmConfig;
use crate::error::{AsmError, Result, SourceLoc, Warning};
use crate::image::{self, GlulxImage, HEADER_SIZE, PAGE};
use crate::symbols::{ConstantTable, SymbolTable};
use crate::strings::StringTable;
use crate::unit::{Data, Label, LabelKind, Unit, UnitKind};

/// Written right after the header so tools can tell who built the image.
pub const ROM_SIGNATURE: u32 = 0x4747_4153; // "GGAS"
pub const START_OF_RAM: &str = "_startOfRAM";
pub const ENTRY_POINT: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Accumulating,
    PositionAssigned,
    SymbolsResolved,
    Encoded,
}

#[derive(Debug)]
pub struct ObjectFile {
    rom: Vec<Unit>,
    ram: Vec<Unit>,
    to_rom: bool,
    symbols: SymbolTable,
    constants: ConstantTable,
    strings: StringTable,
    stack_size: u32,
    stage: Stage,
    rom_end: u32,
    code_size: u32,
    warnings: Vec<Warning>,
}

impl Default for ObjectFile {
    fn default() -> Self {
        Self::new(&AsmConfig::default())
    }
}

impl ObjectFile {
    pub fn new(cfg: &AsmConfig) -> Self {
        let mut obj = Self {
            rom: Vec::new(),
            ram: Vec::new(),
            to_rom: false,
            symbols: SymbolTable::default(),
            constants: ConstantTable::default(),
            strings: StringTable::default(),
            stack_size: 0,
            stage: Stage::Accumulating,
            rom_end: 0,
            code_size: 0,
            warnings: Vec::new(),
        };
        obj.set_stack_size(cfg.stack_size);
        obj.ram.push(Unit::new(
            Label::new(START_OF_RAM, LabelKind::BuiltIn),
            SourceLoc::default(),
        ));
        if cfg.rom_signature {
            obj.rom
                .push(Unit::new(Data::word(ROM_SIGNATURE), SourceLoc::default()));
        }
        obj
    }

    /// Appends a unit to the segment selected by [`toggle_rom`](Self::toggle_rom).
    pub fn add_unit(&mut self, kind: impl Into<UnitKind>, loc: SourceLoc) -> Result<()> {
        if self.stage != Stage::Accumulating {
            return Err(AsmError::internal(&loc, "unit added after layout"));
        }
        let unit = Unit::new(kind, loc);
        if self.to_rom {
            self.rom.push(unit);
        } else {
            self.ram.push(unit);
        }
        Ok(())
    }

    pub fn toggle_rom(&mut self, to_rom: bool) {
        self.to_rom = to_rom;
    }

    pub fn is_to_rom(&self) -> bool {
        self.to_rom
    }

    /// Sets the stack size in bytes, rounding up to a whole page.
    pub fn set_stack_size(&mut self, bytes: u32) {
        let rounded = bytes.next_multiple_of(PAGE);
        if rounded != bytes {
            self.warn(Warning::StackSizeRounded {
                requested: bytes,
                rounded,
            });
        }
        self.stack_size = rounded;
    }

    pub fn add_constant(&mut self, name: &str, value: i32, loc: SourceLoc) {
        if self.constants.define(name, value, loc.clone()).is_some() {
            self.warn(Warning::ConstantRedefined {
                name: name.to_string(),
                loc,
            });
        }
    }

    /// Canonical label for a string literal.
    pub fn intern_string(&mut self, content: &str) -> String {
        self.strings.intern(content)
    }

    pub fn alias_string(&mut self, label: &str, content: &str) -> String {
        self.strings.alias(label, content)
    }

    pub fn rom(&self) -> &[Unit] {
        &self.rom
    }

    pub fn ram(&self) -> &[Unit] {
        &self.ram
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// First RAM address. Valid once positions are assigned.
    pub fn rom_end(&self) -> u32 {
        self.rom_end
    }

    /// Unpadded end of the image. Valid once positions are assigned.
    pub fn code_size(&self) -> u32 {
        self.code_size
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Pass 1: reserves the header, stores the string pool, then walks ROM
    /// and RAM assigning positions and registering labels.
    pub fn layout(&mut self) -> Result<()> {
        self.expect_stage(Stage::Accumulating, "layout")?;
        self.rom.insert(
            0,
            Unit::new(Data::zeroed(HEADER_SIZE), SourceLoc::default()),
        );
        self.strings.materialize(&mut self.rom)?;

        let mut duplicates = Vec::new();
        let rom_size = place(&mut self.rom, 0, &mut self.symbols, &mut duplicates)?;
        let rom_end = rom_size
            .checked_next_multiple_of(PAGE)
            .ok_or_else(|| AsmError::capacity(&SourceLoc::default(), "ROM exceeds 4 GiB"))?;
        let mut padding = Unit::new(
            Data::zeroed((rom_end - rom_size) as usize),
            SourceLoc::default(),
        );
        padding.set_position(rom_size);
        self.rom.push(padding);
        let code_size = place(&mut self.ram, rom_end, &mut self.symbols, &mut duplicates)?;

        for warning in duplicates {
            self.warn(warning);
        }
        self.rom_end = rom_end;
        self.code_size = code_size;
        self.stage = Stage::PositionAssigned;
        debug!(
            rom_units = self.rom.len(),
            ram_units = self.ram.len(),
            rom_end,
            code_size,
            "positions assigned"
        );
        Ok(())
    }

    /// Position of `main`, which must be a function.
    pub fn entry_point(&self) -> Result<u32> {
        match self.symbols.get(ENTRY_POINT) {
            Some(sym) if sym.kind.is_function() => Ok(sym.position),
            _ => Err(AsmError::MissingEntryPoint),
        }
    }

    /// Pass 2: replaces every symbolic operand with its value.
    pub fn resolve(&mut self) -> Result<()> {
        self.expect_stage(Stage::PositionAssigned, "symbol resolution")?;
        for unit in self.rom.iter_mut().chain(self.ram.iter_mut()) {
            unit.resolve(&self.symbols, &self.constants)?;
        }
        self.stage = Stage::SymbolsResolved;
        debug!(symbols = self.symbols.len(), "symbols resolved");
        Ok(())
    }

    /// Runs both passes and encodes the image. Any error leaves no image.
    pub fn build(&mut self) -> Result<GlulxImage> {
        if self.stage == Stage::Accumulating {
            self.layout()?;
        }
        let entry = self.entry_point()?;
        if self.stage == Stage::PositionAssigned {
            self.resolve()?;
        }
        self.expect_stage(Stage::SymbolsResolved, "encoding")?;
        let img = image::write_image(
            &self.rom,
            &self.ram,
            image::Header::new(self.rom_end, self.code_size, self.stack_size, entry),
        )?;
        self.stage = Stage::Encoded;
        info!(
            bytes = img.bytes().len(),
            entry,
            checksum = img.header().checksum,
            "image built"
        );
        Ok(img)
    }

    fn expect_stage(&self, want: Stage, what: &str) -> Result<()> {
        if self.stage == want {
            Ok(())
        } else {
            Err(AsmError::internal(
                &SourceLoc::default(),
                format!("{what} needs stage {want:?} but object file is {:?}", self.stage),
            ))
        }
    }
}

/// Assigns running positions from `start`, registering labels. Returns the
/// position after the last unit.
fn place(
    units: &mut [Unit],
    start: u32,
    symbols: &mut SymbolTable,
    duplicates: &mut Vec<Warning>,
) -> Result<u32> {
    let mut position = start;
    for unit in units {
        unit.set_position(position);
        if let Some(label) = unit.label() {
            if let Err(first) = symbols.define(&label.name, position, label.kind, unit.loc.clone()) {
                duplicates.push(Warning::DuplicateLabel {
                    name: label.name.clone(),
                    first: first.loc.clone(),
                    duplicate: unit.loc.clone(),
                });
            }
        }
        position = position
            .checked_add(unit.size_in_bytes())
            .ok_or_else(|| AsmError::capacity(&unit.loc, "image exceeds 4 GiB"))?;
    }
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Instruction;
    use crate::mnemonic::Mnemonic;

    fn bare() -> ObjectFile {
        ObjectFile::new(&AsmConfig {
            rom_signature: false,
            ..AsmConfig::default()
        })
    }

    fn quit() -> Instruction {
        Instruction::new(*Mnemonic::lookup("quit").unwrap(), vec![])
    }

    #[test]
    fn new_object_file_has_builtins() {
        let obj = ObjectFile::default();
        assert_eq!(obj.rom().len(), 1);
        assert_eq!(obj.ram()[0].label().unwrap().name, START_OF_RAM);
        assert_eq!(obj.stack_size(), 2048);
    }

    #[test]
    fn stack_size_rounds_up_with_warning() {
        let mut obj = bare();
        obj.set_stack_size(1000);
        assert_eq!(obj.stack_size(), 1024);
        assert_eq!(
            obj.warnings(),
            [Warning::StackSizeRounded {
                requested: 1000,
                rounded: 1024
            }]
        );
        obj.set_stack_size(4096);
        assert_eq!(obj.warnings().len(), 1);
    }

    #[test]
    fn layout_pads_rom_to_a_page() {
        let mut obj = bare();
        obj.add_unit(
            Label::function("main", LabelKind::LocalFunction, 0),
            SourceLoc::new("t", 1),
        )
        .unwrap();
        obj.add_unit(quit(), SourceLoc::new("t", 2)).unwrap();
        obj.layout().unwrap();
        assert_eq!(obj.rom_end(), 256);
        assert_eq!(obj.code_size(), 256 + 3 + 2);
        assert_eq!(obj.symbols().position(START_OF_RAM), Some(256));
        assert_eq!(obj.entry_point().unwrap(), 256);
        let pad = obj.rom().last().unwrap();
        assert_eq!(pad.position(), Some(36));
        assert_eq!(pad.size_in_bytes(), 220);
    }

    #[test]
    fn rom_units_go_to_rom() {
        let mut obj = bare();
        obj.toggle_rom(true);
        obj.add_unit(Label::general("table"), SourceLoc::default())
            .unwrap();
        obj.add_unit(Data::zeroed(300), SourceLoc::default()).unwrap();
        obj.toggle_rom(false);
        obj.layout().unwrap();
        assert_eq!(obj.symbols().position("table"), Some(36));
        assert_eq!(obj.rom_end(), 512);
    }

    #[test]
    fn duplicate_labels_keep_the_first() {
        let mut obj = bare();
        obj.add_unit(Label::general("x"), SourceLoc::new("a", 1)).unwrap();
        obj.add_unit(Data::zeroed(4), SourceLoc::new("a", 2)).unwrap();
        obj.add_unit(Label::general("x"), SourceLoc::new("a", 3)).unwrap();
        obj.layout().unwrap();
        assert_eq!(obj.symbols().position("x"), Some(256));
        assert!(matches!(
            &obj.warnings()[0],
            Warning::DuplicateLabel { name, .. } if name == "x"
        ));
    }

    #[test]
    fn main_must_be_a_function() {
        let mut obj = bare();
        obj.add_unit(Label::general("main"), SourceLoc::default())
            .unwrap();
        let err = obj.build().unwrap_err();
        assert!(matches!(err, AsmError::MissingEntryPoint));
    }

    #[test]
    fn passes_run_in_order() {
        let mut obj = bare();
        assert!(matches!(obj.resolve(), Err(AsmError::Internal { .. })));
        obj.layout().unwrap();
        assert!(matches!(obj.layout(), Err(AsmError::Internal { .. })));
        assert!(obj.add_unit(quit(), SourceLoc::default()).is_err());
    }
}
