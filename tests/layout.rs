use ggasm::encoder::Instruction;
use ggasm::mnemonic::Mnemonic;
use ggasm::operand::{Mode, Operand};
use ggasm::unit::{Data, Label, LabelKind, UnitKind, VarData};
use ggasm::{AsmConfig, ObjectFile, SourceLoc, Stage, Warning};
use pretty_assertions::assert_eq;

fn loc(line: u32) -> SourceLoc {
    SourceLoc::new("layout.ga", line)
}

fn op(name: &str, operands: Vec<Operand>) -> Instruction {
    Instruction::new(*Mnemonic::lookup(name).unwrap(), operands)
}

fn with_main(obj: &mut ObjectFile) {
    obj.add_unit(Label::function("main", LabelKind::LocalFunction, 0), loc(1))
        .unwrap();
    obj.add_unit(op("quit", vec![]), loc(2)).unwrap();
}

#[test]
fn rom_end_rounds_up_to_a_page() {
    let mut obj = ObjectFile::default();
    obj.toggle_rom(true);
    obj.add_unit(Label::new("blob", LabelKind::Data), loc(3)).unwrap();
    obj.add_unit(Data::zeroed(300), loc(3)).unwrap();
    obj.toggle_rom(false);
    with_main(&mut obj);

    let img = obj.build().unwrap();
    // header, signature, 300 bytes of data
    assert_eq!(obj.symbols().position("blob"), Some(40));
    assert_eq!(obj.rom_end(), 512);
    assert_eq!(obj.rom_end() % 256, 0);
    assert_eq!(obj.entry_point().unwrap(), 512);
    assert_eq!(img.header().ram_start, 512);
    assert_eq!(img.bytes().len(), 768);
    assert_eq!(obj.stage(), Stage::Encoded);
    img.verify().unwrap();
}

#[test]
fn rom_padding_unit_is_always_present() {
    let mut obj = ObjectFile::new(&AsmConfig {
        rom_signature: false,
        ..AsmConfig::default()
    });
    obj.toggle_rom(true);
    obj.add_unit(Data::zeroed(256 - 36), loc(1)).unwrap();
    obj.toggle_rom(false);
    with_main(&mut obj);
    obj.layout().unwrap();

    let pad = obj.rom().last().unwrap();
    assert_eq!(pad.position(), Some(256));
    assert_eq!(pad.size_in_bytes(), 0);
    assert_eq!(obj.rom_end(), 256);
}

#[test]
fn configured_stack_size_lands_in_header() {
    let mut obj = ObjectFile::new(&AsmConfig {
        stack_size: 1000,
        ..AsmConfig::default()
    });
    with_main(&mut obj);
    let img = obj.build().unwrap();
    assert_eq!(img.header().stack_size, 1024);
    assert!(obj
        .warnings()
        .contains(&Warning::StackSizeRounded {
            requested: 1000,
            rounded: 1024
        }));
}

#[test]
fn duplicate_labels_warn_but_build() {
    let mut obj = ObjectFile::default();
    with_main(&mut obj);
    obj.add_unit(Label::general("here"), loc(5)).unwrap();
    obj.add_unit(Data::word(7), loc(6)).unwrap();
    obj.add_unit(Label::general("here"), loc(7)).unwrap();
    obj.add_unit(Data::word(8), loc(8)).unwrap();
    let mut words = VarData::new();
    words
        .push(Operand::symbol("here", Mode::Constant), &loc(9))
        .unwrap();
    obj.add_unit(words, loc(9)).unwrap();

    let img = obj.build().unwrap();
    let here = obj.symbols().position("here").unwrap();
    assert_eq!(here, 256 + 3 + 2);
    assert_eq!(
        obj.warnings(),
        [Warning::DuplicateLabel {
            name: "here".to_string(),
            first: loc(5),
            duplicate: loc(7),
        }]
    );
    let table = (here + 8) as usize;
    assert_eq!(&img.bytes()[table..table + 4], &here.to_be_bytes());
}

#[test]
fn every_unit_gets_a_position() {
    let mut obj = ObjectFile::default();
    obj.add_unit(Label::function("main", LabelKind::StackFunction, 2), loc(1))
        .unwrap();
    obj.add_unit(
        op("add", vec![Operand::literal(0, Mode::Variable), Operand::constant(1), Operand::stack()]),
        loc(2),
    )
    .unwrap();
    obj.add_unit(op("return", vec![Operand::stack()]), loc(3))
        .unwrap();
    obj.layout().unwrap();

    let mut expected = obj.rom_end();
    for unit in obj.ram() {
        assert_eq!(unit.position(), Some(expected));
        expected += unit.size_in_bytes();
    }
    assert_eq!(expected, obj.code_size());
    assert!(obj
        .ram()
        .iter()
        .any(|u| matches!(u.kind, UnitKind::Instruction(_))));
}
