use ggasm::image::{checksum, MAGIC, VERSION};
use ggasm::{assemble_source, AsmError, GlulxImage, ObjectFile, Stage};
use pretty_assertions::assert_eq;

fn build(src: &str) -> Result<GlulxImage, AsmError> {
    let mut obj = ObjectFile::default();
    assemble_source(&mut obj, "game.ga", src)?;
    obj.build()
}

#[test]
fn main_and_quit() {
    let img = build("function main 0\nquit\n").unwrap();
    let b = img.bytes();
    assert_eq!(b.len(), 512);

    let h = img.header();
    assert_eq!(h.magic, MAGIC);
    assert_eq!(&b[0..4], b"Glul");
    assert_eq!(h.version, VERSION);
    assert_eq!(h.ram_start, 256);
    assert_eq!(h.ext_start, 512);
    assert_eq!(h.end_mem, 512);
    assert_eq!(h.stack_size, 2048);
    assert_eq!(h.start_func, 256);
    assert_eq!(h.decoding_table, 0);

    assert_eq!(&b[36..40], b"GGAS");
    assert!(b[40..256].iter().all(|&x| x == 0));
    // local function header with no locals, then quit
    assert_eq!(&b[256..261], &[0xC1, 0x00, 0x00, 0x81, 0x20]);
    assert!(b[261..].iter().all(|&x| x == 0));

    assert_eq!(checksum(b), h.checksum);
    assert_eq!(u32::from_be_bytes([b[32], b[33], b[34], b[35]]), h.checksum);
    img.verify().unwrap();
}

#[test]
fn same_source_same_bytes() {
    let src = "function main 1\n\
               streamstr \"one\"\n\
               streamstr \"two\"\n\
               addString alias \"one\"\n\
               _call helper 1 2 sp\n\
               quit\n\
               stkfunction helper 0\n\
               return 0\n";
    let a = build(src).unwrap();
    let b = build(src).unwrap();
    assert_eq!(a.bytes(), b.bytes());
    a.verify().unwrap();
}

#[test]
fn branch_offsets_are_relative() {
    let img = build("function main 0\nloop: jump loop\n").unwrap();
    // main header is 3 bytes, so the jump sits at 259 and is 6 bytes long
    let offset = 259i32 - (259 + 6) + 2;
    let b = img.bytes();
    assert_eq!(&b[259..261], &[0x20, 0x03]);
    assert_eq!(&b[261..265], &offset.to_be_bytes());
}

#[test]
fn forward_call_is_absolute() {
    let img = build("function main 0\ncall f 0 sp\nquit\nfunction f 0\nreturn 1\n").unwrap();
    let b = img.bytes();
    // call: opcode, two mode bytes, 4-byte address, zero-width 0, zero-width sp
    assert_eq!(&b[259..262], &[0x30, 0x03, 0x08]);
    let f = u32::from_be_bytes([b[262], b[263], b[264], b[265]]);
    assert_eq!(f, 259 + 7 + 2);
    assert_eq!(&b[f as usize..f as usize + 3], &[0xC1, 0, 0]);
}

#[test]
fn undefined_symbol_builds_nothing() {
    let mut obj = ObjectFile::default();
    assemble_source(&mut obj, "game.ga", "function main 0\njump nowhere\n").unwrap();
    let err = obj.build().unwrap_err();
    match err {
        AsmError::UndefinedSymbol { name, loc } => {
            assert_eq!(name, "nowhere");
            assert_eq!(loc.line, 2);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_ne!(obj.stage(), Stage::Encoded);
}

#[test]
fn missing_main_is_reported() {
    let err = build("function start 0\nquit\n").unwrap_err();
    assert!(matches!(err, AsmError::MissingEntryPoint));
}

#[test]
fn syntax_errors_stop_before_build() {
    let mut obj = ObjectFile::default();
    let err = assemble_source(&mut obj, "game.ga", "function main 0\nquit 1\nbogus\n").unwrap_err();
    let AsmError::Aborted { errors } = err else {
        panic!("expected Aborted");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(obj.stage(), Stage::Accumulating);
}
