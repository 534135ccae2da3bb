use std::fs;

use ggasm::{assemble_file, AsmError, ObjectFile};
use pretty_assertions::assert_eq;

fn aborted(err: AsmError) -> Vec<AsmError> {
    match err {
        AsmError::Aborted { errors } => errors,
        other => panic!("expected Aborted, got {other:?}"),
    }
}

#[test]
fn includes_resolve_relative_to_the_including_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("lib")).unwrap();
    fs::write(
        dir.path().join("game.ga"),
        "include \"lib/util.ga\"\nfunction main 0\ncall util 0 sp\nquit\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("lib/util.ga"),
        "include \"consts.ga\"\nfunction util 0\nreturn ANSWER\n",
    )
    .unwrap();
    fs::write(dir.path().join("lib/consts.ga"), "constant ANSWER 42\n").unwrap();

    let mut obj = ObjectFile::default();
    assemble_file(&mut obj, &dir.path().join("game.ga")).unwrap();
    assert_eq!(obj.constants().get("ANSWER"), Some(42));

    let img = obj.build().unwrap();
    let util = obj.symbols().position("util").unwrap() as usize;
    // header, then return with a one-byte constant
    assert_eq!(&img.bytes()[util..util + 6], &[0xC1, 0, 0, 0x31, 0x01, 42]);
}

#[test]
fn circular_include_is_a_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.ga"), "include \"b.ga\"\nfunction main 0\nquit\n").unwrap();
    fs::write(dir.path().join("b.ga"), "nop\ninclude \"a.ga\"\n").unwrap();

    let mut obj = ObjectFile::default();
    let errors = aborted(assemble_file(&mut obj, &dir.path().join("a.ga")).unwrap_err());
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        AsmError::Syntax { loc, message } => {
            assert!(loc.file.ends_with("b.ga"));
            assert_eq!(loc.line, 2);
            assert!(message.contains("circular include"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_include_names_the_including_line() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.ga"), "nop\ninclude \"gone.ga\"\n").unwrap();
    let mut obj = ObjectFile::default();
    let errors = aborted(assemble_file(&mut obj, &dir.path().join("a.ga")).unwrap_err());
    match &errors[..] {
        [AsmError::Include { loc, path, .. }] => {
            assert!(loc.file.ends_with("a.ga"));
            assert_eq!(loc.line, 2);
            assert!(path.ends_with("gone.ga"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(errors[0].to_string().contains("a.ga:2: cannot include"));
}

#[test]
fn oversized_reservations_are_capacity_errors() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.ga"),
        "function main 0\nquit\nbytesFixed big 2000000000\nwordsFixed many 1000000000\n",
    )
    .unwrap();
    let mut obj = ObjectFile::default();
    let errors = aborted(assemble_file(&mut obj, &dir.path().join("a.ga")).unwrap_err());
    assert_eq!(errors.len(), 2);
    for (err, line) in errors.iter().zip([3, 4]) {
        match err {
            AsmError::CapacityExceeded { loc, .. } => assert_eq!(loc.line, line),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn errors_across_files_are_all_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.ga"),
        "include \"b.ga\"\nfunction main 0\njump\nquit\n",
    )
    .unwrap();
    fs::write(dir.path().join("b.ga"), "constant X\nnop ; fine\nbytes 8 t 300\n").unwrap();

    let mut obj = ObjectFile::default();
    let errors = aborted(assemble_file(&mut obj, &dir.path().join("a.ga")).unwrap_err());
    let lines: Vec<_> = errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(lines.len(), 3, "{lines:#?}");
    assert!(lines[0].contains("b.ga:1"));
    assert!(lines[1].contains("b.ga:3") && lines[1].contains("does not fit"));
    assert!(lines[2].contains("a.ga:3"));
}

#[test]
fn a_missing_root_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut obj = ObjectFile::default();
    let errors = aborted(assemble_file(&mut obj, &dir.path().join("nothing.ga")).unwrap_err());
    assert!(matches!(&errors[..], [AsmError::Io { .. }]));
}
