use sluice_device::ProgramSource;

use crate::{Error, ProgramSourceExt};

#[test]
fn test_from_dir_keeps_requested_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("essentials.cl"), "#define A 1\n").unwrap();
    std::fs::write(dir.path().join("countlink.cl"), "__kernel void count_downchannels() {}").unwrap();
    std::fs::write(dir.path().join("unused.cl"), "junk").unwrap();

    let source = ProgramSource::from_dir("countlink", dir.path(), &["essentials.cl", "countlink.cl"]).unwrap();
    assert_eq!(source.name, "countlink");
    assert_eq!(source.fragment_names().collect::<Vec<_>>(), ["essentials.cl", "countlink.cl"]);
    assert_eq!(source.render(), "#define A 1\n__kernel void count_downchannels() {}\n");
}

#[test]
fn test_missing_fragment() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("essentials.cl"), "").unwrap();

    let err = ProgramSource::from_dir("label", dir.path(), &["essentials.cl", "label.cl"]).unwrap_err();
    match err {
        Error::FragmentNotFound { path } => assert!(path.ends_with("label.cl")),
        other => panic!("expected FragmentNotFound, got {other}"),
    }
}
