use std::path::PathBuf;

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    path.push("tests/fixtures");
    path.push(name);
    path
}

pub const POSITION_REPORT: &str = "!AIVDM,1,1,,B,15NPOOPP00o?b=bD5N5oOj2D0000,0*64";
