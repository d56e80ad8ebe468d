#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// A small author dump in the RA_*.csv layout: two good rows, one row with an invalid
/// username, one malformed line.
pub fn sample_author_lines() -> Vec<String> {
    vec![
        "123 valid_user 1609459200 None 42 -3".to_string(),
        "456 a 1609459200 1612137600 0 0".to_string(),
        "not a valid line at all".to_string(),
        "789 Some-Name_99 None None None None".to_string(),
    ]
}

/// Rows the sample lines normalize to, in order.
pub fn sample_expected_rows() -> Vec<String> {
    vec![
        "123|valid_user|1609459200||42|-3|1".to_string(),
        "456|a|1609459200|1612137600|0|0|0".to_string(),
        "789|Some-Name_99|||||1".to_string(),
    ]
}

/// Write a compressed `.zst` file containing the provided lines (each `\n`-terminated).
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// Write a plain text file with the provided lines (each `\n`-terminated).
pub fn write_plain_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for l in lines {
        writeln!(&mut f, "{}", l).unwrap();
    }
}

/// A file named like a dump but holding plain text, so zstd decoding must fail.
pub fn write_corrupt_zst(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    writeln!(&mut f, "123 valid_user 1609459200 None 42 -3").unwrap();
}

/// Decompress a `.zst` file and collect non-empty lines.
pub fn decompress_zst_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let dec = zstd::stream::read::Decoder::new(f).unwrap();
    let r = BufReader::new(dec);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// Decompress a `.zst` file into raw bytes.
pub fn decompress_zst_bytes(path: &Path) -> Vec<u8> {
    let f = File::open(path).unwrap();
    let mut dec = zstd::stream::read::Decoder::new(f).unwrap();
    let mut out = Vec::new();
    dec.read_to_end(&mut out).unwrap();
    out
}

/// Read a text file line-by-line into strings (skips empty lines).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// Fresh scratch directory that outlives the test (mirrors a dataset dir).
pub fn scratch_dir() -> PathBuf {
    tempfile::tempdir().unwrap().into_path()
}
