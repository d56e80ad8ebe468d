//! Streaming driver: one pass over a byte stream, rows to `out`, raw bad lines to `rejects`.

use crate::normalizer::{ParseFailure, RecordNormalizer};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// Outcome counters for one stream (or a merged set of streams).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    pub lines: u64,
    pub emitted: u64,
    pub rejected: u64,
    pub invalid_usernames: u64,
    pub invalid_utf8: u64,
    pub input_bytes: u64, // decompressed bytes consumed
}

impl StreamStats {
    pub fn merge(&mut self, other: &StreamStats) {
        self.lines += other.lines;
        self.emitted += other.emitted;
        self.rejected += other.rejected;
        self.invalid_usernames += other.invalid_usernames;
        self.invalid_utf8 += other.invalid_utf8;
        self.input_bytes += other.input_bytes;
    }
}

/// Normalize every line of `reader`.
///
/// Lines are split on `\n`; a final line without a terminator is still processed.
/// Rejected lines are copied to `rejects` byte-for-byte, terminator included.
/// `on_line` is called after each line with the raw line length, for progress.
/// Any I/O error is returned; parse failures never are.
pub fn normalize_stream<R, W, E>(
    normalizer: &RecordNormalizer,
    reader: &mut R,
    out: &mut W,
    rejects: &mut E,
    mut on_line: impl FnMut(u64),
) -> Result<StreamStats>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
    E: Write + ?Sized,
{
    let mut stats = StreamStats::default();
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).context("read input line")?;
        if n == 0 {
            break;
        }
        stats.lines += 1;
        stats.input_bytes += n as u64;

        match normalizer.normalize_bytes(&buf) {
            Ok(row) => {
                if !row.valid_username {
                    stats.invalid_usernames += 1;
                }
                row.write_line(out).context("write normalized row")?;
                stats.emitted += 1;
            }
            Err(failure) => {
                if failure == ParseFailure::InvalidUtf8 {
                    stats.invalid_utf8 += 1;
                }
                rejects.write_all(&buf).context("write rejected line")?;
                stats.rejected += 1;
            }
        }
        on_line(n as u64);
    }
    out.flush().context("flush normalized output")?;
    rejects.flush().context("flush rejects")?;
    Ok(stats)
}
