//! Run report: what was processed, where it went, and the outcome counters.

use crate::stream::StreamStats;
use crate::util::create_with_backoff;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// One processed input. Paths are `None` for stdio channels.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub rejects: Option<PathBuf>,
    pub started_at: String, // RFC 3339, UTC
    pub elapsed_ms: u64,
    pub stats: StreamStats,
}

/// Aggregate over a batch run.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchReport {
    pub files: Vec<RunReport>,
    pub failed: Vec<FailedFile>,
    pub totals: StreamStats,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedFile {
    pub input: PathBuf,
    pub error: String,
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("unknown"))
}

/// Pretty-printed JSON, written straight to `path` (overwrites).
pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let f = create_with_backoff(path, 16, 50).with_context(|| format!("create report {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, report).with_context(|| format!("serialize report {}", path.display()))?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}
