use crate::progress::make_count_progress;
use crate::zstd_io::{is_zst, quick_validate_zst, validate_zst_full};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Mode for integrity checks of compressed dumps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegrityMode {
    /// Decode only the first `sample_bytes` (decompressed) per file.
    /// Fast and catches early corruption; cannot detect late/trailing corruption.
    Quick { sample_bytes: u64 },
    /// Decode entire stream; slowest but most thorough (validates checksums).
    Full,
}

impl IntegrityMode {
    pub const DEFAULT_QUICK: IntegrityMode = IntegrityMode::Quick { sample_bytes: 64 * 1024 * 1024 };

    fn label(&self) -> &'static str {
        match self {
            IntegrityMode::Quick { .. } => "Integrity (quick)",
            IntegrityMode::Full => "Integrity (full)",
        }
    }
}

/// Check one file. Plain (non-`.zst`) files have nothing to decode and always pass.
pub fn check_file(path: &Path, mode: IntegrityMode) -> anyhow::Result<()> {
    if !is_zst(path) {
        return Ok(());
    }
    match mode {
        IntegrityMode::Quick { sample_bytes } => quick_validate_zst(path, sample_bytes),
        IntegrityMode::Full => validate_zst_full(path),
    }
}

/// Check every file, at most `concurrency` at a time. Returns `(path, error)` for each
/// failure, in input order.
pub fn check_files(files: &[PathBuf], mode: IntegrityMode, concurrency: usize, progress: bool) -> Vec<(PathBuf, String)> {
    let pb = if progress { Some(make_count_progress(files.len() as u64, mode.label())) } else { None };
    let errors = Mutex::new(Vec::<(usize, PathBuf, String)>::new());

    let run = |idx: usize, path: &PathBuf| {
        if let Err(e) = check_file(path, mode) {
            tracing::warn!("integrity check failed for {}: {:#}", path.display(), e);
            errors.lock().push((idx, path.clone(), format!("{:#}", e)));
        }
        if let Some(pb) = &pb { pb.inc(1); }
    };

    let limit = concurrency.max(1);
    if limit <= 1 {
        for (idx, path) in files.iter().enumerate() {
            run(idx, path);
        }
    } else {
        let indexed: Vec<(usize, &PathBuf)> = files.iter().enumerate().collect();
        for chunk in indexed.chunks(limit) {
            chunk.par_iter().for_each(|(idx, path)| run(*idx, *path));
        }
    }

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }
    let mut errs = errors.into_inner();
    errs.sort_by_key(|(idx, _, _)| *idx);
    errs.into_iter().map(|(_, p, e)| (p, e)).collect()
}
