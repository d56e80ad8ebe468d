//! Batch mode: find every author dump under a directory and preprocess each one into a
//! `<stem>_processed.csv.zst` sibling (or into a separate output directory that mirrors
//! the input tree).

use crate::integrity::check_files;
use crate::pipeline::{AuthorPrep, IoPlan};
use crate::progress::make_count_progress;
use crate::report::{BatchReport, FailedFile, RunReport};
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PROCESSED_SUFFIX: &str = "_processed";
const REJECTS_SUFFIX: &str = "_rejects";

/// One planned file: dump in, normalized rows and rejected lines out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub rejects: PathBuf,
}

fn dump_name_re() -> Regex {
    Regex::new(r"^(RA_.+?)\.csv(\.zst)?$").unwrap()
}

/// Stem of an author dump file name (`RA_78M.csv.zst` -> `RA_78M`), or `None` for
/// anything that is not a raw dump, including our own outputs.
pub fn dump_stem(file_name: &str) -> Option<String> {
    stem_with(&dump_name_re(), file_name)
}

fn stem_with(re: &Regex, file_name: &str) -> Option<String> {
    let caps = re.captures(file_name)?;
    let stem = caps.get(1)?.as_str();
    if stem.ends_with(PROCESSED_SUFFIX) || stem.ends_with(REJECTS_SUFFIX) {
        return None;
    }
    Some(stem.to_string())
}

/// Raw author dumps under `dir` (recursive), sorted by path.
pub fn discover_author_dumps(dir: &Path) -> Vec<PathBuf> {
    let re = dump_name_re();
    let mut found = Vec::new();
    if !dir.exists() {
        return found;
    }
    for ent in WalkDir::new(dir).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        if !ent.file_type().is_file() {
            continue;
        }
        let Some(name) = ent.file_name().to_str() else { continue };
        if stem_with(&re, name).is_some() {
            found.push(ent.path().to_path_buf());
        }
    }
    found.sort();
    found
}

/// Map each dump found under `root` to its outputs. With `out_dir`, outputs land there
/// under the input's directory relative to `root`; otherwise next to the input.
pub fn plan_jobs(root: &Path, inputs: &[PathBuf], out_dir: Option<&Path>) -> Vec<AuthorJob> {
    let re = dump_name_re();
    inputs
        .iter()
        .filter_map(|input| {
            let name = input.file_name()?.to_str()?;
            let stem = stem_with(&re, name)?;
            let parent = input.parent().unwrap_or(Path::new(""));
            let dir = match out_dir {
                Some(d) => d.join(parent.strip_prefix(root).unwrap_or(Path::new(""))),
                None => parent.to_path_buf(),
            };
            Some(AuthorJob {
                input: input.clone(),
                output: dir.join(format!("{stem}{PROCESSED_SUFFIX}.csv.zst")),
                rejects: dir.join(format!("{stem}{REJECTS_SUFFIX}.txt.zst")),
            })
        })
        .collect()
}

/// Pull out every job whose output path is planned for more than one input
/// (`RA_x.csv` next to `RA_x.csv.zst`). None of them run; each is reported failed.
pub fn take_colliding_jobs(jobs: &mut Vec<AuthorJob>) -> Vec<FailedFile> {
    let mut claims: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
    for j in jobs.iter() {
        claims.entry(j.output.clone()).or_default().push(j.input.clone());
    }
    let mut failed = Vec::new();
    jobs.retain(|j| {
        let inputs = &claims[&j.output];
        if inputs.len() < 2 {
            return true;
        }
        let others: Vec<String> =
            inputs.iter().filter(|p| **p != j.input).map(|p| p.display().to_string()).collect();
        failed.push(FailedFile {
            input: j.input.clone(),
            error: format!("output {} is also planned for {}", j.output.display(), others.join(", ")),
        });
        false
    });
    failed
}

impl AuthorPrep {
    /// Preprocess every author dump under `dir`. Files are processed at most
    /// `file_concurrency` at a time; a failing file is recorded and the rest continue.
    pub fn run_batch(&self, dir: &Path, out_dir: Option<&Path>) -> Result<BatchReport> {
        if !dir.is_dir() {
            return Err(anyhow!("not a directory: {}", dir.display()));
        }
        let inputs = discover_author_dumps(dir);
        if inputs.is_empty() {
            tracing::warn!("No author dumps (RA_*.csv[.zst]) found under {}", dir.display());
        } else {
            tracing::info!("Planned {} files for processing.", inputs.len());
        }
        let mut jobs = plan_jobs(dir, &inputs, out_dir);

        let mut report = BatchReport::default();
        for f in take_colliding_jobs(&mut jobs) {
            tracing::warn!("skipping {}: {}", f.input.display(), f.error);
            report.failed.push(f);
        }
        if let Some(mode) = self.opts.verify {
            let planned: Vec<PathBuf> = jobs.iter().map(|j| j.input.clone()).collect();
            let bad = check_files(&planned, mode, self.opts.file_concurrency, self.opts.progress);
            for (path, error) in bad {
                tracing::warn!("skipping {} after failed integrity check", path.display());
                jobs.retain(|j| j.input != path);
                report.failed.push(FailedFile { input: path, error });
            }
        }

        // Per-file bars would interleave; one count bar for the whole batch instead.
        let worker = self.clone().progress(false).verify(None);
        let pb = if self.opts.progress { Some(make_count_progress(jobs.len() as u64, "Preprocessing authors")) } else { None };
        let results = Mutex::new(Vec::<(usize, Result<RunReport>)>::new());

        let run_one = |idx: usize, job: &AuthorJob| {
            tracing::debug!("processing {} -> {}", job.input.display(), job.output.display());
            let plan = IoPlan::stdio().input(&job.input).output(&job.output).rejects(&job.rejects);
            let res = worker.run(&plan);
            results.lock().push((idx, res));
            if let Some(pb) = &pb { pb.inc(1); }
        };

        let limit = self.opts.file_concurrency.max(1);
        if limit <= 1 {
            for (idx, job) in jobs.iter().enumerate() {
                run_one(idx, job);
            }
        } else {
            let indexed: Vec<(usize, &AuthorJob)> = jobs.iter().enumerate().collect();
            for chunk in indexed.chunks(limit) {
                chunk.par_iter().for_each(|(idx, job)| run_one(*idx, *job));
            }
        }
        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }

        let mut results = results.into_inner();
        results.sort_by_key(|(idx, _)| *idx);
        for (idx, res) in results {
            match res {
                Ok(r) => {
                    report.totals.merge(&r.stats);
                    report.files.push(r);
                }
                Err(e) => {
                    let input = jobs[idx].input.clone();
                    tracing::warn!("failed to preprocess {}: {:#}", input.display(), e);
                    report.failed.push(FailedFile { input, error: format!("{:#}", e) });
                }
            }
        }

        tracing::info!(
            "batch done: {} files ok, {} failed, {} rows emitted, {} lines rejected",
            report.files.len(), report.failed.len(), report.totals.emitted, report.totals.rejected
        );
        Ok(report)
    }
}
