use crate::config::{PrepOptions, UsernamePolicy};
use crate::integrity::{check_file, IntegrityMode};
use crate::normalizer::RecordNormalizer;
use crate::progress::make_progress_bar_labeled;
use crate::report::{now_rfc3339, RunReport};
use crate::stream::{normalize_stream, StreamStats};
use crate::util::remove_with_backoff;
use crate::zstd_io::{open_input, OutputFile, SealedOutput};
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Where each channel of one run is bound. `None` means the process's stdio stream
/// (stdin / stdout / stderr respectively).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IoPlan {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub rejects: Option<PathBuf>,
}

impl IoPlan {
    pub fn stdio() -> Self {
        Self::default()
    }
    pub fn input(mut self, p: impl AsRef<Path>) -> Self { self.input = Some(p.as_ref().to_path_buf()); self }
    pub fn output(mut self, p: impl AsRef<Path>) -> Self { self.output = Some(p.as_ref().to_path_buf()); self }
    pub fn rejects(mut self, p: impl AsRef<Path>) -> Self { self.rejects = Some(p.as_ref().to_path_buf()); self }
}

/// A writable channel: a stdio stream or a file promoted on success.
enum Channel {
    Std(Box<dyn Write>),
    File(OutputFile),
}

impl Channel {
    fn open(path: Option<&Path>, opts: &PrepOptions, std: impl FnOnce() -> Box<dyn Write>) -> Result<Self> {
        match path {
            Some(p) => Ok(Channel::File(OutputFile::create(p, opts.write_buffer_bytes, opts.zstd_level)?)),
            None => Ok(Channel::Std(std())),
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Channel::Std(w) => w.as_mut(),
            Channel::File(f) => f,
        }
    }

    /// Flush a stdio channel, or seal a file channel without promoting it yet.
    fn seal(self) -> Result<Option<SealedOutput>> {
        match self {
            Channel::Std(mut w) => {
                w.flush()?;
                Ok(None)
            }
            Channel::File(f) => f.seal().map(Some),
        }
    }
}

/// Front-end for preprocessing author dumps. Cheap to clone; every run builds its own
/// normalizer from the configured options.
#[derive(Clone, Debug, Default)]
pub struct AuthorPrep {
    pub(crate) opts: PrepOptions,
}

impl AuthorPrep {
    pub fn new() -> Self {
        Self { opts: PrepOptions::default() }
    }

    pub fn with_options(opts: PrepOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &PrepOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn username_policy(mut self, policy: UsernamePolicy) -> Self { self.opts = self.opts.with_username_policy(policy); self }
    pub fn zstd_level(mut self, level: i32) -> Self { self.opts = self.opts.with_zstd_level(level); self }
    pub fn verify(mut self, mode: Option<IntegrityMode>) -> Self { self.opts = self.opts.with_verify(mode); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.opts = self.opts.with_file_concurrency(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_read_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_read_buffer(bytes); self }
    pub fn io_write_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_write_buffer(bytes); self }

    pub fn normalizer(&self) -> RecordNormalizer {
        RecordNormalizer::new(self.opts.username_policy)
    }

    /// Normalize caller-supplied streams (no files, no progress).
    pub fn process_streams<R, W, E>(&self, reader: &mut R, out: &mut W, rejects: &mut E) -> Result<StreamStats>
    where
        R: BufRead + ?Sized,
        W: Write + ?Sized,
        E: Write + ?Sized,
    {
        normalize_stream(&self.normalizer(), reader, out, rejects, |_| {})
    }

    /// stdin -> stdout, malformed lines -> stderr.
    pub fn run_stdio(&self) -> Result<RunReport> {
        self.run(&IoPlan::stdio())
    }

    /// Single file in, single file out (zstd by extension), rejects to `rejects` or stderr.
    pub fn process_file(&self, input: &Path, output: &Path, rejects: Option<&Path>) -> Result<RunReport> {
        let mut plan = IoPlan::stdio().input(input).output(output);
        plan.rejects = rejects.map(Path::to_path_buf);
        self.run(&plan)
    }

    /// Run one normalization pass with the channels bound as in `plan`.
    ///
    /// Output files only appear once the whole input has been processed; on error the
    /// partial temp files are removed.
    pub fn run(&self, plan: &IoPlan) -> Result<RunReport> {
        let started_at = now_rfc3339();
        let t0 = Instant::now();
        let normalizer = self.normalizer();

        if let (Some(mode), Some(input)) = (self.opts.verify, plan.input.as_deref()) {
            check_file(input, mode).with_context(|| format!("integrity check {}", input.display()))?;
            tracing::debug!("integrity ok: {}", input.display());
        }

        let counter = Arc::new(AtomicU64::new(0));
        let (mut reader, total_bytes) = match plan.input.as_deref() {
            Some(p) => {
                let size = fs::metadata(p).map(|m| m.len()).unwrap_or(0);
                let r: Box<dyn BufRead> = open_input(p, self.opts.read_buffer_bytes, counter.clone())?;
                (r, size)
            }
            None => {
                let r: Box<dyn BufRead> = Box::new(io::stdin().lock());
                (r, 0)
            }
        };

        let write_buf = self.opts.write_buffer_bytes;
        let mut out = Channel::open(plan.output.as_deref(), &self.opts, || -> Box<dyn Write> {
            Box::new(BufWriter::with_capacity(write_buf, io::stdout().lock()))
        })?;
        let mut rejects = Channel::open(plan.rejects.as_deref(), &self.opts, || -> Box<dyn Write> {
            Box::new(BufWriter::with_capacity(write_buf, io::stderr().lock()))
        })?;

        // Bars draw on stderr; only safe when stderr is not the rejects channel.
        let pb = if self.opts.progress && plan.input.is_some() && plan.rejects.is_some() {
            let label = self.opts.progress_label.clone().or_else(|| {
                plan.input.as_ref().and_then(|p| p.file_name()).map(|n| n.to_string_lossy().into_owned())
            });
            Some(make_progress_bar_labeled(total_bytes, label.as_deref()))
        } else {
            None
        };

        tracing::info!(
            "normalizing {} -> {} (rejects: {})",
            display_channel(plan.input.as_deref(), "stdin"),
            display_channel(plan.output.as_deref(), "stdout"),
            display_channel(plan.rejects.as_deref(), "stderr"),
        );

        let stats = normalize_stream(&normalizer, &mut reader, out.writer(), rejects.writer(), |_| {
            if let Some(pb) = &pb {
                pb.set_position(counter.load(Ordering::Relaxed));
            }
        })
        .with_context(|| format!("normalizing {}", display_channel(plan.input.as_deref(), "stdin")))?;

        // Neither file becomes visible until both are complete; the output goes last so
        // it never appears without its rejects.
        let out = out.seal().context("finalize normalized output")?;
        let rejects = rejects.seal().context("finalize rejects")?;
        if let Some(r) = rejects {
            r.promote().context("finalize rejects")?;
        }
        if let Some(o) = out {
            if let Err(e) = o.promote() {
                if let Some(p) = plan.rejects.as_deref() {
                    if let Err(re) = remove_with_backoff(p, 4, 25) {
                        tracing::warn!("could not remove rejects of failed run {}: {:#}", p.display(), re);
                    }
                }
                return Err(e.context("finalize normalized output"));
            }
        }
        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }

        tracing::info!(
            "done: {} lines, {} emitted, {} rejected, {} invalid usernames",
            stats.lines, stats.emitted, stats.rejected, stats.invalid_usernames
        );
        if stats.invalid_utf8 > 0 {
            tracing::warn!("{} lines were not valid UTF-8 and were rejected", stats.invalid_utf8);
        }

        Ok(RunReport {
            input: plan.input.clone(),
            output: plan.output.clone(),
            rejects: plan.rejects.clone(),
            started_at,
            elapsed_ms: t0.elapsed().as_millis() as u64,
            stats,
        })
    }
}

fn display_channel(path: Option<&Path>, std_name: &str) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_else(|| std_name.to_string())
}
