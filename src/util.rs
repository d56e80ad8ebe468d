use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// -------- tracing setup --------

/// Where log lines go. stderr doubles as the default rejects channel, so callers pick
/// `Stderr` only when rejects are written elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    Off,
}

static INIT_ONCE: std::sync::Once = std::sync::Once::new();

/// Install the global subscriber once. Filter comes from `RUST_LOG` (default `info`).
/// Later calls are no-ops.
pub fn init_tracing_once(target: &LogTarget) {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        match target {
            LogTarget::Stderr => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::new(env_filter))
                    .with_writer(io::stderr)
                    .try_init();
            }
            LogTarget::File(path) => match File::create(path) {
                Ok(f) => {
                    let _ = tracing_subscriber::fmt()
                        .with_env_filter(EnvFilter::new(env_filter))
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(f))
                        .try_init();
                }
                Err(e) => eprintln!("cannot open log file {}: {}", path.display(), e),
            },
            LogTarget::Off => {}
        }
    });
}

// -------- robust open/create with backoff --------

/// Transient OS errors worth retrying (sharing/lock violations and flaky volumes on
/// Windows; EAGAIN/EBUSY elsewhere).
fn is_retriable_io_error(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::Interrupted || e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    if cfg!(windows) {
        matches!(e.raw_os_error(), Some(5) | Some(21) | Some(32) | Some(33) | Some(1117) | Some(1224))
    } else {
        matches!(e.raw_os_error(), Some(11) | Some(16))
    }
}

fn with_backoff<T>(tries: usize, delay_ms: u64, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let tries = tries.max(1);
    let mut last_err: Option<io::Error> = None;
    for i in 0..tries {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) => {
                last_err = Some(e);
                sleep(Duration::from_millis(delay_ms.saturating_mul((i + 1) as u64)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "retries exhausted")))
}

/// Open a file for reading, retrying transient errors.
pub fn open_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::open(path))
}

/// Create (truncate) a file, retrying transient errors.
pub fn create_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> io::Result<File> {
    with_backoff(tries, delay_ms, || File::create(path))
}

/// Remove a file, retrying transient errors. Succeeds if the file doesn't exist.
pub fn remove_with_backoff(path: &Path, tries: usize, delay_ms: u64) -> Result<()> {
    match with_backoff(tries, delay_ms, || fs::remove_file(path)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}

/// Sibling temp path used while an output is being written: `<name>.tmp`.
pub fn tmp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

/// Replace `dest` with `tmp`. Falls back to copy+remove when rename is refused
/// (e.g. across volumes).
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    let tries = 20usize;
    let delay_ms = 50u64;
    if dest.exists() {
        remove_with_backoff(dest, tries, delay_ms)?;
    }
    if with_backoff(tries, delay_ms, || fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    with_backoff(tries, delay_ms, || fs::copy(tmp, dest))
        .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
    remove_with_backoff(tmp, tries, delay_ms)
}
