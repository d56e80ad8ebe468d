//! Dump I/O: plain or zstd-compressed line streams chosen by file extension, a counting
//! reader for byte progress, atomically promoted outputs, and zstd integrity checks.

use crate::util::{create_with_backoff, open_with_backoff, remove_with_backoff, replace_file_atomic_backoff, tmp_path_for};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

/// Reddit dumps use long-distance windows; without this, big frames fail with
/// "Frame requires too much memory".
const WINDOW_LOG_MAX: u32 = 31;

/// True when the path ends in `.zst` (case-insensitive).
pub fn is_zst(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zst"))
        .unwrap_or(false)
}

/// A `Read` wrapper that counts bytes pulled from the underlying file (compressed bytes
/// for `.zst` inputs).
pub struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R, counter: Arc<AtomicU64>) -> Self {
        Self { inner, counter }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Open an input file as a buffered line source, decoding zstd when the name ends in
/// `.zst`. `counter` receives the on-disk bytes consumed.
pub fn open_input(path: &Path, read_buf_bytes: usize, counter: Arc<AtomicU64>) -> Result<Box<dyn BufRead + Send>> {
    let file = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    let counted = CountingReader::new(file, counter);
    let cap = read_buf_bytes.max(8 * 1024);
    if is_zst(path) {
        let mut decoder = Decoder::new(counted).with_context(|| format!("zstd decoder for {}", path.display()))?;
        decoder.window_log_max(WINDOW_LOG_MAX)?;
        Ok(Box::new(BufReader::with_capacity(cap, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(cap, counted)))
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Zstd(Encoder<'static, BufWriter<File>>),
}

/// Output file written to a `.tmp` sibling, made visible by `seal` then `promote`. Compressed with
/// zstd when the destination ends in `.zst`. Dropping before `seal` discards the temp.
pub struct OutputFile {
    dest: PathBuf,
    tmp: PathBuf,
    sink: Option<Sink>,
}

impl OutputFile {
    pub fn create(dest: &Path, write_buf_bytes: usize, zstd_level: i32) -> Result<Self> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
            }
        }
        let tmp = tmp_path_for(dest);
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        let w = BufWriter::with_capacity(write_buf_bytes.max(8 * 1024), f);
        let sink = if is_zst(dest) {
            Sink::Zstd(Encoder::new(w, zstd_level).with_context(|| format!("zstd encoder for {}", dest.display()))?)
        } else {
            Sink::Plain(w)
        };
        Ok(Self { dest: dest.to_path_buf(), tmp, sink: Some(sink) })
    }

    pub fn path(&self) -> &Path {
        &self.dest
    }

    /// End the zstd frame and flush everything into the temp file without making it
    /// visible. On error the temp file is removed.
    pub fn seal(mut self) -> Result<SealedOutput> {
        let sealed = SealedOutput { dest: self.dest.clone(), tmp: self.tmp.clone(), promoted: false };
        let Some(sink) = self.sink.take() else { return Ok(sealed) };
        let mut w = match sink {
            Sink::Plain(w) => w,
            Sink::Zstd(enc) => enc.finish().with_context(|| format!("finish zstd frame {}", sealed.tmp.display()))?,
        };
        w.flush().with_context(|| format!("flush {}", sealed.tmp.display()))?;
        drop(w);
        Ok(sealed)
    }
}

/// A fully written temp file waiting to be moved onto its destination. Dropping it
/// without `promote` removes the temp.
pub struct SealedOutput {
    dest: PathBuf,
    tmp: PathBuf,
    promoted: bool,
}

impl SealedOutput {
    pub fn path(&self) -> &Path {
        &self.dest
    }

    pub fn promote(mut self) -> Result<()> {
        replace_file_atomic_backoff(&self.tmp, &self.dest)
            .with_context(|| format!("promote {} -> {}", self.tmp.display(), self.dest.display()))?;
        self.promoted = true;
        Ok(())
    }
}

impl Drop for SealedOutput {
    fn drop(&mut self) {
        if !self.promoted {
            if let Err(e) = remove_with_backoff(&self.tmp, 4, 25) {
                tracing::warn!("could not remove unpromoted output {}: {:#}", self.tmp.display(), e);
            }
        }
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.sink.as_mut() {
            Some(Sink::Plain(w)) => w.write(buf),
            Some(Sink::Zstd(w)) => w.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "output already sealed")),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(Sink::Plain(w)) => w.flush(),
            Some(Sink::Zstd(w)) => w.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        if self.sink.take().is_some() {
            if let Err(e) = remove_with_backoff(&self.tmp, 4, 25) {
                tracing::warn!("could not remove partial output {}: {:#}", self.tmp.display(), e);
            }
        }
    }
}

// ----------------------------- Integrity checks ----------------------------------

/// QUICK check: decode up to `max_decompressed_bytes` and stop.
pub fn quick_validate_zst(path: &Path, max_decompressed_bytes: u64) -> Result<()> {
    let file = open_with_backoff(path, 16, 50)?;
    let mut decoder = Decoder::new(file)?;
    decoder.window_log_max(WINDOW_LOG_MAX)?;
    let mut limited = decoder.take(max_decompressed_bytes);
    io::copy(&mut limited, &mut io::sink())?;
    Ok(())
}

/// FULL check: decode the entire stream to EOF (validates frame checksums).
pub fn validate_zst_full(path: &Path) -> Result<()> {
    let file = open_with_backoff(path, 16, 50)?;
    let mut decoder = Decoder::new(file)?;
    decoder.window_log_max(WINDOW_LOG_MAX)?;
    io::copy(&mut decoder, &mut io::sink())?;
    Ok(())
}
