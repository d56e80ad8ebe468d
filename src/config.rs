use crate::integrity::IntegrityMode;

/// Username length bounds (in characters), inclusive on both ends.
/// Defaults follow reddit's historical account-name validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsernamePolicy {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for UsernamePolicy {
    fn default() -> Self {
        Self { min_len: 3, max_len: 20 }
    }
}

impl UsernamePolicy {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        let min_len = min_len.max(1);
        Self { min_len, max_len: max_len.max(min_len) }
    }
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct PrepOptions {
    pub username_policy: UsernamePolicy,
    pub zstd_level: i32,              // level for .zst outputs
    pub verify: Option<IntegrityMode>, // decode-check .zst inputs before processing
    pub file_concurrency: usize,      // batch mode: files processed at once
    pub progress: bool,               // show progress bar
    pub progress_label: Option<String>,

    // IO tuning
    pub read_buffer_bytes: usize,     // BufReader capacity
    pub write_buffer_bytes: usize,    // BufWriter capacity
}

impl Default for PrepOptions {
    fn default() -> Self {
        Self {
            username_policy: UsernamePolicy::default(),
            zstd_level: 3,
            verify: None,
            file_concurrency: 1,
            progress: true,
            progress_label: None,
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

const ENV_ZSTD_LEVEL: &str = "AUTHORPREP_ZSTD_LEVEL";
const ENV_READ_BUFFER: &str = "AUTHORPREP_READ_BUFFER";
const ENV_WRITE_BUFFER: &str = "AUTHORPREP_WRITE_BUFFER";
const ENV_FILE_CONCURRENCY: &str = "AUTHORPREP_FILE_CONCURRENCY";

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}

impl PrepOptions {
    pub fn with_username_policy(mut self, policy: UsernamePolicy) -> Self {
        self.username_policy = policy;
        self
    }
    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level.clamp(1, 22);
        self
    }
    pub fn with_verify(mut self, mode: Option<IntegrityMode>) -> Self {
        self.verify = mode;
        self
    }
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_io_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }

    /// Apply `AUTHORPREP_*` environment overrides. Unparsable values are logged and skipped.
    pub fn apply_env(mut self) -> Self {
        if let Some(level) = env_parsed::<i32>(ENV_ZSTD_LEVEL) {
            self = self.with_zstd_level(level);
        }
        if let Some(bytes) = env_parsed::<usize>(ENV_READ_BUFFER) {
            self = self.with_io_read_buffer(bytes);
        }
        if let Some(bytes) = env_parsed::<usize>(ENV_WRITE_BUFFER) {
            self = self.with_io_write_buffer(bytes);
        }
        if let Some(n) = env_parsed::<usize>(ENV_FILE_CONCURRENCY) {
            self = self.with_file_concurrency(n);
        }
        self
    }
}
