mod config;
mod record;
mod normalizer;
mod stream;

mod util;
mod zstd_io;
mod progress;
mod integrity;
mod report;
mod pipeline;
mod batch;

pub use crate::config::{PrepOptions, UsernamePolicy};
pub use crate::record::{replace_none, AuthorRow, FIELD_SEP, NULL_TOKEN};
pub use crate::normalizer::{ParseFailure, RecordNormalizer};
pub use crate::stream::{normalize_stream, StreamStats};
pub use crate::pipeline::{AuthorPrep, IoPlan};

// Batch planning helpers.
pub use crate::batch::{discover_author_dumps, dump_stem, plan_jobs, take_colliding_jobs, AuthorJob};

// Integrity checker mode, and direct zstd validators.
pub use crate::integrity::{check_file, check_files, IntegrityMode};
pub use crate::zstd_io::{is_zst, open_input, quick_validate_zst, validate_zst_full, OutputFile, SealedOutput};

pub use crate::report::{write_json_report, BatchReport, FailedFile, RunReport};

pub use crate::util::{init_tracing_once, LogTarget};
