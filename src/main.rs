use anyhow::{bail, Result};
use authorprep::{
    check_files, init_tracing_once, write_json_report, AuthorPrep, IntegrityMode, IoPlan, LogTarget, PrepOptions,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Validate and normalize Reddit author dump lines into pipe-delimited rows.
///
/// With no subcommand: reads records from --input (or stdin), writes rows to --output
/// (or stdout) and malformed lines, unchanged, to --rejects (or stderr).
/// Paths ending in `.zst` are decompressed / compressed transparently.
#[derive(Parser, Debug)]
#[command(author, version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,

    /// zstd level for .zst outputs (1-22)
    #[arg(long, global = true)]
    zstd_level: Option<i32>,

    /// Disable progress bars
    #[arg(long, global = true, default_value_t = false)]
    no_progress: bool,

    /// Write logs to this file (filter via RUST_LOG)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input dump; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Normalized rows; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Malformed lines; stderr when omitted
    #[arg(short, long)]
    rejects: Option<PathBuf>,

    /// Decode-check a .zst input before processing
    #[arg(long, value_enum)]
    verify: Option<VerifyArg>,

    /// Write a JSON run report here
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preprocess every RA_*.csv[.zst] dump under a directory
    Batch {
        /// Directory to scan (recursively)
        #[arg(long)]
        dir: PathBuf,

        /// Put outputs here, mirroring the tree under --dir, instead of next to each input
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Files processed at once
        #[arg(long)]
        file_concurrency: Option<usize>,

        #[arg(long, value_enum)]
        verify: Option<VerifyArg>,

        /// Write a JSON batch report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Check .zst dumps decode cleanly
    Verify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Decode whole files instead of a leading sample
        #[arg(long, default_value_t = false)]
        full: bool,

        /// Files checked at once
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VerifyArg {
    Quick,
    Full,
}

impl From<VerifyArg> for IntegrityMode {
    fn from(v: VerifyArg) -> Self {
        match v {
            VerifyArg::Quick => IntegrityMode::DEFAULT_QUICK,
            VerifyArg::Full => IntegrityMode::Full,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut opts = PrepOptions::default().apply_env().with_progress(!cli.no_progress);
    if let Some(level) = cli.zstd_level {
        opts = opts.with_zstd_level(level);
    }

    let fallback_log = |stderr_free: bool| match (&cli.log_file, stderr_free) {
        (Some(p), _) => LogTarget::File(p.clone()),
        (None, true) => LogTarget::Stderr,
        (None, false) => LogTarget::Off,
    };

    match cli.command {
        None => {
            let args = cli.run;
            init_tracing_once(&fallback_log(args.rejects.is_some()));
            let prep = AuthorPrep::with_options(opts.with_verify(args.verify.map(Into::into)));
            let plan = IoPlan { input: args.input, output: args.output, rejects: args.rejects };
            let report = prep.run(&plan)?;
            if let Some(path) = args.report {
                write_json_report(&path, &report)?;
            }
        }
        Some(Command::Batch { dir, out_dir, file_concurrency, verify, report }) => {
            init_tracing_once(&fallback_log(true));
            let mut opts = opts.with_verify(verify.map(Into::into));
            if let Some(n) = file_concurrency {
                opts = opts.with_file_concurrency(n);
            }
            let batch = AuthorPrep::with_options(opts).run_batch(&dir, out_dir.as_deref())?;
            if let Some(path) = report {
                write_json_report(&path, &batch)?;
            }
            if !batch.failed.is_empty() {
                bail!("{} of {} files failed", batch.failed.len(), batch.failed.len() + batch.files.len());
            }
        }
        Some(Command::Verify { paths, full, concurrency }) => {
            init_tracing_once(&fallback_log(true));
            let mode = if full { IntegrityMode::Full } else { IntegrityMode::DEFAULT_QUICK };
            let bad = check_files(&paths, mode, concurrency, opts.progress);
            for (path, err) in &bad {
                eprintln!("CORRUPT {}: {}", path.display(), err);
            }
            if !bad.is_empty() {
                bail!("{} of {} files failed the integrity check", bad.len(), paths.len());
            }
            println!("{} files ok", paths.len());
        }
    }
    Ok(())
}
