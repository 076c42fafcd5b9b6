//
// caboodle command-line front end.
//
//! CLI supporting `sync`, `ls`, `check`, `get` and `upload`.
//!
//! Examples:
//! ```bash
//! caboodle-cli sync   gs://bucket/runs/7 ./run7 --concurrent -j 16
//! caboodle-cli sync   gs://bucket/runs/7 ./weights --suffix .bin --flatten
//! caboodle-cli ls     gs://bucket/runs/7 -p '.*\.txt$'
//! caboodle-cli check  gs://bucket/runs/7 model.bin params.json
//! caboodle-cli get    gs://bucket/runs/7/model.bin ./model.bin
//! caboodle-cli upload ./run7 gs://bucket/runs
//! caboodle-cli sync   file:///mnt/share ./copy     # local directory as a store
//! caboodle-cli get    'file:///mnt/share#runs/7/model.bin' ./model.bin
//! ```

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use regex::Regex;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use caboodle::constants::{
    DEFAULT_CHUNK_COUNT_HINT, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENCY,
};
use caboodle::{
    BlobFetcher, ObjectStore, ProgressTracker, SyncDownloader, SyncOptions, UploadOptions,
    check_for_files, download_to_path, list_names, store_for_uri, upload_all,
};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // Gracefully exit on broken pipe (e.g., when piped to head/tail)
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every object under a remote folder into a local directory.
    Sync {
        /// Remote folder URI (gs://bucket/folder, file:///root or file:///root#folder)
        src: String,
        /// Local directory to write into
        dest_dir: PathBuf,
        /// Only download objects whose name ends with this suffix
        #[arg(long)]
        suffix: Option<String>,
        /// Put every file directly in dest_dir (same-named files overwrite each other)
        #[arg(long)]
        flatten: bool,
        /// Download concurrently in chunks instead of one object at a time
        #[arg(long)]
        concurrent: bool,
        /// Maximum concurrent downloads
        #[arg(short = 'j', long = "jobs", default_value_t = DEFAULT_MAX_CONCURRENCY)]
        jobs: usize,
        /// Chunk-count divisor: objects / N + 1 chunks
        #[arg(long = "chunks", default_value_t = DEFAULT_CHUNK_COUNT_HINT)]
        chunks: usize,
        /// Per-object timeout in seconds
        #[arg(long = "timeout-secs", default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
        timeout_secs: u64,
    },

    /// List object names under a remote folder.
    #[clap(name = "ls")]
    List {
        /// Remote folder URI
        uri: String,
        /// Optional regex pattern to filter results (applied client-side)
        #[clap(short, long)]
        pattern: Option<String>,
    },

    /// Exit non-zero unless every named file is present in the remote folder.
    Check {
        /// Remote folder URI
        uri: String,
        /// File names (basenames) that must be present
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Download a single object.
    Get {
        /// Full object URI (gs://bucket/key or file:///root#key)
        uri: String,
        /// Local file to write
        dest: PathBuf,
    },

    /// Upload a local file or directory under a remote folder.
    Upload {
        /// Local file or directory
        path: PathBuf,
        /// Destination folder URI
        dest: String,
        /// Skip objects that already exist
        #[arg(long = "no-replace")]
        no_replace: bool,
        /// Use only file names as keys, dropping local sub-directories
        #[arg(long)]
        flat: bool,
    },
}

// -----------------------------------------------------------------------------
// Command implementations
// -----------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
async fn sync_cmd(
    src: &str,
    dest_dir: &PathBuf,
    suffix: Option<String>,
    flatten: bool,
    concurrent: bool,
    jobs: usize,
    chunks: usize,
    timeout_secs: u64,
) -> Result<()> {
    let (store, folder) = store_for_uri(src).await?;
    let downloader = SyncDownloader::new(Arc::new(store));

    // Ctrl-C stops admitting new downloads; in-flight ones finish.
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight downloads");
            signal_token.cancel();
        }
    });

    let mut opts = SyncOptions::new()
        .flatten(flatten)
        .concurrent(concurrent)
        .max_concurrency(jobs)
        .chunk_count_hint(chunks)
        .fetch_timeout(Duration::from_secs(timeout_secs))
        .cancellation_token(token);
    if let Some(s) = suffix {
        opts = opts.suffix(s);
    }

    let t0 = Instant::now();
    let mut tracker = None;
    let result = downloader
        .sync_with_progress(&folder, dest_dir, &opts, |total| {
            let t = ProgressTracker::with_bar("SYNC", total);
            tracker = Some(t.clone());
            t
        })
        .await
        .with_context(|| format!("Sync of {src} failed"))?;
    if let Some(t) = tracker {
        t.finish("Sync", t0.elapsed());
    }

    safe_println!(
        "Downloaded {} of {} objects ({} bytes) to {}",
        result.succeeded,
        result.listed,
        result.total_bytes,
        dest_dir.display()
    );
    if opts.concurrent {
        info!(
            "{} chunks run, at most {} downloads in flight",
            result.chunks_run, result.peak_inflight
        );
    }
    for failure in &result.failed {
        safe_println!(
            "FAILED {} [{}] after {} attempt(s): {}",
            failure.name,
            failure.kind(),
            failure.attempts,
            failure.error
        );
    }
    if result.not_started > 0 {
        safe_println!("{} objects were not attempted", result.not_started);
    }
    if !result.is_success() {
        bail!(
            "Sync incomplete: {} failed, {} not attempted",
            result.failed.len(),
            result.not_started
        );
    }
    Ok(())
}

async fn list_cmd(uri: &str, pattern: Option<&str>) -> Result<()> {
    let (store, folder) = store_for_uri(uri).await?;
    let mut names = list_names(&store, &folder).await?;

    if let Some(pat) = pattern {
        let re = Regex::new(pat).with_context(|| format!("Invalid regex pattern: '{}'", pat))?;
        names.retain(|k| re.is_match(k));
    }

    for name in &names {
        safe_println!("{}", name);
    }
    safe_println!("\nTotal objects: {}", names.len());
    Ok(())
}

async fn check_cmd(uri: &str, names: &[String]) -> Result<()> {
    let (store, folder) = store_for_uri(uri).await?;
    if check_for_files(&store, &folder, names).await? {
        safe_println!("All {} files present", names.len());
        Ok(())
    } else {
        bail!("Not all of {:?} are present under {}", names, uri)
    }
}

async fn get_cmd(uri: &str, dest: &PathBuf) -> Result<()> {
    let (store, name) = store_for_uri(uri).await?;
    if name.is_empty() {
        bail!("{uri} does not name an object (use file:///root#key for local stores)");
    }
    let bytes = download_to_path(&store, &name, dest, &BlobFetcher::default()).await?;
    safe_println!("Downloaded {} ({} bytes) to {}", name, bytes, dest.display());
    Ok(())
}

async fn upload_cmd(path: &PathBuf, dest: &str, no_replace: bool, flat: bool) -> Result<()> {
    let (store, folder) = store_for_uri(dest).await?;
    let opts = UploadOptions { replace: !no_replace, use_filepaths: !flat };
    let result = upload_all(&store as &dyn ObjectStore, path, &folder, opts).await?;
    safe_println!("Uploaded {} files, skipped {}", result.uploaded.len(), result.skipped.len());
    Ok(())
}

/// Main CLI function
#[tokio::main]
async fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbosity
    let filter = match cli.verbose {
        0 => "warn",        // no -v: WARN level
        1 => "info",        // -v: INFO level
        _ => "debug",       // -vv or more: DEBUG level
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Initialize tracing-log bridge to capture log crate messages from dependencies
    tracing_log::LogTracer::init().ok();

    match cli.cmd {
        Command::Sync {
            src,
            dest_dir,
            suffix,
            flatten,
            concurrent,
            jobs,
            chunks,
            timeout_secs,
        } => {
            info!("Syncing {} to {}", src, dest_dir.display());
            sync_cmd(&src, &dest_dir, suffix, flatten, concurrent, jobs, chunks, timeout_secs)
                .await?
        }
        Command::List { uri, pattern } => list_cmd(&uri, pattern.as_deref()).await?,
        Command::Check { uri, names } => check_cmd(&uri, &names).await?,
        Command::Get { uri, dest } => get_cmd(&uri, &dest).await?,
        Command::Upload { path, dest, no_replace, flat } => {
            upload_cmd(&path, &dest, no_replace, flat).await?
        }
    }

    Ok(())
}
