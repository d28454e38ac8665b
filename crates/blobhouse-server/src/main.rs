//! blobhouse server
//!
//! Indexes a newline-delimited blob file by key and serves its records over
//! HTTP.
//!
//! ## Startup
//! 1. Pick a key extractor from the flags (exactly one of `--key`,
//!    `--pattern`, `--toplevel`).
//! 2. Resolve the index location: `--db`, or a deterministic default named
//!    after the blob file and a short hash of the extractor flags, so the
//!    same flags always find the same index.
//! 3. Build the index if it does not exist yet. Ctrl-C during the build
//!    removes the partial index directory.
//! 4. Serve until SIGINT/SIGTERM, then close the store.
//!
//! ## Logging
//! Controlled via `RUST_LOG` (default `info`).
//!
//! ## Example
//! ```bash
//! blobhouse data.ldj --key id
//! blobhouse data.ldj --pattern 'ai-[0-9]+' --addr 0.0.0.0:8820
//! blobhouse data.ldj --toplevel --create-db-only
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use sha2::{Digest, Sha256};

use blobhouse_api::{create_router, AppState, RequestMetrics};
use blobhouse_storage::{
    BlobFile, FieldExtractor, IndexStore, KeyExtractor, LookupService, RegexExtractor,
    RocksDbStore, ToplevelExtractor, TsvStore,
};

#[derive(Parser)]
#[command(
    name = "blobhouse",
    about = "Serve newline-delimited records by key over HTTP",
    version
)]
#[command(group(
    ArgGroup::new("extractor")
        .required(true)
        .args(["key", "pattern", "toplevel"])
))]
struct Cli {
    /// Blob file to index and serve
    file: PathBuf,

    /// Address to serve on
    #[arg(long, env = "BLOBHOUSE_ADDR", default_value = "127.0.0.1:8820")]
    addr: String,

    /// Top-level JSON field to use as the key
    #[arg(long)]
    key: Option<String>,

    /// Regular expression to use as key extractor
    #[arg(long)]
    pattern: Option<String>,

    /// Use each record's sole top-level key
    #[arg(long)]
    toplevel: bool,

    /// Index backend
    #[arg(long, value_enum, default_value_t = BackendKind::Rocksdb)]
    backend: BackendKind,

    /// Index location; defaults to the blob file name plus a short hash of
    /// the extractor flags
    #[arg(long)]
    db: Option<PathBuf>,

    /// Records per batch during indexing
    #[arg(long, default_value_t = 50_000)]
    batch: usize,

    /// Skip records without an extractable key instead of failing
    #[arg(long)]
    ignore_missing_keys: bool,

    /// Build the index, then exit without serving
    #[arg(long)]
    create_db_only: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendKind {
    /// Persistent RocksDB index
    Rocksdb,
    /// Echo entries as TSV on stdout (debugging)
    Tsv,
}

impl BackendKind {
    fn as_str(self) -> &'static str {
        match self {
            BackendKind::Rocksdb => "rocksdb",
            BackendKind::Tsv => "tsv",
        }
    }
}

/// `<blob>.<hex8>.db`, hashing the flags that shape the index so different
/// extractors never collide on one database.
fn default_db_path(cli: &Cli) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}:{}:{}",
        cli.backend.as_str(),
        cli.key.as_deref().unwrap_or(""),
        cli.pattern.as_deref().unwrap_or("")
    ));
    let digest = hasher.finalize();
    let tag: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

    let mut name = cli.file.as_os_str().to_os_string();
    name.push(format!(".{tag}.db"));
    PathBuf::from(name)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let extractor: Arc<dyn KeyExtractor> = if let Some(pattern) = &cli.pattern {
        let pattern = regex::bytes::Regex::new(pattern)
            .with_context(|| format!("invalid --pattern {pattern:?}"))?;
        Arc::new(RegexExtractor::new(pattern))
    } else if let Some(key) = &cli.key {
        Arc::new(FieldExtractor::new(key.clone()))
    } else {
        Arc::new(ToplevelExtractor)
    };

    let db_path = cli.db.clone().unwrap_or_else(|| default_db_path(&cli));

    let store: Arc<dyn IndexStore> = match cli.backend {
        BackendKind::Rocksdb => Arc::new(RocksDbStore::new(&db_path)),
        BackendKind::Tsv => Arc::new(TsvStore::new(std::io::stdout())),
    };

    if !db_path.exists() {
        tracing::info!(db = %db_path.display(), blob = %cli.file.display(), "creating index");

        let build = {
            let blob = cli.file.clone();
            let extractor = extractor.clone();
            let store = store.clone();
            let batch = cli.batch;
            let ignore_missing_keys = cli.ignore_missing_keys;
            tokio::task::spawn_blocking(move || {
                blobhouse_storage::append(
                    &blob,
                    None,
                    extractor.as_ref(),
                    store.as_ref(),
                    batch,
                    ignore_missing_keys,
                )
            })
        };

        tokio::select! {
            result = build => {
                match result.context("index build task panicked")? {
                    Ok(written) => {
                        tracing::info!(entries = written, "index created");
                    }
                    Err(err) => {
                        let _ = store.close();
                        let _ = std::fs::remove_dir_all(&db_path);
                        bail!("index build failed: {err}");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(db = %db_path.display(), "interrupted, removing partial index");
                let _ = store.close();
                let _ = std::fs::remove_dir_all(&db_path);
                std::process::exit(1);
            }
        }
    }

    if cli.create_db_only {
        store.close().context("failed to close index store")?;
        return Ok(());
    }

    let lookup = Arc::new(LookupService::new(
        store.clone(),
        Arc::new(BlobFile::new(&cli.file)),
    ));
    let state = AppState {
        lookup,
        store: store.clone(),
        blob_path: cli.file.clone(),
        batch_size: cli.batch,
        ignore_missing_keys: cli.ignore_missing_keys,
        metrics: Arc::new(RequestMetrics::default()),
    };

    let listener = tokio::net::TcpListener::bind(&cli.addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.addr))?;
    tracing::info!(addr = %cli.addr, db = %db_path.display(), "listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().context("failed to close index store")?;
    tracing::info!("shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_db_path_depends_on_extractor_flags() {
        let by_key = Cli::parse_from(["blobhouse", "data.ldj", "--key", "id"]);
        let by_pattern = Cli::parse_from(["blobhouse", "data.ldj", "--pattern", "ai-[0-9]+"]);

        let a = default_db_path(&by_key);
        let b = default_db_path(&by_pattern);
        assert_ne!(a, b);
        assert!(a.to_string_lossy().starts_with("data.ldj."));
        assert!(a.to_string_lossy().ends_with(".db"));

        // Same flags, same path.
        let again = Cli::parse_from(["blobhouse", "data.ldj", "--key", "id"]);
        assert_eq!(default_db_path(&again), a);
    }

    #[test]
    fn exactly_one_extractor_flag_is_required() {
        assert!(Cli::try_parse_from(["blobhouse", "data.ldj"]).is_err());
        assert!(Cli::try_parse_from([
            "blobhouse",
            "data.ldj",
            "--key",
            "id",
            "--toplevel"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["blobhouse", "data.ldj", "--toplevel"]).is_ok());
    }
}
