//! Shared SQLite connection setup for the three on-disk indexes.
//!
//! Each index (FTS, Bloomtyper, RDF2Vec) owns its own single-connection
//! pool rather than sharing one `Store`, since §5 of the design treats them
//! as independently-openable read-only artefacts at query time. The pragma
//! tuning mirrors the corpus's `Store::open` (WAL journal mode, busy
//! timeout, mmap) since none of that tuning is domain-specific.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::runtime::Runtime;

#[derive(Error, Debug)]
pub enum SqliteOpenError {
    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to open database at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("pragma setup failed: {0}")]
    Pragma(#[source] sqlx::Error),
}

/// An opened SQLite handle plus the single-threaded runtime used to drive
/// the (otherwise async) `sqlx` pool from ordinary synchronous code. This
/// is the same shape as the corpus's `Store` field pair, just split out so
/// each index can own one independently.
pub struct SqliteHandle {
    pub pool: SqlitePool,
    pub rt: Runtime,
}

impl SqliteHandle {
    /// Open (creating if necessary) a SQLite database at `path` with the
    /// pragmas tuned for a single-writer batch-build workload.
    pub fn open_rw(path: &Path) -> Result<Self, SqliteOpenError> {
        let rt = Runtime::new().map_err(SqliteOpenError::Runtime)?;
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = rt
            .block_on(SqlitePoolOptions::new().max_connections(1).connect_with(options))
            .map_err(|source| SqliteOpenError::Connect {
                path: path.display().to_string(),
                source,
            })?;

        rt.block_on(apply_pragmas(&pool))
            .map_err(SqliteOpenError::Pragma)?;

        Ok(Self { pool, rt })
    }

    /// Open an existing database read-only, for query-time resolver use.
    pub fn open_ro(path: &Path) -> Result<Self, SqliteOpenError> {
        let rt = Runtime::new().map_err(SqliteOpenError::Runtime)?;
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);

        let pool = rt
            .block_on(SqlitePoolOptions::new().max_connections(1).connect_with(options))
            .map_err(|source| SqliteOpenError::Connect {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self { pool, rt })
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    use sqlx::Executor;
    pool.execute("PRAGMA journal_mode = WAL;").await?;
    pool.execute("PRAGMA busy_timeout = 5000;").await?;
    pool.execute("PRAGMA mmap_size = 268435456;").await?;
    Ok(())
}
