//! SQLite connection pool and schema migrations
//!
//! The store is a single SQLite file shared between the polling task and the HTTP read
//! path. Every pooled connection runs in WAL mode so readers see the last committed
//! row while a write is in progress.

use anyhow::{Context, Result, anyhow};
use diesel::SqliteConnection;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

const DEFAULT_POOL_SIZE: u32 = 4;
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Per-connection PRAGMAs applied whenever the pool opens a connection
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Open (creating if needed) the flight store at `path` and apply pending migrations
///
/// Failure here is the one process-fatal condition of the tracker.
pub fn open_store(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory {}", parent.display()))?;
    }

    let url = path.to_string_lossy().to_string();
    let manager = ConnectionManager::<SqliteConnection>::new(url);
    let pool = Pool::builder()
        .max_size(DEFAULT_POOL_SIZE)
        .connection_timeout(Duration::from_secs(10))
        .connection_customizer(Box::new(SqlitePragmas {
            busy_timeout_ms: BUSY_TIMEOUT_MS,
        }))
        .build(manager)
        .with_context(|| format!("Failed to open flight store at {}", path.display()))?;

    run_migrations(&pool)?;
    info!("Flight store ready at {}", path.display());

    Ok(pool)
}

/// Apply any migrations that have not run yet
pub fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut conn = pool
        .get()
        .context("Failed to get connection for migrations")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
    if !applied.is_empty() {
        info!("Applied {} migration(s)", applied.len());
    }
    Ok(())
}
