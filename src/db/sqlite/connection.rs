//! SQLite database connection and migration management.

use std::path::Path;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::entry::SqliteEntryRepository;
use super::tag::SqliteTagRepository;
use super::video::SqliteVideoRepository;
use crate::db::{Database, DbError, DbResult};
use crate::events::{ChangeSet, MutationBus, VideoChange};

/// SQLite database implementation.
///
/// Provides access to repositories via associated types, avoiding dynamic dispatch.
/// Owns the change buses every repository publishes to.
pub struct SqliteDatabase {
    pool: SqlitePool,
    changes: MutationBus<ChangeSet>,
    video_changes: MutationBus<VideoChange>,
}

impl SqliteDatabase {
    /// Open (creating if needed) a database at the given path.
    pub async fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self::with_pool(pool))
    }

    /// Create an in-memory database (useful for testing).
    ///
    /// Every pooled connection to `:memory:` is a separate database, so the
    /// pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self::with_pool(pool))
    }

    fn with_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            changes: MutationBus::new(),
            video_changes: MutationBus::new(),
        }
    }

    /// Direct pool access for tests and maintenance queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Database for SqliteDatabase {
    type Entries<'a> = SqliteEntryRepository<'a>;
    type Tags<'a> = SqliteTagRepository<'a>;
    type Videos<'a> = SqliteVideoRepository<'a>;

    async fn migrate(&self) -> DbResult<()> {
        sqlx::migrate!("data/sql/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| DbError::Migration {
                message: e.to_string(),
            })
    }

    fn entries(&self) -> Self::Entries<'_> {
        SqliteEntryRepository {
            pool: &self.pool,
            changes: &self.changes,
        }
    }

    fn tags(&self) -> Self::Tags<'_> {
        SqliteTagRepository {
            pool: &self.pool,
            changes: &self.changes,
        }
    }

    fn videos(&self) -> Self::Videos<'_> {
        SqliteVideoRepository {
            pool: &self.pool,
            changes: &self.video_changes,
        }
    }

    fn changes(&self) -> &MutationBus<ChangeSet> {
        &self.changes
    }

    fn video_changes(&self) -> &MutationBus<VideoChange> {
        &self.video_changes
    }
}
