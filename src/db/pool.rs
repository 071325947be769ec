//! Connection pooling, grounded on the teacher's `adapters/sqlite/pool.rs`,
//! sized down to a single connection: the accessor is single-writer-per-
//! database (spec §5), so there is no benefit to more than one handle and
//! a larger pool would only let two threads race on the same file.

use std::path::Path;

use r2d2_sqlite::SqliteConnectionManager;

use crate::error::Result;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

pub fn create_pool(db_path: &Path) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -8000;
             PRAGMA mmap_size = 268435456;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )
    });

    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

/// Pool over an in-memory database, for tests and throwaway scratch work.
pub fn create_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}
