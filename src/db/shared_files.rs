//! Shared-file store: each database has a derived share directory holding
//! the raw bytes of messages' shared files, indexed by `_shared_files_`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::db::pool::DbPool;
use crate::error::{ChatVaultError, Result};

#[derive(Debug, Clone)]
pub struct SharedFileMeta {
    pub docid: Option<String>,
    pub author: String,
    pub category: Option<String>,
    pub mimetype: Option<String>,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct SharedFile {
    pub id: i64,
    pub convo_id: i64,
    pub msg_id: i64,
    pub docid: Option<String>,
    pub author: String,
    pub category: Option<String>,
    pub mimetype: Option<String>,
    pub filesize: i64,
    pub filename: String,
    pub filepath: String,
}

/// Returns `<db-dir>/<db-filename> files/`, the default share directory;
/// overridable by the `_options_` row `ShareDirectory`.
pub fn default_share_dir(db_path: &Path) -> PathBuf {
    let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = db_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dir.join(format!("{stem} files"))
}

fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Writes `content` under `share_dir` as `<yyyymmdd_HHMMSS>_<author>_<orig>`,
/// uniquifying on collision, and inserts/updates the `_shared_files_` row.
/// Returns `None` (and logs) on an IO failure, matching the original's
/// "store returns None on failure, row is not inserted" contract.
pub fn store_shared_file(
    pool: &DbPool,
    share_dir: &Path,
    convo_id: i64,
    msg_id: i64,
    when: DateTime<Utc>,
    content: &[u8],
    meta: &SharedFileMeta,
) -> Option<i64> {
    if let Err(e) = fs::create_dir_all(share_dir) {
        tracing::warn!(error = %e, dir = %share_dir.display(), "failed to create share directory");
        return None;
    }

    let stamp = when.format("%Y%m%d_%H%M%S").to_string();
    let base = format!(
        "{}_{}_{}",
        stamp,
        sanitize_component(&meta.author),
        sanitize_component(&meta.filename)
    );

    let mut candidate = base.clone();
    let mut suffix = 1;
    while share_dir.join(&candidate).exists() {
        candidate = format!("{base}.{suffix}");
        suffix += 1;
    }

    let full_path = share_dir.join(&candidate);
    if let Err(e) = fs::write(&full_path, content) {
        tracing::warn!(error = %e, path = %full_path.display(), "failed to write shared file");
        return None;
    }

    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to acquire db connection for shared file insert");
            return None;
        }
    };

    let existing: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, filepath FROM _shared_files_ WHERE msg_id = ?1",
            params![msg_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .ok()
        .flatten();

    let result = if let Some((existing_id, old_filepath)) = existing {
        let old_full = share_dir.join(&old_filepath);
        if old_full != full_path {
            let _ = fs::remove_file(&old_full);
        }
        conn.execute(
            "UPDATE _shared_files_ SET docid=?1, author=?2, category=?3, mimetype=?4, \
             filesize=?5, filename=?6, filepath=?7 WHERE id=?8",
            params![
                meta.docid,
                meta.author,
                meta.category,
                meta.mimetype,
                content.len() as i64,
                meta.filename,
                candidate,
                existing_id,
            ],
        )
        .map(|_| existing_id)
    } else {
        conn.execute(
            "INSERT INTO _shared_files_ (convo_id, msg_id, docid, author, category, mimetype, \
             filesize, filename, filepath) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                convo_id,
                msg_id,
                meta.docid,
                meta.author,
                meta.category,
                meta.mimetype,
                content.len() as i64,
                meta.filename,
                candidate,
            ],
        )
        .map(|_| conn.last_insert_rowid())
    };

    result.ok()
}

pub fn get_shared_file(pool: &DbPool, msg_id: i64) -> Result<Option<SharedFile>> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT id, convo_id, msg_id, docid, author, category, mimetype, filesize, filename, filepath \
         FROM _shared_files_ WHERE msg_id = ?1",
        params![msg_id],
        |row| {
            Ok(SharedFile {
                id: row.get(0)?,
                convo_id: row.get(1)?,
                msg_id: row.get(2)?,
                docid: row.get(3)?,
                author: row.get(4)?,
                category: row.get(5)?,
                mimetype: row.get(6)?,
                filesize: row.get(7)?,
                filename: row.get(8)?,
                filepath: row.get(9)?,
            })
        },
    )
    .optional()
    .map_err(ChatVaultError::from)
}

pub fn get_shared_file_path(pool: &DbPool, share_dir: &Path, msg_id: i64) -> Result<Option<PathBuf>> {
    Ok(get_shared_file(pool, msg_id)?.map(|f| share_dir.join(f.filepath)))
}

/// Moves every file referenced by `_shared_files_` from `old_dir` into
/// `new_dir` and rewrites stored filepaths, mirroring `rename_share_path`.
pub fn rename_share_path(pool: &DbPool, old_dir: &Path, new_dir: &Path) -> Result<usize> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT id, filepath FROM _shared_files_")?;
    let rows: Vec<(i64, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();

    fs::create_dir_all(new_dir)?;
    let mut moved = 0;
    for (id, filepath) in rows {
        let from = old_dir.join(&filepath);
        let to = new_dir.join(&filepath);
        if from.exists() {
            fs::rename(&from, &to)?;
            moved += 1;
        }
        conn.execute(
            "UPDATE _shared_files_ SET filepath = ?1 WHERE id = ?2",
            params![filepath, id],
        )?;
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::create_memory_pool;
    use crate::db::schema::{ensure_internal_schema, ensure_schema};
    use tempfile::tempdir;

    fn setup_pool() -> DbPool {
        let pool = create_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_internal_schema(&conn).unwrap();
        pool
    }

    #[test]
    fn store_then_fetch_round_trips() {
        let pool = setup_pool();
        let dir = tempdir().unwrap();
        let meta = SharedFileMeta {
            docid: Some("doc1".into()),
            author: "alice".into(),
            category: Some("image".into()),
            mimetype: Some("image/png".into()),
            filename: "photo.png".into(),
        };
        let when = Utc::now();
        let id = store_shared_file(&pool, dir.path(), 1, 1, when, b"hello", &meta);
        assert!(id.is_some());

        let fetched = get_shared_file(&pool, 1).unwrap().unwrap();
        assert_eq!(fetched.author, "alice");
        assert_eq!(fetched.filesize, 5);

        let path = get_shared_file_path(&pool, dir.path(), 1).unwrap().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn overwrite_removes_previous_file() {
        let pool = setup_pool();
        let dir = tempdir().unwrap();
        let meta = SharedFileMeta {
            docid: None,
            author: "alice".into(),
            category: None,
            mimetype: None,
            filename: "a.txt".into(),
        };
        let when = Utc::now();
        store_shared_file(&pool, dir.path(), 1, 1, when, b"first", &meta);
        let first = get_shared_file(&pool, 1).unwrap().unwrap();
        let first_path = dir.path().join(&first.filepath);
        assert!(first_path.exists());

        store_shared_file(&pool, dir.path(), 1, 1, when, b"second", &meta);
        assert!(!first_path.exists() || first_path == dir.path().join(get_shared_file(&pool, 1).unwrap().unwrap().filepath));
    }
}
