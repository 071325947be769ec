//! The database accessor: typed reads and writes over a `main.db`-shaped
//! SQLite file, grounded on the teacher's `adapters/sqlite/messages.rs`
//! CRUD idiom (pool.get()? -> prepare()? -> query_map() -> Vec) and on
//! `skypedata.py::SkypeDatabase`'s get_conversations/get_messages/
//! insert_row/update_row contract (spec §4.1).

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::db::cache::RowCache;
use crate::db::cascade::{delete_cascade, prune_contact_group_members, Deletable};
use crate::db::links::{compute_links, suppressed_predecessors, ConversationRow};
use crate::db::pool::{create_pool, DbPool};
use crate::db::schema::{ensure_internal_schema, ensure_schema};
use crate::error::Result;
use crate::identity::is_bot;

/// A live handle on one Skype database: pooled connection plus the table
/// row cache. Matches the accessor's single-writer-per-database contract
/// (spec §5) since the underlying pool is capped at one connection.
pub struct Accessor {
    pool: DbPool,
    cache: RowCache,
}

impl Accessor {
    pub fn open(db_path: &Path) -> Result<Self> {
        let pool = create_pool(db_path)?;
        {
            let conn = pool.get()?;
            ensure_schema(&conn)?;
            ensure_internal_schema(&conn)?;
        }
        Ok(Self {
            pool,
            cache: RowCache::new(),
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Converts one SQLite row into a JSON object keyed by column name, the
    /// accessor's uniform row representation across all tables.
    fn row_to_json(row: &rusqlite::Row, columns: &[String]) -> rusqlite::Result<Value> {
        let mut map = Map::new();
        for (i, name) in columns.iter().enumerate() {
            let v: Value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => Value::Null,
                rusqlite::types::ValueRef::Integer(n) => Value::from(n),
                rusqlite::types::ValueRef::Real(f) => {
                    serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
                }
                rusqlite::types::ValueRef::Text(t) => {
                    Value::String(String::from_utf8_lossy(t).into_owned())
                }
                rusqlite::types::ValueRef::Blob(b) => {
                    Value::String(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b))
                }
            };
            map.insert(name.clone(), v);
        }
        Ok(Value::Object(map))
    }

    fn fetch_table(conn: &Connection, table: &str) -> Result<Vec<Value>> {
        let mut stmt = conn.prepare(&format!("SELECT * FROM {table}"))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt
            .query_map([], |row| Self::row_to_json(row, &columns))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Returns every row of `table`, transparently using the whole-table
    /// cache; `table` must not be `"messages"` (use [`Self::get_messages`]).
    pub fn get_table(&self, table: &str) -> Result<std::sync::Arc<Vec<Value>>> {
        if let Some(cached) = self.cache.get_table(table) {
            return Ok(cached);
        }
        let conn = self.pool.get()?;
        let rows = Self::fetch_table(&conn, table)?;
        self.cache.put_table(table, rows.clone());
        Ok(self.cache.get_table(table).unwrap_or_else(|| std::sync::Arc::new(rows)))
    }

    pub fn get_contacts(&self) -> Result<std::sync::Arc<Vec<Value>>> {
        self.get_table("Contacts")
    }

    pub fn get_accounts(&self) -> Result<std::sync::Arc<Vec<Value>>> {
        self.get_table("Accounts")
    }

    /// Returns all conversation rows with their `__link` predecessor links
    /// resolved (spec §9 "Chat identity merging"), suppressing rows that
    /// are only reachable as another row's legacy predecessor.
    pub fn get_conversations(&self) -> Result<Vec<Value>> {
        let rows = self.get_table("Conversations")?;
        let link_rows: Vec<ConversationRow> = rows
            .iter()
            .filter_map(|v| {
                Some(ConversationRow {
                    id: v.get("id")?.as_i64()?,
                    identity: v.get("identity")?.as_str()?.to_string(),
                    alt_identity: v
                        .get("alt_identity")
                        .and_then(|a| a.as_str())
                        .map(|s| s.to_string()),
                })
            })
            .collect();
        let links = compute_links(&link_rows);
        let suppressed = suppressed_predecessors(&links);

        let mut out = Vec::new();
        for row in rows.iter() {
            let id = row.get("id").and_then(|v| v.as_i64());
            if let Some(id) = id {
                if suppressed.contains(&id) {
                    continue;
                }
                let mut obj = row.clone();
                if let Some(&predecessor) = links.get(&id) {
                    if let Value::Object(ref mut map) = obj {
                        map.insert("__link".to_string(), Value::from(predecessor));
                    }
                }
                out.push(obj);
            } else {
                out.push(row.clone());
            }
        }
        Ok(out)
    }

    /// Returns every message in `convo_id`, ordered by timestamp; cached
    /// only for the full-range (no bound) fetch, per spec §4.1.
    pub fn get_messages(&self, convo_id: i64) -> Result<std::sync::Arc<Vec<Value>>> {
        if let Some(cached) = self.cache.get_chat_messages(convo_id) {
            return Ok(cached);
        }
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM Messages WHERE convo_id = ?1 ORDER BY timestamp, id",
        )?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows: Vec<Value> = stmt
            .query_map(params![convo_id], |row| Self::row_to_json(row, &columns))?
            .filter_map(|r| r.ok())
            .collect();
        self.cache.put_chat_messages(convo_id, rows.clone());
        Ok(self.cache.get_chat_messages(convo_id).unwrap_or_else(|| std::sync::Arc::new(rows)))
    }

    /// Per-conversation message/participant counts, used by the workbench
    /// overview without loading full message bodies.
    pub fn get_conversation_stats(&self, convo_id: i64) -> Result<ConversationStats> {
        let conn = self.pool.get()?;
        let message_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM Messages WHERE convo_id = ?1",
            params![convo_id],
            |row| row.get(0),
        )?;
        let first_message_datetime: Option<i64> = conn
            .query_row(
                "SELECT MIN(timestamp) FROM Messages WHERE convo_id = ?1",
                params![convo_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        let last_message_datetime: Option<i64> = conn
            .query_row(
                "SELECT MAX(timestamp) FROM Messages WHERE convo_id = ?1",
                params![convo_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(ConversationStats {
            message_count,
            first_message_timestamp: first_message_datetime,
            last_message_timestamp: last_message_datetime,
        })
    }

    /// Inserts a row into `table`, honoring the creation_timestamp
    /// invariant: a `Conversations`/`Messages` insert with no
    /// `creation_timestamp`/`timestamp` gets the current time patched in
    /// before the write, since the legacy schema allows the column to be
    /// NULL but downstream ordering assumes every row has one.
    pub fn insert_row(&self, table: &str, mut row: Map<String, Value>) -> Result<i64> {
        if table.eq_ignore_ascii_case("Conversations")
            && !row.contains_key("creation_timestamp")
        {
            row.insert(
                "creation_timestamp".to_string(),
                Value::from(chrono::Utc::now().timestamp()),
            );
        }
        if table.eq_ignore_ascii_case("Messages") && !row.contains_key("timestamp") {
            row.insert("timestamp".to_string(), Value::from(chrono::Utc::now().timestamp()));
        }

        let columns: Vec<&String> = row.keys().collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
            placeholders.join(", ")
        );

        let conn = self.pool.get()?;
        let values: Vec<Box<dyn rusqlite::ToSql>> = columns
            .iter()
            .map(|c| value_to_sql(row.get(*c).unwrap()))
            .collect();
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        conn.execute(&sql, params.as_slice())?;
        let id = conn.last_insert_rowid();

        if table.eq_ignore_ascii_case("Messages") {
            if let (Some(convo_id), Some(timestamp)) = (
                row.get("convo_id").and_then(Value::as_i64),
                row.get("timestamp").and_then(Value::as_i64),
            ) {
                ensure_chat_row(&conn, convo_id)?;
                patch_creation_timestamp(&conn, convo_id, timestamp)?;
            }
        }

        self.cache.clear_cache_rows(table, None);
        Ok(id)
    }

    pub fn update_row(&self, table: &str, id: i64, changes: Map<String, Value>) -> Result<usize> {
        if changes.is_empty() {
            return Ok(0);
        }
        let columns: Vec<&String> = changes.keys().collect();
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            assignments.join(", "),
            columns.len() + 1
        );

        let conn = self.pool.get()?;
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = columns
            .iter()
            .map(|c| value_to_sql(changes.get(*c).unwrap()))
            .collect();
        values.push(Box::new(id));
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        let n = conn.execute(&sql, params.as_slice())?;
        self.cache.clear_cache_rows(table, None);
        Ok(n)
    }

    pub fn delete_row(&self, table: &str, id: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        let n = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
        self.cache.clear_cache_rows(table, None);
        Ok(n)
    }

    /// Deletes a conversation (and everything cascading from it) or a
    /// contact, following the graph in [`crate::db::cascade`].
    pub fn delete_cascading(&self, root: &str, deletables: &[Deletable]) -> Result<HashMap<String, usize>> {
        let mut conn = self.pool.get()?;
        let result = delete_cascade(&mut conn, root, deletables)?;
        if root.eq_ignore_ascii_case("Contacts") {
            let removed: Vec<String> = deletables.iter().map(|d| d.key_value.clone()).collect();
            prune_contact_group_members(&conn, &removed)?;
        }
        self.cache.clear_all();
        Ok(result)
    }

    /// Batch-inserts messages inside one transaction, used by both the
    /// live-sync engine and the export importer. Rows already present
    /// (matched by `pk_id`) are skipped, mirroring `INSERT OR IGNORE`.
    /// Also ensures the parent `Chats` row exists and patches the owning
    /// conversation's `creation_timestamp` downward if any inserted message
    /// predates it, per spec.md §4.1.
    pub fn insert_messages(&self, convo_id: i64, rows: &[Map<String, Value>]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        let mut earliest_timestamp: Option<i64> = None;
        for row in rows {
            let mut row = row.clone();
            row.insert("convo_id".to_string(), Value::from(convo_id));
            let columns: Vec<&String> = row.keys().collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT OR IGNORE INTO Messages ({}) VALUES ({})",
                columns.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
                placeholders.join(", ")
            );
            let values: Vec<Box<dyn rusqlite::ToSql>> =
                columns.iter().map(|c| value_to_sql(row.get(*c).unwrap())).collect();
            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
            inserted += tx.execute(&sql, params.as_slice())?;
            if let Some(timestamp) = row.get("timestamp").and_then(Value::as_i64) {
                earliest_timestamp = Some(earliest_timestamp.map_or(timestamp, |t| t.min(timestamp)));
            }
        }
        if !rows.is_empty() {
            ensure_chat_row(&tx, convo_id)?;
        }
        if let Some(timestamp) = earliest_timestamp {
            patch_creation_timestamp(&tx, convo_id, timestamp)?;
        }
        tx.commit()?;
        self.cache.clear_cache_rows("messages", Some(convo_id));
        Ok(inserted)
    }

    pub fn insert_participants(&self, convo_id: i64, identities: &[String]) -> Result<usize> {
        let conn = self.pool.get()?;
        let mut inserted = 0;
        for identity in identities {
            inserted += conn.execute(
                "INSERT OR IGNORE INTO Participants (convo_id, identity) VALUES (?1, ?2)",
                params![convo_id, identity],
            )?;
        }
        self.cache.clear_cache_rows("participants", None);
        Ok(inserted)
    }

    pub fn insert_contacts(&self, rows: &[Map<String, Value>]) -> Result<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for row in rows {
            let columns: Vec<&String> = row.keys().collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT OR IGNORE INTO Contacts ({}) VALUES ({})",
                columns.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
                placeholders.join(", ")
            );
            let values: Vec<Box<dyn rusqlite::ToSql>> =
                columns.iter().map(|c| value_to_sql(row.get(*c).unwrap())).collect();
            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
            inserted += tx.execute(&sql, params.as_slice())?;
        }
        tx.commit()?;
        self.cache.clear_cache_rows("contacts", None);
        Ok(inserted)
    }

    pub fn insert_account(&self, row: Map<String, Value>) -> Result<i64> {
        self.insert_row("Accounts", row)
    }

    /// Rewrites every stored Skype identity missing the `28:` bot prefix
    /// once a contact is confirmed to be a bot, across the tables that
    /// carry a free-text identity column (spec §9 bot-prefix migration).
    pub fn migrate_bot_prefix(&self, plain_skypename: &str) -> Result<usize> {
        if is_bot(plain_skypename) {
            return Ok(0);
        }
        let bot_identity = format!("28:{plain_skypename}");
        let conn = self.pool.get()?;
        let mut total = 0;
        total += conn.execute(
            "UPDATE Participants SET identity = ?1 WHERE identity = ?2",
            params![bot_identity, plain_skypename],
        )?;
        total += conn.execute(
            "UPDATE Messages SET author = ?1 WHERE author = ?2",
            params![bot_identity, plain_skypename],
        )?;
        total += conn.execute(
            "UPDATE Transfers SET partner_handle = ?1 WHERE partner_handle = ?2",
            params![bot_identity, plain_skypename],
        )?;
        self.cache.clear_all();
        Ok(total)
    }
}

/// Inserts a stub legacy `Chats` row for `convo_id` if one doesn't already
/// exist — Skype's native client requires it to find a conversation's
/// messages, per spec.md §4.1.
fn ensure_chat_row(conn: &Connection, convo_id: i64) -> Result<()> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM Chats WHERE conv_dbid = ?1 LIMIT 1",
            params![convo_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Ok(());
    }
    let identity: Option<String> = conn
        .query_row(
            "SELECT identity FROM Conversations WHERE id = ?1",
            params![convo_id],
            |row| row.get(0),
        )
        .optional()?;
    conn.execute(
        "INSERT INTO Chats (name, conv_dbid) VALUES (?1, ?2)",
        params![identity, convo_id],
    )?;
    Ok(())
}

/// Pulls a conversation's `creation_timestamp` down to `timestamp` if a
/// message predates it, per spec.md §3.2/§8 invariant 2.
fn patch_creation_timestamp(conn: &Connection, convo_id: i64, timestamp: i64) -> Result<()> {
    conn.execute(
        "UPDATE Conversations SET creation_timestamp = MIN(COALESCE(creation_timestamp, ?1), ?1) WHERE id = ?2",
        params![timestamp, convo_id],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ConversationStats {
    pub message_count: i64,
    pub first_message_timestamp: Option<i64>,
    pub last_message_timestamp: Option<i64>,
}

fn value_to_sql(v: &Value) -> Box<dyn rusqlite::ToSql> {
    match v {
        Value::Null => Box::new(Option::<i64>::None),
        Value::Bool(b) => Box::new(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Box::new(i)
            } else {
                Box::new(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Box::new(s.clone()),
        Value::Array(items) => {
            // A BLOB column (e.g. Messages.guid) represented as a byte array.
            match items.iter().map(|b| b.as_u64().and_then(|n| u8::try_from(n).ok())).collect::<Option<Vec<u8>>>() {
                Some(bytes) => Box::new(bytes),
                None => Box::new(Value::Array(items.clone()).to_string()),
            }
        }
        other => Box::new(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_test_accessor() -> Accessor {
        let pool = crate::db::pool::create_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            ensure_schema(&conn).unwrap();
            ensure_internal_schema(&conn).unwrap();
        }
        Accessor {
            pool,
            cache: RowCache::new(),
        }
    }

    #[test]
    fn insert_conversation_patches_creation_timestamp() {
        let accessor = new_test_accessor();
        let mut row = Map::new();
        row.insert("identity".to_string(), json!("8:alice"));
        let id = accessor.insert_row("Conversations", row).unwrap();
        let conversations = accessor.get_conversations().unwrap();
        let inserted = conversations.iter().find(|c| c["id"].as_i64() == Some(id)).unwrap();
        assert!(inserted["creation_timestamp"].is_number());
    }

    #[test]
    fn insert_messages_is_idempotent_on_pk_id() {
        let accessor = new_test_accessor();
        let mut conv = Map::new();
        conv.insert("identity".to_string(), json!("8:alice"));
        let convo_id = accessor.insert_row("Conversations", conv).unwrap();

        let mut msg = Map::new();
        msg.insert("id".to_string(), json!(1));
        msg.insert("author".to_string(), json!("alice"));
        msg.insert("body_xml".to_string(), json!("hi"));
        let inserted = accessor.insert_messages(convo_id, &[msg.clone()]).unwrap();
        assert_eq!(inserted, 1);
        let inserted_again = accessor.insert_messages(convo_id, &[msg]).unwrap();
        assert_eq!(inserted_again, 0);
    }

    #[test]
    fn insert_messages_patches_creation_timestamp_downward() {
        let accessor = new_test_accessor();
        let mut conv = Map::new();
        conv.insert("identity".to_string(), json!("8:alice"));
        conv.insert("creation_timestamp".to_string(), json!(1_800_000_000_i64));
        let convo_id = accessor.insert_row("Conversations", conv).unwrap();

        let mut msg = Map::new();
        msg.insert("id".to_string(), json!(1));
        msg.insert("author".to_string(), json!("alice"));
        msg.insert("timestamp".to_string(), json!(1_700_000_000_i64));
        accessor.insert_messages(convo_id, &[msg]).unwrap();

        let conversations = accessor.get_conversations().unwrap();
        let updated = conversations.iter().find(|c| c["id"].as_i64() == Some(convo_id)).unwrap();
        assert_eq!(updated["creation_timestamp"].as_i64(), Some(1_700_000_000));
    }

    #[test]
    fn insert_messages_ensures_parent_chats_row() {
        let accessor = new_test_accessor();
        let mut conv = Map::new();
        conv.insert("identity".to_string(), json!("8:alice"));
        let convo_id = accessor.insert_row("Conversations", conv).unwrap();

        let mut msg = Map::new();
        msg.insert("id".to_string(), json!(1));
        msg.insert("author".to_string(), json!("alice"));
        accessor.insert_messages(convo_id, &[msg]).unwrap();

        let conn = accessor.pool.get().unwrap();
        let name: String = conn
            .query_row("SELECT name FROM Chats WHERE conv_dbid = ?1", params![convo_id], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "8:alice");
    }

    #[test]
    fn migrate_bot_prefix_rewrites_author_column() {
        let accessor = new_test_accessor();
        let mut conv = Map::new();
        conv.insert("identity".to_string(), json!("8:botuser"));
        let convo_id = accessor.insert_row("Conversations", conv).unwrap();
        let mut msg = Map::new();
        msg.insert("id".to_string(), json!(1));
        msg.insert("author".to_string(), json!("botuser"));
        accessor.insert_messages(convo_id, &[msg]).unwrap();

        let changed = accessor.migrate_bot_prefix("botuser").unwrap();
        assert_eq!(changed, 1);
    }

    #[test]
    fn delete_cascading_removes_conversation() {
        let accessor = new_test_accessor();
        let mut conv = Map::new();
        conv.insert("identity".to_string(), json!("8:alice"));
        let convo_id = accessor.insert_row("Conversations", conv).unwrap();

        let deletables = vec![Deletable {
            key_value: convo_id.to_string(),
            linked_key_value: None,
        }];
        accessor.delete_cascading("Conversations", &deletables).unwrap();
        let conversations = accessor.get_conversations().unwrap();
        assert!(conversations.is_empty());
    }
}
