//! The live-sync engine: drives a [`RemoteClient`] through the rate
//! limiter, converts remote objects to rows via a [`Converter`], and saves
//! them through the [`Accessor`] with the edit/link detection the original
//! `SkypeLogin.save`/`populate` implement.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::db::Accessor;
use crate::error::{ChatVaultError, Result};
use crate::identity::hash_string;
use crate::parser::process_message_edit;
use crate::sync::client::{is_rate_limited, Credentials, Page, RemoteClient, RemoteObject};
use crate::sync::convert::{Converter, TargetTable};
use crate::sync::ratelimit::{CallError, RateLimiter};

/// Outcome of one `save()` call, mirroring `SkypeLogin.SAVE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Skip,
    Insert,
    Update,
    NoChange,
}

/// Running per-table counters the original calls `sync_counts`.
#[derive(Debug, Default, Clone)]
pub struct SyncCounts {
    pub inserted: Map<String, Value>,
    pub updated: Map<String, Value>,
}

/// Strips path-unsafe characters (`/\:*?"<>|`) the way `util.safe_filename`
/// does, for deriving a token-file path from a username.
pub fn safe_filename(name: &str) -> String {
    name.chars().filter(|c| !r#"/\:*?"<>|"#.contains(*c)).collect()
}

/// Derives the token-file path for `username` under `var_dir`: the
/// safe-slugged username, with a hex hash suffix appended if slugging
/// changed it (so two usernames colliding after stripping don't collide on
/// disk), matching `live.py::login`'s `path`/`make_db_path`'s `base` logic.
pub fn token_path(var_dir: &Path, username: &str) -> PathBuf {
    let mut base = safe_filename(username);
    if base != username {
        base = format!("{base}_{:x}", hash_string(username));
    }
    var_dir.join(format!("{base}.token"))
}

/// Derives the default per-account database path, `make_db_path`'s
/// Rust-side counterpart.
pub fn make_db_path(var_dir: &Path, username: &str) -> PathBuf {
    let mut base = safe_filename(username);
    if base != username {
        base = format!("{base}_{:x}", hash_string(username));
    }
    var_dir.join(format!("{base}.main.db"))
}

/// Appends the category-specific view suffix Skype's shared-content API
/// expects, e.g. `/views/audio` for an audio attachment; a no-op for URLs
/// outside `api.asm.skype.com`. Ported from `live.py::make_content_url`.
pub fn make_content_url(url: &str, category: Option<&str>) -> String {
    if !url.contains("api.asm.skype.com/") {
        return url.to_string();
    }
    let suffix = match category {
        Some("avatar") => "/views/avatar_fullsize",
        Some("audio") => "/views/audio",
        Some("video") => "/views/video",
        Some("sticker") => "/views/thumbnail",
        Some("file") => "/views/original",
        _ => "/views/imgpsh_fullsize",
    };
    if url.ends_with(suffix) {
        url.to_string()
    } else {
        format!("{url}{suffix}")
    }
}

pub struct SyncEngine<C: RemoteClient> {
    client: C,
    limiter: RateLimiter,
    accessor: Accessor,
    converter: Box<dyn Converter>,
    counts: SyncCounts,
    seen_messages_this_session: std::collections::HashSet<i64>,
}

impl<C: RemoteClient> SyncEngine<C> {
    pub fn new(client: C, config: &Config, accessor: Accessor, converter: Box<dyn Converter>) -> Self {
        Self {
            client,
            limiter: RateLimiter::from_config(config),
            accessor,
            converter,
            counts: SyncCounts::default(),
            seen_messages_this_session: std::collections::HashSet::new(),
        }
    }

    pub fn counts(&self) -> &SyncCounts {
        &self.counts
    }

    #[instrument(skip(self, credentials))]
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        info!(account = %credentials.username, "logging in to remote account");
        let client = &mut self.client;
        self.limiter
            .call(|| async {
                client
                    .login(credentials)
                    .await
                    .map_err(|e| wrap_call_error(e))
            })
            .await
    }

    /// Saves one remote object through convert → lookup → edit-reconcile →
    /// insert/update, per spec.md §4.3's save contract.
    #[instrument(skip(self, item, parent))]
    pub fn save(&mut self, table: TargetTable, item: &RemoteObject, parent: Option<&Value>) -> Result<(Option<i64>, SaveOutcome)> {
        let Some(mut row) = self.converter.convert(table, item, parent) else {
            return Ok((None, SaveOutcome::Skip));
        };

        if table == TargetTable::Messages {
            apply_inline_edit_marker(&mut row);
        }

        let key_field = table.lookup_key();
        let key_value = row.get(key_field).cloned();

        let existing = self.find_existing(table, &key_value, &row)?;

        match existing {
            None => {
                let id = self.accessor.insert_row(table.table_name(), row)?;
                self.record_count(table, true);
                Ok((Some(id), SaveOutcome::Insert))
            }
            Some((id, existing_row)) => {
                if table == TargetTable::Messages {
                    reconcile_edit(&mut row, &existing_row);
                }
                if rows_equal(&row, &existing_row) {
                    return Ok((Some(id), SaveOutcome::NoChange));
                }
                self.accessor.update_row(table.table_name(), id, row)?;
                self.record_count(table, false);
                Ok((Some(id), SaveOutcome::Update))
            }
        }
    }

    fn find_existing(
        &self,
        table: TargetTable,
        key_value: &Option<Value>,
        row: &Map<String, Value>,
    ) -> Result<Option<(i64, Map<String, Value>)>> {
        let Some(key_value) = key_value else { return Ok(None) };
        let table_rows = self.accessor.get_table(table.table_name())?;
        let key_field = table.lookup_key();

        if table == TargetTable::Messages {
            if let Some(remote_id) = row.get("remote_id") {
                if let Some(found) = table_rows.iter().find_map(|r| {
                    let obj = r.as_object()?;
                    (obj.get("remote_id") == Some(remote_id)).then(|| obj.clone())
                }) {
                    let id = found.get("id").and_then(Value::as_i64).unwrap_or_default();
                    return Ok(Some((id, found)));
                }
            }
        }

        let found = table_rows.iter().find_map(|r| {
            let obj = r.as_object()?;
            (obj.get(key_field) == Some(key_value)).then(|| obj.clone())
        });
        Ok(found.map(|obj| (obj.get("id").and_then(Value::as_i64).unwrap_or_default(), obj)))
    }

    fn record_count(&mut self, table: TargetTable, inserted: bool) {
        let bucket = if inserted { &mut self.counts.inserted } else { &mut self.counts.updated };
        let key = table.table_name().to_string();
        let current = bucket.get(&key).and_then(Value::as_i64).unwrap_or(0);
        bucket.insert(key, Value::from(current + 1));
    }

    /// Drives one chat's full message history through `save`, stopping
    /// once a message already seen this session comes back `NoChange` —
    /// the original's loop terminator for "we've caught up."
    pub async fn sync_chat_messages(&mut self, chat_identity: &str, parent: &Value) -> Result<u32> {
        let mut saved = 0u32;
        let mut cursor: Option<String> = None;
        loop {
            let client = &mut self.client;
            let page: Page = self
                .limiter
                .call(|| async { client.messages(chat_identity, cursor.as_deref()).await.map_err(wrap_call_error) })
                .await?;

            if page.items.is_empty() {
                break;
            }
            let mut should_stop = false;
            for item in &page.items {
                let (id, outcome) = self.save(TargetTable::Messages, item, Some(parent))?;
                saved += 1;
                if let Some(id) = id {
                    if outcome == SaveOutcome::NoChange && self.seen_messages_this_session.contains(&id) {
                        should_stop = true;
                        break;
                    }
                    self.seen_messages_this_session.insert(id);
                }
            }
            if should_stop || page.cursor.is_none() {
                break;
            }
            cursor = page.cursor;
        }
        debug!(chat = chat_identity, saved, "chat message sync complete");
        Ok(saved)
    }

    /// `get_api_content`'s media-fetch path: massages the URL, then fetches
    /// it through the rate-limited client. Disk caching is left to the
    /// caller (a GUI shell concern), matching the original's per-user cache
    /// directory convention being outside this crate's scope.
    pub async fn fetch_content(&mut self, url: &str, category: Option<&str>) -> Result<Vec<u8>> {
        let url = make_content_url(url, category);
        let client = &mut self.client;
        self.limiter
            .call(|| async { client.get_content(&url).await.map_err(wrap_call_error) })
            .await
    }
}

fn wrap_call_error(e: ChatVaultError) -> CallError<ChatVaultError> {
    if is_rate_limited(&e) {
        CallError::rate_limited(e)
    } else {
        CallError::other(e)
    }
}

/// Reconciles an in-body `<e_m>` edit marker, which the service embeds
/// directly in a text message's `body_xml` rather than resending the
/// message under a new `remote_id`. Runs on every converted message
/// (`live.py`'s `process_message_edit(result)` call inside the per-item
/// convert loop), not just on the `remote_id`-keyed update path
/// `reconcile_edit` handles.
fn apply_inline_edit_marker(row: &mut Map<String, Value>) {
    let Some(body_xml) = row.get("body_xml").and_then(Value::as_str) else {
        return;
    };
    let timestamp = row.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
    let timestamp_ms = row
        .get("timestamp__ms")
        .and_then(Value::as_i64)
        .unwrap_or(timestamp * 1000);

    let Some(info) = process_message_edit(body_xml, timestamp, timestamp_ms) else {
        return;
    };

    row.insert("body_xml".to_string(), Value::from(info.body));
    row.insert("timestamp".to_string(), Value::from(info.timestamp));
    row.insert("timestamp__ms".to_string(), Value::from(info.timestamp_ms));
    row.insert("edited_timestamp".to_string(), Value::from(info.edited_timestamp));
    if let Some(edited_by) = info.edited_by {
        row.insert("edited_by".to_string(), Value::from(edited_by));
    } else if let Some(author) = row.get("author").cloned() {
        row.insert("edited_by".to_string(), author);
    }
}

/// Two messages sharing `remote_id` but differing in body trigger edit
/// reconciliation: copy the newer body, set `edited_by`/`edited_timestamp`,
/// and keep the older `pk_id`/`guid`/`timestamp` if they predate the
/// incoming row. Mutates `row` in place; `existing` is left untouched (the
/// caller writes `row` back via `update_row`).
fn reconcile_edit(row: &mut Map<String, Value>, existing: &Map<String, Value>) {
    let same_pk = row.get("pk_id") == existing.get("pk_id");
    let same_body = row.get("body_xml") == existing.get("body_xml");
    if same_pk && same_body {
        return;
    }
    let ts_new = row.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
    let ts_old = existing.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
    let edited_old = existing.get("edited_timestamp").and_then(Value::as_i64).unwrap_or(0);
    let edited_timestamp = ts_new.max(ts_old).max(edited_old);
    row.insert("edited_timestamp".to_string(), Value::from(edited_timestamp));
    row.insert("edited_by".to_string(), row.get("author").cloned().unwrap_or(Value::Null));

    if ts_old < ts_new {
        for field in ["pk_id", "guid", "timestamp"] {
            if let Some(v) = existing.get(field) {
                row.insert(field.to_string(), v.clone());
            }
        }
    }
}

fn rows_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_filename_strips_path_unsafe_characters() {
        assert_eq!(safe_filename("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
    }

    #[test]
    fn token_path_appends_hash_suffix_on_slug_change() {
        let path = token_path(Path::new("/var"), "weird/name");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("weirdname_"));
        assert!(name.ends_with(".token"));
    }

    #[test]
    fn token_path_keeps_plain_username_unchanged() {
        let path = token_path(Path::new("/var"), "plainuser");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "plainuser.token");
    }

    #[test]
    fn content_url_gets_category_suffix_only_for_asm_host() {
        let url = "https://api.asm.skype.com/v1/objects/abc";
        assert_eq!(make_content_url(url, Some("audio")), format!("{url}/views/audio"));
        assert_eq!(make_content_url("https://example.com/x", Some("audio")), "https://example.com/x");
    }

    #[test]
    fn reconcile_edit_keeps_older_pk_id_and_bumps_edited_timestamp() {
        let mut incoming: Map<String, Value> = Map::new();
        incoming.insert("pk_id".into(), Value::from(2));
        incoming.insert("body_xml".into(), Value::from("new body"));
        incoming.insert("timestamp".into(), Value::from(200));
        incoming.insert("author".into(), Value::from("alice"));

        let mut existing: Map<String, Value> = Map::new();
        existing.insert("pk_id".into(), Value::from(1));
        existing.insert("body_xml".into(), Value::from("old body"));
        existing.insert("timestamp".into(), Value::from(100));

        reconcile_edit(&mut incoming, &existing);
        assert_eq!(incoming.get("pk_id"), Some(&Value::from(1)));
        assert_eq!(incoming.get("timestamp"), Some(&Value::from(100)));
        assert_eq!(incoming.get("edited_timestamp"), Some(&Value::from(200)));
    }

    #[test]
    fn inline_edit_marker_rewrites_row_in_place() {
        let mut row: Map<String, Value> = Map::new();
        row.insert(
            "body_xml".into(),
            Value::from("Edited previous message: see later<e_m ts=\"1700000000\" ts_ms=\"1700000000000\" a=\"alice\" t=\"61\"/>"),
        );
        row.insert("timestamp".into(), Value::from(1700000050));
        row.insert("timestamp__ms".into(), Value::from(1700000050000_i64));
        row.insert("author".into(), Value::from("alice"));

        apply_inline_edit_marker(&mut row);

        assert_eq!(row.get("body_xml"), Some(&Value::from("see later")));
        assert_eq!(row.get("timestamp"), Some(&Value::from(1700000000)));
        assert_eq!(row.get("timestamp__ms"), Some(&Value::from(1700000000000_i64)));
        assert_eq!(row.get("edited_timestamp"), Some(&Value::from(1700000050)));
        assert_eq!(row.get("edited_by"), Some(&Value::from("alice")));
    }

    #[test]
    fn inline_edit_marker_is_a_no_op_for_plain_messages() {
        let mut row: Map<String, Value> = Map::new();
        row.insert("body_xml".into(), Value::from("just text"));
        row.insert("timestamp".into(), Value::from(100));
        apply_inline_edit_marker(&mut row);
        assert_eq!(row.get("body_xml"), Some(&Value::from("just text")));
        assert!(row.get("edited_timestamp").is_none());
    }
}
