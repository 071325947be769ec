//! Row cache keyed by table name (spec §4.1). Whole-table caching covers
//! `accounts`, `contacts`, `conversations`, `contactgroups`, `transfers`,
//! `smses`, `videos`, `calls`; `messages` caches only full-range per-chat
//! fetches, keyed additionally by conversation id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

#[derive(Default)]
pub struct RowCache {
    tables: RwLock<HashMap<String, Arc<Vec<Value>>>>,
    messages_by_chat: RwLock<HashMap<i64, Arc<Vec<Value>>>>,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_table(&self, table: &str) -> Option<Arc<Vec<Value>>> {
        self.tables.read().unwrap().get(table).cloned()
    }

    pub fn put_table(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .write()
            .unwrap()
            .insert(table.to_string(), Arc::new(rows));
    }

    pub fn get_chat_messages(&self, convo_id: i64) -> Option<Arc<Vec<Value>>> {
        self.messages_by_chat.read().unwrap().get(&convo_id).cloned()
    }

    pub fn put_chat_messages(&self, convo_id: i64, rows: Vec<Value>) {
        self.messages_by_chat
            .write()
            .unwrap()
            .insert(convo_id, Arc::new(rows));
    }

    /// Evicts a whole table, or a whole chat's message cache when `table`
    /// is `"messages"` and `convo_id` is given. Passing no `convo_id` for
    /// `"messages"` clears every chat's cached messages.
    pub fn clear_cache_rows(&self, table: &str, convo_id: Option<i64>) {
        if table.eq_ignore_ascii_case("messages") {
            match convo_id {
                Some(id) => {
                    self.messages_by_chat.write().unwrap().remove(&id);
                }
                None => self.messages_by_chat.write().unwrap().clear(),
            }
        } else {
            self.tables.write().unwrap().remove(table);
        }
    }

    pub fn clear_all(&self) {
        self.tables.write().unwrap().clear();
        self.messages_by_chat.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_cache_round_trips() {
        let cache = RowCache::new();
        assert!(cache.get_table("contacts").is_none());
        cache.put_table("contacts", vec![json!({"skypename": "alice"})]);
        let rows = cache.get_table("contacts").unwrap();
        assert_eq!(rows.len(), 1);
        cache.clear_cache_rows("contacts", None);
        assert!(cache.get_table("contacts").is_none());
    }

    #[test]
    fn message_cache_is_keyed_by_chat() {
        let cache = RowCache::new();
        cache.put_chat_messages(1, vec![json!({"id": 1})]);
        cache.put_chat_messages(2, vec![json!({"id": 2})]);
        cache.clear_cache_rows("messages", Some(1));
        assert!(cache.get_chat_messages(1).is_none());
        assert!(cache.get_chat_messages(2).is_some());
    }
}
