//! Remote-object-to-row conversion, the `convert` half of `SkypeLogin.save`.
//! Since the remote object schema is opaque (spec.md §1 Non-goal: no
//! protocol reimplementation), this only defines the per-table shape the
//! engine expects back; a concrete [`crate::sync::client::RemoteClient`]'s
//! accompanying converter fills it in from whatever fields that client's
//! objects actually carry.

use serde_json::{Map, Value};

use crate::sync::client::RemoteObject;

/// The four tables `save` ever targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetTable {
    Accounts,
    Contacts,
    Chats,
    Messages,
}

impl TargetTable {
    /// The table-specific lookup key `save` uses to find an existing row,
    /// per spec.md §4.3 step 2: `skypename` for contacts/accounts,
    /// `identity` for chats, `pk_id` for messages.
    pub fn lookup_key(self) -> &'static str {
        match self {
            TargetTable::Accounts | TargetTable::Contacts => "skypename",
            TargetTable::Chats => "identity",
            TargetTable::Messages => "pk_id",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            TargetTable::Accounts => "Accounts",
            TargetTable::Contacts => "Contacts",
            TargetTable::Chats => "Conversations",
            TargetTable::Messages => "Messages",
        }
    }
}

/// Converts one remote object into a row; returns `None` for object shapes
/// the caller doesn't recognize, mirroring `convert`'s `None` "SKIP" return.
pub trait Converter: Send + Sync {
    fn convert(&self, table: TargetTable, item: &RemoteObject, parent: Option<&Value>) -> Option<Map<String, Value>>;
}

/// Synthesizes a group chat's `displayname` from up to four participant
/// display names plus an ellipsis, per spec.md §4.3 step 4.
pub fn synthesize_group_displayname(participant_names: &[String]) -> String {
    let take = participant_names.iter().take(4).cloned().collect::<Vec<_>>();
    let mut name = take.join(", ");
    if participant_names.len() > 4 {
        name.push_str(", ...");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_displayname_truncates_past_four_names() {
        let names: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        assert_eq!(synthesize_group_displayname(&names), "a, b, c, d, ...");
    }

    #[test]
    fn group_displayname_keeps_all_when_four_or_fewer() {
        let names: Vec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(synthesize_group_displayname(&names), "a, b");
    }
}
