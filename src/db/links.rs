//! Conversation-link reconstruction (spec §3.1, §9 "Chat identity
//! merging"). `__link` is never stored; it is recomputed at read time by
//! matching a newer row's `alt_identity` against an older row's `identity`,
//! or by base64-decoding a legacy `19:<b64>@p2p.thread.skype` identity and
//! comparing it against the decoded form of another row's identity.

use std::collections::HashMap;

use crate::identity::id_to_identity;

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: i64,
    pub identity: String,
    pub alt_identity: Option<String>,
}

/// Returns, for each conversation id, the id of its legacy predecessor row
/// if one is found among `rows`.
pub fn compute_links(rows: &[ConversationRow]) -> HashMap<i64, i64> {
    let mut by_identity: HashMap<String, i64> = HashMap::new();
    let mut by_decoded: HashMap<String, i64> = HashMap::new();
    for row in rows {
        by_identity.insert(row.identity.clone(), row.id);
        by_decoded.insert(id_to_identity(&row.identity), row.id);
    }

    let mut links = HashMap::new();
    for row in rows {
        if let Some(alt) = &row.alt_identity {
            if let Some(&predecessor_id) = by_identity.get(alt).or_else(|| by_decoded.get(alt)) {
                if predecessor_id != row.id {
                    links.insert(row.id, predecessor_id);
                    continue;
                }
            }
        }
        let decoded = id_to_identity(&row.identity);
        if decoded != row.identity {
            if let Some(&predecessor_id) = by_identity.get(&decoded) {
                if predecessor_id != row.id {
                    links.insert(row.id, predecessor_id);
                }
            }
        }
    }
    links
}

/// Given the full set of conversation ids and the link map, returns the
/// ids that should be suppressed from `get_conversations` output because
/// they are reachable as a predecessor via `__link` of some other row.
pub fn suppressed_predecessors(links: &HashMap<i64, i64>) -> std::collections::HashSet<i64> {
    links.values().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_identity_links_to_predecessor() {
        let rows = vec![
            ConversationRow {
                id: 1,
                identity: "19:abc123@p2p.thread.skype".to_string(),
                alt_identity: None,
            },
            ConversationRow {
                id: 2,
                identity: "19:xyz@thread.skype".to_string(),
                alt_identity: Some("19:abc123@p2p.thread.skype".to_string()),
            },
        ];
        let links = compute_links(&rows);
        assert_eq!(links.get(&2), Some(&1));
        assert!(suppressed_predecessors(&links).contains(&1));
    }

    #[test]
    fn no_alt_identity_means_no_link() {
        let rows = vec![ConversationRow {
            id: 1,
            identity: "8:alice".to_string(),
            alt_identity: None,
        }];
        assert!(compute_links(&rows).is_empty());
    }
}
