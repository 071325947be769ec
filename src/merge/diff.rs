//! Left-to-right chat diffing, ported from
//! `workers.py::MergeThread.get_chat_diff_left`/`match_time`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// One side's view of a chat being compared: its participants, message
/// rows and any locally-cached shared files, keyed the way the original
/// reads them off each database.
#[derive(Debug, Clone)]
pub struct ChatSide {
    pub convo_id: Option<i64>,
    pub participants: Vec<ParticipantRow>,
    pub messages: Vec<MessageRow>,
    /// `_shared_files_` rows with a locally verified file, keyed by message id.
    pub shared_files: HashMap<i64, SharedFileRow>,
}

#[derive(Debug, Clone)]
pub struct ParticipantRow {
    pub identity: String,
    pub contact_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub author: String,
    pub datetime: DateTime<Utc>,
    /// Whitespace-normalized text rendering (C3 in `format=text, merge=true`),
    /// supplied by the caller so this module stays parser-agnostic.
    pub merge_text: String,
}

#[derive(Debug, Clone)]
pub struct SharedFileRow {
    pub msg_id: i64,
    pub filepath: String,
}

/// A shared file present on the left with no right-side counterpart; when
/// a matching right-side message was found, `msg_id2` lets the caller
/// attach the file to that message rather than re-inserting it.
#[derive(Debug, Clone)]
pub struct SharedFileDelta {
    pub file: SharedFileRow,
    pub msg_id2: Option<i64>,
}

/// `{messages, participants, shared_files}` different on the left, per
/// spec.md §4.4.
#[derive(Debug, Clone, Default)]
pub struct ChatDiff {
    pub message_ids: Vec<i64>,
    pub participants: Vec<ParticipantRow>,
    pub shared_files: Vec<SharedFileDelta>,
}

/// Seconds of slack `match_time` allows between minute-aligned timestamps,
/// per spec.md §4.4 ("3-minute slack").
const TIME_SLACK_SECONDS: i64 = 180;

/// Returns whether `d1`/`d2` might be the same moment viewed from different
/// timezones: true if, shifting the earlier time forward by any whole
/// number of hours up to their span (capped at one day), the remaining
/// difference is under `slack` seconds. Ported from `workers.py::match_time`.
pub fn match_time(d1: DateTime<Utc>, d2: DateTime<Utc>, slack_seconds: i64) -> bool {
    let (earlier, later) = if d1 < d2 { (d1, d2) } else { (d2, d1) };
    let span = (later - earlier).num_seconds();
    if span > 24 * 3600 {
        return false;
    }
    let hours = span / 3600;
    for hour in 0..=hours {
        let shifted = earlier + chrono::Duration::hours(hour);
        let diff = (later - shifted).num_seconds().abs();
        if diff < slack_seconds {
            return true;
        }
    }
    false
}

/// Diffs `left` against `right`, returning what's different (present or
/// changed) on the left side. `account_identities` names every identity
/// that counts as "the account itself" on either side (both databases'
/// account skypename), which collapses to a `None` author key the way
/// `db_account_ids` does.
pub fn diff_chat_left(left: &ChatSide, right: &ChatSide, account_identities: &[String]) -> ChatDiff {
    let right_participants: HashMap<&str, &ParticipantRow> =
        right.participants.iter().map(|p| (p.identity.as_str(), p)).collect();
    let participants = left
        .participants
        .iter()
        .filter(|p| match right_participants.get(p.identity.as_str()) {
            None => true,
            Some(rp) => p.contact_id.is_some() && rp.contact_id.is_none(),
        })
        .cloned()
        .collect();

    let mut message_matches: HashMap<i64, Option<i64>> = HashMap::new();
    let mut message_diff: Vec<(i64, DateTime<Utc>)> = Vec::new();

    if left.messages.is_empty() {
        // nothing to diff
    } else if right.messages.is_empty() {
        message_diff = left.messages.iter().map(|m| (m.id, m.datetime)).collect();
        for m in &left.messages {
            message_matches.insert(m.id, None);
        }
    } else {
        let mut buckets: HashMap<chrono::NaiveDate, HashMap<(Option<String>, String), Vec<(i64, DateTime<Utc>)>>> =
            HashMap::new();
        for m in &right.messages {
            let author_key = (!account_identities.contains(&m.author)).then(|| m.author.clone());
            buckets
                .entry(m.datetime.date_naive())
                .or_default()
                .entry((author_key, m.merge_text.clone()))
                .or_default()
                .push((m.id, m.datetime));
        }

        for m in &left.messages {
            let key = (
                (!account_identities.contains(&m.author)).then(|| m.author.clone()),
                m.merge_text.clone(),
            );
            let date = m.datetime.date_naive();
            let mut matched = None;
            for delta in -1i64..=1 {
                let day = date + chrono::Duration::days(delta);
                if let Some(candidates) = buckets.get(&day).and_then(|b| b.get(&key)) {
                    if let Some((id, _)) = candidates.iter().find(|(_, dt)| match_time(m.datetime, *dt, TIME_SLACK_SECONDS)) {
                        matched = Some(*id);
                        break;
                    }
                }
            }
            if matched.is_none() {
                message_diff.push((m.id, m.datetime));
            }
            message_matches.insert(m.id, matched);
        }
    }

    message_diff.sort_by_key(|(_, dt)| *dt);

    let mut shared_files = Vec::new();
    for (msg_id, matched) in &message_matches {
        if let Some(file) = left.shared_files.get(msg_id) {
            let right_has_it = matched.map(|id| right.shared_files.contains_key(&id)).unwrap_or(false);
            if !right_has_it {
                shared_files.push(SharedFileDelta {
                    file: file.clone(),
                    msg_id2: *matched,
                });
            }
        }
    }

    ChatDiff {
        message_ids: message_diff.into_iter().map(|(id, _)| id).collect(),
        participants,
        shared_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn match_time_accepts_same_day_hour_shift_within_slack() {
        let d1 = dt(0);
        let d2 = dt(3600 * 5 + 10); // 5h10s later, same "shifted" minute
        assert!(match_time(d1, d2, 180));
    }

    #[test]
    fn match_time_rejects_spans_over_a_day() {
        let d1 = dt(0);
        let d2 = dt(25 * 3600);
        assert!(!match_time(d1, d2, 180));
    }

    #[test]
    fn unmatched_left_messages_become_the_delta() {
        let left = ChatSide {
            convo_id: Some(1),
            participants: vec![],
            messages: vec![MessageRow {
                id: 10,
                author: "alice".to_string(),
                datetime: dt(1000),
                merge_text: "hello".to_string(),
            }],
            shared_files: HashMap::new(),
        };
        let right = ChatSide {
            convo_id: Some(2),
            participants: vec![],
            messages: vec![],
            shared_files: HashMap::new(),
        };
        let diff = diff_chat_left(&left, &right, &[]);
        assert_eq!(diff.message_ids, vec![10]);
    }

    #[test]
    fn matching_message_text_and_time_is_not_in_the_delta() {
        let left = ChatSide {
            convo_id: Some(1),
            participants: vec![],
            messages: vec![MessageRow { id: 1, author: "alice".to_string(), datetime: dt(1000), merge_text: "hi".to_string() }],
            shared_files: HashMap::new(),
        };
        let right = ChatSide {
            convo_id: Some(2),
            participants: vec![],
            messages: vec![MessageRow { id: 99, author: "alice".to_string(), datetime: dt(1000), merge_text: "hi".to_string() }],
            shared_files: HashMap::new(),
        };
        let diff = diff_chat_left(&left, &right, &[]);
        assert!(diff.message_ids.is_empty());
    }
}
