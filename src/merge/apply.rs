//! Transactional per-chat application of a [`ChatDiff`], writing through
//! one [`Accessor`] while reading rows from another — spec.md §2's "C5
//! reads from two C2 instances and writes through one."

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{info, instrument};

use crate::db::shared_files::{self, SharedFileMeta};
use crate::db::Accessor;
use crate::error::Result;
use crate::merge::diff::ChatDiff;

#[derive(Debug, Default, Clone)]
pub struct ApplyReport {
    pub messages_inserted: usize,
    pub participants_inserted: usize,
    pub shared_files_copied: usize,
}

/// Applies `diff` (computed left-to-right by [`crate::merge::diff::diff_chat_left`])
/// onto `dest_convo_id` in `dest`, reading the differing rows out of
/// `source` by id. All inserts for one chat happen through [`Accessor`]'s
/// already-transactional `insert_messages`/`insert_participants`, so a
/// chat either lands whole or not at all; `insert_messages` also patches
/// `dest_convo_id`'s `creation_timestamp` downward if any merged message
/// predates it (spec.md §3.2/§8 invariant 2).
#[instrument(skip(source, dest, diff, source_share_dir, dest_share_dir))]
pub fn apply_chat_diff(
    source: &Accessor,
    source_convo_id: i64,
    dest: &Accessor,
    dest_convo_id: i64,
    diff: &ChatDiff,
    source_share_dir: &Path,
    dest_share_dir: &Path,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();

    let source_messages = source.get_messages(source_convo_id)?;
    let wanted: std::collections::HashSet<i64> = diff.message_ids.iter().copied().collect();
    let rows: Vec<serde_json::Map<String, Value>> = source_messages
        .iter()
        .filter_map(|m| m.as_object())
        .filter(|m| m.get("id").and_then(Value::as_i64).map(|id| wanted.contains(&id)).unwrap_or(false))
        .cloned()
        .collect();
    if !rows.is_empty() {
        report.messages_inserted = dest.insert_messages(dest_convo_id, &rows)?;
    }

    if !diff.participants.is_empty() {
        let identities: Vec<String> = diff.participants.iter().map(|p| p.identity.clone()).collect();
        report.participants_inserted = dest.insert_participants(dest_convo_id, &identities)?;
    }

    for delta in &diff.shared_files {
        let Some(dest_msg_id) = delta.msg_id2 else { continue };
        let source_path = source_share_dir.join(&delta.file.filepath);
        let Ok(content) = fs::read(&source_path) else {
            continue;
        };
        let meta = SharedFileMeta {
            docid: None,
            author: String::new(),
            category: None,
            mimetype: None,
            filename: Path::new(&delta.file.filepath)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        if shared_files::store_shared_file(
            dest.pool(),
            dest_share_dir,
            dest_convo_id,
            dest_msg_id,
            chrono::Utc::now(),
            &content,
            &meta,
        )
        .is_some()
        {
            report.shared_files_copied += 1;
        }
    }

    info!(
        messages = report.messages_inserted,
        participants = report.participants_inserted,
        files = report.shared_files_copied,
        "applied chat diff"
    );
    Ok(report)
}
