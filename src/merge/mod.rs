//! The merge/diff engine: compares two databases chat-by-chat and applies
//! the left-to-right delta transactionally. Grounded on
//! `workers.py::MergeThread`.

pub mod apply;
pub mod diff;

pub use apply::{apply_chat_diff, ApplyReport};
pub use diff::{diff_chat_left, match_time, ChatDiff, ChatSide, MessageRow, ParticipantRow, SharedFileDelta, SharedFileRow};
