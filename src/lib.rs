//! chatvault: the non-GUI core of a Skype chat-history workbench.
//!
//! * [`db`] — the SQLite accessor: schema, pooling, row cache, delete
//!   cascades, conversation-link reconstruction, shared-file store.
//! * [`identity`] — Skype identity prefix handling and the `pk_id`/`guid`
//!   message-id codec shared by the sync and merge engines.
//! * [`parser`] — mixed XML/plaintext message body parsing, HTML/text
//!   rendering, and per-conversation statistics.
//! * [`sync`] — the live-sync engine: rate-limited polling of a remote
//!   chat service, converting its objects into database rows.
//! * [`merge`] — the diff/merge engine comparing two databases' chats.
//! * [`import`] — the streaming JSON importer for exported chat archives.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod import;
pub mod merge;
pub mod parser;
pub mod sync;

pub use error::{ChatVaultError, Result};
