//! The opaque remote transport boundary. Reimplementing Skype's network
//! protocol is explicitly out of scope (spec.md §1); this crate only
//! defines the facade the sync engine drives, so any concrete client
//! (a real HTTP+auth stack, or a test double) can plug in behind it.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A single remote object as returned by the opaque client: account,
/// contact, chat or message, represented as a generic JSON value so this
/// crate never needs to know the concrete wire schema — only `convert`
/// (see [`crate::sync::convert`]) interprets its shape.
pub type RemoteObject = Value;

/// One page of a paginated listing (messages, recent chats); `cursor` is
/// opaque to this crate and passed back verbatim to fetch the next page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<RemoteObject>,
    pub cursor: Option<String>,
}

/// Credentials used by [`RemoteClient::login`]; either counts as login
/// input, matching `SkypeLogin.login`'s `(username, password, token)` triad.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
    pub token_path: Option<std::path::PathBuf>,
}

/// The opaque surface `SkypeLogin` drives in the original: authentication,
/// typed facades for contacts/chats/recent-chats, paginated per-chat
/// message retrieval, and authorized content download. A 429 response
/// should be surfaced as [`crate::error::ChatVaultError::Network`] with a
/// message containing `"429"` so [`crate::sync::engine`] can detect it and
/// apply the rate-limited backoff rather than the ordinary retry delay.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn login(&mut self, credentials: &Credentials) -> Result<()>;

    async fn account(&mut self) -> Result<RemoteObject>;
    async fn contacts(&mut self) -> Result<Vec<RemoteObject>>;
    async fn recent_chats(&mut self) -> Result<Page>;
    async fn chats(&mut self) -> Result<Vec<RemoteObject>>;
    async fn messages(&mut self, chat_identity: &str, cursor: Option<&str>) -> Result<Page>;

    /// Fetches `url` (already massaged by [`crate::sync::engine::make_content_url`])
    /// and returns the raw bytes, for shared-file/avatar download.
    async fn get_content(&mut self, url: &str) -> Result<Vec<u8>>;
}

pub fn is_rate_limited(err: &crate::error::ChatVaultError) -> bool {
    matches!(err, crate::error::ChatVaultError::Network(msg) if msg.contains("429"))
}
