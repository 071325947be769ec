use serde::Serialize;

/// Crate-wide error type, taxonomized by failure kind rather than by
/// originating module: `Io`, `Parse`, `Schema`, `Network`, `Logic`, plus
/// `Database` for the SQL layer's own connection/pool failures.
#[derive(Debug, thiserror::Error)]
pub enum ChatVaultError {
    #[error("io error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("logic error: {0}")]
    Logic(String),

    #[error("database error: {0}")]
    Database(String),
}

impl Serialize for ChatVaultError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<r2d2::Error> for ChatVaultError {
    fn from(e: r2d2::Error) -> Self {
        ChatVaultError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for ChatVaultError {
    fn from(e: rusqlite::Error) -> Self {
        ChatVaultError::Database(e.to_string())
    }
}

impl From<std::io::Error> for ChatVaultError {
    fn from(e: std::io::Error) -> Self {
        ChatVaultError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ChatVaultError {
    fn from(e: serde_json::Error) -> Self {
        ChatVaultError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatVaultError>;
