//! Database accessor (C2): schema, pooling, caching, delete cascades,
//! conversation-link reconstruction, the shared-file store, and integrity
//! checking, tied together behind [`accessor::Accessor`].

pub mod accessor;
pub mod cache;
pub mod cascade;
pub mod integrity;
pub mod links;
pub mod pool;
pub mod schema;
pub mod shared_files;

pub use accessor::{Accessor, ConversationStats};
pub use pool::DbPool;
