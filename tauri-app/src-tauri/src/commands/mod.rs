pub mod accounts;
pub mod envelopes;
pub mod folders;
pub mod messages;
pub mod flags;
pub mod config;

pub use accounts::*;
pub use envelopes::*;
pub use folders::*;
pub use messages::*;
pub use flags::*;
pub use config::*;
