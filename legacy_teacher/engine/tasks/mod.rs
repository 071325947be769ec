mod connection_history;
mod historical_fetch;
mod incremental_sync;
mod trust_network;

pub use connection_history::run_connection_history;
pub use historical_fetch::run_historical_fetch;
pub use incremental_sync::{run_incremental_sync, run_incremental_sync_all};
pub use trust_network::run_trust_network;
