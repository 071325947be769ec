mod connection_history;
mod flag_resync;
mod historical_fetch;
mod incremental_sync;
mod skill_classify;
mod trust_network;

pub use connection_history::run_connection_history;
pub use flag_resync::run_flag_resync_all;
pub use historical_fetch::run_historical_fetch;
pub use incremental_sync::run_incremental_sync_all;
pub use skill_classify::run_skill_classify_all;
pub use trust_network::run_trust_network;
