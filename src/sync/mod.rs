//! The live-sync engine: rate-limited polling of an opaque remote chat
//! service, converting its objects into database rows. Grounded on
//! `live.py::SkypeLogin`; the network protocol itself is out of scope
//! (spec.md §1) — [`client::RemoteClient`] is the seam a real transport
//! plugs into.

pub mod client;
pub mod convert;
pub mod engine;
pub mod ratelimit;

pub use client::{Credentials, Page, RemoteClient, RemoteObject};
pub use convert::{Converter, TargetTable};
pub use engine::{SaveOutcome, SyncEngine};
pub use ratelimit::{CallError, RateLimiter};
