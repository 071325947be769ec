//! Config Database module
//!
//! This module provides the Config DB for account settings and credentials.
//! The sync engine logic has been moved to the `adapters/` and `engine/` modules.

pub mod db;
