//! Infrastructure layer for Rendezvous.
//!
//! Contains implementations of the ports defined in `rendezvous-core`: SQLite
//! room and message storage, the reqwest transport for the map service, and
//! the configuration loader.

pub mod config;
pub mod http;
pub mod sqlite;
