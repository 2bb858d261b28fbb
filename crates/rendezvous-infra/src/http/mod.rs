//! Outbound HTTP adapters.

pub mod transport;
