//! Live connections: broadcast groups and the session lifecycle.

pub mod hub;
pub mod session;
