//! Failure isolation for calls to external dependencies.

pub mod breaker;
pub mod client;
