//! Room admission and membership.

pub mod coordinator;
