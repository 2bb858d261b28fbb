//! Chat message persistence and history.

pub mod service;
