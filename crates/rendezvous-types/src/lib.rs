//! Shared domain types for Rendezvous.
//!
//! This crate contains the core domain types used across the platform:
//! Room, Member, Message, real-time events, configuration, and the error
//! taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod room;
