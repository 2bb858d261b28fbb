//! Message repository trait definition.
//!
//! Defines the storage interface for chat and system messages. The
//! infrastructure layer (rendezvous-infra) implements this trait with SQLite
//! persistence.

use chrono::{DateTime, Utc};
use rendezvous_types::error::RepositoryError;
use rendezvous_types::message::Message;

/// Repository trait for message persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageRepository: Send + Sync {
    /// Persist a message. Returns the stored record.
    fn create(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Most recent messages of a room, ordered by timestamp DESC.
    fn find_by_room_id(
        &self,
        room_id: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// One page of a room's messages, ordered by timestamp DESC.
    ///
    /// With `before` set, only messages strictly older than it are returned.
    fn find_by_room_id_paginated(
        &self,
        room_id: &str,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;
}
