//! Message service: validation, persistence and paginated history.

use chrono::{DateTime, Utc};
use rendezvous_types::error::MeetupError;
use rendezvous_types::message::{Message, MessagePage, MessageType, is_empty_payload};
use tracing::{debug, info};

use crate::repository::message::MessageRepository;

/// Number of messages returned by [`MessageService::recent`] by default.
pub const DEFAULT_RECENT_LIMIT: u32 = 50;

/// Validates and persists chat and system messages.
///
/// Generic over `MessageRepository` to maintain clean architecture
/// (rendezvous-core never depends on rendezvous-infra).
pub struct MessageService<M: MessageRepository> {
    repo: M,
}

impl<M: MessageRepository> MessageService<M> {
    pub fn new(repo: M) -> Self {
        Self { repo }
    }

    /// Validate and store a message sent by `sender`.
    ///
    /// Fails with `InvalidParameters` when any argument is empty or `kind`
    /// is not one of `text`, `call` or `location`.
    pub async fn save(
        &self,
        room_id: &str,
        sender: &str,
        data: serde_json::Value,
        kind: &str,
    ) -> Result<Message, MeetupError> {
        if room_id.trim().is_empty() || sender.trim().is_empty() || kind.trim().is_empty() {
            return Err(MeetupError::invalid(
                "roomId, sender, data and type are required",
            ));
        }
        if is_empty_payload(&data) {
            return Err(MeetupError::invalid("message data must not be empty"));
        }
        let kind: MessageType = kind.parse().map_err(MeetupError::InvalidParameters)?;

        let message = self
            .repo
            .create(&Message::new(room_id, sender, kind, data))
            .await?;
        debug!(room_id, sender, kind = %message.kind, "saved message");
        Ok(message)
    }

    /// One page of history, newest first, strictly older than `offset`.
    pub async fn list_paginated(
        &self,
        room_id: &str,
        offset: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<MessagePage, MeetupError> {
        if room_id.trim().is_empty() {
            return Err(MeetupError::invalid("roomId is required"));
        }
        if limit == 0 {
            return Err(MeetupError::invalid("limit must be at least 1"));
        }

        let messages = self
            .repo
            .find_by_room_id_paginated(room_id, offset, limit)
            .await?;
        Ok(MessagePage::from_messages(messages, limit))
    }

    /// The most recent messages of a room, newest first.
    pub async fn recent(
        &self,
        room_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, MeetupError> {
        if room_id.trim().is_empty() {
            return Err(MeetupError::invalid("roomId is required"));
        }
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).max(1);
        Ok(self.repo.find_by_room_id(room_id, limit).await?)
    }

    /// Store a message authored by the server itself.
    pub async fn add_system_message(
        &self,
        room_id: &str,
        data: serde_json::Value,
    ) -> Result<Message, MeetupError> {
        if room_id.trim().is_empty() {
            return Err(MeetupError::invalid("roomId is required"));
        }
        if is_empty_payload(&data) {
            return Err(MeetupError::invalid("message data must not be empty"));
        }

        let message = self.repo.create(&Message::system(room_id, data)).await?;
        info!(room_id, "added system message");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryMessageRepository;
    use chrono::Duration;
    use rendezvous_types::message::{PageCursor, SYSTEM_SENDER};
    use serde_json::json;

    fn service() -> MessageService<MemoryMessageRepository> {
        MessageService::new(MemoryMessageRepository::new())
    }

    /// Store five messages with timestamps t1 < ... < t5, one second apart.
    async fn seed_five(service: &MessageService<MemoryMessageRepository>) -> Vec<DateTime<Utc>> {
        let base = Utc::now() - Duration::minutes(1);
        let mut stamps = Vec::new();
        for i in 1..=5 {
            let mut msg = Message::new("M1", "A", MessageType::Text, json!(format!("m{i}")));
            msg.timestamp = base + Duration::seconds(i);
            stamps.push(msg.timestamp);
            service.repo.create(&msg).await.unwrap();
        }
        stamps
    }

    #[tokio::test]
    async fn save_stores_message() {
        let service = service();
        let msg = service.save("M1", "A", json!("hi"), "text").await.unwrap();
        assert_eq!(msg.kind, MessageType::Text);
        assert_eq!(msg.data, json!("hi"));
        assert!(!msg.is_system_message);
        assert_eq!(service.repo.stored().len(), 1);
    }

    #[tokio::test]
    async fn save_rejects_missing_or_unknown_fields() {
        let service = service();
        for (room, sender, data, kind) in [
            ("", "A", json!("hi"), "text"),
            ("M1", "", json!("hi"), "text"),
            ("M1", "A", json!(""), "text"),
            ("M1", "A", json!(null), "text"),
            ("M1", "A", json!("hi"), ""),
            ("M1", "A", json!("hi"), "video"),
        ] {
            let err = service.save(room, sender, data, kind).await.unwrap_err();
            assert!(matches!(err, MeetupError::InvalidParameters(_)), "{err}");
        }
        assert!(service.repo.stored().is_empty());
    }

    #[tokio::test]
    async fn pagination_walks_newest_first() {
        let service = service();
        let t = seed_five(&service).await;

        let first = service.list_paginated("M1", None, 2).await.unwrap();
        let stamps: Vec<_> = first.messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![t[4], t[3]]);
        assert_eq!(first.next_offset, PageCursor::After(t[3]));

        let second = service.list_paginated("M1", Some(t[3]), 2).await.unwrap();
        let stamps: Vec<_> = second.messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![t[2], t[1]]);
        assert_eq!(second.next_offset, PageCursor::After(t[1]));

        let last = service.list_paginated("M1", Some(t[1]), 2).await.unwrap();
        assert_eq!(last.messages.len(), 1);
        assert_eq!(last.messages[0].timestamp, t[0]);
        assert!(last.next_offset.is_end());
    }

    #[tokio::test]
    async fn pagination_rejects_zero_limit() {
        let service = service();
        let err = service.list_paginated("M1", None, 0).await.unwrap_err();
        assert!(matches!(err, MeetupError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn recent_is_bounded() {
        let service = service();
        seed_five(&service).await;
        let recent = service.recent("M1", Some(3)).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].data, json!("m5"));
        assert_eq!(service.recent("M1", None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn system_message_is_flagged() {
        let service = service();
        let msg = service
            .add_system_message("M1", json!("meetup point computed"))
            .await
            .unwrap();
        assert_eq!(msg.sender, SYSTEM_SENDER);
        assert!(msg.is_system_message);
        assert_eq!(msg.kind, MessageType::Text);
    }

    #[tokio::test]
    async fn storage_failure_is_reported() {
        let repo = MemoryMessageRepository::new();
        repo.fail_all();
        let service = MessageService::new(repo);
        let err = service.save("M1", "A", json!("hi"), "text").await.unwrap_err();
        assert!(matches!(err, MeetupError::Storage(_)));
    }
}
