//! Chat history handler.
//!
//! Endpoint:
//! - GET /api/chat/{match_id}?offset&limit - One page of history, newest first

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rendezvous_types::message::{Message, PageCursor};

use crate::http::error::AppError;
use crate::state::AppState;

/// Query parameters for history paging. Both are kept as raw strings so a
/// malformed value is reported in the error envelope.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub offset: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub chat_id: String,
    /// Cursor for the next page, or `-1` when there are no more messages.
    pub offset: PageCursor,
    pub messages: Vec<Message>,
}

fn parse_offset(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        // End sentinel echoed back by a client.
        Some("-1") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|_| AppError::invalid(format!("offset must be an RFC 3339 timestamp, got '{s}'"))),
    }
}

fn parse_limit(raw: Option<&str>) -> Result<Option<u32>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<u32>()
            .map(Some)
            .map_err(|_| AppError::invalid(format!("limit must be a positive integer, got '{s}'"))),
    }
}

/// GET /api/chat/{match_id}
pub async fn get_history(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let offset = parse_offset(query.offset.as_deref())?;
    let limit = state
        .config
        .messages
        .clamp_limit(parse_limit(query.limit.as_deref())?);

    let page = state
        .messages
        .list_paginated(&match_id, offset, limit)
        .await?;

    Ok(Json(HistoryResponse {
        chat_id: match_id,
        offset: page.next_offset,
        messages: page.messages,
    }))
}
