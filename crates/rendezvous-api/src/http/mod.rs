//! HTTP and WebSocket layer for Rendezvous.
//!
//! Axum-based JSON API under `/api`, a health probe, and the `/ws`
//! real-time endpoint.

pub mod error;
pub mod handlers;
pub mod router;
