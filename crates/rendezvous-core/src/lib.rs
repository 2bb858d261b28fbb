//! Business logic and repository trait definitions for Rendezvous.
//!
//! This crate defines the "ports" (repository and transport traits) that the
//! infrastructure layer implements, plus the room coordinator, message and
//! location services, the circuit-breaking client and the realtime session
//! manager. It depends only on `rendezvous-types`, never on
//! `rendezvous-infra` or any database/IO crate.

pub mod location;
pub mod message;
pub mod realtime;
pub mod repository;
pub mod resilience;
pub mod room;

#[cfg(test)]
mod test_support;
