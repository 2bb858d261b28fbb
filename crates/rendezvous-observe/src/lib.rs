//! Observability setup for Rendezvous.
//!
//! Installs the global `tracing` subscriber and, optionally, an
//! OpenTelemetry bridge for span export.

pub mod tracing_setup;
