//! Observability setup for Engram binaries.

pub mod tracing_setup;
