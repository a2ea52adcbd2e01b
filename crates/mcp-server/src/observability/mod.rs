//! Observability for the MCP resource server.
//!
//! Provides metrics definitions and the Prometheus recorder.

pub mod metrics;
