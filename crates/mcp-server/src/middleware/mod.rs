//! Middleware for the MCP resource server.
//!
//! # Components
//!
//! - `auth` - authorization gate and readiness middleware
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, require_ready};
pub use http_metrics::http_metrics_middleware;
