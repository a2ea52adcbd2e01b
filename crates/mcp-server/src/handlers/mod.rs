//! HTTP request handlers for the MCP resource server.

pub mod health;
pub mod mcp;
pub mod metadata;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use mcp::{handle_mcp, handle_sse, manifest, prompts, tools};
pub use metadata::{authorization_server_metadata, protected_resource_metadata};
pub use metrics::metrics_handler;
