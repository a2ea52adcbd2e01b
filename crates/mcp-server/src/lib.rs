//! MCP resource server library.
//!
//! An MCP (Model Context Protocol) resource server whose protected endpoints
//! accept bearer tokens issued by an external OAuth 2.1 / OIDC identity
//! provider. The server never issues tokens; it trusts the provider's
//! discovery document and published signing keys.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth::Authorizer -> handlers/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Discovery, key cache, token verification and the gate
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authorization and metrics middleware
//! - `models` - Response models
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
