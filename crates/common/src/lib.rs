//! Common utilities shared by the MCP resource server and its test tooling.

#![warn(clippy::pedantic)]

/// Module for shared observability configuration
pub mod config;

/// Module for JWT utilities (header inspection, size and `iat` checks)
pub mod jwt;
