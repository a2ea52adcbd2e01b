//! # MCP Test Utilities
//!
//! Shared test utilities for the MCP resource server.
//!
//! This crate provides:
//! - Deterministic Ed25519 keypairs that publish JWKs and sign tokens
//! - A claims builder (`TestClaims`)
//! - A wiremock identity provider serving discovery and JWKS documents
//! - Server test harness (`TestMcpServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mcp_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let keypair = TestKeypair::new(1, "key-1");
//!     let idp = MockIdentityProvider::start().await;
//!     idp.mount_discovery().await;
//!     idp.mount_jwks(&[&keypair]).await;
//!
//!     let server = TestMcpServer::spawn(&idp.discovery_url()).await?;
//!     let token = keypair.sign(&TestClaims::new(&idp.issuer(), &server.resource_id()));
//!     // POST {server.url()}/mcp with `Authorization: Bearer {token}`
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod identity_provider;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use identity_provider::*;
pub use server_harness::*;
pub use token_builders::*;
