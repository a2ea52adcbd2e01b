//! Bearer token authorization against an external identity provider.
//!
//! # Components
//!
//! - `discovery` - OIDC discovery document retrieval
//! - `jwks` - signing key cache with on-demand refresh
//! - `jwt` - token verification
//! - `authorizer` - readiness lifecycle and the per-request gate
//! - `claims`, `resource` - request-scoped values produced by the gate

pub mod authorizer;
pub mod claims;
pub mod discovery;
pub mod jwks;
pub mod jwt;
pub mod resource;

pub use authorizer::{AuthSettings, Authorizer, AuthorizerState};
pub use claims::TokenClaims;
pub use discovery::{DiscoveryError, DiscoveryMetadata};
pub use jwks::{Jwk, JwksCache, KeyResolutionError};
pub use jwt::{JwtValidator, TokenVerificationError};
pub use resource::ResourceId;
