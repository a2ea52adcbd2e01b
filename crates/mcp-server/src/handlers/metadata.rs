//! OAuth discovery handlers.
//!
//! The authorization server metadata routes serve the identity provider's
//! discovery document as fetched at startup. They sit behind
//! `require_ready`. The protected resource metadata (RFC 9728) is built from
//! configuration and is always available.

use crate::auth::{DiscoveryMetadata, ResourceId};
use crate::errors::{AuthError, METADATA_NOT_INITIALIZED};
use crate::models::ProtectedResourceMetadata;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// `GET /.well-known/oauth-authorization-server` and
/// `GET /.well-known/openid-configuration`.
#[tracing::instrument(skip_all, name = "mcp.handlers.authorization_server")]
pub async fn authorization_server_metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DiscoveryMetadata>, AuthError> {
    let metadata = state.authorizer.metadata().ok_or_else(|| {
        AuthError::ServiceUnavailable(METADATA_NOT_INITIALIZED.to_string())
    })?;

    Ok(Json(DiscoveryMetadata::clone(&metadata)))
}

/// `GET /.well-known/oauth-protected-resource`.
pub async fn protected_resource_metadata(
    State(state): State<Arc<AppState>>,
    resource_id: ResourceId,
) -> Json<ProtectedResourceMetadata> {
    Json(ProtectedResourceMetadata {
        resource: resource_id.to_string(),
        authorization_servers: vec![state.config.authorization_server_url.clone()],
        bearer_methods_supported: vec!["header".to_string()],
        scopes_supported: state.config.supported_scopes.clone(),
    })
}
