//! MCP discovery and protocol handlers.
//!
//! `/manifest.json`, `/tools` and `/prompts` are public. `/mcp` and `/sse`
//! run behind `require_auth` and read the verified claims from request
//! extensions.

use crate::auth::{ResourceId, TokenClaims};
use crate::errors::{AuthError, METADATA_UNAVAILABLE};
use crate::models::{
    prompt_catalog, tool_catalog, Manifest, ManifestAuth, McpMessage, McpResponse,
    PromptDescriptor, SseCompletion, ToolCall, ToolDescriptor,
};
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

const MANIFEST_DESCRIPTION: &str = "A mock MCP server to validate Dynamic Client Registration (DCR) and OAuth 2.1 token exchange with an external Authorization Server.";

const SSE_CONNECTED_EVENT: &str =
    r#"{"message": "SSE stream connected. Mocking full result now..."}"#;

/// `GET /manifest.json`.
pub async fn manifest(
    State(state): State<Arc<AppState>>,
    resource_id: ResourceId,
) -> Json<Manifest> {
    Json(Manifest {
        name: state.config.server_name.clone(),
        description: MANIFEST_DESCRIPTION.to_string(),
        version: "1.0".to_string(),
        contact: "support@example.com".to_string(),
        tools_url: format!("{resource_id}/tools"),
        prompts_url: format!("{resource_id}/prompts"),
        streaming_url: format!("{resource_id}/sse"),
        auth: ManifestAuth {
            auth_type: "OAuth".to_string(),
            authorization_server_url: state.config.authorization_server_url.clone(),
            scopes: state.config.supported_scopes.clone(),
            resource_id: resource_id.to_string(),
        },
    })
}

/// `GET /tools`.
pub async fn tools() -> Json<Vec<ToolDescriptor>> {
    Json(tool_catalog())
}

/// `GET /prompts`.
pub async fn prompts() -> Json<Vec<PromptDescriptor>> {
    Json(prompt_catalog())
}

/// `POST /mcp`: acknowledge an authorized protocol request.
///
/// The request body is accepted as-is; only its size is logged.
#[tracing::instrument(skip_all, name = "mcp.handlers.mcp")]
pub async fn handle_mcp(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<TokenClaims>,
    body: Bytes,
) -> Result<Json<McpResponse>, AuthError> {
    tracing::debug!(target: "mcp.handlers.mcp", body_len = body.len(), "Incoming MCP request");

    let issuer = state
        .authorizer
        .metadata()
        .map(|m| m.issuer.clone())
        .ok_or_else(|| AuthError::ServiceUnavailable(METADATA_UNAVAILABLE.to_string()))?;

    Ok(Json(McpResponse {
        messages: vec![McpMessage {
            message_type: "text".to_string(),
            text: format!(
                "MCP Acknowledged. Token successfully validated by the external AS ({issuer}). User ID: {}. You can now execute protected tools.",
                claims.sub
            ),
        }],
        tool_calls: vec![ToolCall {
            tool: "get_secure_user_data".to_string(),
            arguments: json!({ "data_key": "email" }),
        }],
    }))
}

/// `GET /sse`: a complete two-event stream for an authorized client.
#[tracing::instrument(skip_all, name = "mcp.handlers.sse")]
pub async fn handle_sse(Extension(claims): Extension<TokenClaims>) -> Response {
    let completion = SseCompletion {
        id: chrono::Utc::now().timestamp_millis(),
        status: "completed".to_string(),
        progress: 100,
        user: claims.sub,
        message: "Mock SSE task finished. Final result provided.".to_string(),
    };

    let completion_json = match serde_json::to_string(&completion) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(target: "mcp.handlers.sse", error = %e, "Failed to encode SSE event");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let body = format!("data: {SSE_CONNECTED_EVENT}\n\ndata: {completion_json}\n\n");

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}
