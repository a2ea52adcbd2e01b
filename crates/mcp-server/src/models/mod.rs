//! Response models for the MCP resource server.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Readiness probe response.
///
/// Returned by the `/ready` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: String,

    /// Authorizer state ("ready", "uninitialized", "degraded").
    pub auth_metadata: String,
}

/// OAuth 2.0 Protected Resource Metadata (RFC 9728).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

/// MCP server manifest served at `/manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub version: String,
    pub contact: String,
    pub tools_url: String,
    pub prompts_url: String,
    pub streaming_url: String,
    pub auth: ManifestAuth,
}

/// How clients obtain tokens for this server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestAuth {
    #[serde(rename = "type")]
    pub auth_type: String,
    pub authorization_server_url: String,
    pub scopes: Vec<String>,
    pub resource_id: String,
}

/// A tool advertised at `/tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool arguments.
    pub parameters: Value,
}

/// A prompt advertised at `/prompts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the prompt input.
    pub input_format: Value,
}

/// Response to an authorized `POST /mcp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub messages: Vec<McpMessage>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub arguments: Value,
}

/// Final event of the `/sse` stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseCompletion {
    /// Milliseconds since the Unix epoch when the event was produced.
    pub id: i64,
    pub status: String,
    pub progress: u8,
    pub user: String,
    pub message: String,
}

/// Tools offered by this server.
pub fn tool_catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "get_secure_user_data".to_string(),
            description: "A secure tool that retrieves user-specific information based on the validated token claims.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "data_key": {
                        "type": "string",
                        "description": "The specific data field to retrieve (e.g., email, status)."
                    }
                }
            }),
        },
        ToolDescriptor {
            name: "calculate_payroll_tax".to_string(),
            description: "Calculates estimated payroll tax based on annual salary and state of residence.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "annual_salary": {
                        "type": "number",
                        "description": "The user's total annual salary."
                    },
                    "state": {
                        "type": "string",
                        "description": "The state of residence (e.g., CA, NY)."
                    }
                },
                "required": ["annual_salary", "state"]
            }),
        },
    ]
}

/// Prompts offered by this server.
pub fn prompt_catalog() -> Vec<PromptDescriptor> {
    vec![PromptDescriptor {
        name: "generate_onboarding_summary".to_string(),
        description: "Generates a personalized summary of the user's account details and next steps after successful token validation.".to_string(),
        input_format: json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The user's display name."
                }
            }
        }),
    }]
}
