//! Test server harness for E2E testing
//!
//! Provides `TestMcpServer` for spawning real MCP resource server instances
//! against a mock identity provider.

use mcp_server::auth::{AuthSettings, Authorizer};
use mcp_server::config::Config;
use mcp_server::observability::metrics::build_metrics_recorder;
use mcp_server::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the MCP resource server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_e2e() -> Result<(), anyhow::Error> {
///     let idp = MockIdentityProvider::start().await;
///     idp.mount_discovery().await;
///     let server = TestMcpServer::spawn(&idp.discovery_url()).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestMcpServer {
    addr: SocketAddr,
    config: Config,
    authorizer: Arc<Authorizer>,
    _handle: JoinHandle<()>,
}

impl TestMcpServer {
    /// Spawn a server that discovers its identity provider at `discovery_url`.
    ///
    /// The server will:
    /// - Run discovery once before accepting requests (failures leave it degraded)
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn(discovery_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(discovery_url, HashMap::new()).await
    }

    /// Like [`TestMcpServer::spawn`] with extra configuration variables.
    pub async fn spawn_with_vars(
        discovery_url: &str,
        extra_vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("OIDC_DISCOVERY_URL".to_string(), discovery_url.to_string()),
            ("DRAIN_SECONDS".to_string(), "0".to_string()),
        ]);
        vars.extend(extra_vars);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let authorizer = Arc::new(Authorizer::new(AuthSettings::from_config(&config)));
        authorizer.initialize().await;

        // A private recorder so parallel tests never fight over the global one
        let metrics_handle = build_metrics_recorder()
            .map_err(|e| anyhow::anyhow!("Failed to build metrics recorder: {}", e))?
            .build_recorder()
            .handle();

        let state = Arc::new(AppState {
            config: config.clone(),
            authorizer: authorizer.clone(),
        });

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            authorizer,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn authorizer(&self) -> &Arc<Authorizer> {
        &self.authorizer
    }

    /// Resource identifier the server derives for requests sent to
    /// [`TestMcpServer::url`]. Tokens must carry this as their audience.
    pub fn resource_id(&self) -> String {
        format!("https://{}", self.addr)
    }
}

impl Drop for TestMcpServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
