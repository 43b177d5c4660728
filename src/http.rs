//! HTTP transport for the MCP server.
//!
//! One JSON-RPC request per `POST /mcp`, mirroring the streamable-HTTP
//! deployment the portal runs behind. `GET /health` is for load-balancer
//! probes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::server::PortalMcpServer;

/// Serve the MCP server over HTTP on `addr`.
pub async fn serve(server: Arc<PortalMcpServer>, addr: SocketAddr) -> Result<()> {
    info!("starting access portal MCP server on http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(server)).await?;
    Ok(())
}

/// Build the HTTP router.
pub fn router(server: Arc<PortalMcpServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(server)
}

async fn handle_mcp(State(server): State<Arc<PortalMcpServer>>, body: String) -> Json<Value> {
    match server.handle_message(&body).await {
        Some(response) => Json(serde_json::to_value(response).unwrap_or_else(|_| json!({}))),
        // Notifications get an empty acknowledgement body.
        None => Json(json!({})),
    }
}

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "server": "access-portal-mcp",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::IncidentDispatcher;
    use crate::knowledge::KnowledgeBase;
    use crate::prompts::PromptLibrary;
    use crate::tickets::TicketClient;
    use crate::tools::ToolContext;
    use tempfile::TempDir;

    async fn spawn_server(dir: &TempDir) -> SocketAddr {
        let server = Arc::new(PortalMcpServer::new(ToolContext {
            knowledge: KnowledgeBase::new(dir.path()),
            prompts: PromptLibrary::new(),
            tickets: TicketClient::mock(),
            dispatcher: IncidentDispatcher::from_url(None),
        }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(server)).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let addr = spawn_server(&dir).await;
        let response = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_mcp_endpoint_tools_list() {
        let dir = TempDir::new().unwrap();
        let addr = spawn_server(&dir).await;
        let response = reqwest::Client::new()
            .post(format!("http://{}/mcp", addr))
            .body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .send()
            .await
            .unwrap();
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 8);
    }
}
