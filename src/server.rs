//! MCP server for the access portal tools.
//!
//! Newline-delimited JSON-RPC 2.0 on stdin/stdout. Logging goes to stderr;
//! stdout is reserved for protocol messages. Notifications produce no
//! response.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::protocol::{
    error_codes, McpRequest, McpResponse, ServerCapabilities, ServerInfo, ToolCapabilities,
    PROTOCOL_VERSION,
};
use crate::tools::{ToolContext, ToolRegistry};

/// Access portal MCP server.
pub struct PortalMcpServer {
    /// Tool registry.
    registry: ToolRegistry,
    /// Server info.
    server_info: ServerInfo,
    /// Whether the client has completed initialization.
    initialized: AtomicBool,
}

impl PortalMcpServer {
    /// Create a new MCP server over the given tool context.
    pub fn new(context: ToolContext) -> Self {
        Self {
            registry: ToolRegistry::new(context),
            server_info: ServerInfo::default(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Names of the registered tools.
    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// Run the server on stdio.
    pub async fn run_stdio(&self) -> Result<()> {
        info!("starting access portal MCP server on stdio");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("received: {}", line);

            if let Some(response) = self.handle_message(line).await {
                let encoded = serde_json::to_string(&response)?;
                debug!("sending: {}", encoded);
                stdout.write_all(encoded.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle a single message. Returns `None` for notifications.
    pub async fn handle_message(&self, message: &str) -> Option<McpResponse> {
        let request: McpRequest = match serde_json::from_str(message) {
            Ok(request) => request,
            Err(err) => {
                error!("failed to parse request: {}", err);
                return Some(McpResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    err.to_string(),
                ));
            }
        };

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(&request)),
            "notifications/initialized" | "initialized" => {
                self.initialized.store(true, Ordering::Relaxed);
                info!("MCP client initialized");
                None
            }
            "tools/list" => Some(self.handle_tools_list(&request)),
            "tools/call" => Some(self.handle_tools_call(&request).await),
            "ping" => Some(McpResponse::success(request.id.clone(), json!({}))),
            method => {
                if request.is_notification() {
                    debug!("ignoring notification: {}", method);
                    None
                } else {
                    Some(McpResponse::error(
                        request.id,
                        error_codes::METHOD_NOT_FOUND,
                        format!("unknown method: {}", method),
                    ))
                }
            }
        }
    }

    fn handle_initialize(&self, request: &McpRequest) -> McpResponse {
        info!("initializing MCP session");

        let capabilities = ServerCapabilities {
            tools: Some(ToolCapabilities {
                list_changed: false,
            }),
        };

        McpResponse::success(
            request.id.clone(),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": capabilities,
                "serverInfo": self.server_info
            }),
        )
    }

    fn handle_tools_list(&self, request: &McpRequest) -> McpResponse {
        McpResponse::success(
            request.id.clone(),
            json!({
                "tools": self.registry.definitions()
            }),
        )
    }

    async fn handle_tools_call(&self, request: &McpRequest) -> McpResponse {
        let name = match request.params.get("name").and_then(|value| value.as_str()) {
            Some(name) => name,
            None => {
                return McpResponse::error(
                    request.id.clone(),
                    error_codes::INVALID_PARAMS,
                    "missing tool name",
                );
            }
        };
        let arguments = request
            .params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        info!("calling tool: {}", name);

        match self.registry.execute(name, arguments).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => McpResponse::success(request.id.clone(), value),
                Err(err) => McpResponse::error(
                    request.id.clone(),
                    error_codes::INTERNAL_ERROR,
                    err.to_string(),
                ),
            },
            Err(err) => {
                error!("tool call failed: {}", err);
                let code = match err {
                    Error::InvalidParams(_) => error_codes::INVALID_PARAMS,
                    _ => error_codes::INTERNAL_ERROR,
                };
                McpResponse::error(request.id.clone(), code, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::IncidentDispatcher;
    use crate::knowledge::KnowledgeBase;
    use crate::prompts::PromptLibrary;
    use crate::tickets::TicketClient;
    use std::fs;
    use tempfile::TempDir;

    fn test_server(dir: &TempDir) -> PortalMcpServer {
        fs::write(
            dir.path().join("users.md"),
            "\
| User ID | Name | Dataiku ID | Email | Status |
|---------|------|------------|-------|--------|
| U10001 | Ada Moreno | DKU-4411 | ada.moreno@example.com | A |
",
        )
        .unwrap();
        PortalMcpServer::new(ToolContext {
            knowledge: KnowledgeBase::new(dir.path()),
            prompts: PromptLibrary::new(),
            tickets: TicketClient::mock(),
            dispatcher: IncidentDispatcher::from_url(None),
        })
    }

    #[tokio::test]
    async fn test_initialize() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir);
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "access-portal-mcp");
    }

    #[tokio::test]
    async fn test_initialized_notification_has_no_response() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir);
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
        assert!(server.initialized.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_tools_list() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir);
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 8);
    }

    #[tokio::test]
    async fn test_tools_call_round_trip() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir);
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"user_verification","arguments":{"user_id":"U10001","dataiku_id":"DKU-4411"}}}"#,
            )
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], serde_json::json!(false));
        assert_eq!(result["content"][0]["text"], "true");
    }

    #[tokio::test]
    async fn test_tools_call_missing_name() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir);
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir);
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir);
        let response = server.handle_message("not json").await.unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::PARSE_ERROR);
    }
}
