use std::path::PathBuf;

use async_trait::async_trait;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::ServiceExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::process::Command;

use super::bridge::{RemoteToolOutput, ToolTransport};
use crate::core::config::McpSettings;
use crate::core::errors::RagError;

pub const DEFAULT_SERVER_BINARY: &str = "pgrag-mcp-server";

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
}

/// Stdio MCP session with a spawned tool server.
pub struct McpClient {
    service: RunningService<RoleClient, ()>,
}

impl McpClient {
    pub async fn spawn(settings: &McpSettings) -> Result<Self, RagError> {
        let program = resolve_command(settings.command.as_deref())?;
        tracing::info!("Starting MCP server: {}", program.display());

        let mut cmd = Command::new(&program);
        cmd.args(&settings.args);
        if !settings.env.is_empty() {
            cmd.envs(&settings.env);
        }

        let transport = TokioChildProcess::new(cmd.configure(|cmd| {
            let _ = cmd;
        }))
        .map_err(|err| {
            RagError::Tool(format!(
                "Failed to spawn MCP server '{}': {}",
                program.display(),
                err
            ))
        })?;

        let service = ().serve(transport).await.map_err(|err| {
            RagError::Tool(format!("Failed to connect MCP server: {}", err))
        })?;

        Ok(Self { service })
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, RagError> {
        let tools_result = self
            .service
            .list_tools(Default::default())
            .await
            .map_err(|err| RagError::Tool(format!("Failed to list tools: {}", err)))?;

        let tool_values = serde_json::to_value(&tools_result)
            .ok()
            .and_then(|value| value.get("tools").cloned())
            .and_then(|value| value.as_array().cloned())
            .unwrap_or_default();

        Ok(tool_values
            .iter()
            .filter_map(|tool| {
                let name = tool.get("name").and_then(|v| v.as_str())?;
                if name.is_empty() {
                    return None;
                }
                Some(ToolDescriptor {
                    name: name.to_string(),
                    description: tool
                        .get("description")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                })
            })
            .collect())
    }

    /// Ends the session and waits for the child process to exit.
    pub async fn close(self) -> Result<(), RagError> {
        self.service
            .cancel()
            .await
            .map_err(|err| RagError::Tool(format!("Failed to stop MCP server: {}", err)))?;
        Ok(())
    }
}

#[async_trait]
impl ToolTransport for McpClient {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<RemoteToolOutput, RagError> {
        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments: Some(arguments),
            meta: None,
            task: None,
        };

        let result = self
            .service
            .call_tool(params)
            .await
            .map_err(|err| RagError::Tool(err.to_string()))?;

        Ok(read_tool_result(&result))
    }
}

/// Configured command, else `pgrag-mcp-server` on `PATH` or next to the running binary.
fn resolve_command(configured: Option<&str>) -> Result<PathBuf, RagError> {
    if let Some(command) = configured.map(str::trim).filter(|c| !c.is_empty()) {
        return which::which(command)
            .or_else(|_| {
                let path = PathBuf::from(command);
                if path.exists() {
                    Ok(path)
                } else {
                    Err(RagError::Config(format!(
                        "MCP command '{}' not found",
                        command
                    )))
                }
            });
    }

    if let Ok(path) = which::which(DEFAULT_SERVER_BINARY) {
        return Ok(path);
    }

    let sibling = std::env::current_exe()
        .map_err(RagError::internal)?
        .with_file_name(format!("{}{}", DEFAULT_SERVER_BINARY, std::env::consts::EXE_SUFFIX));
    if sibling.exists() {
        Ok(sibling)
    } else {
        Err(RagError::Config(format!(
            "MCP server binary '{}' not found on PATH or next to {}",
            DEFAULT_SERVER_BINARY,
            sibling.display()
        )))
    }
}

fn read_tool_result(result: &impl Serialize) -> RemoteToolOutput {
    let value = serde_json::to_value(result).unwrap_or(Value::Null);
    let mut parts = Vec::new();
    if let Some(content) = value.get("content").and_then(|v| v.as_array()) {
        for item in content {
            let item_type = item.get("type").and_then(|v| v.as_str()).unwrap_or("");
            if item_type == "text" {
                if let Some(text) = item.get("text").and_then(|v| v.as_str()) {
                    parts.push(text.to_string());
                    continue;
                }
            }
            parts.push(item.to_string());
        }
    }

    let is_error = value
        .get("is_error")
        .or_else(|| value.get("isError"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    RemoteToolOutput {
        text: parts.join("\n"),
        is_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use tokio::task::JoinHandle;

    use crate::agent::ToolOutcome;
    use crate::embedding::{EmbeddingProvider, HashingEmbedder};
    use crate::mcp::bridge::McpTool;
    use crate::mcp::server::RagToolServer;
    use crate::rag::RagService;
    use crate::store::InMemoryDocumentStore;

    struct QuotaExceeded;

    #[async_trait]
    impl EmbeddingProvider for QuotaExceeded {
        fn name(&self) -> &str {
            "quota"
        }

        fn dimensions(&self) -> Option<usize> {
            None
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Err(RagError::Embedding("quota".to_string()))
        }
    }

    async fn connect_in_process(
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> (McpClient, JoinHandle<()>) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let rag = RagService::new(embedder, Arc::new(InMemoryDocumentStore::new()));

        let server = tokio::spawn(async move {
            let service = RagToolServer::new(rag).serve(server_io).await.unwrap();
            let _ = service.waiting().await;
        });
        let client = McpClient {
            service: ().serve(client_io).await.unwrap(),
        };
        (client, server)
    }

    #[tokio::test]
    async fn lists_tools_and_round_trips_over_transport() {
        let (client, server) = connect_in_process(Arc::new(HashingEmbedder::new(32).unwrap())).await;

        let mut names: Vec<String> = client
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        names.sort();
        assert_eq!(names, ["insert_document", "query_similar_documents"]);

        let mut arguments = Map::new();
        arguments.insert("content".to_string(), json!("Paris is in France"));
        let inserted = client.call_tool("insert_document", arguments).await.unwrap();
        assert!(!inserted.is_error);

        let client = Arc::new(client);
        let tool = McpTool::new(client.clone(), "query_similar_documents", None).with_k(1);
        assert_eq!(
            tool.call("Where is Paris?").await,
            ToolOutcome::Success("Paris is in France".to_string())
        );

        drop(tool);
        if let Ok(client) = Arc::try_unwrap(client) {
            client.close().await.unwrap();
        }
        let _ = server.await;
    }

    #[tokio::test]
    async fn handler_failure_reaches_agent_as_failure() {
        let (client, server) = connect_in_process(Arc::new(QuotaExceeded)).await;
        let client = Arc::new(client);
        let tool = McpTool::new(client.clone(), "query_similar_documents", None);

        let outcome = tool.call("Where is Pune?").await;
        assert_eq!(
            outcome,
            ToolOutcome::Failure("embedding error: quota".to_string())
        );

        drop(tool);
        if let Ok(client) = Arc::try_unwrap(client) {
            client.close().await.unwrap();
        }
        let _ = server.await;
    }

    #[test]
    fn text_parts_are_joined() {
        let output = read_tool_result(&json!({
            "content": [
                { "type": "text", "text": "Paris is in France" },
                { "type": "text", "text": "Pune is in India" }
            ]
        }));
        assert_eq!(output.text, "Paris is in France\nPune is in India");
        assert!(!output.is_error);
    }

    #[test]
    fn empty_text_stays_empty() {
        let output = read_tool_result(&json!({
            "content": [{ "type": "text", "text": "" }],
            "isError": false
        }));
        assert_eq!(output.text, "");
    }

    #[test]
    fn error_flag_is_preserved() {
        let output = read_tool_result(&json!({
            "content": [{ "type": "text", "text": "relation \"documents\" does not exist" }],
            "isError": true
        }));
        assert!(output.is_error);
        assert!(output.text.contains("does not exist"));
    }

    #[test]
    fn missing_configured_command_is_config_error() {
        let err = resolve_command(Some("/definitely/not/here/pgrag-mcp-server")).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }
}
