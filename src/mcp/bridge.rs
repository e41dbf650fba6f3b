// Tool bridge
// Exposes a remote MCP tool as an agent tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::agent::{AgentTool, ToolOutcome};
use crate::core::config::DEFAULT_K;
use crate::core::errors::RagError;

const PREVIEW_CHARS: usize = 200;

/// Text content of a remote tool result.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteToolOutput {
    pub text: String,
    pub is_error: bool,
}

#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<RemoteToolOutput, RagError>;
}

pub struct McpTool {
    transport: Arc<dyn ToolTransport>,
    name: String,
    description: String,
    k: usize,
}

impl McpTool {
    pub fn new(
        transport: Arc<dyn ToolTransport>,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        let name = name.into();
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Search for similar documents using {}", name));
        Self {
            transport,
            name,
            description,
            k: DEFAULT_K,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub async fn call(&self, query: &str) -> ToolOutcome {
        tracing::info!("Calling MCP tool '{}' with query: {}", self.name, query);

        let mut arguments = Map::new();
        arguments.insert("query".to_string(), json!(query));
        arguments.insert("k".to_string(), json!(self.k));

        match self.transport.call_tool(&self.name, arguments).await {
            Ok(output) if output.is_error => {
                tracing::error!("MCP tool '{}' returned an error: {}", self.name, output.text);
                ToolOutcome::Failure(output.text)
            }
            Ok(output) => {
                tracing::info!(
                    "Tool response received: {}",
                    preview(&output.text, PREVIEW_CHARS)
                );
                ToolOutcome::Success(output.text)
            }
            Err(err) => {
                tracing::error!("Error calling tool {}: {}", self.name, err);
                ToolOutcome::Failure(err.to_string())
            }
        }
    }

    /// Blocks the current thread until the call completes.
    ///
    /// Inside a multi-thread runtime this uses `block_in_place`; without a runtime a
    /// private current-thread runtime is created for the call.
    pub fn call_blocking(&self, query: &str) -> ToolOutcome {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::CurrentThread {
                    return ToolOutcome::Failure(
                        "blocking tool calls need a multi-thread runtime".to_string(),
                    );
                }
                tokio::task::block_in_place(|| handle.block_on(self.call(query)))
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(self.call(query)),
                Err(err) => ToolOutcome::Failure(format!("failed to start runtime: {}", err)),
            },
        }
    }
}

#[async_trait]
impl AgentTool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: &str) -> ToolOutcome {
        self.call(input).await
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
