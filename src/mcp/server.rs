//! MCP tool server exposing the document store over stdio.

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::transport::stdio;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use serde::Deserialize;

use crate::core::config::DEFAULT_K;
use crate::core::errors::RagError;
use crate::rag::RagService;

pub const INSERT_DOCUMENT_TOOL: &str = "insert_document";
pub const QUERY_SIMILAR_DOCUMENTS_TOOL: &str = "query_similar_documents";

const INSERTED_MESSAGE: &str = "Document inserted successfully.";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InsertDocumentRequest {
    /// Text of the document to store.
    pub content: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryRequest {
    /// Text to search for.
    pub query: String,
    /// Number of documents to return.
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    DEFAULT_K
}

#[derive(Clone)]
pub struct RagToolServer {
    rag: RagService,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RagToolServer {
    pub fn new(rag: RagService) -> Self {
        Self {
            rag,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Embed a document and store it in the vector database.")]
    async fn insert_document(
        &self,
        Parameters(request): Parameters<InsertDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.rag.insert_document(&request.content).await {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(INSERTED_MESSAGE)])),
            Err(err) => {
                tracing::error!("insert_document failed: {}", err);
                Ok(CallToolResult::error(vec![Content::text(err.to_string())]))
            }
        }
    }

    #[tool(
        description = "Return the k stored documents most similar to the query, separated by blank lines."
    )]
    async fn query_similar_documents(
        &self,
        Parameters(request): Parameters<QueryRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.k == 0 {
            return Ok(CallToolResult::error(vec![Content::text(
                "k must be at least 1",
            )]));
        }

        match self
            .rag
            .query_similar_documents(&request.query, request.k)
            .await
        {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(err) => {
                tracing::error!("query_similar_documents failed: {}", err);
                Ok(CallToolResult::error(vec![Content::text(err.to_string())]))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for RagToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Stores documents with vector embeddings in PostgreSQL and answers similarity queries."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

/// Serves the tools on stdin/stdout until the client disconnects.
pub async fn serve_stdio(rag: RagService) -> Result<(), RagError> {
    let service = RagToolServer::new(rag)
        .serve(stdio())
        .await
        .map_err(|err| RagError::Tool(format!("failed to start MCP server: {}", err)))?;
    tracing::info!("MCP server ready on stdio");

    let reason = service
        .waiting()
        .await
        .map_err(|err| RagError::Tool(format!("MCP server task failed: {}", err)))?;
    tracing::info!("MCP server stopped: {:?}", reason);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::Value;

    use crate::embedding::HashingEmbedder;
    use crate::store::InMemoryDocumentStore;

    fn server() -> RagToolServer {
        RagToolServer::new(RagService::new(
            Arc::new(HashingEmbedder::new(32).unwrap()),
            Arc::new(InMemoryDocumentStore::new()),
        ))
    }

    fn text_of(result: &CallToolResult) -> (String, bool) {
        let value = serde_json::to_value(result).unwrap();
        let text = value["content"][0]["text"].as_str().unwrap_or_default().to_string();
        let is_error = value
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        (text, is_error)
    }

    #[tokio::test]
    async fn insert_then_query_round_trips_through_handlers() {
        let server = server();
        let inserted = server
            .insert_document(Parameters(InsertDocumentRequest {
                content: "Paris is in France".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(text_of(&inserted), (INSERTED_MESSAGE.to_string(), false));

        let found = server
            .query_similar_documents(Parameters(QueryRequest {
                query: "Where is Paris?".to_string(),
                k: 1,
            }))
            .await
            .unwrap();
        assert_eq!(text_of(&found), ("Paris is in France".to_string(), false));
    }

    #[tokio::test]
    async fn zero_k_is_an_error_result() {
        let result = server()
            .query_similar_documents(Parameters(QueryRequest {
                query: "anything".to_string(),
                k: 0,
            }))
            .await
            .unwrap();
        assert!(text_of(&result).1);
    }

    #[test]
    fn query_request_defaults_k() {
        let request: QueryRequest = serde_json::from_str(r#"{"query":"Where is Pune?"}"#).unwrap();
        assert_eq!(request.k, 3);
    }

    #[test]
    fn both_tools_are_listed() {
        let mut names: Vec<String> = server()
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, [INSERT_DOCUMENT_TOOL, QUERY_SIMILAR_DOCUMENTS_TOOL]);
    }
}
