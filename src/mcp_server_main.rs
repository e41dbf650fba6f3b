use std::sync::Arc;

use anyhow::Context;

use pgrag::core::logging::ConsoleTarget;
use pgrag::core::startup;
use pgrag::embedding::build_embedder;
use pgrag::mcp::serve_stdio;
use pgrag::rag::RagService;
use pgrag::store::PgVectorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = startup::init("pgrag-mcp-server.log", ConsoleTarget::Stderr)?;

    let embedder = build_embedder(&settings.embedding)?;
    let store = PgVectorStore::new(&settings.database, settings.embedding.dimensions)?;
    if settings.database.ensure_schema {
        store
            .ensure_schema()
            .await
            .context("failed to create the documents table")?;
    }

    let rag = RagService::new(embedder, Arc::new(store));
    serve_stdio(rag).await?;
    Ok(())
}
