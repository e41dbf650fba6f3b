use std::sync::Arc;

use anyhow::Context;

use pgrag::core::logging::ConsoleTarget;
use pgrag::core::startup;
use pgrag::embedding::build_embedder;
use pgrag::rag::RagService;
use pgrag::store::PgVectorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = startup::init("pgrag-ingest.log", ConsoleTarget::Stdout)?;

    let embedder = build_embedder(&settings.embedding)?;
    let store = PgVectorStore::new(&settings.database, settings.embedding.dimensions)?;
    if settings.database.ensure_schema {
        store.ensure_schema().await?;
    }

    let rag = RagService::new(embedder, Arc::new(store));
    let inserted = rag
        .ingest(&settings.ingest.documents)
        .await
        .context("failed to ingest documents")?;

    println!("Inserted {} documents into PostgreSQL.", inserted);
    Ok(())
}
