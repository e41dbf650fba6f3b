use anyhow::Context;

use pgrag::core::logging::ConsoleTarget;
use pgrag::core::startup;
use pgrag::embedding::build_embedder_with_dimensions;
use pgrag::store::CollectionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = startup::init("pgrag-vector-search.log", ConsoleTarget::Stdout)?;
    let vector_store = &settings.vector_store;

    let embedder =
        build_embedder_with_dimensions(&settings.embedding, vector_store.embedding_dimensions)?;
    let store = CollectionStore::connect(&settings.database, &vector_store.collection_name, embedder)
        .await
        .context("failed to open the vector store")?;

    let results = store
        .similarity_search(&vector_store.query, vector_store.k)
        .await;
    store.close().await;

    for (i, doc) in results?.iter().enumerate() {
        println!("Result {}: {}", i + 1, doc.page_content);
    }
    Ok(())
}
