//! Collection-scoped vector store.
//!
//! Uses the two-table layout common to Python vector-store libraries, so a database
//! populated by those tools can be searched directly:
//!
//! - `langchain_pg_collection(uuid, name, cmetadata)`
//! - `langchain_pg_embedding(uuid, collection_id, embedding, document, cmetadata, custom_id)`
//!
//! Unlike `PgVectorStore` this keeps a small connection pool for the lifetime of the store.

use std::sync::Arc;

use pgvector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::document::sql_limit;
use crate::core::config::DatabaseSettings;
use crate::core::errors::RagError;
use crate::embedding::EmbeddingProvider;

const COLLECTION_TABLE: &str = "langchain_pg_collection";
const EMBEDDING_TABLE: &str = "langchain_pg_embedding";

/// A search result: page content, its metadata and the cosine distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub page_content: String,
    pub metadata: Value,
    pub distance: f64,
}

pub struct CollectionStore {
    pool: PgPool,
    embedder: Arc<dyn EmbeddingProvider>,
    collection_name: String,
    collection_id: Uuid,
}

impl CollectionStore {
    /// Connects, creates the tables if needed and resolves (or creates) the collection.
    pub async fn connect(
        settings: &DatabaseSettings,
        collection_name: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RagError> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(settings.connect_options()?)
            .await
            .map_err(|err| RagError::Database(format!("failed to connect: {}", err)))?;

        init_schema(&pool).await?;
        let collection_id = get_or_create_collection(&pool, collection_name).await?;
        tracing::info!(
            collection = collection_name,
            id = %collection_id,
            "Vector store collection ready"
        );

        Ok(Self {
            pool,
            embedder,
            collection_name: collection_name.to_string(),
            collection_id,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Embeds each text (one request per text) and stores them in the collection.
    pub async fn add_texts(
        &self,
        texts: &[String],
        metadatas: Option<&[Value]>,
    ) -> Result<Vec<Uuid>, RagError> {
        if let Some(metadatas) = metadatas {
            if metadatas.len() != texts.len() {
                return Err(RagError::Internal(format!(
                    "{} texts but {} metadata entries",
                    texts.len(),
                    metadatas.len()
                )));
            }
        }

        let mut rows = Vec::with_capacity(texts.len());
        for (idx, text) in texts.iter().enumerate() {
            let embedding = self.embedder.embed(text).await?;
            let metadata = metadatas
                .and_then(|m| m.get(idx).cloned())
                .unwrap_or_else(|| Value::Object(Default::default()));
            rows.push((Uuid::new_v4(), text, embedding, metadata));
        }

        let mut tx = self.pool.begin().await?;
        for (id, text, embedding, metadata) in &rows {
            sqlx::query(&format!(
                "INSERT INTO {} (uuid, collection_id, embedding, document, cmetadata, custom_id)
                 VALUES ($1, $2, $3, $4, $5, $6)",
                EMBEDDING_TABLE
            ))
            .bind(id)
            .bind(self.collection_id)
            .bind(Vector::from(embedding.clone()))
            .bind(text.as_str())
            .bind(metadata)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(rows.into_iter().map(|(id, ..)| id).collect())
    }

    /// Returns the `k` documents of this collection closest to `query`.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, RagError> {
        let embedding = self.embedder.embed(query).await?;
        self.similarity_search_by_vector(&embedding, k).await
    }

    pub async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>, RagError> {
        let limit = sql_limit(k)?;
        let rows = sqlx::query(&format!(
            "SELECT e.document, e.cmetadata, (e.embedding <=> $1) AS distance
             FROM {} e
             JOIN {} c ON e.collection_id = c.uuid
             WHERE c.uuid = $2
             ORDER BY distance ASC
             LIMIT $3",
            EMBEDDING_TABLE, COLLECTION_TABLE
        ))
        .bind(Vector::from(embedding.to_vec()))
        .bind(self.collection_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let document: Option<String> = row.try_get("document")?;
                let metadata: Option<Value> = row.try_get("cmetadata")?;
                Ok(ScoredDocument {
                    page_content: document.unwrap_or_default(),
                    metadata: metadata.unwrap_or(Value::Null),
                    distance: row.try_get("distance")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(RagError::from)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn init_schema(pool: &PgPool) -> Result<(), RagError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            uuid UUID PRIMARY KEY,
            name VARCHAR NOT NULL,
            cmetadata JSONB
        )",
        COLLECTION_TABLE
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            uuid UUID PRIMARY KEY,
            collection_id UUID REFERENCES {}(uuid) ON DELETE CASCADE,
            embedding vector,
            document VARCHAR,
            cmetadata JSONB,
            custom_id VARCHAR
        )",
        EMBEDDING_TABLE, COLLECTION_TABLE
    ))
    .execute(pool)
    .await?;

    Ok(())
}

async fn get_or_create_collection(pool: &PgPool, name: &str) -> Result<Uuid, RagError> {
    let existing: Option<Uuid> = sqlx::query_scalar(&format!(
        "SELECT uuid FROM {} WHERE name = $1 LIMIT 1",
        COLLECTION_TABLE
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    sqlx::query(&format!(
        "INSERT INTO {} (uuid, name, cmetadata) VALUES ($1, $2, $3)",
        COLLECTION_TABLE
    ))
    .bind(id)
    .bind(name)
    .bind(Value::Null)
    .execute(pool)
    .await?;

    Ok(id)
}
