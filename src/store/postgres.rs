//! PostgreSQL + pgvector document store.
//!
//! Every operation opens its own connection, runs a single statement and closes the
//! connection again. Nothing is pooled or shared between calls.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Row};

use super::document::{sql_limit, DocumentHit, DocumentStore};
use crate::core::config::validation::is_sql_identifier;
use crate::core::config::DatabaseSettings;
use crate::core::errors::RagError;

pub struct PgVectorStore {
    options: PgConnectOptions,
    table: String,
    dimensions: usize,
}

impl PgVectorStore {
    pub fn new(settings: &DatabaseSettings, dimensions: usize) -> Result<Self, RagError> {
        if !is_sql_identifier(&settings.table) {
            return Err(RagError::Config(format!(
                "'{}' is not a valid table name",
                settings.table
            )));
        }

        Ok(Self {
            options: settings.connect_options()?,
            table: settings.table.clone(),
            dimensions,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn connect(&self) -> Result<PgConnection, RagError> {
        PgConnection::connect_with(&self.options)
            .await
            .map_err(|err| RagError::Database(format!("failed to connect: {}", err)))
    }

    /// Creates the `vector` extension and the documents table if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), RagError> {
        let mut conn = self.connect().await?;

        let outcome = async {
            sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
                .execute(&mut conn)
                .await?;
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id BIGSERIAL PRIMARY KEY,
                    content TEXT NOT NULL,
                    embedding vector({}) NOT NULL
                )",
                self.table, self.dimensions
            ))
            .execute(&mut conn)
            .await?;
            Ok::<(), sqlx::Error>(())
        }
        .await;

        close_connection(conn).await;
        outcome?;
        tracing::info!(table = %self.table, dimensions = self.dimensions, "Schema ensured");
        Ok(())
    }
}

async fn close_connection(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        tracing::warn!("Failed to close database connection cleanly: {}", err);
    }
}

#[async_trait]
impl DocumentStore for PgVectorStore {
    async fn insert(&self, content: &str, embedding: &[f32]) -> Result<(), RagError> {
        let mut conn = self.connect().await?;

        let outcome = sqlx::query(&format!(
            "INSERT INTO {} (content, embedding) VALUES ($1, $2)",
            self.table
        ))
        .bind(content)
        .bind(Vector::from(embedding.to_vec()))
        .execute(&mut conn)
        .await;

        close_connection(conn).await;
        outcome?;
        Ok(())
    }

    async fn query_similar(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<DocumentHit>, RagError> {
        let limit = sql_limit(k)?;
        let mut conn = self.connect().await?;

        let outcome = sqlx::query(&format!(
            "SELECT content, (embedding <=> $1) AS distance
             FROM {}
             ORDER BY embedding <=> $1
             LIMIT $2",
            self.table
        ))
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit)
        .fetch_all(&mut conn)
        .await;

        close_connection(conn).await;

        outcome?
            .iter()
            .map(|row| {
                Ok(DocumentHit {
                    content: row.try_get("content")?,
                    distance: row.try_get("distance")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(RagError::from)
    }

    async fn count(&self) -> Result<usize, RagError> {
        let mut conn = self.connect().await?;

        let outcome: Result<i64, sqlx::Error> =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
                .fetch_one(&mut conn)
                .await;

        close_connection(conn).await;
        Ok(outcome? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsafe_table_name() {
        let mut settings = DatabaseSettings::default();
        settings.table = "documents; DROP TABLE documents".to_string();
        assert!(matches!(
            PgVectorStore::new(&settings, 3),
            Err(RagError::Config(_))
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[tokio::test]
    async fn oversized_k_fails_before_connecting() {
        let mut settings = DatabaseSettings::default();
        settings.port = 1;
        let store = PgVectorStore::new(&settings, 3).unwrap();

        let err = store
            .query_similar(&[0.1, 0.2, 0.3], usize::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Tool(_)));
    }

    #[test]
    fn keeps_configured_table() {
        let mut settings = DatabaseSettings::default();
        settings.table = "rag_documents".to_string();
        let store = PgVectorStore::new(&settings, 3).unwrap();
        assert_eq!(store.table(), "rag_documents");
    }
}
