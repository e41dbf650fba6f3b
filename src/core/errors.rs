use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("tool error: {0}")]
    Tool(String),
    #[error("llm error: {0}")]
    Llm(String),
    #[error("agent error: {0}")]
    Agent(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        RagError::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::Database(err.to_string())
    }
}
