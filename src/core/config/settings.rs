//! Typed view over the merged YAML configuration.
//!
//! `ConfigService` produces a `serde_json::Value`; `Settings` deserializes it with defaults for
//! every key and then layers environment overrides on top.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgConnectOptions;

use super::service::{redact_sensitive_values, ConfigService};
use crate::agent::EarlyStopping;
use crate::core::errors::RagError;

pub const DEFAULT_K: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub mcp: McpSettings,
    pub ingest: IngestSettings,
    pub vector_store: VectorStoreSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub table: String,
    /// Create the `vector` extension and the documents table when missing.
    pub ensure_schema: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "my_sample_db".to_string(),
            user: "postgres".to_string(),
            password: None,
            table: "documents".to_string(),
            ensure_schema: false,
        }
    }
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> Result<PgConnectOptions, RagError> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url
                .parse::<PgConnectOptions>()
                .map_err(|err| RagError::Config(format!("invalid database url: {}", err)));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user);
        if let Some(password) = self.password.as_deref() {
            options = options.password(password);
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Gemini,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Gemini,
            model: "gemini-embedding-001".to_string(),
            dimensions: 3,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            temperature: 0.0,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub early_stopping: EarlyStopping,
    pub handle_parsing_errors: bool,
    /// Remote tool exposed to the model; matched by exact name.
    pub tool_name: String,
    pub query: String,
    pub k: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            early_stopping: EarlyStopping::Generate,
            handle_parsing_errors: true,
            tool_name: "query_similar_documents".to_string(),
            query: "Where is Pune?".to_string(),
            k: DEFAULT_K,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSettings {
    /// Tool server executable. Defaults to `pgrag-mcp-server`.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub documents: Vec<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            documents: vec![
                "Retrieval Augmented Generation (RAG) improves LLMs with context.".to_string(),
                "LangChain helps orchestrate LLMs and tools together.".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub collection_name: String,
    pub query: String,
    pub k: usize,
    /// Output dimensionality requested from the embedding model; `None` keeps the model default.
    pub embedding_dimensions: Option<usize>,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            collection_name: "documents".to_string(),
            query: "How can I use Postgres for vector search?".to_string(),
            k: DEFAULT_K,
            embedding_dimensions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn load(config_service: &ConfigService) -> Result<Self, RagError> {
        let raw = config_service.load_config()?;
        let mut settings = Self::from_value(raw)?;
        settings.apply_env_overrides(|key| env::var(key).ok());
        Ok(settings)
    }

    /// Null entries count as unset, so section defaults fill them in.
    pub fn from_value(value: Value) -> Result<Self, RagError> {
        serde_json::from_value(strip_nulls(value))
            .map_err(|err| RagError::Config(format!("invalid configuration: {}", err)))
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = lookup("GEMINI_API_KEY") {
            self.embedding.api_key = Some(api_key.clone());
            self.llm.api_key = Some(api_key);
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(command) = lookup("PGRAG_MCP_COMMAND") {
            self.mcp.command = Some(command);
        }
    }

    /// Settings as JSON with credentials masked, for startup logging.
    pub fn redacted(&self) -> Value {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        let mut redacted = redact_sensitive_values(&value);
        // connection URLs embed the password
        if let Some(url) = redacted.pointer_mut("/database/url").filter(|v| !v.is_null()) {
            *url = Value::String("****".to_string());
        }
        redacted
    }
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_demo_configuration() {
        let settings = Settings::from_value(json!({})).unwrap();

        assert_eq!(settings.embedding.dimensions, 3);
        assert_eq!(settings.embedding.model, "gemini-embedding-001");
        assert_eq!(settings.agent.max_iterations, 3);
        assert_eq!(settings.agent.early_stopping, EarlyStopping::Generate);
        assert_eq!(settings.agent.tool_name, "query_similar_documents");
        assert_eq!(settings.database.table, "documents");
        assert_eq!(settings.ingest.documents.len(), 2);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let settings = Settings::from_value(json!({
            "database": { "host": "db", "password": "pw" },
            "embedding": { "provider": "hashing", "dimensions": 64 },
            "agent": { "early_stopping": "force" }
        }))
        .unwrap();

        assert_eq!(settings.database.host, "db");
        assert_eq!(settings.database.port, 5432);
        assert_eq!(settings.embedding.provider, EmbeddingProviderKind::Hashing);
        assert_eq!(settings.embedding.dimensions, 64);
        assert_eq!(settings.agent.early_stopping, EarlyStopping::Force);
        assert_eq!(settings.agent.max_iterations, 3);
    }

    #[test]
    fn null_values_fall_back_to_defaults() {
        let settings = Settings::from_value(json!({
            "database": { "url": null, "table": null },
            "llm": { "temperature": null },
            "agent": { "early_stopping": null, "query": null },
            "vector_store": null
        }))
        .unwrap();

        assert!(settings.database.url.is_none());
        assert_eq!(settings.database.table, "documents");
        assert_eq!(settings.llm.temperature, 0.0);
        assert_eq!(settings.agent.early_stopping, EarlyStopping::Generate);
        assert_eq!(settings.agent.query, "Where is Pune?");
        assert_eq!(settings.vector_store.collection_name, "documents");
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut settings = Settings::from_value(json!({
            "embedding": { "api_key": "from-file" },
            "database": { "url": "postgres://file/db" }
        }))
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", "from-env"),
            ("DATABASE_URL", "postgres://env/db"),
            ("PGRAG_MCP_COMMAND", "   "),
        ]);
        settings.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.embedding.api_key.as_deref(), Some("from-env"));
        assert_eq!(settings.llm.api_key.as_deref(), Some("from-env"));
        assert_eq!(settings.database.url.as_deref(), Some("postgres://env/db"));
        assert!(settings.mcp.command.is_none());
    }

    #[test]
    fn redacted_masks_credentials() {
        let mut settings = Settings::default();
        settings.database.password = Some("secret".to_string());
        settings.embedding.api_key = Some("key".to_string());

        let redacted = settings.redacted();
        assert_eq!(redacted["database"]["password"], "****");
        assert_eq!(redacted["embedding"]["api_key"], "****");
        assert_eq!(redacted["database"]["user"], "postgres");
    }

    #[test]
    fn connect_options_prefer_url() {
        let mut database = DatabaseSettings::default();
        database.url = Some("postgres://alice:pw@example.com:6000/rag".to_string());
        let options = database.connect_options().unwrap();
        assert_eq!(options.get_host(), "example.com");
        assert_eq!(options.get_port(), 6000);
        assert_eq!(options.get_database(), Some("rag"));
    }
}
