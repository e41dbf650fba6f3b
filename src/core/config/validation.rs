use serde_json::{Map, Value};

use crate::core::errors::RagError;

pub fn validate_config(config: &Value) -> Result<(), RagError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(database) = expect_optional_object(root, "database")? {
        validate_optional_string_field(database, "database.url", "url")?;
        validate_optional_string_field(database, "database.host", "host")?;
        validate_u64_field(database, "database.port", "port", 1, 65535)?;
        validate_optional_string_field(database, "database.dbname", "dbname")?;
        validate_optional_string_field(database, "database.user", "user")?;
        validate_optional_string_field(database, "database.password", "password")?;
        validate_identifier_field(database, "database.table", "table")?;
        validate_bool_field(database, "database.ensure_schema", "ensure_schema")?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_enum_field(
            embedding,
            "embedding.provider",
            "provider",
            &["gemini", "hashing"],
        )?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(embedding, "embedding.dimensions", "dimensions", 1, 65_536)?;
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_u64_field(
            embedding,
            "embedding.timeout_secs",
            "timeout_secs",
            1,
            86_400,
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 86_400)?;
    }

    if let Some(agent) = expect_optional_object(root, "agent")? {
        validate_u64_field(agent, "agent.max_iterations", "max_iterations", 1, 100)?;
        validate_enum_field(
            agent,
            "agent.early_stopping",
            "early_stopping",
            &["force", "generate"],
        )?;
        validate_bool_field(
            agent,
            "agent.handle_parsing_errors",
            "handle_parsing_errors",
        )?;
        validate_required_string_if_present(agent, "agent.tool_name", "tool_name")?;
        validate_required_string_if_present(agent, "agent.query", "query")?;
        validate_u64_field(agent, "agent.k", "k", 1, 1000)?;
    }

    if let Some(mcp) = expect_optional_object(root, "mcp")? {
        validate_required_string_if_present(mcp, "mcp.command", "command")?;
        validate_string_array_field(mcp, "mcp.args", "args")?;
        if let Some(env) = mcp.get("env").filter(|v| !v.is_null()) {
            let env = env
                .as_object()
                .ok_or_else(|| config_type_error("mcp.env", "object"))?;
            for (key, value) in env {
                if value.as_str().is_none() {
                    return Err(config_type_error(&format!("mcp.env.{}", key), "string"));
                }
            }
        }
    }

    if let Some(ingest) = expect_optional_object(root, "ingest")? {
        validate_string_array_field(ingest, "ingest.documents", "documents")?;
    }

    if let Some(vector_store) = expect_optional_object(root, "vector_store")? {
        validate_required_string_if_present(
            vector_store,
            "vector_store.collection_name",
            "collection_name",
        )?;
        validate_required_string_if_present(vector_store, "vector_store.query", "query")?;
        validate_u64_field(vector_store, "vector_store.k", "k", 1, 1000)?;
        validate_u64_field(
            vector_store,
            "vector_store.embedding_dimensions",
            "embedding_dimensions",
            1,
            65_536,
        )?;
    }

    if let Some(logging) = expect_optional_object(root, "logging")? {
        validate_optional_string_field(logging, "logging.level", "level")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, RagError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), RagError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), RagError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_required_string_if_present(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), RagError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn validate_identifier_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    validate_required_string_if_present(section, path, key)?;
    let Some(text) = section.get(key).and_then(|v| v.as_str()) else {
        return Ok(());
    };
    if !is_sql_identifier(text) {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': '{}' is not a plain SQL identifier",
            path, text
        )));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(RagError::Config(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

/// Table names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` passes.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn config_type_error(path: &str, expected: &str) -> RagError {
    RagError::Config(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_typical_config() {
        validate_config(&json!({})).unwrap();
        validate_config(&json!({
            "database": { "host": "localhost", "port": 5432, "table": "documents" },
            "embedding": { "provider": "gemini", "dimensions": 3 },
            "llm": { "temperature": 0.0 },
            "agent": { "max_iterations": 3, "early_stopping": "generate" },
            "mcp": { "command": "pgrag-mcp-server", "args": [], "env": { "RUST_LOG": "debug" } },
            "ingest": { "documents": ["one", "two"] }
        }))
        .unwrap();
    }

    #[test]
    fn rejects_out_of_range_port() {
        let err = validate_config(&json!({ "database": { "port": 70000 } })).unwrap_err();
        assert!(err.to_string().contains("database.port"));
    }

    #[test]
    fn rejects_unknown_stopping_policy() {
        let err =
            validate_config(&json!({ "agent": { "early_stopping": "panic" } })).unwrap_err();
        assert!(err.to_string().contains("force, generate"));
    }

    #[test]
    fn enum_values_are_case_sensitive() {
        let err = validate_config(&json!({ "agent": { "early_stopping": "Generate" } }))
            .unwrap_err();
        assert!(err.to_string().contains("agent.early_stopping"));
        assert!(validate_config(&json!({ "embedding": { "provider": "Hashing" } })).is_err());
    }

    #[test]
    fn explicit_nulls_are_treated_as_unset() {
        validate_config(&json!({
            "llm": { "temperature": null },
            "agent": { "tool_name": null, "early_stopping": null, "handle_parsing_errors": null },
            "mcp": { "args": null, "env": null }
        }))
        .unwrap();
    }

    #[test]
    fn rejects_table_name_that_is_not_an_identifier() {
        let err = validate_config(&json!({ "database": { "table": "docs; DROP TABLE x" } }))
            .unwrap_err();
        assert!(err.to_string().contains("database.table"));
    }

    #[test]
    fn rejects_empty_ingest_document() {
        let err = validate_config(&json!({ "ingest": { "documents": ["ok", "  "] } }))
            .unwrap_err();
        assert!(err.to_string().contains("ingest.documents[1]"));
    }

    #[test]
    fn sql_identifier_rules() {
        assert!(is_sql_identifier("documents"));
        assert!(is_sql_identifier("_docs_2"));
        assert!(!is_sql_identifier("2docs"));
        assert!(!is_sql_identifier("docs-table"));
        assert!(!is_sql_identifier(""));
    }
}
