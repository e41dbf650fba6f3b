use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::EmbeddingProvider;
use crate::core::config::EmbeddingSettings;
use crate::core::errors::RagError;

#[derive(Clone)]
pub struct GeminiEmbedder {
    base_url: String,
    model: String,
    api_key: String,
    output_dimensionality: Option<usize>,
    client: Client,
}

impl GeminiEmbedder {
    pub fn new(
        settings: &EmbeddingSettings,
        output_dimensionality: Option<usize>,
    ) -> Result<Self, RagError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                RagError::Config(
                    "Gemini API key missing: set GEMINI_API_KEY or embedding.api_key".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(RagError::internal)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            output_dimensionality,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.model)
    }
}

pub(crate) fn build_embed_body(model: &str, text: &str, dimensions: Option<usize>) -> Value {
    let mut body = json!({
        "model": format!("models/{}", model),
        "content": { "parts": [{ "text": text }] },
    });
    if let (Some(obj), Some(dimensions)) = (body.as_object_mut(), dimensions) {
        obj.insert("outputDimensionality".to_string(), json!(dimensions));
    }
    body
}

pub(crate) fn parse_embed_response(payload: &Value) -> Result<Vec<f32>, RagError> {
    let values = payload
        .get("embedding")
        .and_then(|embedding| embedding.get("values"))
        .and_then(|values| values.as_array())
        .ok_or_else(|| {
            RagError::Embedding("response did not contain embedding.values".to_string())
        })?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| RagError::Embedding(format!("non-numeric embedding value: {}", v)))
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn name(&self) -> &str {
        "gemini"
    }

    fn dimensions(&self) -> Option<usize> {
        self.output_dimensionality
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let body = build_embed_body(&self.model, text, self.output_dimensionality);

        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Gemini embed error ({}): {}",
                status, text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        let embedding = parse_embed_response(&payload)?;
        tracing::debug!(
            model = %self.model,
            dimensions = embedding.len(),
            "Embedded text"
        );
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_requests_output_dimensionality() {
        let body = build_embed_body("gemini-embedding-001", "hello", Some(3));
        assert_eq!(body["model"], "models/gemini-embedding-001");
        assert_eq!(body["content"]["parts"][0]["text"], "hello");
        assert_eq!(body["outputDimensionality"], 3);
    }

    #[test]
    fn body_omits_dimensionality_when_unset() {
        let body = build_embed_body("gemini-embedding-001", "hello", None);
        assert!(body.get("outputDimensionality").is_none());
    }

    #[test]
    fn parses_embedding_values() {
        let payload = json!({ "embedding": { "values": [0.25, -0.5, 1.0] } });
        assert_eq!(parse_embed_response(&payload).unwrap(), vec![0.25, -0.5, 1.0]);
    }

    #[test]
    fn rejects_malformed_payload() {
        let err = parse_embed_response(&json!({ "error": { "code": 403 } })).unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));

        let err = parse_embed_response(&json!({ "embedding": { "values": ["x"] } })).unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn new_requires_api_key() {
        let settings = EmbeddingSettings::default();
        assert!(matches!(
            GeminiEmbedder::new(&settings, Some(3)),
            Err(RagError::Config(_))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_gemini_embedding() {
        let mut settings = EmbeddingSettings::default();
        settings.api_key = std::env::var("GEMINI_API_KEY").ok();
        let embedder = GeminiEmbedder::new(&settings, Some(3)).unwrap();

        let embedding = embedder.embed("Paris is in France").await.unwrap();
        assert_eq!(embedding.len(), 3);
    }
}
