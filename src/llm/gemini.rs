use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmSettings;
use crate::core::errors::RagError;

/// Gemini accepts at most this many stop sequences.
const MAX_STOP_SEQUENCES: usize = 5;

#[derive(Clone)]
pub struct GeminiChat {
    base_url: String,
    model: String,
    api_key: String,
    client: Client,
}

impl GeminiChat {
    pub fn new(settings: &LlmSettings) -> Result<Self, RagError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                RagError::Config(
                    "Gemini API key missing: set GEMINI_API_KEY or llm.api_key".to_string(),
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
            client,
        })
    }
}

pub(crate) fn build_generate_body(request: &ChatRequest) -> Value {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in &request.messages {
        match message.role.as_str() {
            "system" => system_parts.push(json!({ "text": message.content })),
            "assistant" | "model" => contents.push(json!({
                "role": "model",
                "parts": [{ "text": message.content }],
            })),
            _ => contents.push(json!({
                "role": "user",
                "parts": [{ "text": message.content }],
            })),
        }
    }

    let mut body = Map::new();
    if !system_parts.is_empty() {
        body.insert(
            "systemInstruction".to_string(),
            json!({ "parts": system_parts }),
        );
    }
    body.insert("contents".to_string(), Value::Array(contents));

    let mut generation = Map::new();
    if let Some(t) = request.temperature {
        generation.insert("temperature".to_string(), json!(t));
    }
    if let Some(t) = request.max_tokens {
        generation.insert("maxOutputTokens".to_string(), json!(t));
    }
    if let Some(stop) = request.stop.as_ref().filter(|s| !s.is_empty()) {
        let stop: Vec<&String> = stop.iter().take(MAX_STOP_SEQUENCES).collect();
        generation.insert("stopSequences".to_string(), json!(stop));
    }
    if !generation.is_empty() {
        body.insert("generationConfig".to_string(), Value::Object(generation));
    }

    Value::Object(body)
}

pub(crate) fn parse_generate_response(payload: &Value) -> Result<String, RagError> {
    let Some(candidate) = payload
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|candidates| candidates.first())
    else {
        let reason = payload
            .pointer("/promptFeedback/blockReason")
            .and_then(|v| v.as_str())
            .unwrap_or("no candidates returned");
        return Err(RagError::Llm(format!("Gemini returned no answer: {}", reason)));
    };

    let text = candidate
        .pointer("/content/parts")
        .and_then(|v| v.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    Ok(text)
}

#[async_trait]
impl LlmProvider for GeminiChat {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, RagError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = build_generate_body(&request);

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Llm(err.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Llm(format!("Gemini chat error ({}): {}", status, text)));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|err| RagError::Llm(err.to_string()))?;
        parse_generate_response(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;

    #[test]
    fn system_messages_become_system_instruction() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage {
                role: "assistant".to_string(),
                content: "hello".to_string(),
            },
        ]);
        let body = build_generate_body(&request);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn generation_config_carries_temperature_and_stops() {
        let request = ChatRequest::new(vec![ChatMessage::user("q")])
            .with_settings(&LlmSettings::default())
            .with_stop(vec!["\nObservation:".to_string()]);
        let body = build_generate_body(&request);

        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert_eq!(body["generationConfig"]["stopSequences"][0], "\nObservation:");
    }

    #[test]
    fn parses_concatenated_parts() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Final " }, { "text": "Answer: Paris" }] }
            }]
        });
        assert_eq!(parse_generate_response(&payload).unwrap(), "Final Answer: Paris");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let payload = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_generate_response(&payload).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
