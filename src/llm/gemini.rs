//! Gemini text generation over REST.
//!
//! Sends the replayed history plus the new input to
//! `POST {base_url}/models/{model}:generateContent` and joins the text parts
//! of the first candidate. The key travels in the `x-goog-api-key` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ChatModel, ChatRequest, ModelError};
use crate::config::GeminiConfig;
use crate::message::ChatTurn;

pub struct GeminiClient {
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Request body for `generateContent`.
pub fn request_body(request: &ChatRequest<'_>) -> Value {
    let mut contents: Vec<Value> = request.history.iter().map(turn_json).collect();
    contents.push(json!({
        "role": "user",
        "parts": [{ "text": request.input }]
    }));

    let mut body = json!({ "contents": contents });
    if let Some(system) = request.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

fn turn_json(turn: &ChatTurn) -> Value {
    json!({
        "role": turn.role.as_str(),
        "parts": [{ "text": turn.text }]
    })
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(data: &Value) -> Result<String, ModelError> {
    let parts = data["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            let reason = data["promptFeedback"]["blockReason"]
                .as_str()
                .or_else(|| data["candidates"][0]["finishReason"].as_str())
                .unwrap_or("no candidate parts");
            ModelError::Malformed(reason.to_string())
        })?;

    let text: String = parts
        .iter()
        .filter(|p| !p["thought"].as_bool().unwrap_or(false))
        .filter_map(|p| p["text"].as_str())
        .collect();

    let text = text.trim();
    if text.is_empty() {
        Err(ModelError::Empty)
    } else {
        Ok(text.to_string())
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: ChatRequest<'_>) -> Result<String, ModelError> {
        let body = request_body(&request);
        debug!(
            "Sending to Gemini model '{}': {} history turns",
            self.model,
            request.history.len()
        );

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", request.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Gemini returned status {status}");
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data = resp
            .json::<Value>()
            .await
            .map_err(|e| ModelError::Malformed(e.without_url().to_string()))?;
        let text = extract_text(&data)?;
        debug!("Gemini output: {} chars", text.chars().count());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RemoteRole;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    const KEY: &str = "SECRET-KEY-123";

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1beta")
    }

    fn client_for(base_url: String) -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            base_url,
            model: "test-model".into(),
            timeout_secs: 5,
            ..GeminiConfig::default()
        })
        .unwrap()
    }

    fn request(history: &[ChatTurn]) -> ChatRequest<'_> {
        ChatRequest {
            api_key: KEY,
            system_instruction: None,
            history,
            input: "我今天很难过",
        }
    }

    #[tokio::test]
    async fn test_generate_sends_key_header_and_reads_candidates() {
        let router = Router::new().route(
            "/v1beta/models/test-model:generateContent",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(KEY) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "no key" })));
                }
                let input = body["contents"][0]["parts"][0]["text"].clone();
                (
                    StatusCode::OK,
                    Json(json!({
                        "candidates": [{ "content": { "parts": [{ "text": input }] } }]
                    })),
                )
            }),
        );
        let client = client_for(spawn_backend(router).await);

        let reply = client.generate(request(&[])).await.unwrap();
        assert_eq!(reply, "我今天很难过");
    }

    #[tokio::test]
    async fn test_generate_maps_error_status() {
        let router = Router::new().route(
            "/v1beta/models/test-model:generateContent",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
        );
        let client = client_for(spawn_backend(router).await);

        match client.generate(request(&[])).await {
            Err(ModelError::Status { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_non_json_body() {
        let router = Router::new().route(
            "/v1beta/models/test-model:generateContent",
            post(|| async { "<html>gateway</html>" }),
        );
        let client = client_for(spawn_backend(router).await);

        let err = client.generate(request(&[])).await.unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_api_error_does_not_contain_key() {
        let client = client_for("http://127.0.0.1:1/v1beta".into());

        let err = client.generate(request(&[])).await.unwrap_err();
        assert!(matches!(err, ModelError::Transport(_)));
        let text = format!("{err} {err:?}");
        assert!(!text.contains(KEY), "key leaked into error text: {text}");
    }

    #[test]
    fn test_request_body_appends_input_after_history() {
        let history = vec![
            ChatTurn { role: RemoteRole::User, text: "你好".into() },
            ChatTurn { role: RemoteRole::Model, text: "乖乖".into() },
        ];
        let request = ChatRequest {
            api_key: "k",
            system_instruction: None,
            history: &history,
            input: "我今天很难过",
        };
        let body = request_body(&request);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "我今天很难过");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_request_body_carries_system_instruction() {
        let request = ChatRequest {
            api_key: "k",
            system_instruction: Some("be kind"),
            history: &[],
            input: "hi",
        };
        let body = request_body(&request);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be kind");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_extract_text_joins_parts_and_skips_thoughts() {
        let data = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "thinking...", "thought": true },
                        { "text": "抱抱，" },
                        { "text": "別怕，有我呢。" }
                    ]
                }
            }]
        });
        assert_eq!(extract_text(&data).unwrap(), "抱抱，別怕，有我呢。");
    }

    #[test]
    fn test_extract_text_reports_block_reason() {
        let data = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        match extract_text(&data) {
            Err(ModelError::Malformed(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_extract_text_empty_is_error() {
        let data = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert!(matches!(extract_text(&data), Err(ModelError::Empty)));
    }
}
