//! OpenAI-compatible chat completions client.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::error::DocParserError;

/// Anything that can turn a list of chat messages into one completion text.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, messages: Vec<Message>) -> Result<String>;
}

/// Chat completions client with a fixed model and sampling configuration.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, client: Client) -> std::result::Result<Self, DocParserError> {
        if config.api_key.trim().is_empty() {
            return Err(DocParserError::Configuration(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, messages: Vec<Message>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }

    async fn send_request(&self, request: ChatCompletionRequest) -> Result<String> {
        debug!("Sending request to chat completions: model={}", request.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to chat completions API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions API error ({}): {}", status, error_text);
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        if let Some(usage) = &response.usage {
            info!(
                "Chat completion: {} tokens (prompt: {}, completion: {})",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Chat completions response contained no message content")
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<String> {
        let request = self.build_request(messages);
        self.send_request(request).await
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// ============================================================================
// Message types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Extractor;
    use axum::{http::StatusCode, routing::post, Router};
    use std::sync::Arc;

    fn config() -> LlmConfig {
        LlmConfig {
            api_key: "sk-test".to_string(),
            base_url: "https://api.openai.com/v1/".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
        }
    }

    #[test]
    fn test_new_requires_key() {
        let mut cfg = config();
        cfg.api_key = String::new();
        let err = OpenAiClient::new(&cfg, Client::new()).err().unwrap();
        assert!(matches!(err, DocParserError::Configuration(_)));
    }

    #[test]
    fn test_endpoint() {
        let client = OpenAiClient::new(&config(), Client::new()).unwrap();
        assert_eq!(client.endpoint, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let client = OpenAiClient::new(&config(), Client::new()).unwrap();
        let request =
            client.build_request(vec![Message::system("be terse"), Message::user("hello")]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 2000);
        assert!((json["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be terse");
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "[]"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        }"#;
        let resp: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("[]"));
        assert_eq!(resp.usage.unwrap().total_tokens, 11);
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    /// Extractor backed by a chat endpoint that always answers with `status` and `body`.
    async fn extractor_against(status: StatusCode, body: &'static str) -> Extractor {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || async move {
                (status, [("content-type", "application/json")], body)
            }),
        );
        let mut cfg = config();
        cfg.base_url = serve(app).await;
        Extractor::new(Arc::new(OpenAiClient::new(&cfg, Client::new()).unwrap()))
    }

    #[tokio::test]
    async fn test_round_trip() {
        let extractor = extractor_against(
            StatusCode::OK,
            r#"{"choices": [{"message": {"role": "assistant", "content": "[{\"field\":\"Name\",\"value\":\"Alice\"}]"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 5, "total_tokens": 10}}"#,
        )
        .await;

        let points = extractor.extract_fields("Name: Alice", "Extract Name").await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].field, "Name");
        assert_eq!(points[0].value, "Alice");
    }

    #[tokio::test]
    async fn test_error_status_is_completion_error() {
        let extractor = extractor_against(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "Rate limit reached"}}"#,
        )
        .await;

        let err = extractor.extract_fields("x", "y").await.unwrap_err();
        assert!(matches!(err, DocParserError::Completion(_)), "{}", err);
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Rate limit reached"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_completion_error() {
        let extractor = extractor_against(StatusCode::OK, r#"{"choices": []}"#).await;

        let err = extractor.extract_fields("x", "y").await.unwrap_err();
        assert!(matches!(err, DocParserError::Completion(_)), "{}", err);
        assert!(err.to_string().contains("no message content"));
    }

    #[tokio::test]
    async fn test_null_content_is_completion_error() {
        let extractor = extractor_against(
            StatusCode::OK,
            r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#,
        )
        .await;

        let err = extractor.extract_fields("x", "y").await.unwrap_err();
        assert!(matches!(err, DocParserError::Completion(_)), "{}", err);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_completion_error() {
        let extractor = extractor_against(StatusCode::OK, "upstream timeout").await;

        let err = extractor.extract_fields("x", "y").await.unwrap_err();
        assert!(matches!(err, DocParserError::Completion(_)), "{}", err);
    }
}
