// Gemini generateContent client

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::utils::retry::retry_once_on_timeout;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to the AI endpoint failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("AI endpoint timed out")]
    Timeout,
}

/// Sampling settings sent as `generationConfig`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiPart {
    pub text: Option<String>,
}

impl GeminiResponse {
    /// `candidates[0].content.parts[0].text`, if present and not blank
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

pub struct GeminiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(http: Client, endpoint: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            timeout,
            generation: GenerationConfig::default(),
        }
    }

    /// Send `prompt`. `Ok(None)` means the endpoint answered but gave no usable text.
    pub async fn generate(&self, prompt: &str) -> Result<Option<String>, LlmError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": self.generation,
        });

        retry_once_on_timeout("Gemini request", self.timeout, || self.send(&body))
            .await
            .map_err(|_| LlmError::Timeout)?
    }

    async fn send(&self, body: &serde_json::Value) -> Result<Option<String>, LlmError> {
        let res = self
            .http
            .post(&self.endpoint)
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(LlmError::Status(status));
        }

        let raw = res.text().await?;
        match serde_json::from_str::<GeminiResponse>(&raw) {
            Ok(response) => Ok(response.first_text().map(str::to_string)),
            Err(e) => {
                debug!("Unparseable Gemini response: {}", e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            Client::new(),
            &format!("{}/v1beta/models/gemini:generateContent", server.uri()),
            "secret",
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_generate_reads_first_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini:generateContent"))
            .and(query_param("key", "secret"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{ "text": "hello" }] }],
                "generationConfig": { "topP": 0.95, "maxOutputTokens": 1024 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Hi there!" }] } }]
            })))
            .mount(&server)
            .await;

        let answer = client(&server).generate("hello").await.unwrap();
        assert_eq!(answer.as_deref(), Some("Hi there!"));
    }

    #[tokio::test]
    async fn test_server_error_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_empty_or_malformed_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.generate("a").await.unwrap(), None);
        assert_eq!(client.generate("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            Client::new(),
            &server.uri(),
            "secret",
            Duration::from_millis(100),
        );
        assert!(matches!(client.generate("hi").await, Err(LlmError::Timeout)));
    }

    #[test]
    fn test_first_text_skips_blank() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "   " }] } }]
        }))
        .unwrap();
        assert_eq!(response.first_text(), None);
    }
}
