//! 언어 모델 모듈 - OpenAI 호환 Chat Completions 호출
//!
//! 채워진 프롬프트 하나를 user 메시지로 보내고 응답 텍스트를 그대로 반환합니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{get_api_key, RagConfig};
use crate::error::SynthesisError;

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 프롬프트 완성
    async fn complete(&self, prompt: &str) -> Result<String, SynthesisError>;

    /// 모델 이름 (토크나이저 선택에도 사용)
    fn model(&self) -> &str;
}

// ============================================================================
// OpenAiChat
// ============================================================================

/// OpenAI Chat Completions 구현체
///
/// source: https://platform.openai.com/docs/api-reference/chat
pub struct OpenAiChat {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        })
    }

    /// 설정과 환경변수 API 키로 생성
    pub fn from_config(config: &RagConfig) -> Result<Self, SynthesisError> {
        let api_key = get_api_key().ok_or(SynthesisError::MissingApiKey)?;
        Self::new(
            api_key,
            &config.api_base_url,
            &config.chat_model,
            config.temperature,
            config.request_timeout,
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ApiMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String, SynthesisError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ApiMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SynthesisError::Http(e.to_string()))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SynthesisError::RateLimited);
        }

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            tracing::error!("Chat API error {}: {}", status, message);
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let resp: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(SynthesisError::EmptyResponse)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_chat(server: &MockServer) -> OpenAiChat {
        OpenAiChat::new(
            "test-key".to_string(),
            &server.uri(),
            "gpt-4o-mini",
            0.2,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "explain login"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "It checks credentials."}}]
            })))
            .mount(&server)
            .await;

        let answer = test_chat(&server).complete("explain login").await.unwrap();
        assert_eq!(answer, "It checks credentials.");
    }

    #[tokio::test]
    async fn test_complete_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = test_chat(&server).complete("x").await.unwrap_err();
        assert!(matches!(err, SynthesisError::RateLimited));
    }

    #[tokio::test]
    async fn test_complete_api_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "context_length_exceeded"}
            })))
            .mount(&server)
            .await;

        let err = test_chat(&server).complete("x").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "language model API error (400): context_length_exceeded"
        );
    }

    #[tokio::test]
    async fn test_complete_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = test_chat(&server).complete("x").await.unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyResponse));
    }
}
