//! 임베딩 모듈 - OpenAI 호환 API를 통한 텍스트 벡터화
//!
//! 수집 시점(청크)과 질의 시점(질문) 모두 같은 프로바이더를 사용해야
//! 벡터가 같은 공간에 놓입니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::from_config(&RagConfig::from_env()?)?;
//! let vectors = embedder.embed(&["fn login() {}".to_string()]).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{get_api_key, RagConfig};
use crate::error::EmbeddingError;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 입력 하나당 벡터 하나를, 입력 순서대로 반환합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 배치 임베딩
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// 단일 텍스트 임베딩
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// 429/전송 오류 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// OpenAI 임베딩 구현체
///
/// source: https://platform.openai.com/docs/api-reference/embeddings
pub struct OpenAiEmbedding {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    max_retries: u32,
    initial_backoff: Duration,
}

impl std::fmt::Debug for OpenAiEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedding")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl OpenAiEmbedding {
    /// 새 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - API 키
    /// * `base_url` - API 주소 (`.../v1`)
    /// * `model` - 임베딩 모델 이름
    /// * `dimension` - 출력 차원
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            max_retries: MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// 설정과 환경변수 API 키로 생성
    pub fn from_config(config: &RagConfig) -> Result<Self, EmbeddingError> {
        let api_key = get_api_key().ok_or(EmbeddingError::MissingApiKey)?;
        Self::new(
            api_key,
            &config.api_base_url,
            &config.embedding_model,
            config.embedding_dimension,
            config.request_timeout,
        )
    }

    /// 재시도 정책 지정
    pub fn with_retry(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    /// `dimensions` 파라미터는 text-embedding-3 계열만 지원
    fn requested_dimensions(&self) -> Option<usize> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dimension)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// 임베딩 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// 임베딩 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// API 에러 응답
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        // 빈 입력은 API가 거부하므로 공백 한 칸으로 대체
        let request = EmbedRequest {
            input: texts
                .iter()
                .map(|t| if t.is_empty() { " " } else { t.as_str() })
                .collect(),
            model: &self.model,
            dimensions: self.requested_dimensions(),
        };

        let url = format!("{}/embeddings", self.base_url);
        let mut last_error = EmbeddingError::Http("no attempt made".to_string());

        // 재시도 루프 (429 에러/전송 실패 시 지수 백오프)
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff(attempt - 1);
                tracing::warn!(
                    "Embedding request failed ({}), retrying in {:?} (attempt {}/{})",
                    last_error,
                    backoff,
                    attempt,
                    self.max_retries
                );
                tokio::time::sleep(backoff).await;
            }

            let response = match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = EmbeddingError::Http(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            // 본문 수신 중 끊김도 전송 실패로 재시도
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error =
                        EmbeddingError::Http(format!("Failed to read response body: {}", e));
                    continue;
                }
            };

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = EmbeddingError::RateLimited;
                continue;
            }

            if !status.is_success() {
                let message = serde_json::from_str::<ApiErrorBody>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                tracing::error!("Embedding API error {}: {}", status, message);
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: EmbedResponse = serde_json::from_str(&body)
                .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

            if parsed.data.len() != texts.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: texts.len(),
                    actual: parsed.data.len(),
                });
            }

            let mut data = parsed.data;
            data.sort_by_key(|d| d.index);
            return Ok(data.into_iter().map(|d| d.embedding).collect());
        }

        Err(last_error)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
