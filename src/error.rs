//! 에러 타입
//!
//! 외부 호출 경계(임베딩, 벡터 인덱스, 언어 모델)마다 구분 가능한 에러를 정의합니다.
//! 애플리케이션 레이어(CLI, 설정)는 `anyhow`를 사용합니다.

use thiserror::Error;

/// 임베딩 호출 실패
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding API key not set (OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("embedding request failed: {0}")]
    Http(String),

    #[error("embedding rate limit exceeded (429)")]
    RateLimited,

    #[error("embedding API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// 벡터 인덱스 실패
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to open vector index: {0}")]
    Open(String),

    #[error("failed to write chunk {id}: {reason}")]
    Write { id: String, reason: String },

    #[error("failed to read vector index: {0}")]
    Read(String),

    #[error("embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// 언어 모델 호출 실패
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("language model API key not set (OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("language model request failed: {0}")]
    Http(String),

    #[error("language model rate limit exceeded (429)")]
    RateLimited,

    #[error("language model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed language model response: {0}")]
    MalformedResponse(String),

    #[error("language model returned no content")]
    EmptyResponse,
}

/// 청크 단위 수집 실패
///
/// 한 청크의 실패는 배치 전체를 중단시키지 않습니다.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// 프롬프트 템플릿 오류
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("prompt template is missing placeholder {{{0}}}")]
    MissingPlaceholder(&'static str),

    #[error("prompt template has unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("failed to read prompt template: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid placeholder pattern: {0}")]
    Pattern(#[from] regex::Error),
}
