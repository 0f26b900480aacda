//! 설정 모듈
//!
//! 기본값 + 환경변수 오버라이드로 구성합니다. API 키는 설정 구조체에 담지 않고
//! 호출 시점에 환경변수에서 읽습니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::knowledge::DEFAULT_CHUNK_SIZE;

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION: &str = "codebase_embeddings";

/// OpenAI 호환 API 기본 주소
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// 기본 컨텍스트 토큰 예산
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 6000;

/// 기본 검색 결과 수
pub const DEFAULT_TOP_K: usize = 5;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.codebase-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codebase-rag")
}

// ============================================================================
// RagConfig
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// 벡터 인덱스 디렉토리
    pub data_dir: PathBuf,
    /// 컬렉션(테이블) 이름
    pub collection: String,
    /// OpenAI 호환 API 주소
    pub api_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub temperature: f32,
    /// 청크 크기 (줄 수)
    pub chunk_size: usize,
    pub max_context_tokens: usize,
    pub top_k: usize,
    /// 외부 프롬프트 템플릿 (없으면 내장 템플릿)
    pub prompt_path: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            collection: DEFAULT_COLLECTION.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            temperature: 0.2,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            top_k: DEFAULT_TOP_K,
            prompt_path: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RagConfig {
    /// 환경변수를 반영한 설정 로드
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = env_var("CODEBASE_RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(collection) = env_var("CODEBASE_RAG_COLLECTION") {
            config.collection = collection;
        }
        if let Some(url) = env_var("OPENAI_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(model) = env_var("CODEBASE_RAG_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Some(model) = env_var("CODEBASE_RAG_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(dim) = env_var("CODEBASE_RAG_EMBEDDING_DIMENSION") {
            config.embedding_dimension = dim
                .parse()
                .context("CODEBASE_RAG_EMBEDDING_DIMENSION must be an integer")?;
        }
        if let Some(size) = env_var("CODEBASE_RAG_CHUNK_SIZE") {
            config.chunk_size = size
                .parse()
                .context("CODEBASE_RAG_CHUNK_SIZE must be an integer")?;
        }
        if let Some(tokens) = env_var("CODEBASE_RAG_MAX_CONTEXT_TOKENS") {
            config.max_context_tokens = tokens
                .parse()
                .context("CODEBASE_RAG_MAX_CONTEXT_TOKENS must be an integer")?;
        }
        if let Some(path) = env_var("CODEBASE_RAG_PROMPT") {
            config.prompt_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// 데이터 디렉토리 지정
    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    /// 컬렉션 지정
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be at least 1");
        }
        if self.embedding_dimension == 0 {
            bail!("embedding_dimension must be at least 1");
        }
        if self.max_context_tokens == 0 {
            bail!("max_context_tokens must be at least 1");
        }
        if self.collection.trim().is_empty() {
            bail!("collection name must not be empty");
        }
        url::Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;
        Ok(())
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `OPENAI_API_KEY` 환경변수
/// 2. `CODEBASE_RAG_API_KEY` 환경변수
pub fn get_api_key() -> Option<String> {
    if let Some(key) = env_var("OPENAI_API_KEY") {
        tracing::debug!("Using API key from OPENAI_API_KEY");
        return Some(key);
    }

    if let Some(key) = env_var("CODEBASE_RAG_API_KEY") {
        tracing::debug!("Using API key from CODEBASE_RAG_API_KEY");
        return Some(key);
    }

    None
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_some()
}

/// 비어있지 않은 환경변수 값
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.collection, "codebase_embeddings");
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.max_context_tokens, 6000);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert!(config.data_dir.ends_with(".codebase-rag"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = RagConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RagConfig {
            max_context_tokens: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RagConfig {
            embedding_dimension: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = RagConfig {
            api_base_url: "not a url".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid API base URL"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = RagConfig::default()
            .with_data_dir("/tmp/rag")
            .with_collection("project_a");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/rag"));
        assert_eq!(config.collection, "project_a");
    }
}
