//! Vector Store - 벡터 인덱스 트레이트 및 타입
//!
//! 청크 ID를 키로 (임베딩, 텍스트, 메타데이터)를 저장하고
//! k-최근접 이웃 검색을 제공하는 인덱스의 공통 인터페이스입니다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

// ============================================================================
// Types
// ============================================================================

/// 청크 메타데이터
///
/// 직렬화 키는 프론트엔드가 사용하는 `file` / `chunk_id`입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(rename = "file")]
    pub file_path: String,
    #[serde(rename = "chunk_id")]
    pub sequence_index: usize,
}

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 청크 ID (`path_index`)
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// 코사인 유사도 (높을수록 유사)
    pub score: f32,
}

/// 저장된 청크 (조회용)
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 같은 ID에 대한 동시 쓰기는 직렬화되며(last-writer-wins),
/// 읽기는 쓰기 도중에도 스냅샷 일관성을 유지해야 합니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 엔트리 저장 (같은 ID가 있으면 덮어쓰기)
    async fn upsert(&self, entry: VectorEntry) -> Result<(), IndexError>;

    /// 유사도 내림차순으로 최대 `k`개 검색 (빈 저장소는 빈 결과)
    async fn search(&self, query_embedding: &[f32], k: usize)
        -> Result<Vec<SearchResult>, IndexError>;

    /// 저장된 청크를 최대 `limit`개 조회
    async fn list(&self, limit: usize) -> Result<Vec<StoredChunk>, IndexError>;

    /// 저장된 청크 수
    async fn count(&self) -> Result<usize, IndexError>;

    /// 모든 청크 삭제
    async fn clear(&self) -> Result<(), IndexError>;

    /// 임베딩 차원
    fn dimension(&self) -> usize;
}
