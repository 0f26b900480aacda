//! Knowledge 모듈 - 코드 청크 벡터 인덱스
//!
//! - Chunker: 줄 수 기반 코드 분할
//! - VectorStore: 청크 ID 기반 upsert + k-NN 검색 인터페이스
//! - LanceDB: 영속 벡터 인덱스 구현

mod chunker;
mod lance;
mod vector;

// Re-exports
pub use chunker::{
    chunk_id, chunk_lines, Chunk, Chunker, LineChunker, SourceFile, DEFAULT_CHUNK_SIZE,
    LINE_SEPARATOR,
};
pub use lance::LanceVectorStore;
pub use vector::{ChunkMetadata, SearchResult, StoredChunk, VectorEntry, VectorStore};
