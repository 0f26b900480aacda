//! codebase-rag - 코드베이스 질의응답 RAG 에이전트
//!
//! 소스 파일을 줄 단위 청크로 나눠 LanceDB 벡터 인덱스에 저장하고,
//! 코드 관련 질문에 대해 유사 청크를 검색해 언어 모델로 답변을 생성합니다.

pub mod analysis;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod llm;

// Re-exports
pub use analysis::{
    AnswerSynthesizer, ChunkListing, CodeAnalysisAgent, ContextBudgeter, IngestReport,
    KeywordGate, PromptTemplate, QueryOutcome, QueryResult, RelevanceGate,
};
pub use collector::{CollectorConfig, FileCollector};
pub use config::{get_api_key, get_data_dir, has_api_key, RagConfig};
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use error::{EmbeddingError, IndexError, IngestError, SynthesisError, TemplateError};
pub use knowledge::{
    Chunk, ChunkMetadata, Chunker, LanceVectorStore, LineChunker, SearchResult, SourceFile,
    VectorEntry, VectorStore,
};
pub use llm::{LanguageModel, OpenAiChat};
