//! Analysis 모듈 - 질의 파이프라인
//!
//! - RelevanceGate: 코드 관련 질문 판별
//! - ContextBudgeter: 토큰 예산 내 컨텍스트 조립
//! - PromptTemplate / AnswerSynthesizer: 프롬프트 채우기 + 답변 생성
//! - CodeAnalysisAgent: 수집/질의 오케스트레이션

mod agent;
mod budget;
mod gate;
mod prompt;
mod synthesizer;

// Re-exports
pub use agent::{
    AgentStats, ChunkFailure, ChunkListing, ChunkSummary, CodeAnalysisAgent, IngestReport,
    QueryOutcome, QueryResult, NO_MATCH_MESSAGE, OUT_OF_SCOPE_MESSAGE, RETRIEVAL_ERROR_PREFIX,
};
pub use budget::{ContextBudgeter, CHUNK_SEPARATOR};
pub use gate::{KeywordGate, RelevanceGate, DEFAULT_KEYWORDS};
pub use prompt::{PromptTemplate, DEFAULT_TEMPLATE};
pub use synthesizer::{AnswerSynthesizer, SYNTHESIS_ERROR_PREFIX};
