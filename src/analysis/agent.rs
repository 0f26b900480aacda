//! Code Analysis Agent - 수집/질의 오케스트레이션
//!
//! `ingest`: Chunker → EmbeddingProvider → VectorStore
//! `query`:  RelevanceGate → (조기 종료 | 검색 → 컨텍스트 예산 → 답변 합성)
//!
//! 에이전트 자체는 호출 간 상태를 갖지 않으며 모든 상태는 벡터 인덱스에 있습니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use super::budget::ContextBudgeter;
use super::gate::{KeywordGate, RelevanceGate};
use super::prompt::PromptTemplate;
use super::synthesizer::AnswerSynthesizer;
use crate::config::RagConfig;
use crate::embedding::{EmbeddingProvider, OpenAiEmbedding};
use crate::error::{EmbeddingError, IndexError, IngestError};
use crate::knowledge::{
    Chunk, ChunkMetadata, Chunker, LanceVectorStore, LineChunker, SourceFile, VectorEntry,
    VectorStore,
};
use crate::llm::{LanguageModel, OpenAiChat};

/// 게이트 거절 응답
pub const OUT_OF_SCOPE_MESSAGE: &str = "Your question doesn't seem related to code analysis. \
     Please ask about code, errors, architecture, functions, or bugs.";

/// 검색 결과 없음 응답
pub const NO_MATCH_MESSAGE: &str = "No relevant code found for your query.";

/// 검색 실패 응답 접두어
pub const RETRIEVAL_ERROR_PREFIX: &str = "Error retrieving code: ";

/// 목록 스니펫 길이 (문자 수)
const SNIPPET_CHARS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// 질의 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    /// 게이트 거절 (모델/인덱스 호출 없음)
    OutOfScope,
    /// 검색 결과 0건
    NoMatch,
    /// 질문 임베딩 또는 검색 실패
    RetrievalFailed,
    /// 합성까지 진행 (합성 실패 메시지 포함)
    Answered,
}

/// 질의 결과
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub response: String,
    /// 검색된 청크 메타데이터 (유사도 순)
    pub retrieved_docs: Vec<ChunkMetadata>,
    pub outcome: QueryOutcome,
}

impl QueryResult {
    fn terminal(response: impl Into<String>, outcome: QueryOutcome) -> Self {
        Self {
            response: response.into(),
            retrieved_docs: vec![],
            outcome,
        }
    }
}

/// 청크 단위 수집 실패
#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk_id: String,
    pub error: IngestError,
}

/// 수집 리포트 (부분 성공도 성공)
#[derive(Debug, Default)]
pub struct IngestReport {
    /// 저장된 청크 ID (처리 순서)
    pub stored: Vec<String>,
    pub failures: Vec<ChunkFailure>,
    pub file_count: usize,
}

impl IngestReport {
    /// 청크 하나의 결과 기록
    pub fn record(&mut self, chunk_id: String, result: Result<(), IngestError>) {
        match result {
            Ok(()) => self.stored.push(chunk_id),
            Err(error) => self.failures.push(ChunkFailure { chunk_id, error }),
        }
    }

    pub fn stored_count(&self) -> usize {
        self.stored.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// 청크 목록 항목
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub file: String,
    pub chunk_id: usize,
    /// 앞 100자
    pub snippet: String,
}

/// 청크 목록
#[derive(Debug, Clone, Serialize)]
pub struct ChunkListing {
    pub total_chunks: usize,
    pub chunks: Vec<ChunkSummary>,
}

impl ChunkListing {
    /// 저장소에서 최대 `limit`개 청크 요약
    ///
    /// `total_chunks`는 이번 목록에 담긴 개수입니다. 전체 개수는 [`VectorStore::count`]를 사용합니다.
    pub async fn from_store(store: &dyn VectorStore, limit: usize) -> Result<Self, IndexError> {
        let chunks: Vec<ChunkSummary> = store
            .list(limit)
            .await?
            .into_iter()
            .map(|c| ChunkSummary {
                file: c.metadata.file_path,
                chunk_id: c.metadata.sequence_index,
                snippet: c.text.chars().take(SNIPPET_CHARS).collect(),
            })
            .collect();

        Ok(Self {
            total_chunks: chunks.len(),
            chunks,
        })
    }
}

/// 인덱스 통계
#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub chunk_count: usize,
    pub dimension: usize,
}

// ============================================================================
// CodeAnalysisAgent
// ============================================================================

/// 코드베이스 RAG 에이전트
///
/// 저장소 핸들은 명시적으로 주입합니다. 서로 다른 저장소를 가진 인스턴스를
/// 여러 개 만들 수 있습니다.
pub struct CodeAnalysisAgent {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    gate: Arc<dyn RelevanceGate>,
    chunker: Arc<dyn Chunker>,
    budgeter: ContextBudgeter,
    synthesizer: AnswerSynthesizer,
    template: PromptTemplate,
}

impl CodeAnalysisAgent {
    /// 기본 구성으로 생성
    ///
    /// 키워드 게이트, 500줄 청커, 모델 토크나이저 기반 6000 토큰 예산, 내장 템플릿을 사용합니다.
    /// 임베딩 차원과 인덱스 차원이 다르면 실패합니다.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let budgeter = ContextBudgeter::for_model(
            model.model(),
            crate::config::DEFAULT_MAX_CONTEXT_TOKENS,
        )?;
        let template = PromptTemplate::builtin().context("Built-in prompt template is invalid")?;

        Self::from_parts(
            store,
            embedder,
            model,
            Arc::new(LineChunker::default()),
            budgeter,
            template,
        )
    }

    /// 설정으로 LanceDB + OpenAI 구성 열기
    pub async fn open(config: &RagConfig) -> Result<Self> {
        config.validate()?;

        let store = LanceVectorStore::open(
            &config.data_dir,
            &config.collection,
            config.embedding_dimension,
        )
        .await
        .context("Failed to open vector index")?;

        let embedder = OpenAiEmbedding::from_config(config).context("Failed to create embedder")?;
        let model = OpenAiChat::from_config(config).context("Failed to create chat model")?;

        let template = match &config.prompt_path {
            Some(path) => PromptTemplate::load(path)
                .with_context(|| format!("Failed to load prompt template {:?}", path))?,
            None => PromptTemplate::builtin().context("Built-in prompt template is invalid")?,
        };
        let budgeter = ContextBudgeter::for_model(&config.chat_model, config.max_context_tokens)?;

        let agent = Self::from_parts(
            Arc::new(store),
            Arc::new(embedder),
            Arc::new(model),
            Arc::new(LineChunker::new(config.chunk_size)),
            budgeter,
            template,
        )?;

        tracing::info!(
            "Agent ready (collection={}, embedding={}, chat={})",
            config.collection,
            config.embedding_model,
            config.chat_model
        );

        Ok(agent)
    }

    fn from_parts(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn LanguageModel>,
        chunker: Arc<dyn Chunker>,
        budgeter: ContextBudgeter,
        template: PromptTemplate,
    ) -> Result<Self> {
        if embedder.dimension() != store.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: store.dimension(),
                actual: embedder.dimension(),
            })
            .with_context(|| {
                format!(
                    "Embedding provider {} does not match the vector index",
                    embedder.name()
                )
            });
        }

        Ok(Self {
            store,
            embedder,
            gate: Arc::new(KeywordGate::new()),
            chunker,
            budgeter,
            synthesizer: AnswerSynthesizer::new(model),
            template,
        })
    }

    pub fn with_gate(mut self, gate: Arc<dyn RelevanceGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_budgeter(mut self, budgeter: ContextBudgeter) -> Self {
        self.budgeter = budgeter;
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// 파일 수집 및 인덱싱
    ///
    /// 파일 순서, 청크 순서대로 처리합니다. 청크 하나의 임베딩/저장 실패는
    /// 기록만 하고 나머지를 계속 처리합니다.
    pub async fn ingest(&self, files: &[SourceFile]) -> IngestReport {
        let mut report = IngestReport {
            file_count: files.len(),
            ..Default::default()
        };

        for file in files {
            let chunks = self.chunker.chunk_file(&file.path, &file.content);
            tracing::debug!("Processing file: {} ({} chunks)", file.path, chunks.len());

            for chunk in chunks {
                let chunk_id = chunk.id.clone();
                let result = self.store_chunk(chunk).await;

                match &result {
                    Ok(()) => tracing::debug!("Stored chunk {}", chunk_id),
                    Err(e) => tracing::warn!("Skipping chunk {}: {}", chunk_id, e),
                }
                report.record(chunk_id, result);
            }
        }

        tracing::info!(
            "Ingested {} files: {} chunks stored, {} failed",
            report.file_count,
            report.stored_count(),
            report.failed_count()
        );

        report
    }

    async fn store_chunk(&self, chunk: Chunk) -> Result<(), IngestError> {
        let embedding = self.embedder.embed_one(&chunk.text).await?;

        self.store
            .upsert(VectorEntry {
                id: chunk.id,
                text: chunk.text,
                embedding,
                metadata: ChunkMetadata {
                    file_path: chunk.file_path,
                    sequence_index: chunk.sequence_index,
                },
            })
            .await?;

        Ok(())
    }

    /// 코드베이스 질의
    ///
    /// 어떤 경로로 끝나든 호출자에게 에러를 던지지 않습니다.
    pub async fn query(&self, question: &str, top_k: usize) -> QueryResult {
        tracing::info!("User query: {}", question);

        if !self.gate.is_in_scope(question) {
            tracing::info!("Rejected by {}: out of scope", self.gate.name());
            return QueryResult::terminal(OUT_OF_SCOPE_MESSAGE, QueryOutcome::OutOfScope);
        }

        let hits = match self.retrieve(question, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!("Retrieval failed: {}", e);
                return QueryResult::terminal(
                    format!("{}{}", RETRIEVAL_ERROR_PREFIX, e),
                    QueryOutcome::RetrievalFailed,
                );
            }
        };

        if hits.is_empty() {
            tracing::info!("No chunks matched");
            return QueryResult::terminal(NO_MATCH_MESSAGE, QueryOutcome::NoMatch);
        }

        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        let context = self.budgeter.budget(&texts);
        tracing::debug!(
            "Context budgeted: {} chunks, {} tokens",
            hits.len(),
            self.budgeter.count_tokens(&context)
        );

        let response = self
            .synthesizer
            .synthesize(question, &context, &self.template)
            .await;

        QueryResult {
            response,
            retrieved_docs: hits.into_iter().map(|h| h.metadata).collect(),
            outcome: QueryOutcome::Answered,
        }
    }

    async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<crate::knowledge::SearchResult>, RetrievalError> {
        let embedding = self.embedder.embed_one(question).await?;
        Ok(self.store.search(&embedding, top_k).await?)
    }

    /// 저장된 청크 목록 (운영 점검용)
    pub async fn list_chunks(&self, limit: usize) -> Result<ChunkListing, IndexError> {
        ChunkListing::from_store(self.store.as_ref(), limit).await
    }

    /// 인덱스 통계
    pub async fn stats(&self) -> Result<AgentStats, IndexError> {
        Ok(AgentStats {
            chunk_count: self.store.count().await?,
            dimension: self.store.dimension(),
        })
    }

    /// 인덱스 비우기
    pub async fn clear(&self) -> Result<(), IndexError> {
        self.store.clear().await
    }
}

/// 질의 시점 검색 실패
#[derive(Debug, thiserror::Error)]
enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

// ============================================================================
// Tests
// ============================================================================
