//! Text Chunking Module
//!
//! 소스 파일을 고정 줄 수 단위로 분할합니다.
//! 언어를 가리지 않으며 AST를 파싱하지 않습니다. 청크 간 오버랩은 없습니다.

use serde::{Deserialize, Serialize};

/// 줄 구분자
pub const LINE_SEPARATOR: &str = "\n";

/// 기본 청크 크기 (줄 수)
pub const DEFAULT_CHUNK_SIZE: usize = 500;

// ============================================================================
// Chunk
// ============================================================================

/// 수집된 소스 파일 (청크로 소비되며 자체는 저장하지 않음)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// 소스 파일 하나의 연속된 줄 구간
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `path + "_" + sequence_index`
    pub id: String,
    pub file_path: String,
    /// 파일 내 순번 (0-based)
    pub sequence_index: usize,
    pub text: String,
}

/// 청크 ID 생성
///
/// 경로와 순번의 결정적 함수이므로 같은 파일을 다시 수집하면 기존 엔트리를 덮어씁니다.
pub fn chunk_id(file_path: &str, sequence_index: usize) -> String {
    format!("{}_{}", file_path, sequence_index)
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;

    /// 파일 경로를 붙여 [`Chunk`] 목록 생성
    fn chunk_file(&self, file_path: &str, content: &str) -> Vec<Chunk> {
        self.chunk(content)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                id: chunk_id(file_path, sequence_index),
                file_path: file_path.to_string(),
                sequence_index,
                text,
            })
            .collect()
    }
}

// ============================================================================
// LineChunker
// ============================================================================

/// 줄 수 기반 청커
#[derive(Debug, Clone)]
pub struct LineChunker {
    chunk_size: usize,
}

impl LineChunker {
    /// 청크 크기 지정 (0은 1로 보정)
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for LineChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Chunker for LineChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        chunk_lines(text, self.chunk_size)
    }

    fn name(&self) -> &'static str {
        "LineChunker"
    }
}

/// 텍스트를 `chunk_size` 줄 단위로 분할
///
/// 마지막 청크는 더 짧을 수 있습니다. 빈 텍스트는 빈 문자열 청크 하나를 반환합니다.
/// 청크들을 순서대로 [`LINE_SEPARATOR`]로 다시 이으면 원문과 정확히 같습니다.
pub fn chunk_lines(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let lines: Vec<&str> = text.split(LINE_SEPARATOR).collect();

    lines
        .chunks(chunk_size)
        .map(|window| window.join(LINE_SEPARATOR))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
