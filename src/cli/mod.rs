//! CLI 모듈
//!
//! codebase-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::analysis::{ChunkListing, CodeAnalysisAgent, QueryOutcome};
use crate::collector::FileCollector;
use crate::config::{has_api_key, RagConfig};
use crate::knowledge::{LanceVectorStore, VectorStore};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "codebase-rag")]
#[command(version, about = "코드베이스 질의응답 RAG 에이전트", long_about = None)]
pub struct Cli {
    /// 벡터 인덱스 디렉토리 (기본: ~/.codebase-rag)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 컬렉션 이름
    #[arg(long, global = true)]
    pub collection: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 폴더의 소스 코드를 인덱싱
    Ingest {
        /// 수집할 폴더 경로 (재귀)
        dir: PathBuf,

        /// 청크 크기 (줄 수)
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// 코드베이스에 질문
    Query {
        /// 질문
        question: String,

        /// 검색할 청크 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 저장된 청크 목록
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// JSON 출력
        #[arg(long)]
        json: bool,
    },

    /// 상태 확인
    Status,

    /// 컬렉션 비우기
    Clear,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = RagConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(collection) = cli.collection {
        config = config.with_collection(collection);
    }

    match cli.command {
        Commands::Ingest { dir, chunk_size } => {
            if let Some(size) = chunk_size {
                config.chunk_size = size;
            }
            cmd_ingest(&config, dir).await
        }
        Commands::Query {
            question,
            top_k,
            json,
        } => {
            let top_k = top_k.unwrap_or(config.top_k);
            cmd_query(&config, &question, top_k, json).await
        }
        Commands::List { limit, json } => cmd_list(&config, limit, json).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Clear => cmd_clear(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// API 키 확인
fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export OPENAI_API_KEY=your-api-key\n  \
             또는\n  \
             export CODEBASE_RAG_API_KEY=your-api-key"
        );
    }
    Ok(())
}

/// 벡터 인덱스만 열기 (API 키 불필요)
async fn open_store(config: &RagConfig) -> Result<LanceVectorStore> {
    config.validate()?;
    LanceVectorStore::open(
        &config.data_dir,
        &config.collection,
        config.embedding_dimension,
    )
    .await
    .context("벡터 인덱스 열기 실패")
}

/// 인덱싱 명령어 (ingest)
///
/// 폴더의 소스 파일을 청크로 나눠 임베딩 후 저장합니다.
async fn cmd_ingest(config: &RagConfig, dir: PathBuf) -> Result<()> {
    require_api_key()?;

    let files = FileCollector::with_defaults().collect_directory(&dir)?;

    if files.is_empty() {
        println!("[!] 수집할 소스 파일이 없습니다.");
        return Ok(());
    }

    let total_size: usize = files.iter().map(|f| f.content.len()).sum();
    println!("[*] 수집 대상: {} 파일", files.len());
    println!("    총 크기: {}", format_bytes(total_size));
    println!("    청크 크기: {} 줄", config.chunk_size);
    println!();

    let agent = CodeAnalysisAgent::open(config)
        .await
        .context("에이전트 초기화 실패")?;

    println!("[*] 임베딩 생성 및 저장 중...");
    let report = agent.ingest(&files).await;

    for failure in &report.failures {
        println!("[!] {} 실패: {}", failure.chunk_id, failure.error);
    }

    println!();
    println!(
        "[OK] 완료: 파일 {}, 청크 성공 {}, 실패 {}",
        report.file_count,
        report.stored_count(),
        report.failed_count()
    );

    Ok(())
}

/// 질의 명령어 (query)
async fn cmd_query(config: &RagConfig, question: &str, top_k: usize, json: bool) -> Result<()> {
    require_api_key()?;

    let agent = CodeAnalysisAgent::open(config)
        .await
        .context("에이전트 초기화 실패")?;

    if !json {
        println!("[*] 질의 중: \"{}\"", question);
    }

    let result = agent.query(question, top_k).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let marker = match result.outcome {
        QueryOutcome::Answered => "[OK]",
        QueryOutcome::NoMatch | QueryOutcome::OutOfScope | QueryOutcome::RetrievalFailed => "[!]",
    };

    println!();
    println!("{} {}", marker, result.response);

    if !result.retrieved_docs.is_empty() {
        println!();
        println!("참조 청크 ({} 건):", result.retrieved_docs.len());
        for (i, doc) in result.retrieved_docs.iter().enumerate() {
            println!("  {}. {} #{}", i + 1, doc.file_path, doc.sequence_index);
        }
    }

    Ok(())
}

/// 목록 명령어 (list)
async fn cmd_list(config: &RagConfig, limit: usize, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let listing = ChunkListing::from_store(&store, limit)
        .await
        .context("청크 목록 조회 실패")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.chunks.is_empty() {
        println!("[!] 저장된 청크가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 청크 ({} 건):\n", listing.total_chunks);

    for chunk in &listing.chunks {
        println!("  {} #{}", chunk.file, chunk.chunk_id);
        println!("        {}", truncate_text(&chunk.snippet, 80));
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("codebase-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 컬렉션: {}", config.collection);
    println!(
        "[*] 모델: {} / {} ({}차원)",
        config.chat_model, config.embedding_model, config.embedding_dimension
    );

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    match open_store(config).await {
        Ok(store) => match store.count().await {
            Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
            Err(e) => println!("[!] 통계 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 벡터 인덱스 열기 실패: {:#}", e),
    }

    Ok(())
}

/// 초기화 명령어 (clear)
async fn cmd_clear(config: &RagConfig) -> Result<()> {
    let store = open_store(config).await?;
    let before = store.count().await.unwrap_or(0);

    store.clear().await.context("컬렉션 비우기 실패")?;

    println!(
        "[OK] 컬렉션 '{}' 비움 ({} 청크 삭제)",
        config.collection, before
    );
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
