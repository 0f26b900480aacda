//! 파일 수집 모듈
//!
//! 로컬 코드베이스 폴더를 걸으며 소스 파일을 읽어 [`SourceFile`]로 반환합니다.
//! .gitignore 패턴을 존중하고, 코드 확장자만 수집합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::knowledge::SourceFile;

/// 수집 대상 소스 코드 확장자 (소문자)
pub const CODE_EXTENSIONS: &[&str] = &[
    "py", "java", "js", "sql", "jsx", "ts", "tsx", "rs", "go", "c", "h", "cpp", "hpp", "cc",
    "cs", "rb", "php", "kt", "kts", "swift", "scala", "sh", "bash", "lua", "dart", "vue",
];

/// 기본 최대 파일 크기 (2 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// 확장자가 코드 파일인지 확인
pub fn is_code_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            CODE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// 추가로 허용할 확장자
    pub extra_extensions: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            extra_extensions: vec![],
        }
    }
}

/// 소스 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 수집기 생성
    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 폴더 재귀 수집
    ///
    /// 경로는 `root` 기준 상대 경로(`/` 구분)로 기록되며, 결과는 경로 순으로 정렬됩니다.
    /// 읽지 못한 파일은 경고만 남기고 건너뜁니다.
    pub fn collect_directory(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let abs_root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };

        if !abs_root.exists() {
            anyhow::bail!("Directory not found: {:?}", abs_root);
        }

        if !abs_root.is_dir() {
            anyhow::bail!("Not a directory: {:?}", abs_root);
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&abs_root)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            // .git 디렉토리가 없어도 .gitignore 적용
            .require_git(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            let path = entry.path();
            if !self.should_include(path) {
                continue;
            }

            match self.read_file(&abs_root, path) {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to collect file: {:#}", e),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!("Collected {} source files from {:?}", files.len(), abs_root);
        Ok(files)
    }

    /// 단일 파일 읽기 (크기 제한 초과 시 None)
    fn read_file(&self, root: &Path, path: &Path) -> Result<Option<SourceFile>> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if self.config.max_file_size > 0 && metadata.len() > self.config.max_file_size {
            tracing::debug!("Skipping large file: {:?} ({} bytes)", path, metadata.len());
            return Ok(None);
        }

        let bytes = std::fs::read(path).with_context(|| format!("Failed to read: {:?}", path))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        Ok(Some(SourceFile::new(relative_path(root, path), content)))
    }

    fn should_include(&self, path: &Path) -> bool {
        if is_code_file(path) {
            return true;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.config
                    .extra_extensions
                    .iter()
                    .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// `root` 기준 상대 경로 (구분자는 `/`)
fn relative_path(root: &Path, path: &Path) -> String {
    let relative: PathBuf = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Tests
// ============================================================================
