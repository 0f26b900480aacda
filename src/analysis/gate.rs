//! Relevance Gate - 질문 도메인 사전 필터
//!
//! 모델 호출 전에 코드 관련 질문인지 판별합니다. 외부 호출이 없는 순수 함수입니다.

/// 코드 관련 키워드 (소문자)
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "code",
    "bug",
    "error",
    "fix",
    "function",
    "class",
    "method",
    "java",
    "python",
    "js",
    "javascript",
    "typescript",
    "spring",
    "react",
    "node",
    "api",
    "explain this",
    "what does this do",
    "debug",
    "stacktrace",
    "compile",
    "runtime",
    "exception",
];

/// 질문 도메인 판별 전략
///
/// 키워드 휴리스틱을 모델 기반 분류기로 교체할 수 있도록 트레이트로 둡니다.
pub trait RelevanceGate: Send + Sync {
    /// 코드 분석 대상 질문이면 `true`
    fn is_in_scope(&self, question: &str) -> bool;

    /// 게이트 이름
    fn name(&self) -> &'static str;
}

/// 키워드 부분 문자열 게이트
///
/// 소문자화한 질문에 키워드 중 하나라도 포함되면 통과합니다.
#[derive(Debug, Clone)]
pub struct KeywordGate {
    keywords: Vec<String>,
}

impl KeywordGate {
    pub fn new() -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS.iter().copied())
    }

    /// 키워드 목록 지정
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// 기본 키워드에 추가
    pub fn extend<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in extra {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        self
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl Default for KeywordGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RelevanceGate for KeywordGate {
    fn is_in_scope(&self, question: &str) -> bool {
        let question = question.to_lowercase();
        self.keywords.iter().any(|k| question.contains(k.as_str()))
    }

    fn name(&self) -> &'static str {
        "KeywordGate"
    }
}
