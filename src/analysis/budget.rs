//! Context Budgeter - 검색된 청크를 토큰 예산 내로 자르기
//!
//! 대상 언어 모델과 같은 BPE 토크나이저로 토큰 수를 셉니다.
//! 예산 초과 시 앞에서부터 `max_tokens` 토큰만 남기는 단순 접두 절단입니다.

use anyhow::{Context, Result};
use tiktoken_rs::CoreBPE;

use crate::config::DEFAULT_MAX_CONTEXT_TOKENS;

/// 청크 구분자 (빈 줄)
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// 컨텍스트 예산 관리자
#[derive(Clone)]
pub struct ContextBudgeter {
    bpe: CoreBPE,
    max_tokens: usize,
}

impl std::fmt::Debug for ContextBudgeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBudgeter")
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ContextBudgeter {
    /// 모델 이름에 맞는 토크나이저로 생성
    ///
    /// 알 수 없는 모델은 `cl100k_base`로 대체합니다.
    pub fn for_model(model: &str, max_tokens: usize) -> Result<Self> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(e) => {
                tracing::debug!("No tokenizer for model {} ({}), using cl100k_base", model, e);
                tiktoken_rs::cl100k_base().context("Failed to load cl100k_base tokenizer")?
            }
        };

        Ok(Self { bpe, max_tokens })
    }

    /// gpt-4o-mini 토크나이저 + 기본 예산
    pub fn with_defaults() -> Result<Self> {
        Self::for_model("gpt-4o-mini", DEFAULT_MAX_CONTEXT_TOKENS)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// 토큰 수 계산
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// 청크들을 검색 순서대로 빈 줄로 이어 붙이고 예산 내로 자르기
    pub fn budget<S: AsRef<str>>(&self, chunks: &[S]) -> String {
        self.budget_with_limit(chunks, self.max_tokens)
    }

    /// 예산을 지정하여 [`budget`](Self::budget) 수행
    pub fn budget_with_limit<S: AsRef<str>>(&self, chunks: &[S], max_tokens: usize) -> String {
        let joined = chunks
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR);

        self.truncate(&joined, max_tokens)
    }

    /// 텍스트를 `max_tokens` 토큰 이하로 자르기
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        // 토큰 경계가 UTF-8 문자 중간이거나 재토큰화 시 늘어나면 한 토큰씩 줄임
        let mut keep = max_tokens;
        while keep > 0 {
            if let Ok(prefix) = self.bpe.decode(tokens[..keep].to_vec()) {
                if self.count_tokens(&prefix) <= max_tokens {
                    tracing::warn!(
                        "Context trimmed from {} tokens -> {} (budget {})",
                        tokens.len(),
                        keep,
                        max_tokens
                    );
                    return prefix;
                }
            }
            keep -= 1;
        }

        tracing::warn!(
            "Context trimmed from {} tokens -> 0 (budget {})",
            tokens.len(),
            max_tokens
        );
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budgeter(max_tokens: usize) -> ContextBudgeter {
        ContextBudgeter::for_model("gpt-4o-mini", max_tokens).unwrap()
    }

    #[test]
    fn test_under_budget_is_unchanged() {
        let b = budgeter(6000);
        let chunks = vec!["def login(user):".to_string(), "    return True".to_string()];
        assert_eq!(b.budget(&chunks), "def login(user):\n\n    return True");
    }

    #[test]
    fn test_order_is_preserved() {
        let b = budgeter(6000);
        let out = b.budget(&["best", "second", "third"]);
        assert_eq!(out, "best\n\nsecond\n\nthird");
    }

    #[test]
    fn test_over_budget_is_prefix_within_ceiling() {
        let b = budgeter(50);
        let chunk = (0..200)
            .map(|i| format!("let value_{} = compute({});", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = vec![chunk.clone(), chunk];
        let joined = chunks.join(CHUNK_SEPARATOR);

        let out = b.budget(&chunks);
        assert!(b.count_tokens(&out) <= 50);
        assert!(!out.is_empty());
        assert!(joined.starts_with(&out));
    }

    #[test]
    fn test_ceiling_holds_for_multibyte_text() {
        let text = "함수가 에러를 반환합니다 🚀 ".repeat(100);
        for limit in [1, 7, 33, 100] {
            let b = budgeter(limit);
            let out = b.budget(&[text.as_str()]);
            assert!(b.count_tokens(&out) <= limit, "limit={}", limit);
        }
    }

    #[test]
    fn test_budget_with_limit_overrides_default() {
        let b = budgeter(6000);
        let text = "word ".repeat(100);
        let out = b.budget_with_limit(&[text.as_str()], 10);
        assert!(b.count_tokens(&out) <= 10);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let b = ContextBudgeter::for_model("my-local-model", 100).unwrap();
        assert!(b.count_tokens("hello world") > 0);
        assert_eq!(b.max_tokens(), 100);
    }

    #[test]
    fn test_empty_chunks() {
        let b = budgeter(10);
        let chunks: Vec<String> = vec![];
        assert_eq!(b.budget(&chunks), "");
    }

    mod proptest_budget {
        use super::*;
        use proptest::prelude::*;
        use std::sync::OnceLock;

        fn shared() -> &'static ContextBudgeter {
            static BUDGETER: OnceLock<ContextBudgeter> = OnceLock::new();
            BUDGETER.get_or_init(|| budgeter(DEFAULT_MAX_CONTEXT_TOKENS))
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(128))]

            #[test]
            fn budget_never_exceeds_ceiling(
                chunks in prop::collection::vec("\\PC{0,300}", 0..8),
                limit in 1usize..200,
            ) {
                let b = shared();
                let out = b.budget_with_limit(&chunks, limit);

                prop_assert!(b.count_tokens(&out) <= limit);
                prop_assert!(chunks.join(CHUNK_SEPARATOR).starts_with(&out));
            }

            #[test]
            fn multibyte_budget_never_exceeds_ceiling(
                chunks in prop::collection::vec("[가-힣ぁ-ん🚀😀 \n]{0,200}", 1..5),
                limit in 1usize..100,
            ) {
                let b = shared();
                let out = b.budget_with_limit(&chunks, limit);

                prop_assert!(b.count_tokens(&out) <= limit);
                prop_assert!(chunks.join(CHUNK_SEPARATOR).starts_with(&out));
            }
        }
    }
}
