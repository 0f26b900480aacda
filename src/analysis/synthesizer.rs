//! Answer Synthesizer - 프롬프트 채우기 + 언어 모델 호출
//!
//! 모델 호출 실패는 에러로 전파하지 않고 에러 설명 문자열로 변환합니다.

use std::sync::Arc;

use super::prompt::PromptTemplate;
use crate::llm::LanguageModel;

/// 합성 실패 시 응답 접두어
pub const SYNTHESIS_ERROR_PREFIX: &str = "Error generating analysis: ";

/// 답변 합성기
#[derive(Clone)]
pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// 답변 생성
    ///
    /// 성공 시 모델 응답 원문, 실패 시 [`SYNTHESIS_ERROR_PREFIX`]로 시작하는 설명을 반환합니다.
    pub async fn synthesize(
        &self,
        question: &str,
        context: &str,
        template: &PromptTemplate,
    ) -> String {
        let prompt = template.render(question, context);

        match self.model.complete(&prompt).await {
            Ok(text) => {
                tracing::debug!(
                    "Synthesized answer ({} chars) with {}",
                    text.len(),
                    self.model.model()
                );
                text
            }
            Err(e) => {
                tracing::error!("Synthesis failed: {}", e);
                format!("{}{}", SYNTHESIS_ERROR_PREFIX, e)
            }
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model()
    }
}
