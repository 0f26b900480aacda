//! 프롬프트 템플릿
//!
//! `{user_query}`와 `{code}` 두 자리표시자를 가진 외부 텍스트 자산입니다.
//! 한 번 로드해서 재사용합니다.

use std::path::Path;

use regex::Regex;

use crate::error::TemplateError;

/// 내장 템플릿
pub const DEFAULT_TEMPLATE: &str = include_str!("../../prompts/code_analysis_prompt.txt");

/// 질문 자리표시자
pub const USER_QUERY: &str = "user_query";
/// 코드 자리표시자
pub const CODE: &str = "code";

const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// 두 자리표시자 프롬프트 템플릿
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
    placeholder: Regex,
}

impl PromptTemplate {
    /// 템플릿 문자열 파싱
    ///
    /// 두 자리표시자가 모두 있어야 하고, 그 외 자리표시자는 허용하지 않습니다.
    pub fn new(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let placeholder = Regex::new(PLACEHOLDER_PATTERN)?;

        let names: Vec<&str> = placeholder
            .captures_iter(&source)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        if let Some(unknown) = names.iter().find(|n| **n != USER_QUERY && **n != CODE) {
            return Err(TemplateError::UnknownPlaceholder(unknown.to_string()));
        }
        for required in [USER_QUERY, CODE] {
            if !names.contains(&required) {
                return Err(TemplateError::MissingPlaceholder(required));
            }
        }

        Ok(Self {
            source,
            placeholder,
        })
    }

    /// 파일에서 로드
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded prompt template from {:?}", path);
        Self::new(source)
    }

    /// 내장 템플릿
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::new(DEFAULT_TEMPLATE)
    }

    /// 자리표시자 채우기
    ///
    /// 템플릿 원문만 한 번 훑으므로 삽입된 값 안의 `{...}`는 그대로 남습니다.
    pub fn render(&self, user_query: &str, code: &str) -> String {
        self.placeholder
            .replace_all(&self.source, |caps: &regex::Captures<'_>| {
                match caps.get(1).map(|m| m.as_str()) {
                    Some(USER_QUERY) => user_query.to_string(),
                    Some(CODE) => code.to_string(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_template_is_valid() {
        let template = PromptTemplate::builtin().unwrap();
        let rendered = template.render("What does login do?", "def login(): pass");
        assert!(rendered.contains("What does login do?"));
        assert!(rendered.contains("def login(): pass"));
        assert!(!rendered.contains("{user_query}"));
        assert!(!rendered.contains("{code}"));
    }

    #[test]
    fn test_inserted_braces_are_not_rescanned() {
        let template = PromptTemplate::new("Q: {user_query}\nC: {code}").unwrap();
        let rendered = template.render("why {code}?", "fn main() { let x = {user_query}; }");
        assert_eq!(
            rendered,
            "Q: why {code}?\nC: fn main() { let x = {user_query}; }"
        );
    }

    #[test]
    fn test_missing_placeholder() {
        let err = PromptTemplate::new("Only {user_query}").unwrap_err();
        assert!(matches!(err, TemplateError::MissingPlaceholder("code")));
    }

    #[test]
    fn test_unknown_placeholder() {
        let err = PromptTemplate::new("{user_query} {code} {language}").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownPlaceholder(ref n) if n == "language"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Question: {{user_query}}\n---\n{{code}}").unwrap();

        let template = PromptTemplate::load(file.path()).unwrap();
        assert_eq!(template.render("q", "c"), "Question: q\n---\nc");
    }
}
