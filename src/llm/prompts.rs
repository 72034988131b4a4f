use crate::error::{QaError, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(\w+)\}").unwrap();
}

/// Text with `{name}` placeholders, filled in a single pass so substituted
/// values are never re-expanded.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    pub fn variables(&self) -> Vec<&'static str> {
        PLACEHOLDER
            .captures_iter(self.template)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    pub fn format(&self, values: &[(&str, &str)]) -> Result<String> {
        let values: HashMap<&str, &str> = values.iter().copied().collect();
        if let Some(missing) = self.variables().into_iter().find(|v| !values.contains_key(v)) {
            return Err(QaError::InvalidConfiguration(format!(
                "prompt variable '{}' was not provided",
                missing
            )));
        }

        Ok(PLACEHOLDER
            .replace_all(self.template, |caps: &Captures| values[&caps[1]].to_string())
            .into_owned())
    }
}

/// Asks for an answer with a trailing `SOURCES:` line over `{summaries}`.
pub const COMBINE_PROMPT: PromptTemplate = PromptTemplate::new(
    "Given the following extracted parts of a long document and a question, \
create a final answer with references (\"SOURCES\").
If you don't know the answer, just say that you don't know. Don't try to make up an answer.
ALWAYS return a \"SOURCES\" part in your answer, listing the Source values you used.

QUESTION: {question}
=========
{summaries}
=========
FINAL ANSWER:",
);

/// How one document is rendered inside `{summaries}`.
pub const DOCUMENT_PROMPT: PromptTemplate = PromptTemplate::new("Content: {page_content}\nSource: {source}");

/// Per-document extraction step of map_reduce.
pub const MAP_PROMPT: PromptTemplate = PromptTemplate::new(
    "Use the following portion of a long document to see if any of the text is relevant to answer the question.
Return any relevant text verbatim.
{context}
Question: {question}
Relevant text, if any:",
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fills_every_placeholder() {
        let prompt = MAP_PROMPT
            .format(&[("context", "Justice Breyer retired."), ("question", "Who retired?")])
            .unwrap();
        assert!(prompt.contains("Justice Breyer retired.\nQuestion: Who retired?"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_values_are_not_reexpanded() {
        let prompt = DOCUMENT_PROMPT
            .format(&[("page_content", "literal {source} text"), ("source", "3")])
            .unwrap();
        assert_eq!(prompt, "Content: literal {source} text\nSource: 3");
    }

    #[test]
    fn test_missing_variable() {
        assert!(matches!(
            COMBINE_PROMPT.format(&[("question", "q")]),
            Err(QaError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_variables() {
        assert_eq!(COMBINE_PROMPT.variables(), vec!["question", "summaries"]);
    }
}
