use crate::document::{Document, Metadata};
use crate::error::{QaError, Result};
use crate::llm::prompts::{COMBINE_PROMPT, DOCUMENT_PROMPT, MAP_PROMPT};
use crate::providers::traits::CompletionProvider;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_TOKEN_MAX: usize = crate::config::DEFAULT_TOKEN_MAX;

lazy_static! {
    static ref SOURCES_LINE: Regex = Regex::new(r"(?im)^[ \t]*SOURCES?:").unwrap();
    static ref SOURCES_MARKER: Regex = Regex::new(r"(?i)\bSOURCES?:").unwrap();
    static ref QUESTION_MARKER: Regex = Regex::new(r"(?i)\bQUESTION:").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    /// Every document goes into one prompt.
    Stuff,
    /// One extraction call per document, then one combining call.
    MapReduce,
}

impl FromStr for ChainType {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stuff" => Ok(Self::Stuff),
            "map_reduce" => Ok(Self::MapReduce),
            other => Err(QaError::InvalidConfiguration(format!(
                "unknown chain type '{}', expected 'stuff' or 'map_reduce'",
                other
            ))),
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stuff => write!(f, "stuff"),
            Self::MapReduce => write!(f, "map_reduce"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub intermediate_steps: Option<Vec<String>>,
}

fn until_question(text: &str) -> &str {
    QUESTION_MARKER.find(text).map_or(text, |m| &text[..m.start()])
}

/// Splits model output into the answer and a de-duplicated list of source
/// labels.
///
/// A `SOURCES:` marker opening a line wins over one inside a sentence. Only
/// the first non-empty line after the marker holds labels, and anything from
/// a `QUESTION:` marker on is dropped from both parts.
pub fn parse_answer(output: &str) -> (String, Vec<String>) {
    let marker = SOURCES_LINE
        .find(output)
        .or_else(|| SOURCES_MARKER.find_iter(output).last());
    let Some(marker) = marker else {
        return (output.trim().to_string(), Vec::new());
    };

    let answer = until_question(&output[..marker.start()]).trim().to_string();
    let line = output[marker.end()..]
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    let mut sources: Vec<String> = Vec::new();
    for label in until_question(line).split(',') {
        let label = label.trim().trim_end_matches('.').trim();
        if !label.is_empty() && !sources.iter().any(|s| s == label) {
            sources.push(label.to_string());
        }
    }
    (answer, sources)
}

/// Rough token count, one per whitespace-separated word.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

fn format_document(document: &Document) -> Result<String> {
    let source = document.source().unwrap_or_default();
    DOCUMENT_PROMPT.format(&[
        ("page_content", document.page_content.as_str()),
        ("source", source.as_str()),
    ])
}

fn format_documents(documents: &[Document]) -> Result<String> {
    Ok(documents
        .iter()
        .map(format_document)
        .collect::<Result<Vec<_>>>()?
        .join("\n\n"))
}

/// Joins each metadata key's values across a group with ", ".
fn merge_metadata(documents: &[Document]) -> Metadata {
    let mut keys: Vec<&String> = documents.iter().flat_map(|d| d.metadata.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .map(|key| {
            let joined = documents
                .iter()
                .filter_map(|d| d.metadata.get(key))
                .map(|value| match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            (key.clone(), serde_json::Value::String(joined))
        })
        .collect()
}

/// Answers a question over a given set of documents, citing their sources.
#[derive(Clone)]
pub struct QaWithSourcesChain {
    llm: Arc<dyn CompletionProvider>,
    chain_type: ChainType,
    return_intermediate_steps: bool,
    token_max: usize,
}

impl QaWithSourcesChain {
    pub fn new(llm: Arc<dyn CompletionProvider>, chain_type: ChainType) -> Self {
        Self {
            llm,
            chain_type,
            return_intermediate_steps: false,
            token_max: DEFAULT_TOKEN_MAX,
        }
    }

    /// Only map_reduce produces intermediate steps.
    pub fn with_intermediate_steps(mut self, return_intermediate_steps: bool) -> Self {
        self.return_intermediate_steps = return_intermediate_steps;
        self
    }

    pub fn with_token_max(mut self, token_max: usize) -> Self {
        self.token_max = token_max.max(1);
        self
    }

    pub fn chain_type(&self) -> ChainType {
        self.chain_type
    }

    pub async fn answer(&self, documents: &[Document], question: &str) -> Result<AnswerResult> {
        log::info!(
            "Answering with {} over {} documents",
            self.chain_type,
            documents.len()
        );

        let (output, steps) = match self.chain_type {
            ChainType::Stuff => (self.stuff(documents, question).await?, None),
            ChainType::MapReduce => {
                let (output, steps) = self.map_reduce(documents, question).await?;
                (output, self.return_intermediate_steps.then_some(steps))
            }
        };

        let (answer, sources) = parse_answer(&output);
        Ok(AnswerResult {
            answer,
            sources,
            intermediate_steps: steps,
        })
    }

    async fn stuff(&self, documents: &[Document], question: &str) -> Result<String> {
        let summaries = format_documents(documents)?;
        let prompt = COMBINE_PROMPT.format(&[("question", question), ("summaries", summaries.as_str())])?;
        self.llm.complete(&prompt).await
    }

    async fn map_reduce(&self, documents: &[Document], question: &str) -> Result<(String, Vec<String>)> {
        let mut steps = Vec::with_capacity(documents.len());
        for (i, document) in documents.iter().enumerate() {
            let prompt = MAP_PROMPT.format(&[
                ("context", document.page_content.as_str()),
                ("question", question),
            ])?;
            log::debug!("Map step {}/{}", i + 1, documents.len());
            steps.push(self.llm.complete(&prompt).await?);
        }

        let mapped: Vec<Document> = steps
            .iter()
            .zip(documents)
            .map(|(step, document)| Document::with_metadata(step.clone(), document.metadata.clone()))
            .collect();

        let collapsed = self.collapse(mapped, question).await?;
        let output = self.stuff(&collapsed, question).await?;
        Ok((output, steps))
    }

    /// Combines groups of mapped documents until they fit in `token_max`.
    async fn collapse(&self, mut documents: Vec<Document>, question: &str) -> Result<Vec<Document>> {
        loop {
            let total: usize = documents.iter().map(|d| estimate_tokens(&d.page_content)).sum();
            if total <= self.token_max || documents.len() <= 1 {
                return Ok(documents);
            }

            let groups = self.group_by_budget(&documents);
            if groups.len() >= documents.len() {
                log::warn!(
                    "Cannot collapse {} documents ({} tokens) below token_max {}",
                    documents.len(),
                    total,
                    self.token_max
                );
                return Ok(documents);
            }

            log::debug!("Collapsing {} documents into {}", documents.len(), groups.len());
            let mut collapsed = Vec::with_capacity(groups.len());
            for group in groups {
                let output = self.stuff(group, question).await?;
                collapsed.push(Document::with_metadata(output, merge_metadata(group)));
            }
            documents = collapsed;
        }
    }

    fn group_by_budget<'a>(&self, documents: &'a [Document]) -> Vec<&'a [Document]> {
        let mut groups = Vec::new();
        let mut start = 0;
        let mut tokens = 0;
        for (i, document) in documents.iter().enumerate() {
            let doc_tokens = estimate_tokens(&document.page_content);
            if i > start && tokens + doc_tokens > self.token_max {
                groups.push(&documents[start..i]);
                start = i;
                tokens = 0;
            }
            tokens += doc_tokens;
        }
        groups.push(&documents[start..]);
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ordinal_sources;
    use crate::test_support::ScriptedProvider;

    fn documents() -> Vec<Document> {
        let texts = [
            "One of the most serious constitutional responsibilities is nominating a Justice.",
            "Justice Breyer, thank you for your service.",
            "We are cutting energy costs.",
        ];
        texts
            .iter()
            .zip(ordinal_sources(texts.len()))
            .map(|(text, metadata)| Document::with_metadata(*text, metadata))
            .collect()
    }

    fn responder(prompt: &str) -> Result<String> {
        if prompt.contains("Relevant text, if any:") {
            if prompt.contains("Breyer, thank you") {
                Ok("Justice Breyer, thank you for your service.".to_string())
            } else {
                Ok("None".to_string())
            }
        } else {
            Ok("The president thanked Justice Breyer for his service.\nSOURCES: 1".to_string())
        }
    }

    #[test]
    fn test_chain_type_parsing() {
        assert_eq!("stuff".parse::<ChainType>().unwrap(), ChainType::Stuff);
        assert_eq!("MAP_REDUCE".parse::<ChainType>().unwrap(), ChainType::MapReduce);
        assert!(matches!("refine".parse::<ChainType>(), Err(QaError::InvalidConfiguration(_))));
        assert_eq!(ChainType::MapReduce.to_string(), "map_reduce");
    }

    #[test]
    fn test_parse_answer() {
        let (answer, sources) = parse_answer("He thanked him.\nSOURCES: 1, 3, 1.");
        assert_eq!(answer, "He thanked him.");
        assert_eq!(sources, vec!["1", "3"]);

        let (answer, sources) = parse_answer("He thanked him. Source: speech.txt");
        assert_eq!(answer, "He thanked him.");
        assert_eq!(sources, vec!["speech.txt"]);

        let (answer, sources) = parse_answer("  I don't know.  ");
        assert_eq!(answer, "I don't know.");
        assert!(sources.is_empty());
    }

    #[test]
    fn test_parse_answer_ignores_text_after_sources_line() {
        let (answer, sources) = parse_answer(
            "He thanked him.\nSOURCES: 1\n\nQUESTION: What else did he say?\nFINAL ANSWER: nothing",
        );
        assert_eq!(answer, "He thanked him.");
        assert_eq!(sources, vec!["1"]);

        let (answer, sources) = parse_answer("He thanked him.\nSOURCES: 2, 0 QUESTION: Anything else?");
        assert_eq!(answer, "He thanked him.");
        assert_eq!(sources, vec!["2", "0"]);
    }

    #[test]
    fn test_parse_answer_keeps_source_word_inside_answer() {
        let (answer, sources) = parse_answer("Open source: the bill is funded.\nSOURCES: 1");
        assert_eq!(answer, "Open source: the bill is funded.");
        assert_eq!(sources, vec!["1"]);

        let (answer, sources) = parse_answer("He thanked him.\nSOURCES:\n3, 4");
        assert_eq!(answer, "He thanked him.");
        assert_eq!(sources, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_stuff_sends_one_prompt_with_all_documents() {
        let llm = ScriptedProvider::new(responder);
        let chain = QaWithSourcesChain::new(Arc::new(llm.clone()), ChainType::Stuff)
            .with_intermediate_steps(true);

        let result = chain.answer(&documents(), "What about Justice Breyer?").await.unwrap();

        assert_eq!(result.answer, "The president thanked Justice Breyer for his service.");
        assert_eq!(result.sources, vec!["1"]);
        assert_eq!(result.intermediate_steps, None);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("QUESTION: What about Justice Breyer?"));
        assert!(prompts[0].contains("Content: We are cutting energy costs.\nSource: 2"));
    }

    #[tokio::test]
    async fn test_map_reduce_returns_one_step_per_document() {
        let llm = ScriptedProvider::new(responder);
        let chain = QaWithSourcesChain::new(Arc::new(llm.clone()), ChainType::MapReduce)
            .with_intermediate_steps(true);

        let result = chain.answer(&documents(), "What about Justice Breyer?").await.unwrap();

        assert!(!result.answer.is_empty());
        assert_eq!(result.sources, vec!["1"]);
        let steps = result.intermediate_steps.unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1], "Justice Breyer, thank you for your service.");
        assert_eq!(steps[0], "None");

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 4);
        // The combine prompt carries the mapped text under the original source labels.
        assert!(prompts[3].contains("Content: Justice Breyer, thank you for your service.\nSource: 1"));
    }

    #[tokio::test]
    async fn test_map_reduce_without_intermediate_steps() {
        let chain = QaWithSourcesChain::new(Arc::new(ScriptedProvider::new(responder)), ChainType::MapReduce);
        let result = chain.answer(&documents(), "q").await.unwrap();
        assert_eq!(result.intermediate_steps, None);
    }

    #[tokio::test]
    async fn test_stuff_and_map_reduce_both_answer() {
        for chain_type in [ChainType::Stuff, ChainType::MapReduce] {
            let chain = QaWithSourcesChain::new(Arc::new(ScriptedProvider::new(responder)), chain_type);
            let result = chain.answer(&documents(), "What about Justice Breyer?").await.unwrap();
            assert!(!result.answer.is_empty(), "{} gave an empty answer", chain_type);
        }
    }

    #[tokio::test]
    async fn test_map_reduce_over_no_documents() {
        let llm = ScriptedProvider::new(responder);
        let chain = QaWithSourcesChain::new(Arc::new(llm.clone()), ChainType::MapReduce)
            .with_intermediate_steps(true);

        let result = chain.answer(&[], "q").await.unwrap();
        assert_eq!(result.intermediate_steps, Some(vec![]));
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_collapse_merges_sources() {
        // Each mapped step is 4 words; a budget of 9 forces pairs to be combined.
        let llm = ScriptedProvider::new(|prompt: &str| {
            if prompt.contains("Relevant text, if any:") {
                Ok("four words of text".to_string())
            } else {
                Ok("short\nSOURCES: x".to_string())
            }
        });
        let chain = QaWithSourcesChain::new(Arc::new(llm.clone()), ChainType::MapReduce)
            .with_token_max(9);

        let docs: Vec<Document> = ["a", "b", "c", "d"]
            .iter()
            .zip(ordinal_sources(4))
            .map(|(text, metadata)| Document::with_metadata(*text, metadata))
            .collect();
        chain.answer(&docs, "q").await.unwrap();

        let prompts = llm.prompts();
        // 4 map calls, 2 collapse calls, 1 final combine.
        assert_eq!(prompts.len(), 7);
        assert!(prompts[4].contains("Source: 0\n\nContent: four words of text\nSource: 1"));
        assert!(prompts[6].contains("Source: 0, 1"));
        assert!(prompts[6].contains("Source: 2, 3"));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        for chain_type in [ChainType::Stuff, ChainType::MapReduce] {
            let chain = QaWithSourcesChain::new(Arc::new(ScriptedProvider::failing()), chain_type);
            assert!(matches!(
                chain.answer(&documents(), "q").await,
                Err(QaError::LanguageModel(_))
            ));
        }
    }

    #[test]
    fn test_answer_result_json_omits_missing_steps() {
        let result = AnswerResult {
            answer: "a".to_string(),
            sources: vec!["0".to_string()],
            intermediate_steps: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"answer": "a", "sources": ["0"]}));
    }
}
