//! Structured output shapes exchanged between pipeline stages.
//!
//! Each shape knows its own JSON schema, which agents append verbatim to
//! their system prompt so the model answers with conforming JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Declared output type of an agent.
///
/// Free-text agents use `String`, which carries no schema and accepts any
/// completion as-is.
pub trait OutputSchema: Sized + Send + Sync + 'static {
    /// JSON schema appended to the system prompt, if any.
    fn json_schema() -> Option<Value>;

    /// Build an instance from a parsed JSON document.
    fn from_json(value: Value) -> Result<Self, serde_json::Error>;
}

impl OutputSchema for String {
    fn json_schema() -> Option<Value> {
        None
    }

    fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

fn from_json_value<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}

/// One planned web search and why it matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Reasoning for why this search is important to the query
    pub reason: String,
    /// The search term to use
    pub query: String,
}

impl SearchItem {
    pub fn new(reason: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            query: query.into(),
        }
    }

    /// Input handed to the search agent for this item.
    pub fn to_agent_input(&self) -> String {
        format!("Search term: {}\nReason for searching: {}", self.query, self.reason)
    }
}

/// Ordered list of searches produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub searches: Vec<SearchItem>,
}

impl SearchPlan {
    /// Plan used when the planner's answer cannot be used: one search for
    /// the query itself.
    pub fn fallback(query: &str) -> Self {
        Self {
            searches: vec![SearchItem::new(
                "Fallback search for the original query",
                query.trim(),
            )],
        }
    }

    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }
}

impl OutputSchema for SearchPlan {
    fn json_schema() -> Option<Value> {
        Some(json!({
            "title": "WebSearchPlan",
            "type": "object",
            "properties": {
                "searches": {
                    "type": "array",
                    "description": "A list of web searches to perform to best answer the query.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "reason": {
                                "type": "string",
                                "description": "Your reasoning for why this search is important to the query."
                            },
                            "query": {
                                "type": "string",
                                "description": "The search term to be used to find the information."
                            }
                        },
                        "required": ["reason", "query"]
                    }
                }
            },
            "required": ["searches"]
        }))
    }

    fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        from_json_value(value)
    }
}

/// The finished research report.
///
/// Only `markdown_report` is mandatory on input; a missing summary is
/// derived from the markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// A short 2-3 sentence summary of the findings
    #[serde(default)]
    pub short_summary: String,
    /// The full report in markdown
    pub markdown_report: String,
    /// Suggested topics to research further
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// First non-empty line of `markdown` with heading markers removed.
fn first_line_summary(markdown: &str) -> String {
    markdown
        .lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

impl Report {
    /// Report built from a writer answer that was not valid JSON: the whole
    /// text becomes the markdown body.
    pub fn from_raw_markdown(text: &str) -> Self {
        let markdown = text.trim().to_string();
        let short_summary = first_line_summary(&markdown);
        Self {
            short_summary,
            markdown_report: markdown,
            follow_up_questions: Vec::new(),
        }
    }
}

impl Report {
    /// Report from a writer answer that did not match the schema.
    ///
    /// A JSON object carrying a non-empty `markdown_report` string keeps that
    /// body (and its `short_summary`, when usable); any other text becomes the
    /// markdown itself.
    pub fn from_unstructured(text: &str) -> Self {
        let trimmed = text.trim();
        let span = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => trimmed,
        };

        if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(span) {
            let markdown = fields
                .get("markdown_report")
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty());
            if let Some(markdown) = markdown {
                let mut report = Self::from_raw_markdown(markdown);
                if let Some(summary) = fields
                    .get("short_summary")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                {
                    report.short_summary = summary.trim().to_string();
                }
                return report;
            }
        }

        Self::from_raw_markdown(text)
    }
}

impl OutputSchema for Report {
    fn json_schema() -> Option<Value> {
        Some(json!({
            "title": "ReportData",
            "type": "object",
            "properties": {
                "short_summary": {
                    "type": "string",
                    "description": "A short 2-3 sentence summary of the findings."
                },
                "markdown_report": {
                    "type": "string",
                    "description": "The final report"
                },
                "follow_up_questions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Suggested topics to research further"
                }
            },
            "required": ["short_summary", "markdown_report", "follow_up_questions"]
        }))
    }

    fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let mut report: Report = from_json_value(value)?;
        if report.short_summary.trim().is_empty() {
            report.short_summary = first_line_summary(&report.markdown_report);
        }
        Ok(report)
    }
}
