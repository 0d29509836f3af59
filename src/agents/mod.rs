//! Agents module - LLM-backed workers of the research pipeline.
//!
//! An [`Agent`] binds instructions, a model, optional tools and a declared
//! output type. One run is a single model turn:
//! 1. search tools run eagerly and their digests are folded into the prompt
//! 2. the output schema (if any) is appended to the system prompt
//! 3. the model is called once
//! 4. a send tool delivers any HTML document found in the answer
//! 5. the answer is parsed into the output type, or kept as [`Output::Raw`]

mod context;
mod types;

pub use context::{RunContext, RunStatus, Stage};
pub use types::{AgentError, AgentResult, Output};

use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::schema::OutputSchema;
use crate::tools::{html_decode, send_email, EmailSendResult, Mailer, OutgoingEmail, Tool};

/// Subject used when the HTML document carries no `<title>`.
pub const DEFAULT_EMAIL_SUBJECT: &str = "AI Research Report";

static HTML_DOCUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<html.*?</html>").expect("valid regex"));
static HTML_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));

/// An LLM-backed agent producing `T`.
pub struct Agent<T: OutputSchema> {
    name: String,
    instructions: String,
    model: String,
    tools: Vec<Tool>,
    options: ChatOptions,
    llm: Arc<dyn LlmClient>,
    _output: PhantomData<fn() -> T>,
}

impl<T: OutputSchema> Agent<T> {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            tools: Vec::new(),
            options: ChatOptions::default(),
            llm,
            _output: PhantomData,
        }
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Instructions plus the JSON schema of the output type, if it has one.
    pub fn system_prompt(&self) -> String {
        let mut prompt = self.instructions.clone();
        if let Some(schema) = T::json_schema() {
            let pretty = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string());
            prompt.push_str("\n\nRespond with valid JSON that matches this schema:\n");
            prompt.push_str(&pretty);
        }
        prompt
    }

    /// Execute one turn against `input`.
    ///
    /// # Errors
    /// Returns `AgentError::Model` when the model call fails. Tool failures
    /// and unparseable answers are not errors.
    pub async fn run(&self, input: &str, ctx: &RunContext) -> Result<AgentResult<T>, AgentError> {
        let mut user_message = input.to_string();
        let tool_context = self.tool_context(input).await;
        if !tool_context.is_empty() {
            user_message.push_str("\n\nAdditional Context:\n");
            user_message.push_str(&tool_context);
        }

        let messages = [
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(user_message),
        ];

        let response = self
            .llm
            .chat_completion(&self.model, &messages, self.options)
            .await
            .map_err(|source| AgentError::Model {
                agent: self.name.clone(),
                source,
            })?;

        let mut raw_response = response.text().to_string();

        let mut email = None;
        if let Some(mailer) = self.mailer() {
            if let Some(result) = self.deliver_html(mailer, &raw_response, ctx).await {
                let rendered =
                    serde_json::to_string(&result).unwrap_or_else(|_| format!("{:?}", result));
                raw_response.push_str("\n\nEmail sent: ");
                raw_response.push_str(&rendered);
                email = Some(result);
            }
        }

        let final_output = parse_output::<T>(&self.name, &raw_response);
        Ok(AgentResult {
            final_output,
            raw_response,
            email,
        })
    }

    /// Run every search tool up front and describe the send tools.
    async fn tool_context(&self, input: &str) -> String {
        let mut context = String::new();
        for tool in &self.tools {
            match tool {
                Tool::Search(backend) => {
                    let query = search_query(input);
                    tracing::debug!("{}: searching '{}' via {}", self.name, query, backend.name());
                    let digest = match backend.search(query).await {
                        Ok(digest) => digest,
                        Err(e) => {
                            tracing::warn!("{}: search for '{}' failed: {}", self.name, query, e);
                            format!("Search error for query '{}': {}", query, e)
                        }
                    };
                    context.push_str("\nSearch Results:\n");
                    context.push_str(&digest);
                    context.push('\n');
                }
                Tool::Send(_) => {
                    context.push_str("\nEmail tool is available for sending emails.\n");
                }
            }
        }
        context
    }

    fn mailer(&self) -> Option<&Arc<dyn Mailer>> {
        self.tools.iter().find_map(|tool| match tool {
            Tool::Send(mailer) => Some(mailer),
            Tool::Search(_) => None,
        })
    }

    /// Send the first HTML document in `raw` to the run's recipient.
    async fn deliver_html(
        &self,
        mailer: &Arc<dyn Mailer>,
        raw: &str,
        ctx: &RunContext,
    ) -> Option<EmailSendResult> {
        let Some(html) = extract_html(raw) else {
            tracing::info!("{}: no HTML document in response, not sending email", self.name);
            return None;
        };

        let email = OutgoingEmail {
            to: ctx.recipient.clone(),
            subject: extract_title(html).unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT.to_string()),
            html_body: html.to_string(),
        };
        Some(send_email(mailer.as_ref(), &email).await)
    }
}

/// The query a search tool runs for `input`: the `Search term:` line when
/// present, otherwise the whole input.
pub fn search_query(input: &str) -> &str {
    input
        .lines()
        .find_map(|line| line.trim().strip_prefix("Search term:"))
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| input.trim())
}

/// First `<html ...>...</html>` document in `text`.
pub fn extract_html(text: &str) -> Option<&str> {
    HTML_DOCUMENT.find(text).map(|m| m.as_str())
}

/// `<title>` text as a one-line subject with entities decoded.
fn extract_title(html: &str) -> Option<String> {
    HTML_TITLE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            let decoded = html_decode(m.as_str());
            decoded.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|title| !title.is_empty())
}

/// Parse a model answer into `T`.
///
/// Tries the whole trimmed answer first, then the span from the first `{` to
/// the last `}` (models often wrap JSON in prose or code fences).
fn parse_output<T: OutputSchema>(agent: &str, raw: &str) -> Output<T> {
    if T::json_schema().is_none() {
        return match T::from_json(Value::String(raw.to_string())) {
            Ok(value) => Output::Typed(value),
            Err(_) => Output::Raw(raw.to_string()),
        };
    }

    let trimmed = raw.trim();
    let mut last_error = None;

    let mut candidates = vec![trimmed];
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            candidates.push(&trimmed[start..=end]);
        }
    }

    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate).and_then(T::from_json) {
            Ok(value) => return Output::Typed(value),
            Err(e) => last_error = Some(e),
        }
    }

    tracing::warn!(
        "Could not parse structured output for {}: {}",
        agent,
        last_error.map(|e| e.to_string()).unwrap_or_else(|| "no JSON found".to_string())
    );
    Output::Raw(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, Role};
    use crate::schema::{Report, SearchPlan};
    use crate::testing::{FakeSearch, RecordingMailer, ScriptedLlm};

    fn ctx() -> RunContext {
        RunContext::new("topic", "user@example.com")
    }

    #[tokio::test]
    async fn test_exact_json_round_trips() {
        let llm = ScriptedLlm::reply(
            r#"{"searches":[{"reason":"a","query":"q1"},{"reason":"b","query":"q2"}]}"#,
        );
        let agent: Agent<SearchPlan> = Agent::new("PlannerAgent", "plan", "gpt-4o-mini", llm);
        let result = agent.run("Query: batteries", &ctx()).await.unwrap();
        let plan = result.final_output.typed().unwrap();
        let queries: Vec<_> = plan.searches.iter().map(|s| s.query.as_str()).collect();
        assert_eq!(queries, vec!["q1", "q2"]);
    }

    #[tokio::test]
    async fn test_json_wrapped_in_prose_is_extracted() {
        let llm = ScriptedLlm::reply(
            "Here is the report:\n```json\n{\"short_summary\":\"s\",\"markdown_report\":\"# m\",\"follow_up_questions\":[\"x\",\"y\"]}\n```",
        );
        let agent: Agent<Report> = Agent::new("WriterAgent", "write", "gpt-4o-mini", llm);
        let report = agent.run("input", &ctx()).await.unwrap().final_output.typed().unwrap();
        assert_eq!(report.markdown_report, "# m");
        assert_eq!(report.follow_up_questions, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_unparseable_answer_is_raw() {
        let llm = ScriptedLlm::reply("I could not produce a plan.");
        let agent: Agent<SearchPlan> = Agent::new("PlannerAgent", "plan", "gpt-4o-mini", llm);
        let result = agent.run("Query: x", &ctx()).await.unwrap();
        assert_eq!(result.final_output, Output::Raw("I could not produce a plan.".to_string()));
        assert_eq!(result.raw_response, "I could not produce a plan.");
    }

    #[tokio::test]
    async fn test_schema_appended_to_system_prompt() {
        let llm = ScriptedLlm::reply("{}");
        let agent: Agent<SearchPlan> = Agent::new("PlannerAgent", "Plan well.", "m", llm.clone());
        let _ = agent.run("Query: x", &ctx()).await.unwrap();

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "m");
        let system = &calls[0].messages[0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.starts_with("Plan well.\n\nRespond with valid JSON that matches this schema:\n{"));
        assert!(system.content.contains("\"WebSearchPlan\""));
        assert_eq!(calls[0].options, ChatOptions::default());
    }

    #[tokio::test]
    async fn test_search_tool_runs_on_search_term() {
        let llm = ScriptedLlm::reply("summary");
        let search = FakeSearch::new();
        let agent: Agent<String> = Agent::new("Search agent", "search", "m", llm.clone())
            .with_tool(Tool::Search(search.clone()));

        let input = "Search term: battery recycling\nReason for searching: context";
        let result = agent.run(input, &ctx()).await.unwrap();
        assert_eq!(result.final_output, Output::Typed("summary".to_string()));
        assert_eq!(search.queries(), vec!["battery recycling"]);

        let user = &llm.calls()[0].messages[1].content;
        assert!(user.starts_with(input));
        assert!(user.contains("\n\nAdditional Context:\n\nSearch Results:\nResults for battery recycling"));
    }

    #[tokio::test]
    async fn test_search_tool_failure_folded_into_prompt() {
        let llm = ScriptedLlm::reply("summary");
        let search = FakeSearch::failing_on("broken");
        let agent: Agent<String> = Agent::new("Search agent", "search", "m", llm.clone())
            .with_tool(Tool::Search(search));

        let result = agent.run("Search term: broken\nReason for searching: r", &ctx()).await;
        assert!(result.is_ok());
        let user = &llm.calls()[0].messages[1].content;
        assert!(user.contains("Search error for query 'broken':"));
    }

    #[tokio::test]
    async fn test_html_sent_to_run_recipient() {
        let llm = ScriptedLlm::reply(
            "Here you go:\n<HTML><head><title>Battery Weekly</title></head><body>hi</body></HTML>\nDone.",
        );
        let mailer = RecordingMailer::new();
        let agent: Agent<String> = Agent::new("Email agent", "email", "m", llm.clone())
            .with_tool(Tool::Send(mailer.clone()));

        let result = agent.run("# Report", &ctx()).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "user@example.com");
        assert_eq!(sent[0].subject, "Battery Weekly");
        assert!(sent[0].html_body.starts_with("<HTML>"));
        assert!(sent[0].html_body.ends_with("</HTML>"));
        assert!(result.raw_response.ends_with(r#"Email sent: {"status":"success","code":202,"sent_to":"user@example.com"}"#));
        assert!(result.email.unwrap().is_success());

        let user = &llm.calls()[0].messages[1].content;
        assert!(user.contains("Email tool is available for sending emails."));
    }

    #[tokio::test]
    async fn test_html_without_title_uses_default_subject() {
        let llm = ScriptedLlm::reply("<html><body>report</body></html>");
        let mailer = RecordingMailer::new();
        let agent: Agent<String> =
            Agent::new("Email agent", "email", "m", llm).with_tool(Tool::Send(mailer.clone()));
        agent.run("# Report", &ctx()).await.unwrap();
        assert_eq!(mailer.sent()[0].subject, DEFAULT_EMAIL_SUBJECT);
    }

    #[tokio::test]
    async fn test_multiline_title_becomes_single_line_subject() {
        let llm = ScriptedLlm::reply(
            "<html><head><title>\n  EV\n  Weekly &amp; More\n</title></head><body>r</body></html>",
        );
        let mailer = RecordingMailer::new();
        let agent: Agent<String> =
            Agent::new("Email agent", "email", "m", llm).with_tool(Tool::Send(mailer.clone()));
        agent.run("# Report", &ctx()).await.unwrap();
        assert_eq!(mailer.sent()[0].subject, "EV Weekly & More");
    }

    #[tokio::test]
    async fn test_no_html_means_no_send() {
        let llm = ScriptedLlm::reply("I would rather not.");
        let mailer = RecordingMailer::new();
        let agent: Agent<String> =
            Agent::new("Email agent", "email", "m", llm).with_tool(Tool::Send(mailer.clone()));
        let result = agent.run("# Report", &ctx()).await.unwrap();
        assert!(mailer.sent().is_empty());
        assert!(result.email.is_none());
        assert_eq!(result.raw_response, "I would rather not.");
    }

    #[tokio::test]
    async fn test_model_error_is_returned() {
        let llm = ScriptedLlm::new(|_, _| Err(LlmError::network_error("timed out".to_string())));
        let agent: Agent<Report> = Agent::new("WriterAgent", "write", "m", llm);
        let err = agent.run("input", &ctx()).await.unwrap_err();
        assert_eq!(err.agent(), "WriterAgent");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_search_query_extraction() {
        assert_eq!(search_query("Search term: rust async\nReason for searching: x"), "rust async");
        assert_eq!(search_query("  plain query \n"), "plain query");
        assert_eq!(search_query("Search term:   \nmore"), "Search term:   \nmore");
    }
}
