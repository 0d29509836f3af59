//! Research pipeline: planner, parallel searchers, writer, emailer.
//!
//! Data flows `query -> SearchPlan -> [SearchResult] -> Report`, with the
//! email stage as an optional tail that never invalidates the report. Each
//! stage transition is written to the run's [`RunContext`].

pub mod prompts;

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;

use crate::agents::{Agent, AgentError, Output, RunContext, Stage};
use crate::config::Config;
use crate::llm::{LlmClient, OpenAiClient};
use crate::runner::Runner;
use crate::schema::{Report, SearchItem, SearchPlan};
use crate::tools::{EmailSendResult, Tool};

use prompts::{
    planner_instructions, EMAIL_INSTRUCTIONS, EMAIL_NAME, PLANNER_NAME, SEARCH_INSTRUCTIONS,
    SEARCH_NAME, WRITER_INSTRUCTIONS, WRITER_NAME,
};

/// Stage failures that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Planning failed: {0}")]
    Planning(#[source] AgentError),

    #[error("Report writing failed: {0}")]
    Writing(#[source] AgentError),

    #[error("Writer returned an empty report")]
    EmptyReport,
}

/// Summary of one planned search, correlated with its item.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub item: SearchItem,
    pub summary: Result<String, AgentError>,
}

impl SearchResult {
    /// The summary, or the error text standing in for it.
    pub fn text(&self) -> String {
        match &self.summary {
            Ok(summary) => summary.clone(),
            Err(e) => e.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.summary.is_ok()
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub report: Report,
    pub search_results: Vec<SearchResult>,
    /// Present when the email stage ran
    pub email: Option<EmailSendResult>,
}

/// The four agents and the plan size.
pub struct ResearchPipeline {
    planner: Agent<SearchPlan>,
    searcher: Agent<String>,
    writer: Agent<Report>,
    emailer: Agent<String>,
    how_many_searches: usize,
}

impl ResearchPipeline {
    /// Pipeline backed by the configured OpenAI-compatible provider, live
    /// web search and SendGrid.
    pub fn from_config(config: &Config) -> Self {
        let llm: Arc<dyn LlmClient> =
            Arc::new(OpenAiClient::new(config.api_key.clone(), &config.api_base_url));
        Self::new(config, llm)
    }

    /// Pipeline over `llm` with the configured tools.
    pub fn new(config: &Config, llm: Arc<dyn LlmClient>) -> Self {
        Self::with_tools(config, llm, Tool::web_search(config), Tool::send_email(config))
    }

    /// Pipeline over `llm` with explicit search and send tools.
    pub fn with_tools(config: &Config, llm: Arc<dyn LlmClient>, search: Tool, send: Tool) -> Self {
        let model = config.default_model.as_str();
        let today = Utc::now().date_naive();

        Self {
            planner: Agent::new(
                PLANNER_NAME,
                planner_instructions(config.how_many_searches, today),
                model,
                llm.clone(),
            ),
            searcher: Agent::new(SEARCH_NAME, SEARCH_INSTRUCTIONS, model, llm.clone())
                .with_tool(search),
            writer: Agent::new(WRITER_NAME, WRITER_INSTRUCTIONS, model, llm.clone()),
            emailer: Agent::new(EMAIL_NAME, EMAIL_INSTRUCTIONS, model, llm).with_tool(send),
            how_many_searches: config.how_many_searches,
        }
    }

    /// Ask the planner for a search plan of at most `how_many_searches` items.
    ///
    /// An unparseable or empty plan becomes a single search for the query.
    /// A failed model call is different: with no planner reachable the
    /// later agents would fail the same way, so it ends the run with
    /// `PipelineError::Planning`.
    pub async fn plan_searches(&self, query: &str, ctx: &RunContext) -> Result<SearchPlan, PipelineError> {
        tracing::info!("Planning searches...");
        let result = Runner::run(&self.planner, &format!("Query: {}", query), ctx)
            .await
            .map_err(PipelineError::Planning)?;

        let mut plan = match result.final_output {
            Output::Typed(plan) if !plan.is_empty() => plan,
            Output::Typed(_) => {
                tracing::warn!("Planner returned no searches, falling back to the query itself");
                SearchPlan::fallback(query)
            }
            Output::Raw(_) => {
                tracing::warn!("Planner answer was not a valid plan, falling back to the query itself");
                SearchPlan::fallback(query)
            }
        };

        if plan.len() > self.how_many_searches {
            tracing::debug!(
                "Truncating plan from {} to {} searches",
                plan.len(),
                self.how_many_searches
            );
            plan.searches.truncate(self.how_many_searches);
        } else if plan.len() < self.how_many_searches {
            tracing::warn!(
                "Planner returned {} searches, expected {}",
                plan.len(),
                self.how_many_searches
            );
        }

        tracing::info!("Will perform {} searches", plan.len());
        Ok(plan)
    }

    /// Run every planned search concurrently; results keep plan order.
    pub async fn perform_searches(&self, plan: &SearchPlan, ctx: &RunContext) -> Vec<SearchResult> {
        tracing::info!("Searching...");
        let results = join_all(plan.searches.iter().map(|item| self.search(item, ctx))).await;

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        if failed > 0 {
            tracing::warn!("Finished searching, {} of {} searches failed", failed, results.len());
        } else {
            tracing::info!("Finished searching");
        }
        results
    }

    /// Summarize the results of one search.
    pub async fn search(&self, item: &SearchItem, ctx: &RunContext) -> SearchResult {
        let summary = Runner::run(&self.searcher, &item.to_agent_input(), ctx)
            .await
            .map(|result| result.final_output.into_text());
        SearchResult {
            item: item.clone(),
            summary,
        }
    }

    /// Synthesize the report from the query and every search slot.
    pub async fn write_report(
        &self,
        query: &str,
        results: &[SearchResult],
        ctx: &RunContext,
    ) -> Result<Report, PipelineError> {
        tracing::info!("Thinking about report...");
        let result = Runner::run(&self.writer, &writer_input(query, results), ctx)
            .await
            .map_err(PipelineError::Writing)?;

        let report = match result.final_output {
            Output::Typed(report) => report,
            Output::Raw(text) => {
                tracing::warn!("Writer answer did not match the report schema, recovering the body");
                Report::from_unstructured(&text)
            }
        };

        if report.markdown_report.trim().is_empty() {
            return Err(PipelineError::EmptyReport);
        }

        tracing::info!("Finished writing report");
        Ok(report)
    }

    /// Have the email agent format and send `report` to the run's recipient.
    ///
    /// Never fails and never touches `report`; the outcome says whether an
    /// email went out.
    pub async fn send_report_email(&self, report: &Report, ctx: &RunContext) -> EmailSendResult {
        tracing::info!("Writing email...");
        let result = Runner::run_soft(&self.emailer, &report.markdown_report, ctx).await;
        let outcome = match (result.email, result.final_output) {
            (Some(sent), _) => sent,
            // A free-text agent only yields `Raw` for a failed model call.
            (None, Output::Raw(error)) => EmailSendResult::failure(ctx.recipient.as_str(), error),
            (None, Output::Typed(_)) => EmailSendResult::failure(
                ctx.recipient.as_str(),
                "Email agent produced no HTML document",
            ),
        };

        if outcome.is_success() {
            tracing::info!("Email sent to {}", outcome.sent_to);
        } else {
            tracing::warn!(
                "Email to {} not sent: {}",
                outcome.sent_to,
                outcome.message.as_deref().unwrap_or("unknown error")
            );
        }
        outcome
    }

    /// Run every stage for `query`, recording progress and the terminal
    /// state on `ctx`.
    pub async fn run(
        &self,
        query: &str,
        ctx: &RunContext,
        send_email: bool,
    ) -> Result<ResearchOutcome, PipelineError> {
        let result = self.execute(query, ctx, send_email).await;
        match &result {
            Ok(outcome) => ctx.complete(&outcome.report, outcome.email.clone()).await,
            Err(e) => ctx.fail(e.to_string()).await,
        }
        result
    }

    async fn execute(
        &self,
        query: &str,
        ctx: &RunContext,
        send_email: bool,
    ) -> Result<ResearchOutcome, PipelineError> {
        ctx.set_stage(Stage::Planning).await;
        let plan = self.plan_searches(query, ctx).await?;
        ctx.set_search_count(plan.len()).await;

        ctx.set_stage(Stage::Searching).await;
        let search_results = self.perform_searches(&plan, ctx).await;

        ctx.set_stage(Stage::Writing).await;
        let report = self.write_report(query, &search_results, ctx).await?;

        let email = if send_email {
            ctx.set_stage(Stage::Emailing).await;
            Some(self.send_report_email(&report, ctx).await)
        } else {
            None
        };

        Ok(ResearchOutcome {
            report,
            search_results,
            email,
        })
    }
}

/// Writer input: the query plus a JSON array of every slot's text.
fn writer_input(query: &str, results: &[SearchResult]) -> String {
    let texts: Vec<String> = results.iter().map(SearchResult::text).collect();
    let rendered = serde_json::to_string(&texts).unwrap_or_else(|_| format!("{:?}", texts));
    format!("Original query: {}\nSummarized search results: {}", query, rendered)
}
