//! Runner - executes an agent against an input.
//!
//! Stateless; this is where per-call tracing and timing live, so telemetry
//! or retry policies can be attached without touching agents.

use std::time::Instant;

use tracing::Instrument;

use crate::agents::{Agent, AgentError, AgentResult, Output, RunContext};
use crate::schema::OutputSchema;

pub struct Runner;

impl Runner {
    /// Run `agent` on `input` inside a tracing span.
    pub async fn run<T: OutputSchema>(
        agent: &Agent<T>,
        input: &str,
        ctx: &RunContext,
    ) -> Result<AgentResult<T>, AgentError> {
        let span = tracing::info_span!(
            "agent_run",
            agent = %agent.name(),
            model = %agent.model(),
            run_id = %ctx.run_id
        );

        async {
            let started = Instant::now();
            let result = agent.run(input, ctx).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(r) => tracing::info!(
                    elapsed_ms,
                    raw = r.final_output.is_raw(),
                    "{} finished",
                    agent.name()
                ),
                Err(e) => tracing::warn!(elapsed_ms, "{} failed: {}", agent.name(), e),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Like [`Runner::run`], but a model failure becomes a result whose
    /// output and raw response are both `Error in agent <name>: <msg>`.
    pub async fn run_soft<T: OutputSchema>(
        agent: &Agent<T>,
        input: &str,
        ctx: &RunContext,
    ) -> AgentResult<T> {
        match Self::run(agent, input, ctx).await {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                AgentResult {
                    final_output: Output::Raw(message.clone()),
                    raw_response: message,
                    email: None,
                }
            }
        }
    }
}
