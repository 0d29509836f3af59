//! Core types for the agent system.

use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::EmailSendResult;

/// Final output of an agent run.
///
/// `Raw` is returned when an agent declares a structured output type but the
/// model's answer could not be parsed into it, so callers must decide what a
/// degraded answer means for them.
#[derive(Debug, Clone, PartialEq)]
pub enum Output<T> {
    Typed(T),
    Raw(String),
}

impl<T> Output<T> {
    /// The typed value, if parsing succeeded.
    pub fn typed(self) -> Option<T> {
        match self {
            Output::Typed(value) => Some(value),
            Output::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Output::Raw(_))
    }
}

impl Output<String> {
    /// Text of a free-form agent; both variants carry a string.
    pub fn into_text(self) -> String {
        match self {
            Output::Typed(text) | Output::Raw(text) => text,
        }
    }
}

/// Result of one agent execution.
#[derive(Debug, Clone)]
pub struct AgentResult<T> {
    /// Parsed output, or the raw text when parsing failed
    pub final_output: Output<T>,

    /// The model's answer, plus any tool annotations appended after the call
    pub raw_response: String,

    /// Delivery made by a send tool during this run
    pub email: Option<EmailSendResult>,
}

/// Errors from running an agent.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The model provider call failed.
    #[error("Error in agent {agent}: {source}")]
    Model {
        agent: String,
        #[source]
        source: LlmError,
    },
}

impl AgentError {
    /// Name of the agent that failed.
    pub fn agent(&self) -> &str {
        match self {
            AgentError::Model { agent, .. } => agent,
        }
    }
}
