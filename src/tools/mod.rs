//! Tool system for the agents.
//!
//! Tools are the capabilities an agent can reach outside the model: searching
//! the web and sending the finished report by email. They are modelled as a
//! closed set of variants so the agent can treat each one structurally:
//! search tools run eagerly before the model call, send tools act on the
//! model's answer afterwards.
//!
//! Both capabilities sit behind small traits ([`SearchBackend`], [`Mailer`])
//! so the network providers can be swapped for fakes.

mod email;
mod web;

pub use email::{send_email, EmailSendResult, EmailStatus, OutgoingEmail, SendGridMailer};
pub use web::{extract_ddg_results, format_digest, SearchHit, WebSearch};
pub(crate) use web::html_decode;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

/// Errors raised at a tool boundary.
///
/// None of these are fatal to a pipeline run; callers turn them into
/// descriptive text or a structured error result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Search provider blocked the request: {0}")]
    Blocked(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A text-search capability.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Search for `query` and return a plain-text digest of the results.
    ///
    /// An empty result listing is a successful "no results" digest, not an
    /// error.
    async fn search(&self, query: &str) -> Result<String, ToolError>;
}

/// A transactional email capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    /// Hand the email to the provider and return its acceptance status code.
    async fn send(&self, email: &OutgoingEmail) -> Result<u16, ToolError>;
}

/// A capability configured on an agent.
#[derive(Clone)]
pub enum Tool {
    /// Runs before the model call; its digest is folded into the prompt.
    Search(Arc<dyn SearchBackend>),
    /// Made available to the model; acts on an HTML document in its answer.
    Send(Arc<dyn Mailer>),
}

impl Tool {
    /// DuckDuckGo-backed web search sized from the configuration.
    pub fn web_search(config: &Config) -> Self {
        Tool::Search(Arc::new(WebSearch::new(config.search_context.max_results())))
    }

    /// SendGrid-backed email delivery from the configuration.
    pub fn send_email(config: &Config) -> Self {
        Tool::Send(Arc::new(SendGridMailer::new(
            config.email.sendgrid_api_key.clone(),
            config.email.sender.clone(),
        )))
    }

    pub fn name(&self) -> &str {
        match self {
            Tool::Search(backend) => backend.name(),
            Tool::Send(mailer) => mailer.name(),
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tool::Search(backend) => write!(f, "Tool::Search({})", backend.name()),
            Tool::Send(mailer) => write!(f, "Tool::Send({})", mailer.name()),
        }
    }
}
