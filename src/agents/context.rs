//! Per-run execution context.
//!
//! Every pipeline run owns one [`RunContext`]: the email recipient for that
//! run and its status record. Nothing here is global, so concurrent runs
//! never observe each other's recipient or progress.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::schema::Report;
use crate::tools::EmailSendResult;

/// Pipeline stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Pending,
    Planning,
    Searching,
    Writing,
    Emailing,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Human-readable progress line shown while in this stage.
    pub fn progress_message(&self) -> &'static str {
        match self {
            Stage::Pending => "Queued",
            Stage::Planning => "Planning searches...",
            Stage::Searching => "Performing web searches...",
            Stage::Writing => "Thinking about report...",
            Stage::Emailing => "Generating and sending report...",
            Stage::Done => "Complete!",
            Stage::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Planning => "planning",
            Stage::Searching => "searching",
            Stage::Writing => "writing",
            Stage::Emailing => "emailing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Observable state of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStatus {
    pub id: Uuid,
    pub topic: String,
    pub recipient: String,
    pub stage: Stage,
    pub is_running: bool,
    pub progress: String,
    pub completed: bool,
    pub error: Option<String>,

    /// Number of searches in the executed plan
    pub search_count: usize,

    pub summary: Option<String>,
    pub follow_up_questions: Vec<String>,

    /// Outcome of the email stage, when it ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailSendResult>,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunStatus {
    fn new(id: Uuid, topic: String, recipient: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            topic,
            recipient,
            stage: Stage::Pending,
            is_running: false,
            progress: Stage::Pending.progress_message().to_string(),
            completed: false,
            error: None,
            search_count: 0,
            summary: None,
            follow_up_questions: Vec::new(),
            email: None,
            started_at: now,
            updated_at: now,
        }
    }
}

/// Context threaded through every stage and agent of a single run.
///
/// Cloning is cheap; clones share the same status record.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identifier of the run
    pub run_id: Uuid,

    /// Address the email stage delivers to
    pub recipient: String,

    status: Arc<RwLock<RunStatus>>,
}

impl RunContext {
    pub fn new(topic: impl Into<String>, recipient: impl Into<String>) -> Self {
        let run_id = Uuid::new_v4();
        let recipient = recipient.into();
        let status = RunStatus::new(run_id, topic.into(), recipient.clone());
        Self {
            run_id,
            recipient,
            status: Arc::new(RwLock::new(status)),
        }
    }

    /// Snapshot of the current status.
    pub async fn status(&self) -> RunStatus {
        self.status.read().await.clone()
    }

    /// Apply `f` to the status record.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut RunStatus),
    {
        let mut status = self.status.write().await;
        f(&mut status);
        status.updated_at = Utc::now();
    }

    /// Move to `stage`, updating the progress line and running flags.
    pub async fn set_stage(&self, stage: Stage) {
        tracing::info!(run_id = %self.run_id, "Run stage: {}", stage);
        self.update(|s| {
            s.stage = stage;
            s.progress = stage.progress_message().to_string();
            s.is_running = !stage.is_terminal() && stage != Stage::Pending;
        })
        .await;
    }

    pub async fn set_search_count(&self, count: usize) {
        self.update(|s| s.search_count = count).await;
    }

    /// Record the finished report and optional email outcome as terminal.
    pub async fn complete(&self, report: &Report, email: Option<EmailSendResult>) {
        tracing::info!(run_id = %self.run_id, "Run complete");
        let progress = match &email {
            Some(result) if result.is_success() => "Complete! Report sent to your email.".to_string(),
            Some(_) => "Complete! Report generated but the email could not be sent.".to_string(),
            None => Stage::Done.progress_message().to_string(),
        };
        let summary = report.short_summary.clone();
        let follow_ups = report.follow_up_questions.clone();
        self.update(move |s| {
            s.stage = Stage::Done;
            s.is_running = false;
            s.completed = true;
            s.progress = progress;
            s.summary = Some(summary);
            s.follow_up_questions = follow_ups;
            s.email = email;
        })
        .await;
    }

    /// Record a terminal failure.
    pub async fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(run_id = %self.run_id, "Run failed: {}", message);
        self.update(move |s| {
            s.stage = Stage::Failed;
            s.is_running = false;
            s.completed = false;
            s.progress = format!("Error: {}", message);
            s.error = Some(message);
        })
        .await;
    }
}
