//! In-crate fakes for the LLM, search and mail seams.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{ChatMessage, ChatOptions, ChatResponse, LlmClient, LlmError};
use crate::tools::{Mailer, OutgoingEmail, SearchBackend, ToolError};

type Responder = dyn Fn(&str, &str) -> Result<String, LlmError> + Send + Sync;
type Delay = dyn Fn(&str) -> Duration + Send + Sync;

/// One recorded `chat_completion` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

/// LLM whose answers are computed from `(system, user)` by a closure.
pub struct ScriptedLlm {
    responder: Box<Responder>,
    delay: Option<Box<Delay>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Sleep for `delay(user)` before answering.
    pub fn with_delay<F, D>(responder: F, delay: D) -> Arc<Self>
    where
        F: Fn(&str, &str) -> Result<String, LlmError> + Send + Sync + 'static,
        D: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            delay: Some(Box::new(delay)),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Always answer with `text`.
    pub fn reply(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            options,
        });

        let system = messages.first().map(|m| m.content.as_str()).unwrap_or("");
        let user = messages.get(1).map(|m| m.content.as_str()).unwrap_or("");

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(user)).await;
        }

        let content = (self.responder)(system, user)?;
        Ok(ChatResponse {
            content: Some(content),
            finish_reason: Some("stop".to_string()),
            usage: None,
            model: Some(model.to_string()),
        })
    }
}

/// Search backend answering every query with a canned digest.
pub struct FakeSearch {
    fail_on: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_on: None,
            queries: Mutex::new(Vec::new()),
        })
    }

    /// Fails for `query`, answers everything else.
    pub fn failing_on(query: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(query.to_string()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for FakeSearch {
    fn name(&self) -> &str {
        "fake_search"
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail_on.as_deref() == Some(query) {
            return Err(ToolError::Blocked("captcha".to_string()));
        }
        Ok(format!("Results for {}", query))
    }
}

/// Mailer that records every email and accepts it with 202.
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<u16, ToolError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(202)
    }
}
