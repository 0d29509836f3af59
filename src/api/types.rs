//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::Stage;

/// Request to start a research run.
///
/// Both fields are optional at the wire level so missing values get the
/// same 400 response as invalid ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateResearchRequest {
    /// Research topic / query
    pub topic: Option<String>,

    /// Address the finished report is emailed to
    pub email: Option<String>,
}

impl CreateResearchRequest {
    /// Validated `(topic, email)`, or the message for a 400 response.
    pub fn validate(&self) -> Result<(String, String), String> {
        let topic = self.topic.as_deref().map(str::trim).unwrap_or("");
        let email = self.email.as_deref().map(str::trim).unwrap_or("");

        if topic.is_empty() || email.is_empty() {
            return Err("Please provide both email and topic".to_string());
        }
        if !email.contains('@') || !email.contains('.') {
            return Err("Please provide a valid email address".to_string());
        }
        Ok((topic.to_string(), email.to_string()))
    }
}

/// Response after starting a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResearchResponse {
    pub id: Uuid,
    pub status: Stage,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
