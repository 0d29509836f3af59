//! Email delivery through the SendGrid v3 API.
//!
//! Sending never fails a pipeline run: [`send_email`] folds every provider,
//! network or credential problem into an [`EmailSendResult`] with
//! `status: error`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Mailer, ToolError};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// A fully addressed HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Success,
    Error,
}

/// Outcome of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSendResult {
    pub status: EmailStatus,
    /// Provider status code, when the provider answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Diagnostic text for failed sends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub sent_to: String,
}

impl EmailSendResult {
    /// Error result for a send that never reached the provider.
    pub fn failure(sent_to: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: EmailStatus::Error,
            code: None,
            message: Some(message.into()),
            sent_to: sent_to.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EmailStatus::Success
    }
}

/// Send `email` and report the outcome without propagating errors.
pub async fn send_email(mailer: &dyn Mailer, email: &OutgoingEmail) -> EmailSendResult {
    tracing::info!(
        "Sending email via {} to {} (subject: {}, {} bytes of HTML)",
        mailer.name(),
        email.to,
        email.subject,
        email.html_body.len()
    );

    match mailer.send(email).await {
        Ok(code) => EmailSendResult {
            status: EmailStatus::Success,
            code: Some(code),
            message: None,
            sent_to: email.to.clone(),
        },
        Err(e) => {
            tracing::warn!("Email to {} failed: {}", email.to, e);
            let code = match &e {
                ToolError::Status { status, .. } => Some(*status),
                _ => None,
            };
            EmailSendResult {
                status: EmailStatus::Error,
                code,
                message: Some(e.to_string()),
                sent_to: email.to.clone(),
            }
        }
    }
}

/// SendGrid transactional mail client.
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: Option<String>,
    sender: String,
}

impl SendGridMailer {
    /// A missing `api_key` is accepted here and reported on each send.
    pub fn new(api_key: Option<String>, sender: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            sender,
        }
    }

    fn request_body(&self, email: &OutgoingEmail) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.sender },
            "subject": email.subject,
            "content": [{ "type": "text/html", "value": email.html_body }]
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    fn name(&self) -> &str {
        "sendgrid"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<u16, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ToolError::MissingCredential("SENDGRID_API_KEY"))?;

        if !email.to.contains('@') {
            return Err(ToolError::InvalidInput(format!(
                "invalid recipient address '{}'",
                email.to
            )));
        }

        let response = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(api_key)
            .json(&self.request_body(email))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: "Weekly research".to_string(),
            html_body: "<html><body>hi</body></html>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_credential_is_soft_error() {
        let mailer = SendGridMailer::new(None, "sender@example.com".to_string());
        let result = send_email(&mailer, &email("user@example.com")).await;

        assert_eq!(result.status, EmailStatus::Error);
        assert_eq!(result.sent_to, "user@example.com");
        assert!(result.code.is_none());
        assert!(result.message.unwrap().contains("SENDGRID_API_KEY"));
    }

    #[tokio::test]
    async fn test_blank_credential_counts_as_missing() {
        let mailer = SendGridMailer::new(Some("  ".to_string()), "s@example.com".to_string());
        let err = mailer.send(&email("user@example.com")).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected_before_request() {
        let mailer = SendGridMailer::new(Some("SG.key".to_string()), "s@example.com".to_string());
        let result = send_email(&mailer, &email("not-an-address")).await;
        assert_eq!(result.status, EmailStatus::Error);
        assert!(result.message.unwrap().contains("invalid recipient"));
    }

    #[test]
    fn test_request_body_shape() {
        let mailer = SendGridMailer::new(None, "sender@example.com".to_string());
        let body = mailer.request_body(&email("user@example.com"));
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "user@example.com");
        assert_eq!(body["from"]["email"], "sender@example.com");
        assert_eq!(body["content"][0]["type"], "text/html");
    }

    #[test]
    fn test_result_serialization() {
        let ok = EmailSendResult {
            status: EmailStatus::Success,
            code: Some(202),
            message: None,
            sent_to: "a@b.c".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"status":"success","code":202,"sent_to":"a@b.c"}"#
        );
    }
}
