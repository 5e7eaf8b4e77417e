use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
struct Sender<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: Sender<'a>,
    #[serde(flatten)]
    message: &'a EmailMessage,
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct HttpRelayMailer {
    client: reqwest::Client,
    relay_url: String,
    api_key: Option<String>,
    from_name: String,
    from_email: String,
}

impl HttpRelayMailer {
    pub fn new(
        relay_url: impl Into<String>,
        api_key: Option<String>,
        from_name: impl Into<String>,
        from_email: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build mail relay HTTP client")?;

        Ok(Self {
            client,
            relay_url: relay_url.into(),
            api_key,
            from_name: from_name.into(),
            from_email: from_email.into(),
        })
    }
}

#[async_trait::async_trait]
impl Mailer for HttpRelayMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let body = RelayRequest {
            from: Sender {
                name: &self.from_name,
                email: &self.from_email,
            },
            message,
        };

        let mut request = self.client.post(&self.relay_url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        request
            .send()
            .await
            .context("Mail relay request failed")?
            .error_for_status()
            .context("Mail relay rejected the message")?;

        log::info!("Sent '{}' to {}", message.subject, message.to);
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        log::info!(
            "Mail delivery not configured; to={} subject='{}'\n{}",
            message.to,
            message.subject,
            message.text
        );
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<EmailMessage>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().clone()
    }
}

#[async_trait::async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.outbox.lock().push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "john@gmail.com".to_string(),
            subject: "Password reset token".to_string(),
            text: "reset link".to_string(),
        }
    }

    #[test]
    fn test_relay_request_shape() {
        let message = message();
        let body = RelayRequest {
            from: Sender {
                name: "DevCamper",
                email: "noreply@devcamper.io",
            },
            message: &message,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "from": { "name": "DevCamper", "email": "noreply@devcamper.io" },
                "to": "john@gmail.com",
                "subject": "Password reset token",
                "text": "reset link"
            })
        );
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        mailer.send(&message()).await.unwrap();
        LogMailer.send(&message()).await.unwrap();
        assert_eq!(mailer.sent(), vec![message()]);
    }
}
