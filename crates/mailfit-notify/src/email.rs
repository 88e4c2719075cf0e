//! Completion email dispatch.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{NotifyError, NotifyResult};

/// Dispatcher invoked with the retrieval URL once a job completes.
///
/// Delivery is best-effort; a failed send never fails the job that
/// triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn job_completed(
        &self,
        recipient: &str,
        download_url: &str,
        filename: &str,
    ) -> NotifyResult<()>;
}

/// Mailgun HTTP API configuration.
#[derive(Debug, Clone)]
pub struct MailgunConfig {
    /// API key
    pub api_key: String,
    /// Sending domain
    pub domain: String,
    /// From address
    pub sender: String,
    /// API base, overridable for EU-region accounts and tests
    pub base_url: String,
}

impl MailgunConfig {
    /// Create config from environment variables; `None` when the provider
    /// is not configured at all.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("MAILGUN_API_KEY").ok()?;
        let domain = std::env::var("MAILGUN_DOMAIN").ok()?;
        Some(Self {
            api_key,
            domain,
            sender: std::env::var("SENDER_EMAIL")
                .unwrap_or_else(|_| "no-reply@mailfit.dev".to_string()),
            base_url: std::env::var("MAILGUN_BASE_URL")
                .unwrap_or_else(|_| "https://api.mailgun.net".to_string()),
        })
    }
}

/// Mailgun-backed notifier.
pub struct MailgunNotifier {
    config: MailgunConfig,
    http: reqwest::Client,
}

impl MailgunNotifier {
    pub fn new(config: MailgunConfig) -> NotifyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::config_error(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn subject() -> &'static str {
        "Your compressed video is ready"
    }

    fn body(download_url: &str, filename: &str) -> String {
        format!(
            "Hi,\n\n\
             Your video \"{filename}\" has been compressed and is ready to attach.\n\n\
             Download link (valid for 24 hours):\n{download_url}\n\n\
             Thanks for using Mailfit!\n"
        )
    }
}

#[async_trait]
impl Notifier for MailgunNotifier {
    async fn job_completed(
        &self,
        recipient: &str,
        download_url: &str,
        filename: &str,
    ) -> NotifyResult<()> {
        let url = format!("{}/v3/{}/messages", self.config.base_url, self.config.domain);
        let from = format!("Mailfit <{}>", self.config.sender);
        let body = Self::body(download_url, filename);

        let params = [
            ("from", from.as_str()),
            ("to", recipient),
            ("subject", Self::subject()),
            ("text", body.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth("api", Some(&self.config.api_key))
            .form(&params)
            .send()
            .await
            .map_err(|e| NotifyError::send_failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::send_failed(format!(
                "Mailgun returned {}",
                response.status()
            )));
        }

        info!("Sent completion email to {}", recipient);
        Ok(())
    }
}

/// Logs the link instead of sending anything.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn job_completed(
        &self,
        recipient: &str,
        download_url: &str,
        _filename: &str,
    ) -> NotifyResult<()> {
        warn!(
            "No mail provider configured; skipping completion email to {} ({})",
            recipient, download_url
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_notifier(base_url: String) -> MailgunNotifier {
        MailgunNotifier::new(MailgunConfig {
            api_key: "key-test".to_string(),
            domain: "mg.example.com".to_string(),
            sender: "no-reply@example.com".to_string(),
            base_url,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_sends_form_post_with_auth() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/mg.example.com/messages"))
            .and(basic_auth("api", "key-test"))
            .and(body_string_contains("to=user%40example.com"))
            .and(body_string_contains("holiday.mp4"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = test_notifier(server.uri());
        notifier
            .job_completed(
                "user@example.com",
                "https://files.example.com/dl?sig=abc",
                "holiday.mp4",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_rejection_surfaces_as_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let notifier = test_notifier(server.uri());
        let err = notifier
            .job_completed("user@example.com", "https://x", "a.mp4")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_body_mentions_filename_and_link() {
        let body = MailgunNotifier::body("https://files.example.com/dl", "holiday.mp4");
        assert!(body.contains("holiday.mp4"));
        assert!(body.contains("https://files.example.com/dl"));
        assert!(body.contains("24 hours"));
    }
}
