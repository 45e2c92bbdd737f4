//! Chat notifications carrying a chart.
//!
//! A [`Notifier`] delivers a [`Message`]: the text produced by a
//! [`MessageTemplate`] plus the public URL of the chart. [`SlackNotifier`]
//! posts to Slack's Web API; [`LogNotifier`] only logs, which is what runs
//! when no chat credentials are configured.

use std::future::Future;
use std::time::Duration;

use alertplot_core::Alert;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::SlackConfig;
use crate::error::NotifyError;

/// Slack Web API method used for posting.
pub const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").unwrap_or_else(|_| unreachable!())
});

/// A notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Rendered message text.
    pub text: String,
    /// Public URL of the chart.
    pub image_url: String,
    /// Short title, used as the image's alt text.
    pub title: String,
}

/// Delivers messages to people.
pub trait Notifier: Send + Sync {
    /// Sends `message`.
    fn notify(&self, message: &Message) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Renders message text from `{{key}}` placeholders.
///
/// Known keys are `status`, `image_url`, `labels.NAME` and
/// `annotations.NAME`. Anything else renders as an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    source: String,
}

impl MessageTemplate {
    /// Wraps a template string.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The template as given.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Fills the template for one alert.
    pub fn render(&self, status: &str, alert: &Alert, image_url: &str) -> String {
        PLACEHOLDER
            .replace_all(&self.source, |caps: &Captures<'_>| {
                let key = &caps[1];
                let value = match key.split_once('.') {
                    None if key == "status" => Some(status),
                    None if key == "image_url" => Some(image_url),
                    Some(("labels", name)) => alert.labels.get(name).map(String::as_str),
                    Some(("annotations", name)) => alert.annotations.get(name).map(String::as_str),
                    _ => None,
                };
                value.unwrap_or_default().to_string()
            })
            .into_owned()
    }
}

/// Posts messages with Slack's `chat.postMessage`.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    token: String,
    channel: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

impl SlackNotifier {
    /// Creates a notifier from credentials. Each post is abandoned after
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Request` if the HTTP client cannot be built.
    pub fn new(config: &SlackConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Request(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token: config.token.clone(),
            channel: config.channel.clone(),
            api_url: SLACK_POST_MESSAGE_URL.to_string(),
        })
    }

    /// Points the notifier at a different API endpoint.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Channel messages are posted to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn payload(&self, message: &Message) -> serde_json::Value {
        json!({
            "channel": self.channel,
            "text": message.text,
            "blocks": [
                {
                    "type": "section",
                    "text": {"type": "mrkdwn", "text": message.text}
                },
                {
                    "type": "image",
                    "image_url": message.image_url,
                    "alt_text": message.title
                }
            ]
        })
    }
}

impl Notifier for SlackNotifier {
    async fn notify(&self, message: &Message) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Request(format!("Slack returned HTTP {status}")));
        }

        let body: SlackResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        if !body.ok {
            return Err(NotifyError::Rejected(
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        info!(
            channel = %self.channel,
            ts = body.ts.as_deref().unwrap_or_default(),
            "slack message sent"
        );
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, message: &Message) -> Result<(), NotifyError> {
        info!(text = %message.text, image_url = %message.image_url, "chart ready");
        Ok(())
    }
}

/// The notifier selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    /// Post to Slack.
    Slack(SlackNotifier),
    /// Log only.
    Log(LogNotifier),
}

impl ConfiguredNotifier {
    /// Slack when credentials are present, logging otherwise.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Request` if the Slack client cannot be built.
    pub fn from_config(slack: Option<&SlackConfig>, timeout: Duration) -> Result<Self, NotifyError> {
        match slack {
            Some(config) => SlackNotifier::new(config, timeout).map(Self::Slack),
            None => {
                debug!("no Slack credentials, charts will only be logged");
                Ok(Self::Log(LogNotifier))
            }
        }
    }
}

impl Notifier for ConfiguredNotifier {
    async fn notify(&self, message: &Message) -> Result<(), NotifyError> {
        match self {
            Self::Slack(slack) => slack.notify(message).await,
            Self::Log(log) => log.notify(message).await,
        }
    }
}
