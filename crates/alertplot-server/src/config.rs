//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use alertplot_core::MIN_LOOKBACK_MINUTES;
use alertplot_render::RenderConfig;

/// Default chat message.
pub const DEFAULT_MESSAGE_TEMPLATE: &str =
    "[{{status}}] {{labels.alertname}}: {{annotations.summary}}";

/// Slack credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackConfig {
    /// Bot token used as bearer credential.
    pub token: String,
    /// Channel to post into.
    pub channel: String,
}

/// Configuration for the webhook server and the charting pipeline.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub listen: SocketAddr,
    /// Base URL of the Prometheus HTTP API.
    pub prometheus_url: String,
    /// Step of range queries.
    pub metric_resolution: Duration,
    /// Upper bound on a single range query or chat post.
    pub query_timeout: Duration,
    /// Minimum span of a chart.
    pub min_lookback: Duration,
    /// Directory rendered charts are written to.
    pub image_dir: PathBuf,
    /// Externally reachable base URL of this server, used in image links.
    pub public_url: String,
    /// Slack delivery; charts are only logged when unset.
    pub slack: Option<SlackConfig>,
    /// Chat message template.
    pub message_template: String,
    /// Font file for chart text.
    pub font: Option<PathBuf>,
    /// Chart resolution.
    pub dpi: f32,
    /// Answer 500 when any chart fails, so Alertmanager resends the whole
    /// group. Charts already delivered for that group are posted again.
    pub retry_failed: bool,
    /// Log raw webhook bodies.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            prometheus_url: "http://localhost:9090".to_string(),
            metric_resolution: Duration::from_secs(15),
            query_timeout: Duration::from_secs(10),
            min_lookback: Duration::from_secs(MIN_LOOKBACK_MINUTES as u64 * 60),
            image_dir: PathBuf::from("./images"),
            public_url: "http://localhost:8080".to_string(),
            slack: None,
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            font: None,
            dpi: 96.0,
            retry_failed: true,
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            ..Self::default()
        }
    }

    /// Set the Prometheus base URL.
    #[must_use]
    pub fn with_prometheus_url(mut self, url: impl Into<String>) -> Self {
        self.prometheus_url = url.into();
        self
    }

    /// Set the range query step.
    #[must_use]
    pub fn with_metric_resolution(mut self, resolution: Duration) -> Self {
        self.metric_resolution = resolution;
        self
    }

    /// Set the query timeout.
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the minimum chart span.
    #[must_use]
    pub fn with_min_lookback(mut self, lookback: Duration) -> Self {
        self.min_lookback = lookback;
        self
    }

    /// Set the image directory.
    #[must_use]
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Set the public base URL.
    #[must_use]
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// Enable Slack delivery.
    #[must_use]
    pub fn with_slack(mut self, token: impl Into<String>, channel: impl Into<String>) -> Self {
        self.slack = Some(SlackConfig {
            token: token.into(),
            channel: channel.into(),
        });
        self
    }

    /// Set the chat message template.
    #[must_use]
    pub fn with_message_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = template.into();
        self
    }

    /// Set the chart font.
    #[must_use]
    pub fn with_font(mut self, font: impl Into<PathBuf>) -> Self {
        self.font = Some(font.into());
        self
    }

    /// Set the chart resolution.
    #[must_use]
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Choose whether failed charts make Alertmanager retry.
    #[must_use]
    pub fn with_retry_failed(mut self, enabled: bool) -> Self {
        self.retry_failed = enabled;
        self
    }

    /// Enable request body logging.
    #[must_use]
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Chart settings derived from this configuration.
    #[must_use]
    pub fn render_config(&self) -> RenderConfig {
        let config = RenderConfig::default().with_dpi(self.dpi);
        match &self.font {
            Some(font) => config.with_font_path(font),
            None => config,
        }
    }
}
