//! Command-line argument parsing with clap.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{ServerConfig, DEFAULT_MESSAGE_TEMPLATE};

/// alertplot - charts for Alertmanager notifications.
#[derive(Parser, Debug, Clone)]
#[command(name = "alertplot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Shared settings.
    #[command(flatten)]
    pub settings: Settings,

    /// Subcommand to execute; defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the webhook server.
    Serve,

    /// Chart an expression once and write the PNG to a file.
    Plot(PlotArgs),
}

/// Arguments for the plot command.
#[derive(Args, Debug, Clone)]
pub struct PlotArgs {
    /// Alerting expression, e.g. `rate(errors_total[5m]) > 0.1`.
    #[arg(short, long)]
    pub expr: String,

    /// Minutes of history to chart, ending now.
    #[arg(short, long, default_value_t = 20)]
    pub since_mins: u64,

    /// Output file.
    #[arg(short, long, default_value = "alertplot.png")]
    pub out: PathBuf,
}

/// Settings shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Address to listen on.
    #[arg(long, env = "ALERTPLOT_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Prometheus base URL.
    #[arg(long, env = "ALERTPLOT_PROMETHEUS_URL", default_value = "http://localhost:9090")]
    pub prometheus_url: String,

    /// Range query step in seconds.
    #[arg(long, env = "ALERTPLOT_METRIC_RESOLUTION", default_value_t = 15)]
    pub metric_resolution_secs: u64,

    /// Timeout in seconds for range queries and Slack posts.
    #[arg(long, env = "ALERTPLOT_QUERY_TIMEOUT", default_value_t = 10)]
    pub query_timeout_secs: u64,

    /// Minimum chart span in minutes.
    #[arg(long, env = "ALERTPLOT_MIN_LOOKBACK", default_value_t = 20)]
    pub min_lookback_mins: u64,

    /// Directory for rendered charts.
    #[arg(long, env = "ALERTPLOT_IMAGE_DIR", default_value = "./images")]
    pub image_dir: PathBuf,

    /// Public base URL of this server.
    #[arg(long, env = "ALERTPLOT_PUBLIC_URL", default_value = "http://localhost:8080")]
    pub public_url: String,

    /// Slack bot token.
    #[arg(long, env = "ALERTPLOT_SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    /// Slack channel.
    #[arg(long, env = "ALERTPLOT_SLACK_CHANNEL")]
    pub slack_channel: Option<String>,

    /// Chat message template.
    #[arg(long, env = "ALERTPLOT_MESSAGE_TEMPLATE", default_value = DEFAULT_MESSAGE_TEMPLATE)]
    pub message_template: String,

    /// TrueType/OpenType font for chart text.
    #[arg(long, env = "ALERTPLOT_FONT")]
    pub font: Option<PathBuf>,

    /// Chart resolution in dots per inch.
    #[arg(long, env = "ALERTPLOT_DPI", default_value_t = 96.0)]
    pub dpi: f32,

    /// Answer 200 even when charts fail, so Alertmanager does not resend
    /// the group.
    #[arg(long, env = "ALERTPLOT_NO_RETRY")]
    pub no_retry: bool,

    /// Log raw webhook request bodies.
    #[arg(short, long, env = "ALERTPLOT_DEBUG")]
    pub debug: bool,
}

impl Settings {
    /// Builds the server configuration.
    #[must_use]
    pub fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::new(self.listen)
            .with_prometheus_url(self.prometheus_url)
            .with_metric_resolution(Duration::from_secs(self.metric_resolution_secs))
            .with_query_timeout(Duration::from_secs(self.query_timeout_secs))
            .with_min_lookback(Duration::from_secs(self.min_lookback_mins * 60))
            .with_image_dir(self.image_dir)
            .with_public_url(self.public_url)
            .with_message_template(self.message_template)
            .with_dpi(self.dpi)
            .with_retry_failed(!self.no_retry)
            .with_debug(self.debug);

        if let (Some(token), Some(channel)) = (self.slack_token, self.slack_channel) {
            config = config.with_slack(token, channel);
        }
        if let Some(font) = self.font {
            config = config.with_font(font);
        }
        config
    }
}
