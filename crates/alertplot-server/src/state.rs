//! Shared state for the webhook server.

use alertplot_render::Renderer;
use chrono::TimeDelta;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::notify::{ConfiguredNotifier, MessageTemplate};
use crate::pipeline::Pipeline;
use crate::prometheus::PrometheusClient;
use crate::store::FileImageStore;

/// The pipeline wired from configuration.
pub type ServerPipeline = Pipeline<PrometheusClient, FileImageStore, ConfiguredNotifier>;

/// Shared state for the webhook server.
#[derive(Debug)]
pub struct AppState {
    config: ServerConfig,
    pipeline: ServerPipeline,
}

impl AppState {
    /// Wires the Prometheus client, renderer, image store and notifier.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the Prometheus URL is invalid, the
    /// configured font cannot be loaded, the minimum lookback is out of
    /// range or the Slack client cannot be built.
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let source = PrometheusClient::new(&config.prometheus_url, config.query_timeout)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        let renderer = Renderer::new(config.render_config())
            .map_err(|e| ServerError::Config(e.to_string()))?;
        let min_lookback = TimeDelta::from_std(config.min_lookback)
            .map_err(|e| ServerError::Config(format!("min_lookback: {e}")))?;

        let store = FileImageStore::new(&config.image_dir, &config.public_url);
        let notifier = ConfiguredNotifier::from_config(config.slack.as_ref(), config.query_timeout)
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let pipeline = Pipeline::new(source, store, notifier, renderer)
            .with_template(MessageTemplate::new(&config.message_template))
            .with_resolution(config.metric_resolution)
            .with_min_lookback(min_lookback);

        Ok(Self { config, pipeline })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the pipeline.
    pub fn pipeline(&self) -> &ServerPipeline {
        &self.pipeline
    }

    /// Get the image store.
    pub fn images(&self) -> &FileImageStore {
        self.pipeline.store()
    }
}
