//! The per-alert charting pipeline.
//!
//! For every threshold condition of an alert's expression the pipeline
//! queries the metric over the alert's window, keeps the series that raised
//! the alert, renders the chart, stores it and sends the notification.

use std::sync::Arc;
use std::time::Duration;

use alertplot_core::{
    select, Alert, AlertingCondition, QueryWindow, TimeSeries, MIN_LOOKBACK_MINUTES,
};
use alertplot_expr::decompose;
use alertplot_render::Renderer;
use chrono::TimeDelta;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_MESSAGE_TEMPLATE;
use crate::error::PipelineError;
use crate::notify::{Message, MessageTemplate, Notifier};
use crate::prometheus::MetricSource;
use crate::store::ImageStore;

/// What came of charting one alert.
#[derive(Debug, Default)]
pub struct AlertOutcome {
    /// Public URLs of the charts that were delivered.
    pub image_urls: Vec<String>,
    /// Conditions that could not be charted.
    pub failures: Vec<PipelineError>,
}

impl AlertOutcome {
    /// True when no condition failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Charts alerts and delivers the charts.
#[derive(Debug)]
pub struct Pipeline<M, S, N> {
    source: M,
    store: S,
    notifier: N,
    renderer: Arc<Renderer>,
    template: MessageTemplate,
    resolution: Duration,
    min_lookback: TimeDelta,
}

impl<M, S, N> Pipeline<M, S, N>
where
    M: MetricSource,
    S: ImageStore,
    N: Notifier,
{
    /// Creates a pipeline with the default template, a 15s step and the
    /// default minimum lookback.
    pub fn new(source: M, store: S, notifier: N, renderer: Renderer) -> Self {
        Self {
            source,
            store,
            notifier,
            renderer: Arc::new(renderer),
            template: MessageTemplate::new(DEFAULT_MESSAGE_TEMPLATE),
            resolution: Duration::from_secs(15),
            min_lookback: TimeDelta::minutes(MIN_LOOKBACK_MINUTES),
        }
    }

    /// Set the message template.
    #[must_use]
    pub fn with_template(mut self, template: MessageTemplate) -> Self {
        self.template = template;
        self
    }

    /// Set the range query step.
    #[must_use]
    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the minimum chart span.
    #[must_use]
    pub fn with_min_lookback(mut self, min_lookback: TimeDelta) -> Self {
        self.min_lookback = min_lookback;
        self
    }

    /// The metric source.
    pub fn source(&self) -> &M {
        &self.source
    }

    /// The image store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The renderer shared with blocking tasks.
    pub fn renderer(&self) -> Arc<Renderer> {
        Arc::clone(&self.renderer)
    }

    /// Charts every threshold condition of `alert`.
    ///
    /// An expression that does not parse, or holds no comparison against a
    /// literal, produces no charts and no failures. Each remaining condition
    /// is charted independently; one failing does not stop the others.
    pub async fn handle_alert(&self, status: &str, alert: &Alert) -> AlertOutcome {
        let mut outcome = AlertOutcome::default();

        let conditions = match decompose(&alert.generator_expression) {
            Ok(conditions) => conditions,
            Err(e) => {
                warn!(
                    expression = %alert.generator_expression,
                    error = %e,
                    "cannot parse alerting expression, no chart"
                );
                return outcome;
            }
        };
        if conditions.is_empty() {
            info!(expression = %alert.generator_expression, "no threshold conditions to chart");
            return outcome;
        }

        let window =
            QueryWindow::with_min_lookback(alert.starts_at, alert.ends_at, self.min_lookback);
        debug!(end = %window.end, duration = %window.duration, "query window");

        for condition in &conditions {
            match self.chart_condition(status, alert, condition, window).await {
                Ok(url) => outcome.image_urls.push(url),
                Err(e) => {
                    warn!(formula = %condition.formula, error = %e, "failed to chart condition");
                    outcome.failures.push(e);
                }
            }
        }
        outcome
    }

    async fn chart_condition(
        &self,
        status: &str,
        alert: &Alert,
        condition: &AlertingCondition,
        window: QueryWindow,
    ) -> Result<String, PipelineError> {
        info!(formula = %condition.formula, "querying metric");
        let series = self
            .source
            .query_range(&condition.formula, window, self.resolution)
            .await?;

        let selected = select(&series, &alert.labels);
        if selected.is_matched() {
            debug!(series = %selected.series()[0], "best match found");
        } else {
            debug!(
                candidates = series.len(),
                "no series matches the alert labels, charting all"
            );
        }

        let png = render_blocking(
            Arc::clone(&self.renderer),
            selected.series().to_vec(),
            condition,
        )
        .await?;
        let url = self.store.put(png).await?;
        info!(url = %url, "chart stored");

        let title = if alert.summary().is_empty() {
            condition.to_string()
        } else {
            alert.summary().to_string()
        };
        let message = Message {
            text: self.template.render(status, alert, &url),
            image_url: url.clone(),
            title,
        };
        self.notifier.notify(&message).await?;
        Ok(url)
    }
}

/// Renders on the blocking pool and returns the PNG bytes.
pub(crate) async fn render_blocking(
    renderer: Arc<Renderer>,
    series: Vec<TimeSeries>,
    condition: &AlertingCondition,
) -> Result<Vec<u8>, PipelineError> {
    let (threshold, direction) = (condition.threshold, condition.direction);
    let chart =
        tokio::task::spawn_blocking(move || renderer.render(&series, threshold, direction))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;
    Ok(chart.bytes)
}
