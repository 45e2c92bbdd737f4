//! Charting an expression on demand, without an alert.

use std::sync::Arc;
use std::time::Duration;

use alertplot_core::QueryWindow;
use alertplot_expr::decompose;
use alertplot_render::Renderer;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::render_blocking;
use crate::prometheus::MetricSource;

/// Charts the first threshold condition of `expression` over `window`.
///
/// Every returned series is drawn; there are no alert labels to select by.
///
/// # Errors
///
/// Fails if the expression does not parse or has no threshold comparison,
/// and on query or render errors.
pub async fn plot_expression<M: MetricSource>(
    source: &M,
    renderer: Arc<Renderer>,
    expression: &str,
    window: QueryWindow,
    step: Duration,
) -> Result<Vec<u8>, PipelineError> {
    let conditions = decompose(expression)?;
    let Some(condition) = conditions.first() else {
        return Err(PipelineError::NoConditions(expression.to_string()));
    };
    if conditions.len() > 1 {
        warn!(
            conditions = conditions.len(),
            "expression has several conditions, charting the first"
        );
    }

    info!(condition = %condition, start = %window.start(), end = %window.end, "plotting");
    let series = source.query_range(&condition.formula, window, step).await?;
    render_blocking(renderer, series, condition).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertplot_core::{Sample, TimeSeries};
    use alertplot_render::RenderConfig;
    use chrono::{TimeDelta, TimeZone, Utc};

    use crate::pipeline::tests::FakeSource;

    fn window() -> QueryWindow {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        QueryWindow::ending_at(end, TimeDelta::minutes(20))
    }

    fn renderer() -> Arc<Renderer> {
        Arc::new(Renderer::new(RenderConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn plots_first_condition() {
        let t = window().end;
        let source = FakeSource::replying(vec![Ok(vec![
            TimeSeries::new().label("job", "a").sample(Sample::new(t, "4")),
            TimeSeries::new().label("job", "b").sample(Sample::new(t, "9")),
        ])]);

        let png = plot_expression(
            &source,
            renderer(),
            "load1 > 8 and up < 1",
            window(),
            Duration::from_secs(15),
        )
        .await
        .unwrap();

        assert!(png.starts_with(b"\x89PNG"));
        let queries = source.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].0, "load1");
        assert_eq!(queries[0].1, window());
    }

    #[tokio::test]
    async fn expression_without_threshold_is_an_error() {
        let err = plot_expression(
            &FakeSource::default(),
            renderer(),
            "rate(x[5m])",
            window(),
            Duration::from_secs(15),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::NoConditions(_)));
    }

    #[tokio::test]
    async fn parse_error_is_reported() {
        let err = plot_expression(
            &FakeSource::default(),
            renderer(),
            "x >",
            window(),
            Duration::from_secs(15),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Expr(_)));
    }
}
