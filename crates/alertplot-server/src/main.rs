//! alertplot binary.
//!
//! Runs the Alertmanager webhook server, or charts a single expression.

use std::process::ExitCode;
use std::sync::Arc;

use alertplot_core::QueryWindow;
use alertplot_render::Renderer;
use alertplot_server::cli::{Cli, Command, PlotArgs};
use alertplot_server::{plot_expression, AlertplotServer, PrometheusClient, ServerConfig};
use anyhow::Context;
use chrono::{TimeDelta, Utc};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.settings.into_config();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Plot(args) => plot(config, args).await,
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    info!(
        listen = %config.listen,
        prometheus = %config.prometheus_url,
        images = %config.image_dir.display(),
        slack = config.slack.is_some(),
        "starting alertplot"
    );

    let server = AlertplotServer::new(config).context("invalid configuration")?;
    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await?;
    Ok(())
}

async fn plot(config: ServerConfig, args: PlotArgs) -> anyhow::Result<()> {
    let source = PrometheusClient::new(&config.prometheus_url, config.query_timeout)?;
    let renderer = Renderer::new(config.render_config()).context("cannot load font")?;

    let since = TimeDelta::try_minutes(i64::try_from(args.since_mins)?)
        .context("--since-mins out of range")?;
    let window = QueryWindow::ending_at(Utc::now(), since);

    let png = plot_expression(
        &source,
        Arc::new(renderer),
        &args.expr,
        window,
        config.metric_resolution,
    )
    .await?;

    tokio::fs::write(&args.out, &png)
        .await
        .with_context(|| format!("cannot write {}", args.out.display()))?;
    info!(path = %args.out.display(), bytes = png.len(), "chart written");
    Ok(())
}
