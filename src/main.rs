//! bbplus: Barbieri+ の有料コンテンツを保存する
//!
//! 実行方法:
//! ```
//! cargo run --release -- -O ./barbieri -t 1h30m
//! ```

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tower::Service;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bbplus::cli::Cli;
use bbplus::{ArchiveRequest, ArchiveService, FileConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ログ設定
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// 全アイテム成功なら true
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let file = FileConfig::load(&cli.config_path()).context("Failed to load configuration")?;
    let config = cli.into_config(file);
    config.log_summary();

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    let mut service = ArchiveService::new();
    let report = service
        .call(ArchiveRequest::new(config))
        .await
        .context("Archive failed")?;

    for failure in &report.failures {
        error!("Failed: {}: {}", failure.url, failure.error);
    }
    info!(
        "Done: {} items archived, {} failed",
        report.items.len(),
        report.failures.len()
    );
    Ok(report.is_success())
}
