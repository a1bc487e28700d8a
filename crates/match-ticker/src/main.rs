//! match-ticker 入口
//!
//! 加载配置、初始化可观测性、打开设置存储，然后按子命令启动播报服务
//! 或执行一次管理操作。

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::info;

use match_ticker::admin::TickerAdmin;
use match_ticker::cli::{self, Cli, Commands};
use match_ticker::runtime::{self, Ticker};
use ticker_shared::config::AppConfig;
use ticker_shared::{observability, settings};

const SERVICE_NAME: &str = "match-ticker";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(SERVICE_NAME)?;
    if let Some(level) = cli.log_level.clone() {
        config.observability.log_level = level;
    }

    // 管理命令是一次性进程，不启动指标端口
    if cli.command != Commands::Run {
        config.observability.metrics_enabled = false;
    }
    let _guard = observability::init(&config.service_name, &config.observability).await?;

    let store = settings::open(&config).await?;

    match cli.command {
        Commands::Run => {
            info!(
                environment = %config.environment,
                backend = ?config.settings.backend,
                transport = ?config.delivery.transport,
                "Starting {}...",
                SERVICE_NAME
            );

            let (poller, delivery) = runtime::assemble(&config, store)?;
            let ticker = Ticker::start(poller, delivery)?;

            shutdown_signal().await;
            ticker.shutdown().await;
            info!("Service shutdown complete");
        }
        Commands::LastMatch { member } => {
            let fetcher = runtime::lookup(&config, store)?;
            cli::run_last_match(&fetcher, &member).await?;
        }
        command => {
            let admin = TickerAdmin::new(store);
            cli::run_admin(&admin, command).await?;
        }
    }

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
