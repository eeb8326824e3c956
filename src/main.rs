mod config;
mod http;
mod inference;
mod locator;
mod metrics;
mod reconciler;
mod report;
mod scheduler;
mod sources;
mod state;

use axum::serve;
use clap::Parser;
use config::{Config, ConfigError};
use metrics::Metrics;
use reconciler::Reconciler;
use state::StatusRecord;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

#[derive(Parser, Debug)]
#[command(name = "dlmond")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    steam_path: Option<String>,
    #[arg(long)]
    duration_secs: Option<u64>,
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            std::process::exit(1);
        }
    };

    let root = locator::locate_install_root(cfg.steam_path.as_deref());
    println!(
        "{}",
        report::banner(
            &root.display().to_string(),
            cfg.session_duration().map(|d| d.as_secs()),
            cfg.report_interval_secs,
        )
    );

    let reconciler = Reconciler::from_config(&root, &cfg);
    info!(
        steam_path = %root.display(),
        log = %reconciler.log_path().display(),
        interval_secs = cfg.reconcile_interval_secs,
        "запуск мониторинга загрузок Steam"
    );

    let shared = Arc::new(RwLock::new(StatusRecord::default()));
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = cfg.listen.clone().map(|listen| {
        let metrics = metrics.clone();
        let http_state = shared.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let app = http::build_router(metrics, http_state);
            let addr: SocketAddr = match listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %listen, "некорректный адрес listen");
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "не удалось запустить HTTP-сервер");
                    return;
                }
            };
            info!(listen = %addr, "HTTP API запущен");

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "ошибка HTTP-сервера");
            }
        })
    });

    let reconcile_task = tokio::spawn(scheduler::run_reconcile_loop(
        reconciler,
        shared.clone(),
        metrics.clone(),
        cfg.reconcile_interval(),
        shutdown_rx.clone(),
    ));

    let report_task = tokio::spawn(scheduler::run_report_loop(
        shared.clone(),
        cfg.report_interval(),
        shutdown_rx.clone(),
        std::io::stdout(),
    ));

    scheduler::wait_for_session_end(cfg.session_duration()).await;

    let _ = shutdown_tx.send(true);

    let _ = reconcile_task.await;
    let _ = report_task.await;
    if let Some(task) = http_task {
        let _ = task.await;
    }
    info!("мониторинг завершён");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load_from_file(DEFAULT_CONFIG_PATH)?
        }
        None => Config::default(),
    };

    if let Some(path) = &cli.steam_path {
        cfg.steam_path = Some(path.clone());
    }
    if let Some(secs) = cli.duration_secs {
        cfg.session_duration_secs = secs;
    }
    if let Some(listen) = &cli.listen {
        cfg.listen = Some(listen.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}
