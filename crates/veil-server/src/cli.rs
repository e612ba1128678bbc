//! CLI module for veil-server.
//!
//! This module provides the command-line interface that can be used either
//! as a standalone binary or as a subcommand of the main veil CLI.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use veil_auth::MemoryAuth;
use veil_config::{
    CliOverrides, Config, LoggingConfig, apply_overrides, load_or_default, validate_config,
};

use crate::site::{SiteInfo, lookup_isp};
use crate::{CancellationToken, run_with_shutdown};

/// veil server CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "veil-server", version, about = "WebSocket tunnel endpoint for Vless and Trojan")]
pub struct ServerArgs {
    /// Config file path (json/jsonc/yaml/toml). Optional; every setting has a default.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Load the config file (if any), apply CLI/env overrides and validate.
pub fn resolve_config(args: &ServerArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = load_or_default(args.config.as_deref())?;
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config)?;
    Ok(config)
}

/// Run the veil server with the given arguments.
///
/// This is the main entry point for the server CLI, used by both the
/// standalone binary and the unified veil CLI.
pub async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;

    init_tracing(&config.logging);
    install_panic_hook();
    info!(version = veil_core::VERSION, "{} starting", veil_core::PROJECT_NAME);

    if let Some(listen) = &config.metrics.listen {
        match veil_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    let auth = MemoryAuth::from_uuid(&config.auth.uuid)?;
    run_with_shutdown(config, auth, shutdown).await?;
    Ok(())
}

/// Print the subscription body for the given configuration and exit.
///
/// Needs `site.domain` (or `--domain` / `DOMAIN`), since there is no request
/// `Host` header to fall back on.
pub async fn print_subscription(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;
    if config.site.domain.as_deref().is_none_or(str::is_empty) {
        return Err("a domain is required (site.domain, --domain or DOMAIN)".into());
    }
    let isp = if config.site.geoip_enabled {
        lookup_isp(
            &config.site.geoip_url,
            Duration::from_millis(config.site.geoip_timeout_ms),
        )
        .await
    } else {
        veil_core::DEFAULT_ISP_LABEL.to_string()
    };
    let site = SiteInfo::from_config(&config, isp);
    print!("{}", site.subscription(None));
    Ok(())
}

/// Route panics through `tracing` so they land in the configured log sink.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(location = %location, "panic: {}", message);
    }));
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn filter_directives(config: &LoggingConfig) -> String {
    let base_level = config.level.as_deref().unwrap_or("info");
    let mut filter_str = base_level.to_string();

    let mut modules: Vec<_> = config.filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }
    filter_str
}

/// Initialize tracing subscriber with the given logging configuration.
///
/// Supports:
/// - `level`: Base log level (trace, debug, info, warn, error)
/// - `format`: Output format (json, pretty, compact). Default: pretty
/// - `output`: Output target (stdout, stderr). Default: stderr
/// - `filters`: Per-module log level overrides
fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(filter_directives(config))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    match (format, output) {
        ("json", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .init();
        }
        ("json", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        ("compact", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stdout))
                .init();
        }
        ("compact", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        (_, "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stdout))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_string_includes_module_overrides() {
        let mut cfg = LoggingConfig {
            level: Some("warn".into()),
            ..Default::default()
        };
        cfg.filters.insert("veil_dns".into(), "debug".into());
        cfg.filters.insert("rustls".into(), "error".into());
        assert_eq!(filter_directives(&cfg), "warn,rustls=error,veil_dns=debug");
        assert_eq!(filter_directives(&LoggingConfig::default()), "info");
    }

    #[test]
    fn args_parse_with_optional_config() {
        let args = ServerArgs::try_parse_from([
            "veil-server",
            "--uuid",
            "6cf627de-1a2b-4c3d-9e8f-706152433425",
            "--listen",
            "127.0.0.1:0",
        ])
        .unwrap();
        assert!(args.config.is_none());
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:0");
    }

    #[test]
    fn missing_uuid_fails_validation() {
        let args = ServerArgs {
            config: None,
            overrides: CliOverrides::default(),
        };
        assert!(resolve_config(&args).is_err());
    }
}
