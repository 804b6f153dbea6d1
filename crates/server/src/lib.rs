//! HTTP services and process entry point.
//!
//! One binary runs one service per process: the Slack bot, the transaction dashboard,
//! the CSV analysis server, or the Jira notifier loop.

pub mod bootstrap;
pub mod dashboard;
pub mod eda;
pub mod health;
pub mod logging;
pub mod slack;

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use banklens_core::config::{LoadOptions, Service};
use tokio::sync::oneshot;
use tracing::{info, warn};

pub use bootstrap::{build_router, load_config, BootstrapError};
pub use logging::init_logging;

pub fn parse_service(raw: &str) -> Option<Service> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "slack" | "slack-bot" | "bot" => Some(Service::SlackBot),
        "dashboard" => Some(Service::Dashboard),
        "eda" => Some(Service::Eda),
        "notifier" | "notify" => Some(Service::Notifier),
        _ => None,
    }
}

/// Loads configuration, installs logging, and runs `service` until ctrl-c or SIGTERM.
pub async fn run(service: Service, options: LoadOptions) -> Result<()> {
    let config = load_config(options, service)?;
    init_logging(&config.logging);

    let Some(port) = bootstrap::listen_port(&config, service) else {
        let mut poller = banklens_notifier::poller_from_config(&config).await?;
        poller.run_until(shutdown_signal()).await;
        return Ok(());
    };

    let router = build_router(&config, service).await?;
    let address = format!("{}:{port}", config.server.bind_address);
    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    serve(router, &address, service, grace).await
}

async fn serve(router: Router, address: &str, service: Service, grace: Duration) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("could not bind {address}"))?;
    info!(
        event_name = "system.server.started",
        service = service.as_str(),
        bind_address = %address,
        "service listening"
    );

    let (stop, stopped) = oneshot::channel::<()>();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = stopped.await;
    });
    let server = server.into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.context("server terminated unexpectedly"),
        () = shutdown_signal() => {}
    }

    info!(event_name = "system.server.stopping", service = service.as_str(), "draining connections");
    let _ = stop.send(());
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.context("server failed while draining"),
        Err(_) => {
            warn!(
                event_name = "system.server.drain_timeout",
                grace_secs = grace.as_secs(),
                "connections still open after grace period"
            );
            Ok(())
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use banklens_core::config::Service;

    use super::parse_service;

    #[test]
    fn service_names_parse_case_insensitively() {
        assert_eq!(parse_service("Slack"), Some(Service::SlackBot));
        assert_eq!(parse_service(" dashboard "), Some(Service::Dashboard));
        assert_eq!(parse_service("eda"), Some(Service::Eda));
        assert_eq!(parse_service("notify"), Some(Service::Notifier));
        assert_eq!(parse_service("crm"), None);
    }
}
