//! Lifecycle of the custody service process: logging, startup checks, the
//! API task and graceful shutdown.
//!
//! Exit codes: 2 when signal handlers cannot be installed, 3 when service
//! state cannot be built, 4 when the API does not stop within
//! [`FINAL_SHUTDOWN_TIMEOUT`].

pub mod utils;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use common::audit::{AuditLog, AuditLogError};

use crate::http_server;
use crate::{ServiceConfig, ServiceState};

pub const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

const LOG_FILE_PREFIX: &str = "custody.log";

/// Handle on a running service.
///
/// Dropping it does not stop the service; call [`ShutdownHandle::shutdown`]
/// or send a signal, then [`ShutdownHandle::wait`].
pub struct ShutdownHandle {
    signal_task: JoinHandle<()>,
    api_task: JoinHandle<()>,
    shutdown_tx: watch::Sender<()>,
    shutdown_rx: watch::Receiver<()>,
}

impl ShutdownHandle {
    /// Block until shutdown is triggered, then until the API has drained
    pub async fn wait(mut self) {
        let _ = self.shutdown_rx.changed().await;
        self.signal_task.abort();

        match timeout(FINAL_SHUTDOWN_TIMEOUT, self.api_task).await {
            Ok(_) => tracing::info!("custody service stopped"),
            Err(_) => {
                tracing::error!(
                    "API did not stop within {} seconds",
                    FINAL_SHUTDOWN_TIMEOUT.as_secs()
                );
                std::process::exit(4);
            }
        }
    }

    /// Trigger shutdown without a signal
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn env_filter(service_config: &ServiceConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(service_config.log_level.into())
        .from_env_lossy()
}

/// Compact stdout logging plus, with a `log_dir`, a daily rolling file.
/// The returned guards flush the writers and must outlive the service.
fn init_logging(service_config: &ServiceConfig) -> Vec<WorkerGuard> {
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let mut guards = vec![stdout_guard];

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter(service_config));

    let file_layer = match service_config.log_dir.as_deref() {
        Some(log_dir) => match std::fs::create_dir_all(log_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
                let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
                guards.push(file_guard);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_writer)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(env_filter(service_config)),
                )
            }
            Err(e) => {
                // The subscriber is not up yet, so this can only go to stderr
                eprintln!(
                    "warning: file logging disabled, cannot create {}: {}",
                    log_dir.display(),
                    e
                );
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}

async fn create_state(service_config: &ServiceConfig) -> ServiceState {
    match ServiceState::from_config(service_config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating server state: {}", e);
            std::process::exit(3);
        }
    }
}

/// A broken chain is reported but does not stop the service; clients see
/// the same result from the verify endpoint.
async fn check_audit_chain(state: &ServiceState) {
    match state.database().verify().await {
        Ok(events) => tracing::info!(events, "audit chain verified"),
        Err(AuditLogError::BrokenChain(broken)) => {
            tracing::error!("audit log has been tampered with: {}", broken)
        }
        Err(e) => tracing::error!("failed to verify audit chain: {}", e),
    }
}

/// Build the service state and start the API. Returns immediately.
pub async fn start_service(service_config: &ServiceConfig) -> (ServiceState, ShutdownHandle) {
    let signal = match utils::shutdown_signal() {
        Ok(signal) => signal,
        Err(e) => {
            tracing::error!("failed to install signal handlers: {}", e);
            std::process::exit(2);
        }
    };
    let state = create_state(service_config).await;
    check_audit_chain(&state).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let signal_tx = shutdown_tx.clone();
    let signal_task = tokio::spawn(async move {
        signal.await;
        let _ = signal_tx.send(());
    });

    let api_addr = SocketAddr::from(([0, 0, 0, 0], service_config.api_port));
    let mut api_config = http_server::Config::new(api_addr)
        .with_max_upload_size(service_config.max_upload_size);
    api_config.log_level = service_config.log_level;
    let api_state = state.clone();
    let api_rx = shutdown_rx.clone();
    let api_task = tokio::spawn(async move {
        if let Err(e) = http_server::run_api(api_config, api_state, api_rx).await {
            tracing::error!("API server error: {}", e);
        }
    });

    tracing::info!("custody API listening on {}", api_addr);

    let handle = ShutdownHandle {
        signal_task,
        api_task,
        shutdown_tx,
        shutdown_rx,
    };
    (state, handle)
}

/// Run the service in the foreground until a shutdown signal. Used by the
/// `daemon` command.
pub async fn spawn_service(service_config: &ServiceConfig) {
    let _guards = init_logging(service_config);
    let (_, handle) = start_service(service_config).await;
    handle.wait().await;
}
