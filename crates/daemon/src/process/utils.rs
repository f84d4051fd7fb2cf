use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};

/// Time in-flight requests get to finish after SIGTERM
const SIGTERM_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Install SIGINT and SIGTERM handlers.
///
/// The returned future resolves immediately on SIGINT, or after the grace
/// period on SIGTERM. Handlers are installed before this returns so a signal
/// arriving during startup is not lost.
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()> + Send + 'static> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("SIGINT received, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!(
                    "SIGTERM received, shutting down in {}s",
                    SIGTERM_GRACE_PERIOD.as_secs()
                );
                tokio::time::sleep(SIGTERM_GRACE_PERIOD).await;
            }
        }
    })
}

/// Route panics through `tracing` so they reach the log file too
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    let build_profile = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };

    tracing::info!(
        build_profile,
        version = env!("CARGO_PKG_VERSION"),
        "custody service starting up"
    );
}
