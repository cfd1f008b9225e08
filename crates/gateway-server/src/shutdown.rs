//! Shutdown signal handling.

use tokio::signal;
use tracing::info;

/// Shutdown signal handler with multiple signal support
///
/// # Panics
/// Panics if signal handlers cannot be installed
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() -> String {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        "ctrl+c"
    };

    #[cfg(unix)]
    let sigterm = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
        "sigterm"
    };

    #[cfg(unix)]
    let sigint = async {
        signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("failed to install SIGINT handler")
            .recv()
            .await;
        "sigint"
    };

    #[cfg(unix)]
    let sigquit = async {
        signal::unix::signal(signal::unix::SignalKind::quit())
            .expect("failed to install SIGQUIT handler")
            .recv()
            .await;
        "sigquit"
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&str>();
    #[cfg(not(unix))]
    let sigint = std::future::pending::<&str>();
    #[cfg(not(unix))]
    let sigquit = std::future::pending::<&str>();

    let signal_name = tokio::select! {
        name = ctrl_c => name,
        name = sigterm => name,
        name = sigint => name,
        name = sigquit => name,
    };

    info!(signal = signal_name, "Shutdown signal received, draining connections");
    signal_name.to_string()
}
