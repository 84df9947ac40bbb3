//! # Termination signals for [`Application::run`](crate::Application::run).
//!
//! **Unix:** `SIGINT`, `SIGTERM` (systemd, Kubernetes) and `SIGQUIT`.
//! **Other platforms:** Ctrl-C.

/// Completes when the process receives a termination signal.
///
/// Fails if the signal listeners cannot be registered.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    tracing::debug!(signal = name, "termination signal");
    Ok(())
}

/// Completes when the process receives Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::debug!(signal = "ctrl-c", "termination signal");
    Ok(())
}
