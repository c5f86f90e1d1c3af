//! # Operator stop signals.
//!
//! [`termination_signal`] resolves on the first of SIGINT, SIGTERM, SIGQUIT or
//! Ctrl-C (Ctrl-C only on non-unix platforms) and names the signal for logs. The
//! orchestrator forwards it to the supervisor as an external stop.

/// Waits for a termination signal and returns its name.
///
/// Fails only if a listener cannot be registered.
#[cfg(unix)]
pub async fn termination_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for Ctrl-C and returns its name.
#[cfg(not(unix))]
pub async fn termination_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("CTRL-C")
}
