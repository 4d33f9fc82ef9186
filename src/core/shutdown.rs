//! # OS signal handling.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives a
//! termination signal (`SIGINT`/`SIGTERM` on Unix, Ctrl-C elsewhere).
//! [`spawn_hup_listener`] wires the optional `SIGHUP` callback; all other
//! signals keep their default OS behavior.

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Invokes `callback` on every `SIGHUP` until the process exits.
#[cfg(unix)]
pub fn spawn_hup_listener(callback: impl Fn() + Send + Sync + 'static) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while sighup.recv().await.is_some() {
            callback();
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_hup_listener(_callback: impl Fn() + Send + Sync + 'static) -> std::io::Result<()> {
    Ok(())
}
