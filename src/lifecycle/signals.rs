//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGTERM and SIGINT handlers before any subsystem starts
//! - Cancel the root context on the first signal
//! - Force the process down on a second signal or when unwinding hangs
//!
//! # Design Decisions
//! - Registration is synchronous so a signal right after startup is never missed
//! - The watcher is written against `SignalSource` so tests can feed it
//!   signals from a channel

use std::io;
use std::time::Duration;

use async_trait::async_trait;

use crate::lifecycle::shutdown::ExecutionContext;

/// Margin added to the drain grace period before the process is killed.
pub const HARD_EXIT_MARGIN: Duration = Duration::from_secs(5);

/// A stream of termination signals.
#[async_trait]
pub trait SignalSource: Send + 'static {
    /// Wait for the next signal. `None` means no more signals will arrive.
    async fn recv(&mut self) -> Option<&'static str>;
}

/// Termination signals delivered by the operating system.
pub struct OsSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Register the handlers. Must be called inside a tokio runtime.
    pub fn register() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                interrupt: signal(SignalKind::interrupt())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Option<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                received = self.terminate.recv() => received.map(|_| "SIGTERM"),
                received = self.interrupt.recv() => received.map(|_| "SIGINT"),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok().map(|_| "ctrl-c")
        }
    }
}

/// Build the root context and arm it with OS termination signals.
///
/// The first signal cancels the context. A second signal, or `hard_timeout`
/// elapsing after cancellation, exits the process with status 1.
pub fn new_cancellable_root(hard_timeout: Duration) -> io::Result<ExecutionContext> {
    let ctx = ExecutionContext::new();
    let signals = OsSignals::register()?;

    tokio::spawn(watch(ctx.clone(), signals, hard_timeout, |reason| {
        tracing::error!(reason, "Forcing exit before subsystems finished unwinding");
        std::process::exit(1);
    }));

    Ok(ctx)
}

/// Drive `ctx` from `signals`.
///
/// `force_exit` runs at most once, when a second signal arrives or the hard
/// timeout elapses after cancellation.
pub async fn watch<S, F>(ctx: ExecutionContext, mut signals: S, hard_timeout: Duration, force_exit: F)
where
    S: SignalSource,
    F: FnOnce(&'static str),
{
    tokio::select! {
        received = signals.recv() => match received {
            Some(name) => {
                tracing::info!(signal = name, "Shutdown signal received");
                ctx.cancel();
            }
            None => {
                // No signal can arrive any more; fall back to plain cancellation.
                ctx.cancelled().await;
            }
        },
        _ = ctx.cancelled() => {
            tracing::debug!("Root context cancelled without a signal");
        }
    }

    let deadline = tokio::time::sleep(hard_timeout);
    tokio::pin!(deadline);

    let mut signals_open = true;
    loop {
        tokio::select! {
            received = signals.recv(), if signals_open => match received {
                Some(name) => {
                    tracing::warn!(signal = name, "Second shutdown signal received");
                    force_exit("second signal");
                    return;
                }
                None => signals_open = false,
            },
            _ = &mut deadline => {
                tracing::warn!(timeout = ?hard_timeout, "Shutdown did not finish in time");
                force_exit("hard timeout");
                return;
            }
        }
    }
}
