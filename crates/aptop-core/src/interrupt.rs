use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();

fn notify() -> &'static Notify {
    INTERRUPT_NOTIFY.get_or_init(Notify::new)
}

/// Initializes the Ctrl+C handler.
///
/// The handler sets an interrupt flag and wakes waiters; it does not print
/// anything and never exits the process. Repeated interrupts while the
/// monitor drains are absorbed, since the drain is already bounded by the
/// grace period.
///
/// # Errors
/// Returns an error if the Ctrl+C handler cannot be registered (for example
/// when one is already installed).
pub fn init() -> Result<()> {
    ctrlc::set_handler(trigger).context("register Ctrl+C handler")
}

/// Marks the process as interrupted and wakes all waiters.
pub fn trigger() {
    if !INTERRUPTED.swap(true, Ordering::SeqCst) {
        tracing::debug!("interrupt received");
    }
    notify().notify_waiters();
}

/// Checks if an interrupt has been requested.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until an interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        let notified = notify().notified();
        tokio::pin!(notified);
        // Register before checking the flag so a trigger in between is not lost.
        notified.as_mut().enable();
        if is_interrupted() {
            return;
        }
        notified.await;
    }
}

/// Resets the interrupt flag.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

#[cfg(unix)]
type TerminateSignal = Option<tokio::signal::unix::Signal>;
#[cfg(not(unix))]
type TerminateSignal = ();

/// Installs the SIGTERM listener. Registration happens here, not on first
/// poll, so a SIGTERM that arrives right after is not missed.
#[cfg(unix)]
fn listen_for_terminate() -> TerminateSignal {
    use tokio::signal::unix::{SignalKind, signal};

    signal(SignalKind::terminate())
        .inspect_err(|err| tracing::warn!(error = %err, "cannot listen for SIGTERM"))
        .ok()
}

#[cfg(not(unix))]
fn listen_for_terminate() -> TerminateSignal {}

/// Waits for SIGTERM. Never resolves on platforms without it, or if the
/// listener could not be installed.
#[cfg(unix)]
async fn wait_for_terminate(listener: TerminateSignal) {
    if let Some(mut sigterm) = listener {
        sigterm.recv().await;
        tracing::debug!("SIGTERM received");
    } else {
        std::future::pending::<()>().await;
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate((): TerminateSignal) {
    std::future::pending::<()>().await;
}

/// Spawns a task that cancels `token` on Ctrl+C or SIGTERM.
///
/// Must be called from within a tokio runtime.
pub fn cancel_on_interrupt(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    let terminate = listen_for_terminate();
    tokio::spawn(async move {
        tokio::select! {
            () = wait_for_interrupt() => {}
            () = wait_for_terminate(terminate) => {}
            () = token.cancelled() => return,
        }
        token.cancel();
    })
}
