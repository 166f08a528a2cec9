//! Interrupt handling for benchmark runs.
//!
//! A run cannot be cancelled in the middle of an OS wait, so Ctrl+C only
//! raises a flag that the iteration loop checks between iterations and that
//! the settle interval waits on:
//! - First signal: sets the interrupt flag, the run winds down and tears down
//! - Second signal: immediate process exit
//!
//! Handles SIGINT and SIGTERM (and SIGHUP on Unix).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;

#[cfg(unix)]
use signal_hook::consts::signal::SIGHUP;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

static INSTALLED: AtomicBool = AtomicBool::new(false);

static INTERRUPT_CONDVAR: OnceLock<(Mutex<bool>, Condvar)> = OnceLock::new();

fn interrupt_condvar() -> &'static (Mutex<bool>, Condvar) {
    INTERRUPT_CONDVAR.get_or_init(|| (Mutex::new(false), Condvar::new()))
}

/// Install the interrupt handlers.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn install_interrupt_handler() -> Result<(), std::io::Error> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let raised = Arc::new(AtomicBool::new(false));

    for &sig in TERM_SIGNALS {
        // Order matters: the conditional shutdown must see the flag as it was
        // before this delivery, so it is registered first.
        flag::register_conditional_shutdown(sig, 1, Arc::clone(&raised))?;
        flag::register(sig, Arc::clone(&raised))?;
    }

    #[cfg(unix)]
    {
        flag::register_conditional_shutdown(SIGHUP, 1, Arc::clone(&raised))?;
        flag::register(SIGHUP, Arc::clone(&raised))?;
    }

    // Signal handlers may only touch atomics; this thread forwards the flag
    // to the static and wakes waiters.
    std::thread::spawn(move || {
        while !raised.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(50));
        }
        request_interrupt();
        eprintln!("\nInterrupt requested, finishing current step (Ctrl+C again to force exit)");
    });

    Ok(())
}

/// Raise the interrupt flag and wake any waiter.
pub fn request_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
    let (lock, cvar) = interrupt_condvar();
    let mut guard = lock.lock();
    *guard = true;
    cvar.notify_all();
}

/// Whether an interrupt was requested.
pub fn interrupt_requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Sleep for `timeout`, waking early on interrupt.
///
/// Returns `true` if interrupted, `false` if the full interval elapsed.
pub fn wait_for_interrupt_timeout(timeout: Duration) -> bool {
    if interrupt_requested() {
        return true;
    }

    let (lock, cvar) = interrupt_condvar();
    let mut guard = lock.lock();
    let deadline = std::time::Instant::now() + timeout;

    // Loop over spurious wakeups until the flag is set or time runs out.
    while !*guard {
        if cvar.wait_until(&mut guard, deadline).timed_out() {
            break;
        }
    }
    *guard || interrupt_requested()
}

/// Clear the interrupt flag.
pub fn clear_interrupt() {
    INTERRUPTED.store(false, Ordering::SeqCst);
    let (lock, _cvar) = interrupt_condvar();
    *lock.lock() = false;
}
