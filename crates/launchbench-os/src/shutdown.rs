//! Graceful shutdown protocol.
//!
//! Asks a running application instance to exit and waits for its process to
//! terminate, with an optional bound on the wait:
//!
//! 1. Locate the window identifying the instance ([`ShutdownTarget::instance`]).
//! 2. Enumerate the top-level windows of that window's thread and keep the
//!    ones accepted by [`ShutdownTarget::recipients`].
//! 3. Open the owning process for waiting.
//! 4. Post the quit message to every recipient (fire-and-forget).
//! 5. Wait for the process to exit.
//! 6. Read the exit code.
//!
//! The process handle opened in step 3 is held by a guard and returned to the
//! desktop on every path out of [`shut_down`].

use std::time::Duration;

use crate::desktop::{
    ClassMatch, Desktop, OsError, ProcessHandle, ProcessId, QuitMessage, WaitOutcome, WindowId,
    WindowQuery,
};

/// How to find and address one application family's instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownTarget {
    /// Window confirming the instance is the one we want.
    pub instance: WindowQuery,
    /// Windows on the instance's thread that receive the quit request.
    pub recipients: ClassMatch,
    /// Message posted to each recipient.
    pub message: QuitMessage,
}

/// Windows discovered for one shutdown call. Rebuilt on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSet {
    /// The window that matched [`ShutdownTarget::instance`]. It is kept apart
    /// from `recipients` because it may or may not be one of them.
    pub instance: WindowId,
    /// Windows the quit message is posted to.
    pub recipients: Vec<WindowId>,
}

/// Errors that can occur while shutting an application down.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// No window matched the instance query.
    #[error("no running instance found (looked for a window of {query})")]
    TargetNotFound {
        /// The query that found nothing.
        query: WindowQuery,
    },

    /// The process was still running when the wait timed out.
    #[error("process {pid} did not exit within {timeout:?}")]
    Timeout {
        /// Process that did not exit.
        pid: ProcessId,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// An OS primitive failed.
    #[error(transparent)]
    Os(#[from] OsError),
}

/// Returns a process handle to its desktop when dropped.
struct OpenProcess<'a> {
    desktop: &'a dyn Desktop,
    handle: Option<ProcessHandle>,
}

impl<'a> OpenProcess<'a> {
    fn open(desktop: &'a dyn Desktop, pid: ProcessId) -> Result<Self, OsError> {
        let handle = desktop.open_process(pid)?;
        Ok(Self {
            desktop,
            handle: Some(handle),
        })
    }

    fn handle(&self) -> &ProcessHandle {
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("process handle is only taken on drop"),
        }
    }
}

impl Drop for OpenProcess<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.desktop.close_process(handle);
        }
    }
}

/// Locate the target instance and partition its thread's windows.
///
/// Returns the window set together with the owning process.
pub fn locate_target(
    desktop: &dyn Desktop,
    target: &ShutdownTarget,
) -> Result<(WindowSet, ProcessId), ShutdownError> {
    let instance = desktop
        .find_window(&target.instance)
        .ok_or_else(|| ShutdownError::TargetNotFound {
            query: target.instance.clone(),
        })?;

    let (thread, pid) = desktop.window_owner(instance)?;

    // Only windows on the instance's own thread: enumerating process-wide
    // could post to threads that do not run the application's message loop.
    let recipients: Vec<WindowId> = desktop
        .thread_windows(thread)
        .into_iter()
        .filter(|&window| {
            desktop
                .class_name(window)
                .is_some_and(|class| target.recipients.matches(&class))
        })
        .collect();

    Ok((
        WindowSet {
            instance,
            recipients,
        },
        pid,
    ))
}

/// Ask the instance described by `target` to exit and wait for it.
///
/// `timeout` of `None` waits without bound. Returns the process exit code,
/// or `None` when the OS cannot report it.
pub fn shut_down(
    desktop: &dyn Desktop,
    target: &ShutdownTarget,
    timeout: Option<Duration>,
) -> Result<Option<i32>, ShutdownError> {
    let (windows, pid) = locate_target(desktop, target)?;

    if windows.recipients.is_empty() {
        tracing::warn!(
            "Instance {} (pid {}) has no windows accepting {:?}",
            target.instance,
            pid,
            target.message
        );
    }

    let process = OpenProcess::open(desktop, pid)?;

    for &window in &windows.recipients {
        if let Err(e) = desktop.post_quit(window, target.message) {
            // Fire-and-forget: one recipient refusing the post does not stop
            // the others.
            tracing::debug!("Posting {:?} to window {:?} failed: {}", target.message, window, e);
        }
    }
    tracing::debug!(
        "Posted {:?} to {} window(s) of pid {}",
        target.message,
        windows.recipients.len(),
        pid
    );

    match desktop.wait_for_exit(process.handle(), timeout)? {
        WaitOutcome::Exited => {}
        WaitOutcome::TimedOut => {
            return Err(ShutdownError::Timeout {
                pid,
                timeout: timeout.unwrap_or(Duration::MAX),
            });
        }
    }

    let status = desktop.exit_code(process.handle())?;
    tracing::info!("Process {} exited with status {:?}", pid, status);
    Ok(status)
}
