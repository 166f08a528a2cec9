//! Window and process primitives.
//!
//! The [`Desktop`] trait is the seam between the shutdown protocol and the
//! operating system. Windows are addressed by opaque [`WindowId`]s, and the
//! only resource callers own is the [`ProcessHandle`] returned by
//! [`Desktop::open_process`].

use std::fmt;
use std::io;
use std::time::Duration;

/// Opaque identifier of a top-level window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub isize);

/// Identifier of the thread that owns a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u32);

/// Operating system process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owned handle to a process, opened for waiting on exit and reading the
/// exit code.
///
/// Deliberately neither `Clone` nor `Copy`: the handle has to be given back
/// to the [`Desktop`] that opened it through [`Desktop::close_process`].
#[derive(Debug, PartialEq, Eq)]
pub struct ProcessHandle {
    raw: isize,
    pid: ProcessId,
}

impl ProcessHandle {
    /// Wrap a raw OS handle value for the given process.
    pub fn from_raw(raw: isize, pid: ProcessId) -> Self {
        Self { raw, pid }
    }

    /// The raw OS handle value.
    pub fn raw(&self) -> isize {
        self.raw
    }

    /// The process this handle refers to.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }
}

/// Request for a window identifying one application instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowQuery {
    /// Window class name.
    pub class: String,
    /// Window title text, for families without a per-instance class.
    pub title: Option<String>,
}

impl WindowQuery {
    /// Match on class name alone.
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            title: None,
        }
    }

    /// Match on class name and title text.
    pub fn class_and_title(class: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            title: Some(title.into()),
        }
    }
}

impl fmt::Display for WindowQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) => write!(f, "class {} titled \"{title}\"", self.class),
            None => write!(f, "class {}", self.class),
        }
    }
}

/// Class-name predicate selecting the windows that receive the quit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassMatch {
    /// Class name equals the given string.
    Exact(String),
    /// Class name starts with the given string.
    Prefix(String),
}

impl ClassMatch {
    /// Whether `class` satisfies this predicate.
    pub fn matches(&self, class: &str) -> bool {
        match self {
            Self::Exact(expected) => class == expected,
            Self::Prefix(prefix) => class.starts_with(prefix.as_str()),
        }
    }
}

/// Message posted to ask an application to exit gracefully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitMessage {
    /// Session-end notification (`WM_ENDSESSION` on Windows).
    EndSession,
    /// Application-private quit message (`WM_APP + 0x0300`, Mozilla's
    /// `MOZ_WM_APP_QUIT`).
    AppQuit,
}

/// Result of a bounded wait for process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process terminated.
    Exited,
    /// The timeout elapsed first.
    TimedOut,
}

/// Failure of a single OS primitive.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {source}")]
pub struct OsError {
    operation: &'static str,
    #[source]
    source: io::Error,
}

impl OsError {
    /// Wrap an I/O error raised by `operation`.
    pub fn new(operation: &'static str, source: io::Error) -> Self {
        Self { operation, source }
    }

    /// Capture the calling thread's last OS error for `operation`.
    pub fn last(operation: &'static str) -> Self {
        Self::new(operation, io::Error::last_os_error())
    }

    /// Name of the primitive that failed.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

/// Window and process primitives of one desktop session.
///
/// Implementations only observe and signal foreign processes; they never
/// manage their memory. Every method takes `&self` so a desktop can be
/// shared behind an `Arc` by the controller and the benchmark scenario.
pub trait Desktop: Send + Sync {
    /// Find the first top-level window matching `query`.
    fn find_window(&self, query: &WindowQuery) -> Option<WindowId>;

    /// Thread and process owning `window`.
    fn window_owner(&self, window: WindowId) -> Result<(ThreadId, ProcessId), OsError>;

    /// All top-level windows owned by `thread`.
    fn thread_windows(&self, thread: ThreadId) -> Vec<WindowId>;

    /// Class name of `window`, or `None` if it no longer exists.
    fn class_name(&self, window: WindowId) -> Option<String>;

    /// Open `pid` with rights to wait for exit and query its exit code.
    fn open_process(&self, pid: ProcessId) -> Result<ProcessHandle, OsError>;

    /// Post `message` to `window` without waiting for it to be handled.
    fn post_quit(&self, window: WindowId, message: QuitMessage) -> Result<(), OsError>;

    /// Block until the process exits or `timeout` elapses (`None` waits
    /// forever).
    fn wait_for_exit(
        &self,
        process: &ProcessHandle,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, OsError>;

    /// Exit code of a terminated process. `None` when the OS cannot report
    /// it, e.g. for a process that is not our child on Unix.
    fn exit_code(&self, process: &ProcessHandle) -> Result<Option<i32>, OsError>;

    /// Release a handle obtained from [`Desktop::open_process`].
    fn close_process(&self, process: ProcessHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_match_exact() {
        let m = ClassMatch::Exact("MozillaWindowClass".to_string());
        assert!(m.matches("MozillaWindowClass"));
        assert!(!m.matches("MozillaWindowClass2"));
    }

    #[test]
    fn test_class_match_prefix() {
        let m = ClassMatch::Prefix("Chrome_WidgetWin_".to_string());
        assert!(m.matches("Chrome_WidgetWin_0"));
        assert!(m.matches("Chrome_WidgetWin_1"));
        assert!(!m.matches("Chrome_MessageWindow"));
    }

    #[test]
    fn test_query_display() {
        assert_eq!(WindowQuery::class("A").to_string(), "class A");
        assert_eq!(
            WindowQuery::class_and_title("A", "/tmp/p").to_string(),
            "class A titled \"/tmp/p\""
        );
    }
}
