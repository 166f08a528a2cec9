//! In-memory [`Desktop`] for tests.
//!
//! [`MockDesktop`] models processes that own windows on numbered threads.
//! Posting a quit message to a window makes its process exit if it was
//! registered with [`ExitBehavior::OnQuit`]; windows of an exited process
//! are no longer found or enumerated. The mock counts process-handle
//! opens and closes so tests can assert that no handle leaks.
//!
//! # Usage
//!
//! ```
//! use launchbench_os::testing::{ExitBehavior, MockDesktop};
//! use launchbench_os::{Desktop, WindowQuery};
//!
//! let desktop = MockDesktop::new();
//! desktop.add_process(10, 0, ExitBehavior::OnQuit);
//! desktop.add_window(10, 1, "AppMessageWindow", Some("/profile"));
//! assert!(desktop
//!     .find_window(&WindowQuery::class_and_title("AppMessageWindow", "/profile"))
//!     .is_some());
//! ```

use std::collections::{HashMap, HashSet};
use std::io;
use std::time::Duration;

use parking_lot::Mutex;

use crate::desktop::{
    Desktop, OsError, ProcessHandle, ProcessId, QuitMessage, ThreadId, WaitOutcome, WindowId,
    WindowQuery,
};

/// How a mock process reacts to a quit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitBehavior {
    /// Exit as soon as any of its windows receives a quit message.
    OnQuit,
    /// Ignore quit messages and keep running.
    Never,
}

#[derive(Debug)]
struct MockWindow {
    id: WindowId,
    pid: u32,
    thread: u32,
    class: String,
    title: Option<String>,
}

#[derive(Debug)]
struct MockProcess {
    exit_code: i32,
    behavior: ExitBehavior,
    exited: bool,
    deny_open: bool,
}

#[derive(Debug, Default)]
struct MockState {
    next_window: isize,
    next_handle: isize,
    windows: Vec<MockWindow>,
    processes: HashMap<u32, MockProcess>,
    open_handles: HashSet<isize>,
    opened: usize,
    closed: usize,
    posted: Vec<(WindowId, QuitMessage)>,
}

/// Scriptable in-memory desktop.
#[derive(Debug, Default)]
pub struct MockDesktop {
    state: Mutex<MockState>,
}

impl MockDesktop {
    /// Create an empty desktop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running process.
    pub fn add_process(&self, pid: u32, exit_code: i32, behavior: ExitBehavior) {
        self.state.lock().processes.insert(
            pid,
            MockProcess {
                exit_code,
                behavior,
                exited: false,
                deny_open: false,
            },
        );
    }

    /// Add a top-level window owned by `pid` on `thread`.
    pub fn add_window(&self, pid: u32, thread: u32, class: &str, title: Option<&str>) -> WindowId {
        let mut state = self.state.lock();
        state.next_window += 1;
        let id = WindowId(state.next_window);
        state.windows.push(MockWindow {
            id,
            pid,
            thread,
            class: class.to_string(),
            title: title.map(str::to_string),
        });
        id
    }

    /// Make [`Desktop::open_process`] fail for `pid`.
    pub fn deny_open(&self, pid: u32) {
        if let Some(process) = self.state.lock().processes.get_mut(&pid) {
            process.deny_open = true;
        }
    }

    /// Terminate `pid` as if it exited on its own.
    pub fn exit_process(&self, pid: u32) {
        if let Some(process) = self.state.lock().processes.get_mut(&pid) {
            process.exited = true;
        }
    }

    /// Whether `pid` is registered and has not exited.
    pub fn is_running(&self, pid: u32) -> bool {
        self.state
            .lock()
            .processes
            .get(&pid)
            .is_some_and(|p| !p.exited)
    }

    /// Number of process handles opened so far.
    pub fn handles_opened(&self) -> usize {
        self.state.lock().opened
    }

    /// Number of process handles closed so far.
    pub fn handles_closed(&self) -> usize {
        self.state.lock().closed
    }

    /// Quit messages posted so far, in order.
    pub fn posted_messages(&self) -> Vec<(WindowId, QuitMessage)> {
        self.state.lock().posted.clone()
    }
}

impl MockState {
    fn live_windows(&self) -> impl Iterator<Item = &MockWindow> {
        self.windows.iter().filter(|w| {
            self.processes
                .get(&w.pid)
                .is_none_or(|process| !process.exited)
        })
    }
}

fn not_found(operation: &'static str) -> OsError {
    OsError::new(operation, io::Error::new(io::ErrorKind::NotFound, "no such object"))
}

impl Desktop for MockDesktop {
    fn find_window(&self, query: &WindowQuery) -> Option<WindowId> {
        self.state
            .lock()
            .live_windows()
            .find(|w| {
                w.class == query.class
                    && query
                        .title
                        .as_ref()
                        .is_none_or(|title| w.title.as_ref() == Some(title))
            })
            .map(|w| w.id)
    }

    fn window_owner(&self, window: WindowId) -> Result<(ThreadId, ProcessId), OsError> {
        self.state
            .lock()
            .live_windows()
            .find(|w| w.id == window)
            .map(|w| (ThreadId(w.thread), ProcessId(w.pid)))
            .ok_or_else(|| not_found("GetWindowThreadProcessId"))
    }

    fn thread_windows(&self, thread: ThreadId) -> Vec<WindowId> {
        self.state
            .lock()
            .live_windows()
            .filter(|w| w.thread == thread.0)
            .map(|w| w.id)
            .collect()
    }

    fn class_name(&self, window: WindowId) -> Option<String> {
        self.state
            .lock()
            .live_windows()
            .find(|w| w.id == window)
            .map(|w| w.class.clone())
    }

    fn open_process(&self, pid: ProcessId) -> Result<ProcessHandle, OsError> {
        let mut state = self.state.lock();
        match state.processes.get(&pid.0) {
            Some(process) if !process.deny_open => {}
            Some(_) => {
                return Err(OsError::new(
                    "OpenProcess",
                    io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
                ));
            }
            None => return Err(not_found("OpenProcess")),
        }
        state.next_handle += 1;
        let raw = state.next_handle;
        state.open_handles.insert(raw);
        state.opened += 1;
        Ok(ProcessHandle::from_raw(raw, pid))
    }

    fn post_quit(&self, window: WindowId, message: QuitMessage) -> Result<(), OsError> {
        let mut state = self.state.lock();
        let pid = state
            .windows
            .iter()
            .find(|w| w.id == window)
            .map(|w| w.pid)
            .ok_or_else(|| not_found("PostMessage"))?;
        state.posted.push((window, message));

        let exits = state
            .processes
            .get(&pid)
            .is_some_and(|p| p.behavior == ExitBehavior::OnQuit);
        if exits && let Some(process) = state.processes.get_mut(&pid) {
            process.exited = true;
        }
        Ok(())
    }

    fn wait_for_exit(
        &self,
        process: &ProcessHandle,
        _timeout: Option<Duration>,
    ) -> Result<WaitOutcome, OsError> {
        let state = self.state.lock();
        if !state.open_handles.contains(&process.raw()) {
            return Err(not_found("WaitForSingleObject"));
        }
        // Nothing runs concurrently with the mock: a process that has not
        // exited by now never will, so any timeout (even unbounded) elapses.
        let exited = state
            .processes
            .get(&process.pid().0)
            .is_some_and(|p| p.exited);
        Ok(if exited {
            WaitOutcome::Exited
        } else {
            WaitOutcome::TimedOut
        })
    }

    fn exit_code(&self, process: &ProcessHandle) -> Result<Option<i32>, OsError> {
        let state = self.state.lock();
        if !state.open_handles.contains(&process.raw()) {
            return Err(not_found("GetExitCodeProcess"));
        }
        Ok(state
            .processes
            .get(&process.pid().0)
            .filter(|p| p.exited)
            .map(|p| p.exit_code))
    }

    fn close_process(&self, process: ProcessHandle) {
        let mut state = self.state.lock();
        assert!(
            state.open_handles.remove(&process.raw()),
            "closed a process handle that was not open"
        );
        state.closed += 1;
    }
}
