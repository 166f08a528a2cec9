//! Unix [`Desktop`] backed by the process table.
//!
//! Unix has no portable notion of an application's top-level windows, so
//! each process stands in for a single window:
//!
//! - the window class is the basename of the process's `argv[0]`,
//! - the window title is its full command line, and a title query matches
//!   when its arguments appear in the command line as whole arguments,
//! - a process's only "thread window" is itself,
//! - posting a quit message sends `SIGTERM`.
//!
//! The process table is read with `ps`, which behaves the same on Linux and
//! macOS. Exit codes are only available for processes we spawned ourselves
//! (reaped with `waitpid`); for anything else the exit is detected with
//! `kill(pid, 0)` and the code is reported as unknown.

use std::collections::HashMap;
use std::io;
use std::process::Command;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use parking_lot::Mutex;

use crate::desktop::{
    Desktop, OsError, ProcessHandle, ProcessId, QuitMessage, ThreadId, WaitOutcome, WindowId,
    WindowQuery,
};

/// Interval between exit checks while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProcessEntry {
    pid: u32,
    class: String,
    command_line: String,
}

/// Process-table desktop for Linux and macOS.
#[derive(Debug, Default)]
pub struct UnixDesktop {
    /// Exit codes of reaped children, keyed by pid, until the handle closes.
    exit_codes: Mutex<HashMap<u32, Option<i32>>>,
}

impl UnixDesktop {
    /// Create a desktop reading the live process table.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read the process table, skipping zombies and this process.
fn process_table() -> Vec<ProcessEntry> {
    let output = match Command::new("ps")
        .args(["-axww", "-o", "pid=,stat=,args="])
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("Failed to run ps: {}", e);
            return Vec::new();
        }
    };

    let own_pid = std::process::id();
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(parse_ps_line)
        .filter(|entry| entry.pid != own_pid)
        .collect()
}

/// Parse a `pid stat args...` line. Zombies are dropped.
fn parse_ps_line(line: &str) -> Option<ProcessEntry> {
    let mut parts = line.split_whitespace();
    let pid: u32 = parts.next()?.parse().ok()?;
    let stat = parts.next()?;
    if stat.starts_with('Z') {
        return None;
    }
    let args: Vec<&str> = parts.collect();
    let program = args.first()?;
    let class = program.rsplit('/').next().unwrap_or(program).to_string();
    Some(ProcessEntry {
        pid,
        class,
        command_line: args.join(" "),
    })
}

fn matches_query(entry: &ProcessEntry, query: &WindowQuery) -> bool {
    entry.class == query.class
        && query
            .title
            .as_ref()
            .is_none_or(|title| contains_arguments(&entry.command_line, title))
}

/// Whether the arguments of `title` occur as a contiguous run of whole
/// arguments in `command_line`.
fn contains_arguments(command_line: &str, title: &str) -> bool {
    let wanted: Vec<&str> = title.split_whitespace().collect();
    if wanted.is_empty() {
        return true;
    }
    let args: Vec<&str> = command_line.split_whitespace().collect();
    args.windows(wanted.len()).any(|run| run == wanted.as_slice())
}

#[allow(clippy::cast_possible_wrap)]
fn to_pid(pid: u32) -> Pid {
    Pid::from_raw(pid as i32)
}

fn is_alive(pid: u32) -> bool {
    kill(to_pid(pid), None).is_ok()
}

fn errno_error(operation: &'static str, errno: Errno) -> OsError {
    OsError::new(operation, io::Error::from_raw_os_error(errno as i32))
}

impl UnixDesktop {
    /// Check once whether `pid` has exited, reaping it if it is our child.
    fn poll_exit(&self, pid: u32) -> Result<bool, OsError> {
        match waitpid(to_pid(pid), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => {
                self.exit_codes.lock().insert(pid, Some(code));
                Ok(true)
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                self.exit_codes.lock().insert(pid, Some(128 + signal as i32));
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(Errno::ECHILD) => {
                // Not our child: we can see it go away but not why.
                if is_alive(pid) {
                    Ok(false)
                } else {
                    self.exit_codes.lock().insert(pid, None);
                    Ok(true)
                }
            }
            Err(errno) => Err(errno_error("waitpid", errno)),
        }
    }
}

impl Desktop for UnixDesktop {
    fn find_window(&self, query: &WindowQuery) -> Option<WindowId> {
        // The oldest match is most likely the parent of any helpers that
        // share its command line.
        process_table()
            .into_iter()
            .filter(|entry| matches_query(entry, query))
            .map(|entry| entry.pid)
            .min()
            .map(|pid| WindowId(pid as isize))
    }

    fn window_owner(&self, window: WindowId) -> Result<(ThreadId, ProcessId), OsError> {
        let pid = u32::try_from(window.0).map_err(|_| {
            OsError::new(
                "window_owner",
                io::Error::new(io::ErrorKind::InvalidInput, "not a process id"),
            )
        })?;
        Ok((ThreadId(pid), ProcessId(pid)))
    }

    fn thread_windows(&self, thread: ThreadId) -> Vec<WindowId> {
        if is_alive(thread.0) {
            vec![WindowId(thread.0 as isize)]
        } else {
            Vec::new()
        }
    }

    fn class_name(&self, window: WindowId) -> Option<String> {
        let pid = u32::try_from(window.0).ok()?;
        process_table()
            .into_iter()
            .find(|entry| entry.pid == pid)
            .map(|entry| entry.class)
    }

    fn open_process(&self, pid: ProcessId) -> Result<ProcessHandle, OsError> {
        kill(to_pid(pid.0), None).map_err(|errno| errno_error("kill", errno))?;
        Ok(ProcessHandle::from_raw(pid.0 as isize, pid))
    }

    fn post_quit(&self, window: WindowId, message: QuitMessage) -> Result<(), OsError> {
        let (_, pid) = self.window_owner(window)?;
        tracing::trace!("Sending SIGTERM to {} for {:?}", pid, message);
        kill(to_pid(pid.0), Signal::SIGTERM).map_err(|errno| errno_error("kill", errno))
    }

    fn wait_for_exit(
        &self,
        process: &ProcessHandle,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, OsError> {
        let pid = process.pid().0;
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.poll_exit(pid)? {
                return Ok(WaitOutcome::Exited);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(WaitOutcome::TimedOut);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn exit_code(&self, process: &ProcessHandle) -> Result<Option<i32>, OsError> {
        Ok(self
            .exit_codes
            .lock()
            .get(&process.pid().0)
            .copied()
            .flatten())
    }

    fn close_process(&self, process: ProcessHandle) {
        self.exit_codes.lock().remove(&process.pid().0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::{shut_down, ShutdownTarget};
    use crate::desktop::ClassMatch;

    #[test]
    fn test_parse_ps_line() {
        let entry = parse_ps_line("  4242 Ss   /opt/google/chrome/chrome --user-data-dir=/tmp/p").unwrap();
        assert_eq!(entry.pid, 4242);
        assert_eq!(entry.class, "chrome");
        assert_eq!(entry.command_line, "/opt/google/chrome/chrome --user-data-dir=/tmp/p");
    }

    #[test]
    fn test_parse_ps_line_skips_zombies_and_garbage() {
        assert!(parse_ps_line("  17 Z+   [firefox] <defunct>").is_none());
        assert!(parse_ps_line("PID STAT ARGS").is_none());
        assert!(parse_ps_line("").is_none());
    }

    #[test]
    fn test_matches_query_title_is_whole_arguments() {
        let entry = ProcessEntry {
            pid: 1,
            class: "firefox".to_string(),
            command_line: "firefox -profile /tmp/bench-profile".to_string(),
        };
        assert!(matches_query(&entry, &WindowQuery::class("firefox")));
        assert!(matches_query(
            &entry,
            &WindowQuery::class_and_title("firefox", "-profile /tmp/bench-profile")
        ));
        assert!(!matches_query(
            &entry,
            &WindowQuery::class_and_title("firefox", "/tmp/other")
        ));
        assert!(!matches_query(&entry, &WindowQuery::class("chrome")));
    }

    #[test]
    fn test_profile_prefix_does_not_match_other_instance() {
        let other = ProcessEntry {
            pid: 2,
            class: "chrome".to_string(),
            command_line: "/opt/chrome/chrome --user-data-dir=/tmp/p2".to_string(),
        };
        let query = WindowQuery::class_and_title("chrome", "--user-data-dir=/tmp/p");
        assert!(!matches_query(&other, &query));

        let ours = ProcessEntry {
            pid: 3,
            class: "chrome".to_string(),
            command_line: "/opt/chrome/chrome --user-data-dir=/tmp/p --no-first-run".to_string(),
        };
        assert!(matches_query(&ours, &query));
        assert!(!matches_query(
            &ours,
            &WindowQuery::class_and_title("chrome", "--user-data-dir=/tmp")
        ));
    }

    #[test]
    fn test_shut_down_child_reports_signal_status() {
        if Command::new("ps").arg("-p").arg("1").output().is_err() {
            return; // No process table tool in this environment.
        }

        let marker = format!("{}.{}", 3000 + std::process::id() % 1000, 417);
        let mut child = Command::new("sleep").arg(&marker).spawn().unwrap();

        let desktop = UnixDesktop::new();
        let target = ShutdownTarget {
            instance: WindowQuery::class_and_title("sleep", marker.as_str()),
            recipients: ClassMatch::Exact("sleep".to_string()),
            message: QuitMessage::EndSession,
        };

        let mut found = false;
        for _ in 0..40 {
            if desktop.find_window(&target.instance).is_some() {
                found = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        if !found {
            let _ = child.kill();
            let _ = child.wait();
            return; // ps does not list our children here (sandboxed /proc).
        }

        let status = shut_down(&desktop, &target, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(status, Some(128 + Signal::SIGTERM as i32));
    }
}
