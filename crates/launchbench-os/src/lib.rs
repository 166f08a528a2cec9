//! OS primitives for driving a benchmarked desktop application.
//!
//! This crate provides the pieces of the benchmark harness that touch the
//! operating system directly, so the iteration engine in `launchbench` can
//! stay platform-neutral and fully testable.
//!
//! # Components
//!
//! - [`Desktop`] - Window and process primitives (find, enumerate, signal, wait)
//! - [`shut_down`] - Graceful shutdown protocol with a bounded wait for exit
//! - [`native_desktop`] - The platform's [`Desktop`] implementation
//! - [`signal`] - Ctrl+C handling for interrupting a run between iterations
//! - [`spawn_detached`] - Launch the target without tying it to our terminal
//! - [`HostPlatform`] - Host OS version facts, detected once and passed around
//!
//! # Process handles
//!
//! A [`ProcessHandle`] is the one OS resource this crate owns. The shutdown
//! protocol opens it only after the target window is located and always
//! returns it through [`Desktop::close_process`] before returning, whether
//! the target exited, timed out, or a primitive failed.
//!
//! # Example
//!
//! ```
//! use launchbench_os::testing::{ExitBehavior, MockDesktop};
//! use launchbench_os::{shut_down, ClassMatch, QuitMessage, ShutdownTarget, WindowQuery};
//!
//! let desktop = MockDesktop::new();
//! desktop.add_process(42, 0, ExitBehavior::OnQuit);
//! desktop.add_window(42, 7, "AppMessageWindow", None);
//! desktop.add_window(42, 7, "AppFrame", None);
//!
//! let target = ShutdownTarget {
//!     instance: WindowQuery::class("AppMessageWindow"),
//!     recipients: ClassMatch::Exact("AppFrame".to_string()),
//!     message: QuitMessage::AppQuit,
//! };
//! let status = shut_down(&desktop, &target, None).unwrap();
//! assert_eq!(status, Some(0));
//! assert_eq!(desktop.handles_opened(), desktop.handles_closed());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod desktop;
mod platform;
mod process;
mod shutdown;
pub mod signal;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// Mock [`Desktop`] for exercising the shutdown protocol and anything built
/// on it without real windows or processes.
pub mod testing;

pub use desktop::{
    ClassMatch, Desktop, OsError, ProcessHandle, ProcessId, QuitMessage, ThreadId, WaitOutcome,
    WindowId, WindowQuery,
};
pub use platform::{native_desktop, HostPlatform};
pub use process::spawn_detached;
pub use shutdown::{locate_target, shut_down, ShutdownError, ShutdownTarget, WindowSet};

#[cfg(unix)]
pub use unix::UnixDesktop;
#[cfg(windows)]
pub use windows::{registry, Win32Desktop};
