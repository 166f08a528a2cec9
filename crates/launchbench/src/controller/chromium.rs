//! Chromium controller.
//!
//! A Chromium browser process owns one hidden `Chrome_MessageWindow` whose
//! title is the profile directory it runs on, which is how a particular
//! profile's instance is found. Its top-level `Chrome_WidgetWin_*` windows on
//! the same thread are told the session is ending, which makes the browser
//! save state and exit.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use launchbench_os::{ClassMatch, Desktop, QuitMessage, ShutdownTarget, WindowQuery};

use super::preload::{PreloadState, PreloadStore};
use super::ProfileInit;
use crate::error::Result;

/// Controller for Chromium-family browsers.
pub struct ChromiumController {
    #[cfg_attr(windows, allow(dead_code))]
    exe: PathBuf,
    pub(super) desktop: Arc<dyn Desktop>,
    preload: Box<dyn PreloadStore>,
}

impl ChromiumController {
    /// Create a controller for `exe` that keeps its preload setting in
    /// `preload`.
    pub fn new(exe: &Path, desktop: Arc<dyn Desktop>, preload: Box<dyn PreloadStore>) -> Self {
        Self {
            exe: exe.to_path_buf(),
            desktop,
            preload,
        }
    }

    /// `--user-data-dir=<profile>`.
    fn profile_flag(profile: &Path) -> String {
        format!("--user-data-dir={}", profile.display())
    }

    #[cfg(windows)]
    pub(super) fn shutdown_target(&self, profile: &Path) -> ShutdownTarget {
        ShutdownTarget {
            instance: WindowQuery::class_and_title(
                "Chrome_MessageWindow",
                profile.display().to_string(),
            ),
            recipients: ClassMatch::Prefix("Chrome_WidgetWin_".to_string()),
            message: QuitMessage::EndSession,
        }
    }

    #[cfg(not(windows))]
    pub(super) fn shutdown_target(&self, profile: &Path) -> ShutdownTarget {
        // The browser process is the one whose command line names the profile.
        let class = super::process_class(&self.exe);
        ShutdownTarget {
            instance: WindowQuery::class_and_title(class.clone(), Self::profile_flag(profile)),
            recipients: ClassMatch::Exact(class),
            message: QuitMessage::EndSession,
        }
    }

    pub(super) fn preload_state(&self) -> Result<PreloadState> {
        self.preload.load()
    }

    pub(super) fn set_preload_state(&self, state: &PreloadState) -> Result<()> {
        self.preload.store(state)
    }

    pub(super) fn launch_args(&self, profile: &Path, extra: &[OsString]) -> Vec<OsString> {
        let mut args = vec![OsString::from(Self::profile_flag(profile))];
        args.extend_from_slice(extra);
        args
    }

    pub(super) fn profile_init(&self) -> ProfileInit {
        ProfileInit::LaunchAndShutDown(vec![OsString::from("--no-first-run")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchbench_os::testing::MockDesktop;

    use crate::controller::preload::MemoryPreloadStore;

    fn controller(store: MemoryPreloadStore) -> ChromiumController {
        ChromiumController::new(
            Path::new("/opt/chromium/chrome"),
            Arc::new(MockDesktop::new()),
            Box::new(store),
        )
    }

    #[test]
    fn test_launch_args_lead_with_profile() {
        let c = controller(MemoryPreloadStore::default());
        let args = c.launch_args(Path::new("/tmp/p"), &[OsString::from("--no-first-run")]);
        assert_eq!(
            args,
            vec![
                OsString::from("--user-data-dir=/tmp/p"),
                OsString::from("--no-first-run")
            ]
        );
    }

    #[test]
    fn test_profile_init_launches_without_first_run_ui() {
        let c = controller(MemoryPreloadStore::default());
        assert_eq!(
            c.profile_init(),
            ProfileInit::LaunchAndShutDown(vec![OsString::from("--no-first-run")])
        );
    }

    #[test]
    fn test_preload_goes_through_store() {
        let store = MemoryPreloadStore::default();
        let c = controller(store.clone());
        let state = PreloadState {
            enabled: true,
            size: Some(1 << 20),
            stride: Some(4096),
        };
        c.set_preload_state(&state).unwrap();
        assert_eq!(store.current(), state);
        assert_eq!(c.preload_state().unwrap(), state);
    }

    #[test]
    #[cfg(not(windows))]
    fn test_target_addresses_browser_process_by_profile() {
        let c = controller(MemoryPreloadStore::default());
        let target = c.shutdown_target(Path::new("/tmp/p"));
        assert_eq!(
            target.instance,
            WindowQuery::class_and_title("chrome", "--user-data-dir=/tmp/p")
        );
        assert_eq!(target.recipients, ClassMatch::Exact("chrome".to_string()));
        assert_eq!(target.message, QuitMessage::EndSession);
    }

    #[test]
    #[cfg(windows)]
    fn test_target_addresses_message_window_by_profile() {
        let c = controller(MemoryPreloadStore::default());
        let target = c.shutdown_target(Path::new(r"C:\p"));
        assert_eq!(
            target.instance,
            WindowQuery::class_and_title("Chrome_MessageWindow", r"C:\p")
        );
        assert!(target.recipients.matches("Chrome_WidgetWin_1"));
    }
}
