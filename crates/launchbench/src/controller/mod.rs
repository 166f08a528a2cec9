//! Application-family controllers.
//!
//! Each supported browser family differs in how its running instance is
//! identified, how it is asked to quit, how a profile is passed on the
//! command line and whether it has a preload feature. The family is picked
//! once from the executable's name; everything else goes through
//! [`ApplicationController`].

mod chromium;
mod mozilla;
pub mod preload;

pub use chromium::ChromiumController;
pub use mozilla::MozillaController;
pub use preload::{PreloadState, PreloadStore};

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use launchbench_os::{Desktop, ShutdownTarget};

use crate::error::Result;

/// Supported application families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppFamily {
    /// Chromium and Chrome.
    Chromium,
    /// Firefox and other Gecko applications.
    Mozilla,
}

impl AppFamily {
    /// Pick the family for `exe`: names containing "chrom" are Chromium,
    /// anything else is treated as Mozilla.
    pub fn detect(exe: &Path) -> Self {
        let name = exe
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.contains("chrom") {
            Self::Chromium
        } else {
            Self::Mozilla
        }
    }
}

impl fmt::Display for AppFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chromium => write!(f, "Chromium"),
            Self::Mozilla => write!(f, "Mozilla"),
        }
    }
}

/// How a missing profile directory gets created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileInit {
    /// Launch with these extra arguments, wait until running, shut down.
    LaunchAndShutDown(Vec<OsString>),
    /// Run with these extra arguments and wait for the process to finish.
    RunToCompletion(Vec<OsString>),
}

/// Window class used to find the instance on Unix: the executable's name,
/// which is what the process table reports as `argv[0]`'s basename.
#[cfg(not(windows))]
fn process_class(exe: &Path) -> String {
    exe.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Controller for one application family.
pub enum ApplicationController {
    /// Chromium-style application.
    Chromium(ChromiumController),
    /// Mozilla-style application.
    Mozilla(MozillaController),
}

impl ApplicationController {
    /// Controller for `exe`, with the family picked by [`AppFamily::detect`]
    /// and the platform's preload store.
    pub fn for_executable(exe: &Path, desktop: Arc<dyn Desktop>) -> Self {
        match AppFamily::detect(exe) {
            AppFamily::Chromium => Self::Chromium(ChromiumController::new(
                exe,
                desktop,
                preload::platform_store(),
            )),
            AppFamily::Mozilla => Self::Mozilla(MozillaController::new(exe, desktop)),
        }
    }

    /// The family this controller drives.
    pub fn family(&self) -> AppFamily {
        match self {
            Self::Chromium(_) => AppFamily::Chromium,
            Self::Mozilla(_) => AppFamily::Mozilla,
        }
    }

    /// How to find and address the instance running on `profile`.
    pub fn shutdown_target(&self, profile: &Path) -> ShutdownTarget {
        match self {
            Self::Chromium(c) => c.shutdown_target(profile),
            Self::Mozilla(c) => c.shutdown_target(profile),
        }
    }

    /// Whether an instance is running on `profile`.
    ///
    /// Mozilla windows do not reveal their profile, so for that family this
    /// reports whether any instance is running.
    pub fn is_profile_running(&self, profile: &Path) -> bool {
        let target = self.shutdown_target(profile);
        self.desktop().find_window(&target.instance).is_some()
    }

    /// Ask the instance on `profile` to exit and wait up to `timeout`.
    ///
    /// Returns the exit code when the OS reports one.
    pub fn shut_down(&self, profile: &Path, timeout: Option<Duration>) -> Result<Option<i32>> {
        let target = self.shutdown_target(profile);
        Ok(launchbench_os::shut_down(
            self.desktop().as_ref(),
            &target,
            timeout,
        )?)
    }

    /// Read the current preload setting.
    pub fn preload_state(&self) -> Result<PreloadState> {
        match self {
            Self::Chromium(c) => c.preload_state(),
            Self::Mozilla(c) => c.preload_state(),
        }
    }

    /// Apply a preload setting.
    pub fn set_preload_state(&self, state: &PreloadState) -> Result<()> {
        match self {
            Self::Chromium(c) => c.set_preload_state(state),
            Self::Mozilla(c) => c.set_preload_state(state),
        }
    }

    /// Command-line arguments selecting `profile`, followed by `extra`.
    pub fn launch_args(&self, profile: &Path, extra: &[OsString]) -> Vec<OsString> {
        match self {
            Self::Chromium(c) => c.launch_args(profile, extra),
            Self::Mozilla(c) => c.launch_args(profile, extra),
        }
    }

    /// How to create a missing profile directory.
    pub fn profile_init(&self, profile: &Path) -> ProfileInit {
        match self {
            Self::Chromium(c) => c.profile_init(),
            Self::Mozilla(c) => c.profile_init(profile),
        }
    }

    fn desktop(&self) -> &Arc<dyn Desktop> {
        match self {
            Self::Chromium(c) => &c.desktop,
            Self::Mozilla(c) => &c.desktop,
        }
    }
}

impl fmt::Debug for ApplicationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApplicationController")
            .field(&self.family())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchbench_os::testing::{ExitBehavior, MockDesktop};
    use launchbench_os::ClassMatch;

    use crate::controller::preload::MemoryPreloadStore;
    use crate::error::BenchError;

    fn register_instance(desktop: &MockDesktop, target: &ShutdownTarget, pid: u32) {
        desktop.add_process(pid, 0, ExitBehavior::OnQuit);
        desktop.add_window(
            pid,
            pid,
            &target.instance.class,
            target.instance.title.as_deref(),
        );
        let recipient = match &target.recipients {
            ClassMatch::Exact(class) => class.clone(),
            ClassMatch::Prefix(prefix) => format!("{prefix}1"),
        };
        desktop.add_window(pid, pid, &recipient, None);
    }

    #[test]
    fn test_detect_family() {
        assert_eq!(
            AppFamily::detect(Path::new(r"C:\src\out\Release\chrome.exe")),
            AppFamily::Chromium
        );
        assert_eq!(AppFamily::detect(Path::new("/usr/bin/chromium")), AppFamily::Chromium);
        assert_eq!(AppFamily::detect(Path::new("/opt/Chrome/CHROME")), AppFamily::Chromium);
        assert_eq!(AppFamily::detect(Path::new("/usr/bin/firefox")), AppFamily::Mozilla);
        assert_eq!(
            AppFamily::detect(Path::new(r"C:\Program Files\Mozilla Firefox\firefox.exe")),
            AppFamily::Mozilla
        );
    }

    #[test]
    fn test_chromium_profile_running_and_shutdown() {
        let desktop = Arc::new(MockDesktop::new());
        let controller = ApplicationController::Chromium(ChromiumController::new(
            Path::new("chrome.exe"),
            desktop.clone(),
            Box::new(MemoryPreloadStore::default()),
        ));
        let profile = Path::new("/profiles/bench");
        assert!(!controller.is_profile_running(profile));

        register_instance(&desktop, &controller.shutdown_target(profile), 40);
        assert!(controller.is_profile_running(profile));
        assert!(!controller.is_profile_running(Path::new("/profiles/other")));

        assert_eq!(controller.shut_down(profile, None).unwrap(), Some(0));
        assert!(!controller.is_profile_running(profile));
        assert_eq!(desktop.handles_opened(), desktop.handles_closed());
    }

    #[test]
    fn test_mozilla_running_check_ignores_profile() {
        let desktop = Arc::new(MockDesktop::new());
        let controller =
            ApplicationController::Mozilla(MozillaController::new(Path::new("firefox"), desktop.clone()));

        register_instance(&desktop, &controller.shutdown_target(Path::new("/a")), 7);
        assert!(controller.is_profile_running(Path::new("/a")));
        assert!(controller.is_profile_running(Path::new("/b")));
    }

    #[test]
    fn test_shutdown_without_instance_is_target_not_found() {
        let desktop = Arc::new(MockDesktop::new());
        let controller =
            ApplicationController::Mozilla(MozillaController::new(Path::new("firefox"), desktop));
        let err = controller.shut_down(Path::new("/p"), None).unwrap_err();
        assert!(matches!(err, BenchError::TargetNotFound { .. }));
    }

    #[test]
    fn test_for_executable_picks_family() {
        let desktop: Arc<dyn Desktop> = Arc::new(MockDesktop::new());
        let chrome = ApplicationController::for_executable(Path::new("chrome.exe"), desktop.clone());
        assert_eq!(chrome.family(), AppFamily::Chromium);
        let firefox = ApplicationController::for_executable(Path::new("firefox.exe"), desktop);
        assert_eq!(firefox.family(), AppFamily::Mozilla);
        assert_eq!(format!("{firefox:?}"), "ApplicationController(Mozilla)");
    }
}
