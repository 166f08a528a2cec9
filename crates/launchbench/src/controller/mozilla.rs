//! Mozilla controller.
//!
//! Firefox exposes a single `FirefoxMessageWindow` per instance with no
//! trace of the profile it runs on, so any running instance is taken to be
//! ours. Its `MozillaWindowClass` windows understand the private
//! `MOZ_WM_APP_QUIT` message.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use launchbench_os::{ClassMatch, Desktop, QuitMessage, ShutdownTarget, WindowQuery};

use super::preload::PreloadState;
use super::ProfileInit;
use crate::error::{BenchError, Result};

const CREATE_PROFILE: &str = "-CreateProfile";

/// Controller for Mozilla-family browsers.
pub struct MozillaController {
    #[cfg_attr(windows, allow(dead_code))]
    exe: PathBuf,
    pub(super) desktop: Arc<dyn Desktop>,
}

impl MozillaController {
    /// Create a controller for `exe`.
    pub fn new(exe: &Path, desktop: Arc<dyn Desktop>) -> Self {
        Self {
            exe: exe.to_path_buf(),
            desktop,
        }
    }

    #[cfg(windows)]
    pub(super) fn shutdown_target(&self, _profile: &Path) -> ShutdownTarget {
        ShutdownTarget {
            instance: WindowQuery::class("FirefoxMessageWindow"),
            recipients: ClassMatch::Exact("MozillaWindowClass".to_string()),
            message: QuitMessage::AppQuit,
        }
    }

    #[cfg(not(windows))]
    pub(super) fn shutdown_target(&self, _profile: &Path) -> ShutdownTarget {
        let class = super::process_class(&self.exe);
        ShutdownTarget {
            instance: WindowQuery::class(class.clone()),
            recipients: ClassMatch::Exact(class),
            message: QuitMessage::AppQuit,
        }
    }

    pub(super) fn preload_state(&self) -> Result<PreloadState> {
        Ok(PreloadState::disabled())
    }

    pub(super) fn set_preload_state(&self, state: &PreloadState) -> Result<()> {
        if state.enabled {
            return Err(BenchError::UnsupportedFeature {
                feature: "DLL preloading",
                target: "Mozilla".to_string(),
            });
        }
        Ok(())
    }

    pub(super) fn launch_args(&self, profile: &Path, extra: &[OsString]) -> Vec<OsString> {
        let mut args = Vec::with_capacity(extra.len() + 2);
        // -CreateProfile names the directory itself and must not be combined
        // with -profile.
        if !extra.iter().any(|arg| arg == CREATE_PROFILE) {
            args.push(OsString::from("-profile"));
            args.push(profile.as_os_str().to_os_string());
        }
        args.extend_from_slice(extra);
        args
    }

    pub(super) fn profile_init(&self, profile: &Path) -> ProfileInit {
        ProfileInit::RunToCompletion(vec![
            OsString::from(CREATE_PROFILE),
            profile.as_os_str().to_os_string(),
        ])
    }
}
