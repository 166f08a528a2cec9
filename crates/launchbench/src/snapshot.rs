//! Cold-start launches through a volume snapshot.
//!
//! To keep the OS file cache from warming up between iterations, the
//! executable's volume is snapshotted and mounted under a fresh drive letter
//! for every launch by a helper tool, which then runs the real command from
//! the snapshot:
//!
//! ```text
//! run_in_snapshot.exe --volume=C:\ --snapshot=M: -- M:\src\chrome.exe --user-data-dir=...
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use launchbench_os::HostPlatform;

use crate::error::{BenchError, Result};
use crate::launch::LaunchCommand;

/// Windows XP's major version.
const XP_MAJOR_VERSION: u32 = 5;

/// Name of the snapshot helper suited to `host`.
pub fn helper_name(host: HostPlatform) -> Result<&'static str> {
    match host.windows_major {
        Some(XP_MAJOR_VERSION) => Ok("run_in_snapshot_xp.exe"),
        Some(major) if major > XP_MAJOR_VERSION => {
            if host.wow64 {
                Ok("run_in_snapshot_x64.exe")
            } else {
                Ok("run_in_snapshot.exe")
            }
        }
        major => Err(BenchError::UnrecognizedPlatform { major }),
    }
}

/// Split a drive-qualified path into its drive (`C:`) and the rest
/// (`\src\chrome.exe`). `None` when there is no drive letter.
pub fn split_drive(path: &str) -> Option<(&str, &str)> {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        Some(path.split_at(2))
    } else {
        None
    }
}

/// Cold-start launch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColdStart {
    helper: PathBuf,
    snapshot_drive: String,
}

impl ColdStart {
    /// Pick the helper for `host` from `tools_dir` and mount snapshots at
    /// `snapshot_drive` (e.g. `M:`).
    pub fn for_host(host: HostPlatform, tools_dir: &Path, snapshot_drive: &str) -> Result<Self> {
        let helper = tools_dir.join(helper_name(host)?);
        Ok(Self {
            helper,
            snapshot_drive: snapshot_drive.trim_end_matches(['\\', '/']).to_string(),
        })
    }

    /// The helper executable.
    pub fn helper(&self) -> &Path {
        &self.helper
    }

    /// Command running `exe args...` from a fresh snapshot of its volume.
    pub fn command(&self, exe: &Path, args: Vec<OsString>) -> Result<LaunchCommand> {
        let exe_str = exe.to_str().ok_or_else(|| BenchError::InvalidExecutablePath {
            path: exe.to_path_buf(),
            reason: "path is not valid Unicode",
        })?;
        let (drive, rest) = split_drive(exe_str).ok_or_else(|| BenchError::InvalidExecutablePath {
            path: exe.to_path_buf(),
            reason: "cold start needs a drive-qualified path",
        })?;

        let mut helper_args = vec![
            OsString::from(format!("--volume={drive}\\")),
            OsString::from(format!("--snapshot={}", self.snapshot_drive)),
            OsString::from("--"),
            OsString::from(format!("{}{rest}", self.snapshot_drive)),
        ];
        helper_args.extend(args);
        Ok(LaunchCommand::new(&self.helper, helper_args))
    }
}
