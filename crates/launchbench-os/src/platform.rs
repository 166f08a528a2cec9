//! Host platform facts and native desktop selection.

use std::sync::Arc;

use crate::desktop::Desktop;

/// Facts about the host OS that influence helper selection.
///
/// Detected once at startup and passed down explicitly, so the benchmark
/// core never consults global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostPlatform {
    /// Windows major version (5 = XP, 6 = Vista and later), `None` elsewhere.
    pub windows_major: Option<u32>,
    /// Whether this is a 32-bit process on 64-bit Windows.
    pub wow64: bool,
}

impl HostPlatform {
    /// Detect the platform this process runs on.
    #[cfg(windows)]
    pub fn detect() -> Self {
        Self {
            windows_major: crate::windows::os_major_version(),
            wow64: crate::windows::is_wow64(),
        }
    }

    /// Detect the platform this process runs on.
    #[cfg(not(windows))]
    pub fn detect() -> Self {
        Self::default()
    }
}

/// The [`Desktop`] implementation for this platform.
#[cfg(windows)]
pub fn native_desktop() -> Arc<dyn Desktop> {
    Arc::new(crate::windows::Win32Desktop::new())
}

/// The [`Desktop`] implementation for this platform.
#[cfg(unix)]
pub fn native_desktop() -> Arc<dyn Desktop> {
    Arc::new(crate::unix::UnixDesktop::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(windows))]
    fn test_detect_non_windows() {
        let host = HostPlatform::detect();
        assert_eq!(host.windows_major, None);
        assert!(!host.wow64);
    }
}
