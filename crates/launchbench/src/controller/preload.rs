//! Startup-preload settings.
//!
//! Chromium can pre-map its main DLL into memory before it is needed. The
//! feature is controlled per user through three `HKCU` DWORD values; the
//! harness reads them before a run, overrides them for the run and writes
//! the saved values back afterwards.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BenchError, Result};

/// Preload configuration: whether it is on, and the optional read size and
/// stride (bytes) used while pre-mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreloadState {
    /// Whether preloading is enabled.
    pub enabled: bool,
    /// Bytes read per preload step, `None` for the application default.
    pub size: Option<u32>,
    /// Distance between touched pages, `None` for the application default.
    pub stride: Option<u32>,
}

impl PreloadState {
    /// Preloading off, defaults for size and stride.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            size: None,
            stride: None,
        }
    }
}

/// Where a preload setting is persisted.
pub trait PreloadStore {
    /// Read the current setting.
    fn load(&self) -> Result<PreloadState>;

    /// Persist `state`. `None` fields remove the stored value.
    fn store(&self, state: &PreloadState) -> Result<()>;
}

/// Store for platforms without the preload feature: reads as disabled and
/// refuses to enable it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePreloadStore;

impl PreloadStore for UnavailablePreloadStore {
    fn load(&self) -> Result<PreloadState> {
        Ok(PreloadState::disabled())
    }

    fn store(&self, state: &PreloadState) -> Result<()> {
        if state.enabled {
            return Err(BenchError::UnsupportedFeature {
                feature: "DLL preloading",
                target: std::env::consts::OS.to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory store, cloneable so a test can observe what a run wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreloadStore {
    state: Arc<Mutex<PreloadState>>,
}

impl MemoryPreloadStore {
    /// Start from `initial`.
    pub fn new(initial: PreloadState) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
        }
    }

    /// The value last stored.
    pub fn current(&self) -> PreloadState {
        *self.state.lock()
    }
}

impl PreloadStore for MemoryPreloadStore {
    fn load(&self) -> Result<PreloadState> {
        Ok(*self.state.lock())
    }

    fn store(&self, state: &PreloadState) -> Result<()> {
        *self.state.lock() = *state;
        Ok(())
    }
}

#[cfg(windows)]
pub use registry_store::RegistryPreloadStore;

#[cfg(windows)]
mod registry_store {
    use launchbench_os::registry;

    use super::{PreloadState, PreloadStore};
    use crate::error::Result;

    const KEY: &str = r"Software\Chromium";
    const ENABLED: &str = "ChromeDllPreload";
    const SIZE: &str = "ChromeDllPreloadSize";
    const STRIDE: &str = "ChromeDllPreloadStride";

    /// Chromium's preload values under `HKCU\Software\Chromium`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RegistryPreloadStore;

    fn put(value: &str, data: Option<u32>) -> Result<()> {
        match data {
            Some(data) => registry::write_dword(KEY, value, data)?,
            None => registry::delete_value(KEY, value)?,
        }
        Ok(())
    }

    impl PreloadStore for RegistryPreloadStore {
        fn load(&self) -> Result<PreloadState> {
            // Chromium preloads unless told otherwise.
            let enabled = registry::read_dword(KEY, ENABLED)?.is_none_or(|v| v != 0);
            Ok(PreloadState {
                enabled,
                size: registry::read_dword(KEY, SIZE)?,
                stride: registry::read_dword(KEY, STRIDE)?,
            })
        }

        fn store(&self, state: &PreloadState) -> Result<()> {
            tracing::debug!("Writing preload state {:?}", state);
            registry::write_dword(KEY, ENABLED, u32::from(state.enabled))?;
            put(SIZE, state.size)?;
            put(STRIDE, state.stride)
        }
    }
}

/// The store backing Chromium's preload setting on this platform.
pub fn platform_store() -> Box<dyn PreloadStore> {
    #[cfg(windows)]
    {
        Box::new(RegistryPreloadStore)
    }
    #[cfg(not(windows))]
    {
        Box::new(UnavailablePreloadStore)
    }
}
