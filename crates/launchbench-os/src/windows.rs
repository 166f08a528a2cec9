//! Win32 [`Desktop`] and registry helpers.

use std::ffi::OsStr;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::time::Duration;

use windows_sys::Win32::Foundation::{
    CloseHandle, BOOL, HANDLE, HWND, LPARAM, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, WaitForSingleObject, INFINITE, PROCESS_QUERY_INFORMATION,
    PROCESS_SYNCHRONIZE,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumThreadWindows, FindWindowExW, GetClassNameW, GetWindowThreadProcessId, PostMessageW,
    WM_APP, WM_ENDSESSION,
};

use crate::desktop::{
    Desktop, OsError, ProcessHandle, ProcessId, QuitMessage, ThreadId, WaitOutcome, WindowId,
    WindowQuery,
};

/// Mozilla's private quit message (`MOZ_WM_APP_QUIT`).
const MOZ_WM_APP_QUIT: u32 = WM_APP + 0x0300;

/// Longest window class name Win32 allows.
const MAX_CLASS_NAME: usize = 256;

/// Encode `s` as a NUL-terminated UTF-16 string.
pub(crate) fn wide(s: impl AsRef<OsStr>) -> Vec<u16> {
    s.as_ref().encode_wide().chain(std::iter::once(0)).collect()
}

fn hwnd(window: WindowId) -> HWND {
    window.0 as HWND
}

/// Desktop of the interactive Windows session.
#[derive(Debug, Default)]
pub struct Win32Desktop;

impl Win32Desktop {
    /// Create a desktop bound to the current session.
    pub fn new() -> Self {
        Self
    }
}

unsafe extern "system" fn collect_window(window: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: `lparam` is the `&mut Vec<WindowId>` passed by `thread_windows`,
    // which outlives the synchronous EnumThreadWindows call.
    let windows = unsafe { &mut *(lparam as *mut Vec<WindowId>) };
    windows.push(WindowId(window as isize));
    1
}

impl Desktop for Win32Desktop {
    fn find_window(&self, query: &WindowQuery) -> Option<WindowId> {
        let class = wide(&query.class);
        let title = query.title.as_ref().map(wide);
        let title_ptr = title.as_ref().map_or(std::ptr::null(), |t| t.as_ptr());
        // SAFETY: both strings are NUL-terminated and live across the call.
        let found = unsafe {
            FindWindowExW(
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                class.as_ptr(),
                title_ptr,
            )
        };
        (!found.is_null()).then(|| WindowId(found as isize))
    }

    fn window_owner(&self, window: WindowId) -> Result<(ThreadId, ProcessId), OsError> {
        let mut pid = 0u32;
        // SAFETY: `pid` is a valid out-pointer for the duration of the call.
        let thread = unsafe { GetWindowThreadProcessId(hwnd(window), &mut pid) };
        if thread == 0 {
            return Err(OsError::last("GetWindowThreadProcessId"));
        }
        Ok((ThreadId(thread), ProcessId(pid)))
    }

    fn thread_windows(&self, thread: ThreadId) -> Vec<WindowId> {
        let mut windows: Vec<WindowId> = Vec::new();
        // SAFETY: the callback only casts `lparam` back to the vector above.
        unsafe {
            EnumThreadWindows(
                thread.0,
                Some(collect_window),
                &mut windows as *mut Vec<WindowId> as LPARAM,
            );
        }
        windows
    }

    fn class_name(&self, window: WindowId) -> Option<String> {
        let mut buffer = [0u16; MAX_CLASS_NAME];
        // SAFETY: the buffer length passed matches the buffer.
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let len = unsafe { GetClassNameW(hwnd(window), buffer.as_mut_ptr(), buffer.len() as i32) };
        let len = usize::try_from(len).ok().filter(|&n| n > 0)?;
        Some(String::from_utf16_lossy(&buffer[..len]))
    }

    fn open_process(&self, pid: ProcessId) -> Result<ProcessHandle, OsError> {
        // SAFETY: plain FFI call; the returned handle is owned by the caller.
        let handle =
            unsafe { OpenProcess(PROCESS_SYNCHRONIZE | PROCESS_QUERY_INFORMATION, 0, pid.0) };
        if handle.is_null() {
            return Err(OsError::last("OpenProcess"));
        }
        Ok(ProcessHandle::from_raw(handle as isize, pid))
    }

    fn post_quit(&self, window: WindowId, message: QuitMessage) -> Result<(), OsError> {
        let (msg, wparam) = match message {
            QuitMessage::EndSession => (WM_ENDSESSION, 1),
            QuitMessage::AppQuit => (MOZ_WM_APP_QUIT, 0),
        };
        // SAFETY: posting to a possibly stale HWND is reported as an error.
        if unsafe { PostMessageW(hwnd(window), msg, wparam, 0) } == 0 {
            return Err(OsError::last("PostMessage"));
        }
        Ok(())
    }

    fn wait_for_exit(
        &self,
        process: &ProcessHandle,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, OsError> {
        let millis = timeout.map_or(INFINITE, |t| {
            u32::try_from(t.as_millis()).unwrap_or(INFINITE - 1)
        });
        // SAFETY: the handle is open until `close_process`.
        let result = unsafe { WaitForSingleObject(process.raw() as HANDLE, millis) };
        match result {
            WAIT_OBJECT_0 => Ok(WaitOutcome::Exited),
            WAIT_TIMEOUT => Ok(WaitOutcome::TimedOut),
            _ => Err(OsError::last("WaitForSingleObject")),
        }
    }

    fn exit_code(&self, process: &ProcessHandle) -> Result<Option<i32>, OsError> {
        let mut code = 0u32;
        // SAFETY: `code` is a valid out-pointer; the handle is open.
        if unsafe { GetExitCodeProcess(process.raw() as HANDLE, &mut code) } == 0 {
            return Err(OsError::last("GetExitCodeProcess"));
        }
        #[allow(clippy::cast_possible_wrap)]
        Ok(Some(code as i32))
    }

    fn close_process(&self, process: ProcessHandle) {
        // SAFETY: the handle came from OpenProcess and is closed exactly once,
        // since `ProcessHandle` is consumed here.
        if unsafe { CloseHandle(process.raw() as HANDLE) } == 0 {
            tracing::warn!(
                "CloseHandle failed for process {}: {}",
                process.pid(),
                io::Error::last_os_error()
            );
        }
    }
}

/// DWORD values under `HKEY_CURRENT_USER`.
pub mod registry {
    use std::ffi::c_void;
    use std::io;

    use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
    use windows_sys::Win32::System::Registry::{
        RegDeleteKeyValueW, RegGetValueW, RegSetKeyValueW, HKEY_CURRENT_USER, REG_DWORD,
        RRF_RT_REG_DWORD,
    };

    use super::wide;
    use crate::desktop::OsError;

    fn check(operation: &'static str, status: u32) -> Result<(), OsError> {
        if status == ERROR_SUCCESS {
            Ok(())
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Err(OsError::new(operation, io::Error::from_raw_os_error(status as i32)))
        }
    }

    /// Read `subkey\value`, or `None` if the key or value is absent.
    pub fn read_dword(subkey: &str, value: &str) -> Result<Option<u32>, OsError> {
        let subkey = wide(subkey);
        let value = wide(value);
        let mut data = 0u32;
        let mut size = std::mem::size_of::<u32>() as u32;
        // SAFETY: strings are NUL-terminated; `data`/`size` are valid for writes.
        let status = unsafe {
            RegGetValueW(
                HKEY_CURRENT_USER,
                subkey.as_ptr(),
                value.as_ptr(),
                RRF_RT_REG_DWORD,
                std::ptr::null_mut(),
                (&raw mut data).cast::<c_void>(),
                &mut size,
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        check("RegGetValue", status)?;
        Ok(Some(data))
    }

    /// Write `subkey\value`, creating the key if needed.
    pub fn write_dword(subkey: &str, value: &str, data: u32) -> Result<(), OsError> {
        let subkey = wide(subkey);
        let value = wide(value);
        // SAFETY: strings are NUL-terminated; `data` outlives the call.
        let status = unsafe {
            RegSetKeyValueW(
                HKEY_CURRENT_USER,
                subkey.as_ptr(),
                value.as_ptr(),
                REG_DWORD,
                (&raw const data).cast::<c_void>(),
                std::mem::size_of::<u32>() as u32,
            )
        };
        check("RegSetKeyValue", status)
    }

    /// Delete `subkey\value`. Deleting an absent value succeeds.
    pub fn delete_value(subkey: &str, value: &str) -> Result<(), OsError> {
        let subkey = wide(subkey);
        let value = wide(value);
        // SAFETY: strings are NUL-terminated.
        let status =
            unsafe { RegDeleteKeyValueW(HKEY_CURRENT_USER, subkey.as_ptr(), value.as_ptr()) };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        check("RegDeleteKeyValue", status)
    }
}

/// Whether this 32-bit process runs under WOW64.
pub(crate) fn is_wow64() -> bool {
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, IsWow64Process};

    let mut wow64: BOOL = 0;
    // SAFETY: pseudo-handle of the current process; `wow64` is a valid out-pointer.
    let ok = unsafe { IsWow64Process(GetCurrentProcess(), &mut wow64) };
    ok != 0 && wow64 != 0
}

/// Major version reported by the OS.
pub(crate) fn os_major_version() -> Option<u32> {
    use windows_sys::Win32::System::SystemInformation::{GetVersionExW, OSVERSIONINFOW};

    // SAFETY: OSVERSIONINFOW is plain data; all-zero is a valid value.
    let mut info: OSVERSIONINFOW = unsafe { std::mem::zeroed() };
    info.dwOSVersionInfoSize = std::mem::size_of::<OSVERSIONINFOW>() as u32;
    // SAFETY: `info` is initialized with its size as the API requires.
    let ok = unsafe { GetVersionExW(&mut info) };
    (ok != 0).then_some(info.dwMajorVersion)
}
