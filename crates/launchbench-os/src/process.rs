//! Spawning the benchmarked application.
//!
//! The target is started detached from our terminal so that a Ctrl+C aimed at
//! the harness does not also kill the application mid-iteration; the harness
//! shuts it down itself during teardown.

use std::process::{Child, Command, Stdio};

/// Spawn `command` detached from the controlling terminal.
///
/// This function:
/// - Redirects stdin/stdout/stderr to /dev/null (or NUL)
/// - On Unix, calls `setsid()` in the child so it leads its own session and
///   process group and does not receive terminal signals
/// - Returns immediately with the child
///
/// The returned [`Child`] may be dropped; dropping does not kill the process.
#[cfg(unix)]
pub fn spawn_detached(command: &mut Command) -> std::io::Result<Child> {
    use std::os::unix::process::CommandExt;

    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    // setsid() must run in the child before exec. It fails if the caller is
    // already a process group leader, which a freshly forked child never is.
    unsafe {
        command.pre_exec(|| match nix::unistd::setsid() {
            Ok(_) => Ok(()),
            Err(e) => Err(std::io::Error::from_raw_os_error(e as i32)),
        });
    }

    command.spawn()
}

/// Spawn `command` with its streams redirected to NUL.
#[cfg(not(unix))]
pub fn spawn_detached(command: &mut Command) -> std::io::Result<Child> {
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());
    command.spawn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_spawn_detached_true() {
        let mut child = spawn_detached(&mut Command::new("true")).unwrap();
        let status = child.wait().unwrap();
        assert!(status.success());
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_detached_leads_new_session() {
        let mut child = spawn_detached(&mut Command::new("sleep").arg("5")).unwrap();
        let pid = nix::unistd::Pid::from_raw(i32::try_from(child.id()).unwrap());
        let sid = nix::unistd::getsid(Some(pid)).unwrap();
        child.kill().unwrap();
        child.wait().unwrap();
        assert_eq!(sid, pid);
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let result = spawn_detached(&mut Command::new("/nonexistent/launchbench-target-12345"));
        assert!(result.is_err());
    }
}
