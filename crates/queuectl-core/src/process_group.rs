//! Process-group helpers for reliable child cleanup on timeout (§4.3).
//!
//! Grounded on the pack's process-group handling for sandboxed shell
//! execution: the child is placed in its own process group at `pre_exec`
//! time so a timeout can terminate the whole tree, not just the leader.
//! On non-Unix platforms these are no-ops; QueueCTL's timeout enforcement
//! degrades to killing the leader process only.

use std::io;
use tokio::process::Child;

#[cfg(unix)]
/// Put the calling process into its own process group. Intended for
/// `pre_exec` so the spawned shell becomes the group leader.
pub fn set_process_group() -> io::Result<()> {
    if unsafe { libc::setpgid(0, 0) } == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
pub fn set_process_group() -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn signal_process_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
    use std::io::ErrorKind;

    let pgid = unsafe { libc::getpgid(pid as libc::pid_t) };
    if pgid == -1 {
        let err = io::Error::last_os_error();
        return if err.kind() == ErrorKind::NotFound {
            Ok(())
        } else {
            Err(err)
        };
    }

    if unsafe { libc::killpg(pgid, signal) } == -1 {
        let err = io::Error::last_os_error();
        if err.kind() != ErrorKind::NotFound {
            return Err(err);
        }
    }
    Ok(())
}

/// Soft termination: SIGTERM the whole group. Called when `timeout_s`
/// elapses, before the grace period.
pub fn terminate_child_process_group(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            return signal_process_group(pid, libc::SIGTERM);
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = child;
        Ok(())
    }
}

/// Forceful termination: SIGKILL the whole group. Called after the grace
/// period if the group has not exited.
pub fn kill_child_process_group(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            return signal_process_group(pid, libc::SIGKILL);
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = child;
        Ok(())
    }
}
