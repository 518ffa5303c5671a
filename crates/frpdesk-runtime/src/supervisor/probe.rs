//! OS-level pid liveness.

/// Whether a process with this pid currently exists.
///
/// Errors other than "no such process" count as alive, so a permission
/// problem never reports a live process as gone.
#[cfg(unix)]
pub(crate) fn pid_exists(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal;
    use nix::unistd::Pid;

    if pid == 0 {
        return false;
    }

    // Null signal: existence and permission checks only, nothing delivered.
    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub(crate) fn pid_exists(pid: u32) -> bool {
    use sysinfo::System;

    if pid == 0 {
        return false;
    }

    let system = System::new_all();
    system.process(sysinfo::Pid::from_u32(pid)).is_some()
}
