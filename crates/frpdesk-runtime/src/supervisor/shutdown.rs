//! Signal delivery by pid.
//!
//! The waiter task owns every child handle, so stops and kills here work
//! on raw pids. [`Delivery`] separates "signal sent" from "already gone";
//! a dead target is never an error at this layer.

use frpdesk_core::ports::{StopSignal, SupervisorError};

/// What happened to a delivered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The signal reached a live process.
    Delivered,
    /// The process was gone before the signal could land.
    AlreadyGone,
}

/// Send the graceful-stop signal to one pid.
#[cfg(unix)]
pub(crate) fn send_stop_signal(pid: u32, signal: StopSignal) -> Result<Delivery, SupervisorError> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let sig = match signal {
        StopSignal::Term => Signal::SIGTERM,
        StopSignal::Int => Signal::SIGINT,
    };

    match signal::kill(Pid::from_raw(pid as i32), sig) {
        Ok(()) => Ok(Delivery::Delivered),
        Err(Errno::ESRCH) => Ok(Delivery::AlreadyGone),
        Err(e) => Err(SupervisorError::Signal {
            pid,
            reason: e.to_string(),
        }),
    }
}

/// SIGKILL the process group, falling back to the single pid when the
/// target is not a group leader.
#[cfg(unix)]
pub(crate) fn send_kill(pid: u32) -> Result<Delivery, SupervisorError> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw = Pid::from_raw(pid as i32);

    match signal::killpg(raw, Signal::SIGKILL) {
        Ok(()) => return Ok(Delivery::Delivered),
        // ESRCH from killpg also covers "no such group"; the plain kill
        // below settles whether the pid itself is alive.
        Err(Errno::ESRCH | Errno::EPERM) => {}
        Err(e) => {
            return Err(SupervisorError::Signal {
                pid,
                reason: e.to_string(),
            });
        }
    }

    match signal::kill(raw, Signal::SIGKILL) {
        Ok(()) => Ok(Delivery::Delivered),
        Err(Errno::ESRCH) => Ok(Delivery::AlreadyGone),
        Err(e) => Err(SupervisorError::Signal {
            pid,
            reason: e.to_string(),
        }),
    }
}

// Windows has no SIGTERM equivalent; taskkill terminates the tree and a
// stop degrades to the same hard termination as a kill.

#[cfg(not(unix))]
pub(crate) fn send_stop_signal(pid: u32, _signal: StopSignal) -> Result<Delivery, SupervisorError> {
    taskkill(pid, false)
}

#[cfg(not(unix))]
pub(crate) fn send_kill(pid: u32) -> Result<Delivery, SupervisorError> {
    taskkill(pid, true)
}

#[cfg(not(unix))]
fn taskkill(pid: u32, force: bool) -> Result<Delivery, SupervisorError> {
    use std::process::Command;

    let mut command = Command::new("taskkill");
    command.arg("/PID").arg(pid.to_string()).arg("/T");
    if force {
        command.arg("/F");
    }

    let output = command.output().map_err(|e| SupervisorError::Signal {
        pid,
        reason: e.to_string(),
    })?;

    if output.status.success() {
        Ok(Delivery::Delivered)
    } else if output.status.code() == Some(128) {
        // taskkill exit code for "process not found"
        Ok(Delivery::AlreadyGone)
    } else {
        Err(SupervisorError::Signal {
            pid,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn signalling_a_dead_pid_reports_already_gone() {
        let delivery = send_stop_signal(999_999_999, StopSignal::Term).unwrap();
        assert_eq!(delivery, Delivery::AlreadyGone);

        let delivery = send_kill(999_999_999).unwrap();
        assert_eq!(delivery, Delivery::AlreadyGone);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn term_reaches_a_live_process() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id().expect("no pid");

        let delivery = send_stop_signal(pid, StopSignal::Term).unwrap();
        assert_eq!(delivery, Delivery::Delivered);

        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
