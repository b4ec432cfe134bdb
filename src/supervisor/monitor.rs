//! Agent process exit monitoring and termination.

use std::time::Duration;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time a stopped agent gets to exit after `SIGTERM` before it is killed.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Spawn a task owning `child` until it exits.
///
/// - The child exits on its own: the exit is logged at `WARN` and `on_exit`
///   runs with the exit code (`None` when killed by a signal).
/// - `cancel` fires (the supervisor stopped it): the task waits up to
///   `grace` for the child to exit, then kills it. `on_exit` does not run.
#[must_use]
pub fn monitor_exit<F>(
    mut child: Child,
    grace: Duration,
    cancel: CancellationToken,
    on_exit: F,
) -> JoinHandle<()>
where
    F: FnOnce(Option<i32>) + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            result = child.wait() => {
                let code = match result {
                    Ok(status) => {
                        let code = status.code();
                        match code {
                            Some(c) => warn!(code = c, "agent process exited"),
                            None => warn!("agent process terminated by signal"),
                        }
                        code
                    }
                    Err(err) => {
                        warn!(%err, "error waiting for agent process");
                        None
                    }
                };
                on_exit(code);
            }
            () = cancel.cancelled() => {
                match tokio::time::timeout(grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        info!(code = ?status.code(), "agent process stopped");
                    }
                    Ok(Err(err)) => {
                        warn!(%err, "error waiting for stopped agent process");
                    }
                    Err(_elapsed) => {
                        warn!(?grace, "agent process ignored termination signal, killing");
                        if let Err(err) = child.kill().await {
                            warn!(%err, "failed to kill agent process");
                        }
                    }
                }
            }
        }
    })
}

/// Ask process `pid` to terminate with `SIGTERM`.
///
/// Returns `false` when the signal could not be delivered.
#[cfg(unix)]
#[must_use]
pub fn terminate(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(err) => {
            warn!(pid, %err, "failed to send SIGTERM to agent process");
            false
        }
    }
}

/// Graceful termination is not available; the monitor kills the process.
#[cfg(not(unix))]
#[must_use]
pub fn terminate(_pid: u32) -> bool {
    false
}

/// Grace period the monitor applies after [`terminate`].
#[must_use]
pub fn grace_period() -> Duration {
    if cfg!(unix) {
        STOP_GRACE_PERIOD
    } else {
        Duration::ZERO
    }
}
