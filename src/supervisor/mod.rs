//! Agent process supervision.
//!
//! The [`Supervisor`] exclusively owns the agent child process and its stdio
//! pipes. Everything else reaches the process through the [`Outbound`] send
//! primitive or through events on the [`EventBus`].
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted ──start──▶ Running ──stop──▶ Stopped ──start──▶ Running
//!                          │
//!                          └── process exits on its own ──▶ NotStarted
//! ```
//!
//! Starting a running supervisor and stopping an idle one are no-ops. An
//! unexpected exit is logged and the handle cleared; nothing is restarted
//! automatically.

pub mod args;
pub mod monitor;

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::EventBus;
use crate::config::LaunchConfig;
use crate::protocol::Submission;
use crate::wire::{codec, diagnostics, reader};
use crate::{AppError, Result};

use self::args::{command_args, ArgsEncoder, FlagArgs};

/// Send primitive used by the session engine.
///
/// Implemented by [`Supervisor`]; tests substitute a recorder.
pub trait Outbound: Send + Sync {
    /// Write `submission` to the agent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] when the agent is not running or its
    /// stdin rejects the write.
    fn send<'a>(
        &'a self,
        submission: &'a Submission,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Lifecycle state of the supervised process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessState {
    /// Never started, or exited on its own.
    #[default]
    NotStarted,
    /// Process is running.
    Running,
    /// Stopped through [`Supervisor::stop`].
    Stopped,
}

/// Handle to the live process.
#[derive(Debug)]
struct Running {
    pid: Option<u32>,
    generation: u64,
    stdin: Arc<tokio::sync::Mutex<ChildStdin>>,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct Slot {
    state: ProcessState,
    /// Incremented on every spawn so a stale exit monitor never clears a
    /// newer process.
    generation: u64,
    running: Option<Running>,
}

/// Owner of the agent process.
#[derive(Debug)]
pub struct Supervisor {
    config: LaunchConfig,
    encoder: Arc<dyn ArgsEncoder>,
    bus: Arc<EventBus>,
    slot: Arc<Mutex<Slot>>,
}

impl Supervisor {
    /// Supervisor publishing on `bus`, deriving arguments with [`FlagArgs`].
    #[must_use]
    pub fn new(config: LaunchConfig, bus: Arc<EventBus>) -> Self {
        Self::with_encoder(config, bus, Arc::new(FlagArgs))
    }

    /// Supervisor using a custom argument encoder.
    #[must_use]
    pub fn with_encoder(
        config: LaunchConfig,
        bus: Arc<EventBus>,
        encoder: Arc<dyn ArgsEncoder>,
    ) -> Self {
        Self {
            config,
            encoder,
            bus,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Launch configuration.
    #[must_use]
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        lock(&self.slot).state
    }

    /// OS process id of the running agent.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        lock(&self.slot).running.as_ref().and_then(|r| r.pid)
    }

    /// `true` while a process handle is held.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.slot).running.is_some()
    }

    /// Full argument vector the agent is launched with.
    #[must_use]
    pub fn command_line(&self) -> Vec<String> {
        command_args(
            &self.config.program_args,
            self.encoder.as_ref(),
            &self.config.session,
        )
    }

    /// Spawn the agent unless it is already running.
    ///
    /// Must be called from within a Tokio runtime: stdout, stderr, and exit
    /// monitoring run as background tasks.
    ///
    /// # Errors
    ///
    /// - [`AppError::Config`] if the working directory cannot be determined.
    /// - [`AppError::Spawn`] if the process cannot be spawned or one of its
    ///   stdio pipes cannot be captured.
    pub fn start(&self) -> Result<()> {
        let mut slot = lock(&self.slot);
        if slot.running.is_some() {
            debug!("start: agent already running");
            return Ok(());
        }

        let cwd = self.config.working_dir()?;
        let args = self.command_line();

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args);
        if let Some(env) = &self.config.env {
            cmd.env_clear();
            cmd.envs(env);
        }
        if let Some(key) = &self.config.api_key {
            cmd.env(self.config.api_key_env(), key);
        }
        cmd.current_dir(&cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            AppError::Spawn(format!("failed to spawn {}: {err}", self.config.program))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture agent stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture agent stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture agent stderr".into()))?;

        slot.generation += 1;
        let generation = slot.generation;
        let pid = child.id();
        let cancel = CancellationToken::new();

        tokio::spawn(reader::run_stdout_reader(
            stdout,
            Arc::clone(&self.bus),
            cancel.clone(),
        ));
        tokio::spawn(diagnostics::run_stderr_reader(
            stderr,
            Arc::clone(&self.bus),
            cancel.clone(),
        ));

        let exit_slot = Arc::clone(&self.slot);
        let monitor = monitor::monitor_exit(
            child,
            monitor::grace_period(),
            cancel.clone(),
            move |code| {
                let mut slot = lock(&exit_slot);
                let current = slot
                    .running
                    .as_ref()
                    .is_some_and(|running| running.generation == generation);
                if current {
                    slot.running = None;
                    slot.state = ProcessState::NotStarted;
                    debug!(?code, generation, "agent handle cleared after exit");
                }
            },
        );
        // Detached: the monitor lives as long as the child does.
        drop(monitor);

        slot.running = Some(Running {
            pid,
            generation,
            stdin: Arc::new(tokio::sync::Mutex::new(stdin)),
            cancel,
        });
        slot.state = ProcessState::Running;

        info!(
            ?pid,
            program = %self.config.program,
            ?args,
            cwd = %cwd.display(),
            "agent process started"
        );
        Ok(())
    }

    /// Terminate the agent if it is running.
    ///
    /// Sends the termination signal and clears the handle without waiting for
    /// the process to exit.
    pub fn stop(&self) {
        let running = {
            let mut slot = lock(&self.slot);
            let Some(running) = slot.running.take() else {
                debug!("stop: agent not running");
                return;
            };
            slot.state = ProcessState::Stopped;
            running
        };

        if let Some(pid) = running.pid {
            if !monitor::terminate(pid) {
                debug!(pid, "termination signal not delivered; monitor will kill");
            }
        }
        running.cancel.cancel();
        info!(pid = ?running.pid, "agent process stopping");
    }

    /// [`stop`](Self::stop) followed by [`start`](Self::start) with the same
    /// configuration.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`start`](Self::start).
    pub fn restart(&self) -> Result<()> {
        self.stop();
        self.start()
    }

    /// Encode `submission` and write it to the agent's stdin.
    ///
    /// # Errors
    ///
    /// - [`AppError::Codec`] if the submission cannot be serialized.
    /// - [`AppError::Transport`] if the agent is not running or the write or
    ///   flush fails.
    pub async fn send(&self, submission: &Submission) -> Result<()> {
        let line = codec::encode(submission)?;

        let stdin = lock(&self.slot)
            .running
            .as_ref()
            .map(|running| Arc::clone(&running.stdin))
            .ok_or_else(|| AppError::Transport("agent process is not running".into()))?;

        debug!(id = %submission.id, op = submission.op.kind(), "sending operation");

        let mut stdin = stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::Transport(format!("agent stdin is not writable: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| AppError::Transport(format!("agent stdin flush failed: {e}")))?;
        Ok(())
    }
}

impl Outbound for Supervisor {
    fn send<'a>(
        &'a self,
        submission: &'a Submission,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Supervisor::send(self, submission))
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
