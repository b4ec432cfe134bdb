//! Session façade.
//!
//! A [`Session`] ties one [`EventBus`], one [`Supervisor`], and one
//! [`SessionEngine`] together. Several sessions can coexist in one process;
//! none of them share state.
//!
//! ```rust,ignore
//! let session = Session::new(config)?;
//! session.start()?;
//! let configured = session.configure().await?;
//! session.send_user_message(vec![InputItem::text("hello")], None).await?;
//! ```

pub mod correlation;
pub mod engine;

use std::path::PathBuf;
use std::sync::Arc;

use crate::approval::{ApprovalKind, ApprovalRequest};
use crate::bus::{EventBus, Subscription};
use crate::config::LaunchConfig;
use crate::protocol::{Event, InputItem, SessionConfiguredEvent, SessionOptions, Submission};
use crate::supervisor::args::ArgsEncoder;
use crate::supervisor::{Outbound, ProcessState, Supervisor};
use crate::Result;

pub use self::engine::SessionEngine;

/// One agent process and the protocol session running over it.
#[derive(Debug)]
pub struct Session {
    bus: Arc<EventBus>,
    supervisor: Arc<Supervisor>,
    engine: SessionEngine,
}

impl Session {
    /// Session for `config` using the default argument encoder.
    ///
    /// Does not start the process.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`](crate::AppError::Config) if the working
    /// directory cannot be determined.
    pub fn new(config: LaunchConfig) -> Result<Self> {
        let bus = Arc::new(EventBus::new());
        let supervisor = Arc::new(Supervisor::new(config, Arc::clone(&bus)));
        Self::assemble(bus, supervisor)
    }

    /// Session deriving launch arguments with `encoder`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`](crate::AppError::Config) if the working
    /// directory cannot be determined.
    pub fn with_encoder(config: LaunchConfig, encoder: Arc<dyn ArgsEncoder>) -> Result<Self> {
        let bus = Arc::new(EventBus::new());
        let supervisor = Arc::new(Supervisor::with_encoder(config, Arc::clone(&bus), encoder));
        Self::assemble(bus, supervisor)
    }

    fn assemble(bus: Arc<EventBus>, supervisor: Arc<Supervisor>) -> Result<Self> {
        let default_cwd = supervisor.config().working_dir()?;
        let outbound: Arc<dyn Outbound> = Arc::clone(&supervisor) as Arc<dyn Outbound>;
        let engine = SessionEngine::new(Arc::clone(&bus), outbound, default_cwd);
        Ok(Self {
            bus,
            supervisor,
            engine,
        })
    }

    // ── Process lifecycle ─────────────────────────────────────────────────────

    /// Spawn the agent unless it is already running.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::start`].
    pub fn start(&self) -> Result<()> {
        self.supervisor.start()
    }

    /// Terminate the agent if it is running.
    pub fn stop(&self) {
        self.supervisor.stop();
    }

    /// Stop then start the agent with the same configuration.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::start`].
    pub fn restart(&self) -> Result<()> {
        self.supervisor.restart()
    }

    /// Lifecycle state of the agent process.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.supervisor.state()
    }

    /// The underlying supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// The session's event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ── Protocol operations ───────────────────────────────────────────────────

    /// Configure the session from the `[session]` table of the launch
    /// configuration.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::configure_session`].
    pub async fn configure(&self) -> Result<SessionConfiguredEvent> {
        let options = self.supervisor.config().session.clone();
        self.engine.configure_session(options).await
    }

    /// Configure the session with explicit `options`.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::configure_session`].
    pub async fn configure_session(
        &self,
        options: SessionOptions,
    ) -> Result<SessionConfiguredEvent> {
        self.engine.configure_session(options).await
    }

    /// Send user input; returns the run id.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::send_user_message`].
    pub async fn send_user_message(
        &self,
        items: Vec<InputItem>,
        run_id: Option<String>,
    ) -> Result<String> {
        self.engine.send_user_message(items, run_id).await
    }

    /// Answer a command approval request.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::handle_command`].
    pub async fn handle_command(
        &self,
        call_id: &str,
        approved: bool,
        for_session: bool,
    ) -> Result<()> {
        self.engine
            .handle_command(call_id, approved, for_session)
            .await
    }

    /// Answer a patch approval request.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::handle_patch`].
    pub async fn handle_patch(&self, call_id: &str, approved: bool, for_session: bool) -> Result<()> {
        self.engine.handle_patch(call_id, approved, for_session).await
    }

    /// Answer `request` with the operation matching its kind.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// answer cannot be sent.
    pub async fn respond(
        &self,
        request: &ApprovalRequest,
        approved: bool,
        for_session: bool,
    ) -> Result<()> {
        match request.kind {
            ApprovalKind::Exec => {
                self.handle_command(&request.call_id, approved, for_session)
                    .await
            }
            ApprovalKind::Patch => {
                self.handle_patch(&request.call_id, approved, for_session)
                    .await
            }
        }
    }

    /// Interrupt the task running under `request_id`.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::abort`].
    pub async fn abort(&self, request_id: &str) -> Result<()> {
        self.engine.abort(request_id).await
    }

    /// Append an entry to the agent's history.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::add_to_history`].
    pub async fn add_to_history(&self, text: impl Into<String>, cwd: Option<PathBuf>) -> Result<()> {
        self.engine.add_to_history(text, cwd).await
    }

    /// Request one history entry; returns the envelope id.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::request_history_entry`].
    pub async fn request_history_entry(&self, log_id: u64, offset: u64) -> Result<String> {
        self.engine.request_history_entry(log_id, offset).await
    }

    /// Send an arbitrary submission.
    ///
    /// # Errors
    ///
    /// See [`SessionEngine::send_raw`].
    pub async fn send_raw(&self, submission: &Submission) -> Result<()> {
        self.engine.send_raw(submission).await
    }

    // ── Subscriptions ─────────────────────────────────────────────────────────

    /// Subscribe to every decoded agent event.
    #[must_use]
    pub fn on_response<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.engine.on_response(handler)
    }

    /// Subscribe to diagnostics and protocol violations.
    #[must_use]
    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.engine.on_error(handler)
    }

    /// Number of correlations still awaiting an answer.
    #[must_use]
    pub fn pending_correlations(&self) -> usize {
        self.engine.pending_correlations()
    }
}
