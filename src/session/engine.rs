//! Session protocol engine.
//!
//! Builds outbound operations, sends them through an [`Outbound`] primitive,
//! and correlates the answers the agent publishes on the bus. The engine never
//! touches the process itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::approval;
use crate::bus::{Channel, EventBus, Subscription};
use crate::protocol::{
    new_correlation_id, ErrorEvent, Event, EventKind, EventMsg, InputItem, Op,
    SessionConfig, SessionConfiguredEvent, SessionOptions, Submission, CONFIGURE_SESSION_ID,
};
use crate::supervisor::Outbound;
use crate::{AppError, Result};

use super::correlation::{CorrelationTable, Settlement};

/// Protocol engine bound to one bus and one outbound primitive.
pub struct SessionEngine {
    bus: Arc<EventBus>,
    outbound: Arc<dyn Outbound>,
    pending: Arc<CorrelationTable>,
    default_cwd: PathBuf,
    router: Subscription,
}

impl SessionEngine {
    /// Engine sending through `outbound` and correlating answers from the
    /// `response` channel of `bus`.
    ///
    /// `default_cwd` fills an unset session working directory.
    #[must_use]
    pub fn new(bus: Arc<EventBus>, outbound: Arc<dyn Outbound>, default_cwd: PathBuf) -> Self {
        let pending = Arc::new(CorrelationTable::new());
        let table = Arc::clone(&pending);
        let router = bus.subscribe(Channel::Response, move |event| {
            let _ = table.dispatch(event);
        });

        Self {
            bus,
            outbound,
            pending,
            default_cwd,
            router,
        }
    }

    /// Working directory used when the session options set none.
    #[must_use]
    pub fn default_cwd(&self) -> &Path {
        &self.default_cwd
    }

    /// Send `configure_session` and wait for the agent's answer.
    ///
    /// The wait has no deadline of its own; wrap the call in
    /// `tokio::time::timeout` to bound it. Dropping the future abandons the
    /// wait and clears its correlation.
    ///
    /// # Errors
    ///
    /// - [`AppError::Config`] if `model` or `provider` is missing.
    /// - [`AppError::Transport`] if the operation cannot be sent.
    /// - [`AppError::Session`] with the agent's message if it answers with
    ///   `error`.
    pub async fn configure_session(
        &self,
        options: SessionOptions,
    ) -> Result<SessionConfiguredEvent> {
        let config = SessionConfig::resolve(options, &self.default_cwd)?;
        let model = config.model.clone();

        let awaiting = self
            .pending
            .register(EventKind::SessionConfigured, EventKind::Error);
        self.outbound
            .send(&Submission::new(
                CONFIGURE_SESSION_ID,
                Op::ConfigureSession(Box::new(config)),
            ))
            .await?;
        debug!(%model, "configure_session sent, awaiting answer");

        match awaiting.settled().await {
            Some(Settlement::Resolved(Event {
                msg: EventMsg::SessionConfigured(configured),
                ..
            })) => {
                info!(
                    session_id = %configured.session_id,
                    model = %configured.model,
                    "session configured"
                );
                Ok(configured)
            }
            Some(Settlement::Rejected(Event {
                msg: EventMsg::Error(ErrorEvent { message }),
                ..
            })) => {
                warn!(%message, "session configuration rejected");
                Err(AppError::Session(message))
            }
            Some(Settlement::Resolved(event) | Settlement::Rejected(event)) => {
                Err(AppError::Protocol(format!(
                    "unexpected `{}` answer to configure_session",
                    event.kind()
                )))
            }
            None => Err(AppError::Session(
                "configure_session wait was cancelled".into(),
            )),
        }
    }

    /// Send a `user_input` operation.
    ///
    /// Uses `run_id` as the envelope id when given, a fresh UUID otherwise,
    /// and returns the id used. Events of the resulting task carry it.
    ///
    /// # Errors
    ///
    /// - [`AppError::Protocol`] if `items` is empty.
    /// - [`AppError::Transport`] if the operation cannot be sent.
    pub async fn send_user_message(
        &self,
        items: Vec<InputItem>,
        run_id: Option<String>,
    ) -> Result<String> {
        if items.is_empty() {
            return Err(AppError::Protocol(
                "user_input requires at least one item".into(),
            ));
        }
        let id = run_id.unwrap_or_else(new_correlation_id);
        self.send_raw(&Submission::new(id.clone(), Op::UserInput { items }))
            .await?;
        Ok(id)
    }

    /// Answer an `exec_approval_request` identified by `call_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the operation cannot be sent.
    pub async fn handle_command(
        &self,
        call_id: &str,
        approved: bool,
        for_session: bool,
    ) -> Result<()> {
        let decision = approval::decide(approved, for_session);
        debug!(call_id, decision = decision.as_str(), "answering exec approval");
        self.send_raw(&Submission::with_generated_id(Op::ExecApproval {
            id: call_id.to_owned(),
            decision,
        }))
        .await
    }

    /// Answer an `apply_patch_approval_request` identified by `call_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the operation cannot be sent.
    pub async fn handle_patch(
        &self,
        call_id: &str,
        approved: bool,
        for_session: bool,
    ) -> Result<()> {
        let decision = approval::decide(approved, for_session);
        debug!(call_id, decision = decision.as_str(), "answering patch approval");
        self.send_raw(&Submission::with_generated_id(Op::PatchApproval {
            id: call_id.to_owned(),
            decision,
        }))
        .await
    }

    /// Ask the agent to interrupt the task running under `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the operation cannot be sent.
    pub async fn abort(&self, request_id: &str) -> Result<()> {
        info!(request_id, "interrupting task");
        self.send_raw(&Submission::new(request_id, Op::Interrupt))
            .await
    }

    /// Append `text` to the agent's persistent history.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the operation cannot be sent.
    pub async fn add_to_history(
        &self,
        text: impl Into<String>,
        cwd: Option<PathBuf>,
    ) -> Result<()> {
        self.send_raw(&Submission::with_generated_id(Op::AddToHistory {
            cwd,
            text: text.into(),
        }))
        .await
    }

    /// Request one history entry and return the envelope id used.
    ///
    /// The entry arrives later as a `get_history_entry_response` event on the
    /// `response` channel.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the operation cannot be sent.
    pub async fn request_history_entry(&self, log_id: u64, offset: u64) -> Result<String> {
        let submission =
            Submission::with_generated_id(Op::GetHistoryEntryRequest { offset, log_id });
        let id = submission.id.clone();
        self.send_raw(&submission).await?;
        Ok(id)
    }

    /// Send an arbitrary submission unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the operation cannot be sent.
    pub async fn send_raw(&self, submission: &Submission) -> Result<()> {
        self.outbound.send(submission).await
    }

    /// Subscribe to every decoded agent event.
    #[must_use]
    pub fn on_response<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.bus.subscribe(Channel::Response, handler)
    }

    /// Subscribe to diagnostics and protocol violations.
    #[must_use]
    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.bus.subscribe(Channel::Error, handler)
    }

    /// Number of correlations still awaiting an answer.
    #[must_use]
    pub fn pending_correlations(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("pending", &self.pending.len())
            .field("default_cwd", &self.default_cwd)
            .finish_non_exhaustive()
    }
}

impl Drop for SessionEngine {
    fn drop(&mut self) {
        self.router.unsubscribe();
    }
}
