//! Outbound operations (harness → agent).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::session::SessionConfig;

/// Operation payload of a [`Submission`](super::Submission).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    /// Start or continue a turn with user-provided content.
    UserInput {
        /// Ordered, non-empty content parts.
        items: Vec<InputItem>,
    },
    /// Answer an `exec_approval_request`.
    ExecApproval {
        /// Id of the approval request being answered.
        id: String,
        /// The reviewer's decision.
        decision: ReviewDecision,
    },
    /// Answer an `apply_patch_approval_request`.
    PatchApproval {
        /// Id of the approval request being answered.
        id: String,
        /// The reviewer's decision.
        decision: ReviewDecision,
    },
    /// Establish model, provider, policy, and working directory for the run.
    ConfigureSession(Box<SessionConfig>),
    /// Cancel the task running under the envelope id.
    Interrupt,
    /// Append an entry to the agent's persistent message history.
    AddToHistory {
        /// Directory the entry was produced in.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
        /// Entry text.
        text: String,
    },
    /// Fetch one history entry; answered by `get_history_entry_response`.
    GetHistoryEntryRequest {
        /// Entry offset within the log.
        offset: u64,
        /// History log identifier from `session_configured`.
        log_id: u64,
    },
}

impl Op {
    /// Wire tag of this operation, used for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserInput { .. } => "user_input",
            Self::ExecApproval { .. } => "exec_approval",
            Self::PatchApproval { .. } => "patch_approval",
            Self::ConfigureSession(_) => "configure_session",
            Self::Interrupt => "interrupt",
            Self::AddToHistory { .. } => "add_to_history",
            Self::GetHistoryEntryRequest { .. } => "get_history_entry_request",
        }
    }
}

/// One content part of a `user_input` operation.
///
/// Reachability of URLs and paths is not checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    /// Plain text.
    Text {
        /// Text content.
        text: String,
    },
    /// Remote or data-URI image.
    Image {
        /// Image URL.
        image_url: String,
    },
    /// Image on the local file system.
    LocalImage {
        /// Path to the image.
        path: PathBuf,
    },
}

impl InputItem {
    /// Convenience constructor for [`InputItem::Text`].
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Reviewer decision sent in `exec_approval` / `patch_approval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Run this one action.
    Approved,
    /// Run this action and identical ones for the rest of the session.
    ApprovedForSession,
    /// Skip the action; the agent keeps working.
    Denied,
    /// Skip the action and stop until the next user input.
    Abort,
}

impl ReviewDecision {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::ApprovedForSession => "approved_for_session",
            Self::Denied => "denied",
            Self::Abort => "abort",
        }
    }
}
