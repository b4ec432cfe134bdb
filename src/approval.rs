//! Approval gating for agent commands and patches.
//!
//! Under most approval policies the agent pauses before running a command or
//! applying a patch and asks the user. [`ApprovalRequest::from_event`]
//! recognises those requests; [`decide`] maps the user's answer onto a
//! [`ReviewDecision`].

use std::path::PathBuf;

use crate::protocol::events::{ApplyPatchApprovalRequestEvent, ExecApprovalRequestEvent};
use crate::protocol::{Event, EventMsg, ReviewDecision};

/// Map a yes/no answer onto a review decision.
///
/// | `approved` | `for_session` | Decision               |
/// |------------|---------------|------------------------|
/// | `false`    | any           | `denied`               |
/// | `true`     | `false`       | `approved`             |
/// | `true`     | `true`        | `approved_for_session` |
///
/// `abort` is never produced here; send it through a raw submission.
#[must_use]
pub fn decide(approved: bool, for_session: bool) -> ReviewDecision {
    match (approved, for_session) {
        (false, _) => ReviewDecision::Denied,
        (true, false) => ReviewDecision::Approved,
        (true, true) => ReviewDecision::ApprovedForSession,
    }
}

/// What the agent asks permission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalKind {
    /// Run a command (`exec_approval_request`).
    Exec,
    /// Apply a patch (`apply_patch_approval_request`).
    Patch,
}

impl ApprovalKind {
    /// Short label for logs and prompts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::Patch => "patch",
        }
    }
}

/// A pending approval request extracted from an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    /// Command or patch.
    pub kind: ApprovalKind,
    /// Id the answer must reference (the request's envelope id).
    pub call_id: String,
    /// One-line description for the reviewer.
    pub summary: String,
    /// Reason given by the agent, if any.
    pub reason: Option<String>,
}

impl ApprovalRequest {
    /// Extract an approval request from `event`.
    ///
    /// Returns `None` for every event that is not an approval request.
    #[must_use]
    pub fn from_event(event: &Event) -> Option<Self> {
        let (kind, summary, reason) = match &event.msg {
            EventMsg::ExecApprovalRequest(ExecApprovalRequestEvent {
                command,
                cwd,
                reason,
            }) => (
                ApprovalKind::Exec,
                format!("run `{}` in {}", command.join(" "), cwd.display()),
                reason.clone(),
            ),
            EventMsg::ApplyPatchApprovalRequest(ApplyPatchApprovalRequestEvent {
                changes,
                reason,
                ..
            }) => (
                ApprovalKind::Patch,
                patch_summary(changes.keys()),
                reason.clone(),
            ),
            _ => return None,
        };

        Some(Self {
            kind,
            call_id: event.id.clone(),
            summary,
            reason,
        })
    }
}

fn patch_summary<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> String {
    let paths: Vec<String> = paths.map(|path| path.display().to_string()).collect();
    match paths.len() {
        0 => "apply an empty patch".to_owned(),
        1 => format!("patch {}", paths[0]),
        n => format!("patch {n} files: {}", paths.join(", ")),
    }
}
