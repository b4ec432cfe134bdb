//! What a single-task driver does with each event it receives.
//!
//! Diagnostics on the error channel are reported but never end the task;
//! the agent dying is noticed through the supervisor state instead.

use crate::approval::ApprovalRequest;
use crate::bus::Channel;
use crate::protocol::{Event, EventMsg};

/// Reaction to one bus event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Report the event and keep waiting.
    Continue,
    /// Answer an approval request, then keep waiting.
    Answer(ApprovalRequest),
    /// The task finished; `last_message` is the agent's final reply.
    Finish {
        /// Last agent message, if the agent sent one.
        last_message: Option<String>,
    },
}

impl Step {
    /// Reaction to `event` received on `channel`.
    #[must_use]
    pub fn of(channel: Channel, event: &Event) -> Self {
        if channel == Channel::Error {
            return Self::Continue;
        }
        if let EventMsg::TaskComplete(done) = &event.msg {
            return Self::Finish {
                last_message: done.last_agent_message.clone(),
            };
        }
        ApprovalRequest::from_event(event).map_or(Self::Continue, Self::Answer)
    }
}
