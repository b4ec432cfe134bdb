//! Wire protocol data model.
//!
//! Every message exchanged with the agent is wrapped in an envelope that
//! carries a correlation `id`:
//!
//! | Direction        | Envelope                 | Payload field |
//! |------------------|--------------------------|---------------|
//! | harness → agent  | [`Submission`]           | `op`          |
//! | agent → harness  | [`Event`]                | `msg`         |
//!
//! Both payload unions are internally tagged by a snake_case `type` field.

pub mod events;
pub mod ops;
pub mod session;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use events::{
    ErrorEvent, EventKind, EventMsg, FileChange, SessionConfiguredEvent,
};
pub use ops::{InputItem, Op, ReviewDecision};
pub use session::{SessionConfig, SessionOptions};

/// Correlation id reserved for the `configure_session` handshake.
pub const CONFIGURE_SESSION_ID: &str = "config-session";

/// Envelope id carried by synthetic error events raised by the harness itself.
pub const ERROR_EVENT_ID: &str = "error";

/// Outbound envelope (harness → agent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Correlation id echoed by the agent on related events.
    pub id: String,
    /// Operation payload.
    pub op: Op,
}

impl Submission {
    /// Wrap `op` under an explicit correlation id.
    #[must_use]
    pub fn new(id: impl Into<String>, op: Op) -> Self {
        Self { id: id.into(), op }
    }

    /// Wrap `op` under a freshly generated UUID v4 correlation id.
    #[must_use]
    pub fn with_generated_id(op: Op) -> Self {
        Self::new(new_correlation_id(), op)
    }
}

/// Inbound envelope (agent → harness).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Id of the submission this event relates to.
    pub id: String,
    /// Event payload.
    pub msg: EventMsg,
}

impl Event {
    /// Build a synthetic `error` event carrying `message`.
    ///
    /// Used for diagnostics and protocol violations that did not arrive as a
    /// well-formed `error` message from the agent.
    #[must_use]
    pub fn synthetic_error(message: impl Into<String>) -> Self {
        Self {
            id: ERROR_EVENT_ID.to_owned(),
            msg: EventMsg::Error(ErrorEvent {
                message: message.into(),
            }),
        }
    }

    /// Discriminant of the payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.msg.kind()
    }
}

/// Generate an opaque correlation id.
#[must_use]
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
