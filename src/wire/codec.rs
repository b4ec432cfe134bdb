//! JSON codec for the agent's stdio streams.
//!
//! Outbound, every [`Submission`] becomes one compact JSON document followed
//! by exactly one `\n` ([`encode`]).
//!
//! Inbound, the agent is not consistent about framing: it sometimes writes
//! compact newline-delimited documents and sometimes one large pretty-printed
//! document spread over many lines, and a single read may end in the middle
//! of either. [`WireDecoder`] therefore does not split on newlines first.
//! It runs a streaming JSON parser over everything buffered so far:
//!
//! - a complete document is consumed and yielded, whatever its layout;
//! - a document cut off by the end of the buffer stays buffered until the
//!   next read completes it; the parse is only retried once a newline or a
//!   closing bracket has arrived past the point already scanned;
//! - a syntax error drops the offending line with a warning and decoding
//!   resumes on the next line.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use codex_harness::wire::codec::WireDecoder;
//!
//! let inbound = FramedRead::new(child_stdout, WireDecoder::new());
//! ```

use bytes::{Buf, BytesMut};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

use crate::protocol::{ErrorEvent, Event, EventKind, EventMsg, SessionConfiguredEvent, Submission};
use crate::{AppError, Result};

/// Upper bound on bytes held for a single incomplete document: 8 MiB.
///
/// A partial document that grows beyond this is discarded with a warning.
pub const MAX_BUFFERED_BYTES: usize = 8 * 1_048_576;

/// One decoded inbound item.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A well-formed event envelope.
    Event(Event),
    /// Valid JSON that is not a known event envelope (unknown `type`,
    /// missing or mistyped fields).
    Rejected {
        /// The offending document, trimmed.
        raw: String,
        /// Why the document was rejected.
        reason: String,
    },
}

/// Serialize `submission` as a single NDJSON line.
///
/// # Errors
///
/// Returns [`AppError::Codec`] if serialization fails.
pub fn encode(submission: &Submission) -> Result<String> {
    let mut line = serde_json::to_string(submission)
        .map_err(|e| AppError::Codec(format!("failed to serialise submission: {e}")))?;
    line.push('\n');
    Ok(line)
}

/// Decode every item contained in `chunk`, treating it as the whole stream.
///
/// Any trailing incomplete document is dropped with a warning.
#[must_use]
pub fn decode(chunk: &[u8]) -> Vec<Inbound> {
    let mut decoder = WireDecoder::new();
    let mut buf = BytesMut::from(chunk);
    let mut items = Vec::new();
    while let Ok(Some(item)) = decoder.decode_eof(&mut buf) {
        items.push(item);
    }
    items
}

/// Buffering decoder for the agent's stdout.
///
/// Never fails: invalid input is logged and skipped. The `Error` type exists
/// to satisfy [`Decoder`], whose I/O errors surface through it.
#[derive(Debug, Default)]
pub struct WireDecoder {
    /// Bytes of the buffered partial document already known not to complete
    /// it.
    scanned: usize,
}

impl WireDecoder {
    /// Create a decoder with an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the incomplete document in `src` for the next read, unless it
    /// has outgrown [`MAX_BUFFERED_BYTES`].
    fn hold(&mut self, src: &mut BytesMut) {
        if src.len() > MAX_BUFFERED_BYTES {
            warn!(
                buffered = src.len(),
                "wire decoder: incomplete document exceeds buffer limit, discarding"
            );
            src.clear();
            self.scanned = 0;
        } else {
            self.scanned = src.len();
        }
    }
}

impl Decoder for WireDecoder {
    type Item = Inbound;
    type Error = AppError;

    /// Yield the next complete document in `src`, or `Ok(None)` when more
    /// bytes are needed.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let leading = src
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            src.advance(leading);
            self.scanned = self.scanned.saturating_sub(leading);
            if src.is_empty() {
                self.scanned = 0;
                return Ok(None);
            }
            if self.scanned > 0 && !may_complete(&src[self.scanned.min(src.len())..]) {
                self.hold(src);
                return Ok(None);
            }

            let (parsed, consumed) = {
                let mut stream =
                    serde_json::Deserializer::from_slice(&src[..]).into_iter::<Value>();
                let parsed = stream.next();
                (parsed, stream.byte_offset())
            };

            match parsed {
                Some(Ok(value)) => {
                    self.scanned = 0;
                    let raw = src.split_to(consumed);
                    if let Some(item) = classify(&value, &raw) {
                        return Ok(Some(item));
                    }
                }
                Some(Err(err)) if err.is_eof() => {
                    self.hold(src);
                    return Ok(None);
                }
                Some(Err(err)) => {
                    self.scanned = 0;
                    let line = take_line(src);
                    warn!(
                        error = %err,
                        line = %String::from_utf8_lossy(&line).trim(),
                        "wire decoder: invalid JSON, dropping line"
                    );
                }
                None => {
                    src.clear();
                    self.scanned = 0;
                    return Ok(None);
                }
            }
        }
    }

    /// Flush at end of stream; an incomplete trailing document is dropped.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.scanned = 0;
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if !src.is_empty() {
            warn!(
                bytes = src.len(),
                "wire decoder: stream ended inside a document, dropping remainder"
            );
            src.clear();
        }
        self.scanned = 0;
        Ok(None)
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// `true` when `fresh` could end the document being buffered.
fn may_complete(fresh: &[u8]) -> bool {
    fresh.iter().any(|b| matches!(b, b'\n' | b'}' | b']'))
}

/// Remove and return everything up to and including the first `\n`
/// (or the whole buffer when there is none).
fn take_line(src: &mut BytesMut) -> BytesMut {
    match src.iter().position(|b| *b == b'\n') {
        Some(pos) => src.split_to(pos + 1),
        None => src.split(),
    }
}

/// Turn a parsed JSON value into an [`Inbound`] item.
///
/// Non-object values are line fragments, not messages, and are dropped.
fn classify(value: &Value, raw: &[u8]) -> Option<Inbound> {
    if !value.is_object() {
        warn!(
            raw = %String::from_utf8_lossy(raw).trim(),
            "wire decoder: non-object JSON value, dropping"
        );
        return None;
    }

    let tag = value
        .get("msg")
        .and_then(|msg| msg.get("type"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    match Event::deserialize(value) {
        Ok(event) => {
            debug!(id = %event.id, kind = %event.kind(), "wire decoder: event decoded");
            Some(Inbound::Event(event))
        }
        Err(err) => {
            if let Some(event) = tag
                .as_deref()
                .and_then(EventKind::from_tag)
                .and_then(|kind| salvage(kind, value))
            {
                warn!(
                    error = %err,
                    kind = %event.kind(),
                    "wire decoder: malformed payload, keeping the message type"
                );
                return Some(Inbound::Event(event));
            }
            let reason = match tag {
                Some(tag) if EventKind::from_tag(&tag).is_none() => {
                    format!("unknown message type `{tag}`")
                }
                Some(tag) => format!("invalid `{tag}` message: {err}"),
                None => format!("not an event envelope: {err}"),
            };
            Some(Inbound::Rejected {
                raw: String::from_utf8_lossy(raw).trim().to_owned(),
                reason,
            })
        }
    }
}

/// Rebuild a malformed `session_configured` or `error` message from whatever
/// fields are usable, so a pending handshake settles on the type alone.
fn salvage(kind: EventKind, envelope: &Value) -> Option<Event> {
    let msg = envelope.get("msg")?;
    let text = |field: &str| {
        msg.get(field)
            .map(|value| value.as_str().map_or_else(|| value.to_string(), str::to_owned))
            .unwrap_or_default()
    };
    let count = |field: &str| msg.get(field).and_then(Value::as_u64).unwrap_or_default();

    let msg = match kind {
        EventKind::SessionConfigured => EventMsg::SessionConfigured(SessionConfiguredEvent {
            session_id: text("session_id"),
            model: text("model"),
            history_log_id: count("history_log_id"),
            history_entry_count: count("history_entry_count"),
        }),
        EventKind::Error => EventMsg::Error(ErrorEvent {
            message: text("message"),
        }),
        _ => return None,
    };

    Some(Event {
        id: envelope
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        msg,
    })
}
