//! Agent stderr classification.
//!
//! The agent writes its own log output to stderr. Lines carrying the
//! [`INFO_MARKER`] are routine and only logged; every other non-empty line is
//! treated as a protocol error and published once on [`Channel::Error`].
//!
//! Lines are split on raw bytes and converted lossily, so output that is not
//! valid UTF-8 never stops the reader. A stopped reader would close the pipe
//! and the agent's next write to stderr would kill it.

use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{Channel, EventBus};
use crate::protocol::Event;

/// Substring marking an informational diagnostic line.
pub const INFO_MARKER: &str = "INFO";

/// Maximum stderr line length: 1 MiB. Longer lines are skipped whole.
pub const MAX_DIAGNOSTIC_LINE_BYTES: usize = 1_048_576;

/// Classification of one diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// Blank line; ignored.
    Blank,
    /// Routine log output.
    Info,
    /// Anything else; surfaced as an error event.
    Error,
}

impl Diagnostic {
    /// Classify a single stderr line.
    #[must_use]
    pub fn classify(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            Self::Blank
        } else if line.contains(INFO_MARKER) {
            Self::Info
        } else {
            Self::Error
        }
    }
}

/// Newline framing for stderr that never fails on content.
///
/// Each `\n`-terminated line is yielded with invalid UTF-8 replaced by
/// `U+FFFD` and a trailing `\r` removed. A line longer than
/// [`MAX_DIAGNOSTIC_LINE_BYTES`] is discarded up to its newline and reading
/// continues.
#[derive(Debug, Default)]
pub struct DiagnosticLines {
    /// Bytes already searched for a newline.
    scanned: usize,
    /// Inside an overlong line whose head was dropped.
    discarding: bool,
}

impl DiagnosticLines {
    /// Create a decoder with an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for DiagnosticLines {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        loop {
            let start = self.scanned.min(src.len());
            let Some(offset) = src[start..].iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_DIAGNOSTIC_LINE_BYTES {
                    if !self.discarding {
                        warn!(
                            limit = MAX_DIAGNOSTIC_LINE_BYTES,
                            "stderr reader: line too long, skipping"
                        );
                    }
                    self.discarding = true;
                    src.clear();
                    self.scanned = 0;
                } else {
                    self.scanned = src.len();
                }
                return Ok(None);
            };

            let end = start + offset;
            let line = src.split_to(end + 1);
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if end > MAX_DIAGNOSTIC_LINE_BYTES {
                warn!(
                    limit = MAX_DIAGNOSTIC_LINE_BYTES,
                    "stderr reader: line too long, skipping"
                );
                continue;
            }
            return Ok(Some(lossy_line(&line[..end])));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.scanned = 0;
        let rest = src.split();
        if rest.is_empty() || std::mem::take(&mut self.discarding) {
            return Ok(None);
        }
        Ok(Some(lossy_line(&rest)))
    }
}

/// Read `stderr` line by line until EOF, an I/O error, or cancellation.
pub async fn run_stderr_reader<R>(stderr: R, bus: Arc<EventBus>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stderr, DiagnosticLines::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("stderr reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!("stderr reader: EOF detected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "stderr reader: IO error, stopping");
                        break;
                    }
                    Some(Ok(line)) => handle_line(&bus, &line),
                }
            }
        }
    }
}

fn lossy_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

fn handle_line(bus: &EventBus, line: &str) {
    match Diagnostic::classify(line) {
        Diagnostic::Blank => {}
        Diagnostic::Info => info!(line = line.trim(), "agent diagnostic"),
        Diagnostic::Error => {
            let text = line.trim();
            error!(line = text, "agent stderr");
            bus.publish(Channel::Error, &Event::synthetic_error(text));
        }
    }
}
