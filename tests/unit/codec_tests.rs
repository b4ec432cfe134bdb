//! Unit tests for the wire codec: outbound encoding and the buffering
//! inbound decoder.
//!
//! Covers:
//! - encoded submissions are one compact line ending in a single `\n`
//! - newline-delimited documents decode in order
//! - documents split across reads at every byte offset are reassembled
//! - one pretty-printed multi-line document decodes to exactly one event
//! - invalid JSON lines are dropped without losing neighbouring documents
//! - unknown message types and malformed envelopes are rejected, not coerced,
//!   except `session_configured` and `error`, which keep their type
//! - incomplete trailing documents are dropped at end of stream

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use codex_harness::protocol::{EventKind, EventMsg, InputItem, Op, Submission};
use codex_harness::wire::codec::{decode, encode, Inbound, WireDecoder};

const STARTED: &str = r#"{"id":"r1","msg":{"type":"task_started"}}"#;
const MESSAGE: &str = r#"{"id":"r1","msg":{"type":"agent_message","message":"hello"}}"#;
const COMPLETE: &str =
    r#"{"id":"r1","msg":{"type":"task_complete","last_agent_message":"done"}}"#;

fn kinds(items: &[Inbound]) -> Vec<EventKind> {
    items
        .iter()
        .map(|item| match item {
            Inbound::Event(event) => event.kind(),
            Inbound::Rejected { reason, .. } => panic!("unexpected rejection: {reason}"),
        })
        .collect()
}

/// Drain every complete item from `buf` without signalling end of stream.
fn drain(decoder: &mut WireDecoder, buf: &mut BytesMut) -> Vec<Inbound> {
    let mut items = Vec::new();
    while let Some(item) = decoder.decode(buf).expect("decode never fails") {
        items.push(item);
    }
    items
}

// ── Encoding ────────────────────────────────────────────────────────────────

/// An encoded submission is a single line terminated by exactly one newline
/// and parses back to the original submission.
#[test]
fn encoded_submission_is_one_line_and_parses_back() {
    let submission = Submission::new(
        "run-1",
        Op::UserInput {
            items: vec![InputItem::text("list files\nplease")],
        },
    );

    let line = encode(&submission).expect("encode must succeed");

    assert!(line.ends_with('\n'), "line must end with a newline");
    assert!(!line.ends_with("\n\n"), "line must end with a single newline");
    assert_eq!(
        line.matches('\n').count(),
        1,
        "embedded newlines must be escaped"
    );

    let parsed: Submission =
        serde_json::from_str(line.trim_end()).expect("encoded line must be valid JSON");
    assert_eq!(parsed, submission);
}

/// The envelope shape on the wire is `{"id":..,"op":{"type":..}}`.
#[test]
fn encoded_interrupt_has_expected_shape() {
    let line = encode(&Submission::new("abc", Op::Interrupt)).expect("encode must succeed");
    assert_eq!(line, "{\"id\":\"abc\",\"op\":{\"type\":\"interrupt\"}}\n");
}

// ── Line-delimited input ────────────────────────────────────────────────────

/// Three newline-joined documents decode to three events in order.
#[test]
fn newline_delimited_documents_decode_in_order() {
    let raw = format!("{STARTED}\n{MESSAGE}\n{COMPLETE}\n");

    let items = decode(raw.as_bytes());

    assert_eq!(
        kinds(&items),
        vec![
            EventKind::TaskStarted,
            EventKind::AgentMessage,
            EventKind::TaskComplete
        ]
    );
}

/// Documents written back to back without separators still decode.
#[test]
fn concatenated_documents_decode() {
    let raw = format!("{STARTED}{MESSAGE}");
    let items = decode(raw.as_bytes());
    assert_eq!(
        kinds(&items),
        vec![EventKind::TaskStarted, EventKind::AgentMessage]
    );
}

/// Splitting the stream into two reads at any byte offset yields the same
/// events as decoding it in one piece.
#[test]
fn split_reads_at_every_offset_are_reassembled() {
    let raw = format!("{STARTED}\n{MESSAGE}\n{COMPLETE}\n");
    let bytes = raw.as_bytes();

    for split in 0..=bytes.len() {
        let mut decoder = WireDecoder::new();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&bytes[..split]);
        let mut items = drain(&mut decoder, &mut buf);
        buf.extend_from_slice(&bytes[split..]);
        items.extend(drain(&mut decoder, &mut buf));

        assert_eq!(
            kinds(&items),
            vec![
                EventKind::TaskStarted,
                EventKind::AgentMessage,
                EventKind::TaskComplete
            ],
            "split at byte {split} must not lose or duplicate events"
        );
        assert!(buf.is_empty(), "buffer must be drained after split {split}");
    }
}

/// A partial document stays buffered and yields nothing until completed.
#[test]
fn partial_document_is_buffered() {
    let mut decoder = WireDecoder::new();
    let mut buf = BytesMut::from(&MESSAGE.as_bytes()[..20]);

    let first = decoder.decode(&mut buf).expect("decode must succeed");
    assert!(first.is_none(), "incomplete document must not be emitted");
    assert_eq!(buf.len(), 20, "incomplete document must stay buffered");

    buf.extend_from_slice(&MESSAGE.as_bytes()[20..]);
    let second = decoder.decode(&mut buf).expect("decode must succeed");
    assert!(matches!(second, Some(Inbound::Event(_))));
}

// ── Aggregated input ────────────────────────────────────────────────────────

/// A single pretty-printed document spanning many lines is one event.
#[test]
fn pretty_printed_document_decodes_to_one_event() {
    let raw = r#"{
  "id": "cfg",
  "msg": {
    "type": "session_configured",
    "session_id": "s-1",
    "model": "o4-mini",
    "history_log_id": 7,
    "history_entry_count": 3
  }
}
"#;

    let items = decode(raw.as_bytes());

    assert_eq!(items.len(), 1, "exactly one event expected");
    let Inbound::Event(event) = &items[0] else {
        panic!("expected an event, got {:?}", items[0]);
    };
    let EventMsg::SessionConfigured(configured) = &event.msg else {
        panic!("expected session_configured, got {:?}", event.msg);
    };
    assert_eq!(configured.session_id, "s-1");
    assert_eq!(configured.history_log_id, 7);
}

/// A pretty-printed document delivered in two reads is reassembled.
#[test]
fn pretty_printed_document_split_across_reads() {
    let raw = "{\n  \"id\": \"x\",\n  \"msg\": {\n    \"type\": \"background_event\",\n    \"message\": \"indexing\"\n  }\n}\n";
    let (head, tail) = raw.split_at(raw.len() / 2);

    let mut decoder = WireDecoder::new();
    let mut buf = BytesMut::from(head);
    assert!(drain(&mut decoder, &mut buf).is_empty());
    buf.extend_from_slice(tail.as_bytes());

    assert_eq!(
        kinds(&drain(&mut decoder, &mut buf)),
        vec![EventKind::BackgroundEvent]
    );
}

/// A large document trickling in through small reads stays buffered until
/// its closing bracket arrives, then decodes exactly once.
#[test]
fn large_document_in_small_reads_decodes_once() {
    let raw = format!(
        "{{\n  \"id\": \"big\",\n  \"msg\": {{\n    \"type\": \"agent_message\",\n    \"message\": \"{}\"\n  }}\n}}\n",
        "a".repeat(200_000)
    );
    let mut decoder = WireDecoder::new();
    let mut buf = BytesMut::new();
    let mut items = Vec::new();

    for chunk in raw.as_bytes().chunks(4096) {
        buf.extend_from_slice(chunk);
        items.extend(drain(&mut decoder, &mut buf));
        if items.is_empty() {
            assert!(!buf.is_empty(), "partial document must stay buffered");
        }
    }

    assert_eq!(kinds(&items), vec![EventKind::AgentMessage]);
    assert!(buf.is_empty());
}

/// A closing brace alone completes a buffered document; no newline needed.
#[test]
fn closing_brace_completes_buffered_document() {
    let (head, tail) = STARTED.split_at(STARTED.len() - 1);
    assert_eq!(tail, "}");

    let mut decoder = WireDecoder::new();
    let mut buf = BytesMut::from(head);
    assert!(drain(&mut decoder, &mut buf).is_empty());
    buf.extend_from_slice(b"   ");
    assert!(drain(&mut decoder, &mut buf).is_empty());
    buf.extend_from_slice(tail.as_bytes());

    assert_eq!(
        kinds(&drain(&mut decoder, &mut buf)),
        vec![EventKind::TaskStarted]
    );
}

// ── Invalid input ───────────────────────────────────────────────────────────

/// A line of invalid JSON is dropped; the documents around it survive.
#[test]
fn malformed_line_is_dropped() {
    let raw = format!("{STARTED}\nthis is not json\n{MESSAGE}\n");
    let items = decode(raw.as_bytes());
    assert_eq!(
        kinds(&items),
        vec![EventKind::TaskStarted, EventKind::AgentMessage]
    );
}

/// A well-formed envelope with an unknown `type` is rejected with a reason
/// naming the tag.
#[test]
fn unknown_message_type_is_rejected() {
    let raw = r#"{"id":"r1","msg":{"type":"telepathy","payload":1}}"#;

    let items = decode(raw.as_bytes());

    assert_eq!(items.len(), 1);
    match &items[0] {
        Inbound::Rejected { raw: text, reason } => {
            assert!(reason.contains("unknown message type `telepathy`"), "{reason}");
            assert!(text.contains("telepathy"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

/// A known `type` with a missing required field is rejected as invalid.
#[test]
fn invalid_known_message_is_rejected() {
    let raw = r#"{"id":"r1","msg":{"type":"exec_command_end","call_id":"c"}}"#;

    let items = decode(raw.as_bytes());

    match items.as_slice() {
        [Inbound::Rejected { reason, .. }] => {
            assert!(reason.starts_with("invalid `exec_command_end` message"), "{reason}");
        }
        other => panic!("expected one rejection, got {other:?}"),
    }
}

/// `session_configured` without its history counters still decodes; the
/// counters default to zero.
#[test]
fn session_configured_without_counters_decodes() {
    let raw = br#"{"id":"config-session","msg":{"type":"session_configured","session_id":"s","model":"m"}}
"#;

    let items = decode(raw);

    let [Inbound::Event(event)] = items.as_slice() else {
        panic!("expected one event, got {items:?}");
    };
    let EventMsg::SessionConfigured(configured) = &event.msg else {
        panic!("expected session_configured, got {:?}", event.msg);
    };
    assert_eq!(event.id, "config-session");
    assert_eq!(configured.session_id, "s");
    assert_eq!(configured.model, "m");
    assert_eq!(configured.history_log_id, 0);
    assert_eq!(configured.history_entry_count, 0);
}

/// A mistyped `session_configured` keeps its type with the usable fields.
#[test]
fn mistyped_session_configured_keeps_its_type() {
    let raw = br#"{"id":"config-session","msg":{"type":"session_configured","session_id":"s","model":"m","history_log_id":"seven","history_entry_count":2}}"#;

    let items = decode(raw);

    let [Inbound::Event(event)] = items.as_slice() else {
        panic!("expected one event, got {items:?}");
    };
    let EventMsg::SessionConfigured(configured) = &event.msg else {
        panic!("expected session_configured, got {:?}", event.msg);
    };
    assert_eq!(configured.session_id, "s");
    assert_eq!(configured.history_log_id, 0);
    assert_eq!(configured.history_entry_count, 2);
}

/// An `error` whose message is not a string keeps its type; the message is
/// the JSON text of the value.
#[test]
fn mistyped_error_keeps_its_type() {
    let raw = br#"{"id":"config-session","msg":{"type":"error","message":{"code":7}}}"#;

    let items = decode(raw);

    let [Inbound::Event(event)] = items.as_slice() else {
        panic!("expected one event, got {items:?}");
    };
    let EventMsg::Error(err) = &event.msg else {
        panic!("expected error, got {:?}", event.msg);
    };
    assert_eq!(err.message, r#"{"code":7}"#);
}

/// JSON objects that are not envelopes are rejected.
#[test]
fn non_envelope_object_is_rejected() {
    let items = decode(br#"{"hello":"world"}"#);
    match items.as_slice() {
        [Inbound::Rejected { reason, .. }] => {
            assert!(reason.starts_with("not an event envelope"), "{reason}");
        }
        other => panic!("expected one rejection, got {other:?}"),
    }
}

/// Bare scalars and arrays are not messages and are dropped silently.
#[test]
fn non_object_values_are_dropped() {
    let raw = format!("42\n[1,2]\n\"text\"\n{STARTED}\n");
    assert_eq!(kinds(&decode(raw.as_bytes())), vec![EventKind::TaskStarted]);
}

/// Blank lines and surrounding whitespace are ignored.
#[test]
fn whitespace_between_documents_is_ignored() {
    let raw = format!("\n\n  {STARTED}  \r\n\n\t{MESSAGE}\n\n");
    assert_eq!(
        kinds(&decode(raw.as_bytes())),
        vec![EventKind::TaskStarted, EventKind::AgentMessage]
    );
}

/// An incomplete trailing document is dropped at end of stream.
#[test]
fn trailing_partial_document_is_dropped_at_eof() {
    let raw = format!("{STARTED}\n{{\"id\":\"r1\",\"msg\":{{\"type\":");

    let mut decoder = WireDecoder::new();
    let mut buf = BytesMut::from(raw.as_str());

    let first = decoder.decode_eof(&mut buf).expect("decode must succeed");
    assert!(matches!(first, Some(Inbound::Event(_))));
    let second = decoder.decode_eof(&mut buf).expect("decode must succeed");
    assert!(second.is_none());
    assert!(buf.is_empty(), "remainder must be discarded at EOF");
}
