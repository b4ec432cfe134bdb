//! Unit tests for approval gating.

use std::collections::BTreeMap;
use std::path::PathBuf;

use codex_harness::approval::{decide, ApprovalKind, ApprovalRequest};
use codex_harness::protocol::events::{
    AgentMessageEvent, ApplyPatchApprovalRequestEvent, ExecApprovalRequestEvent,
};
use codex_harness::protocol::{Event, EventMsg, FileChange, ReviewDecision};

/// The decision table: deny, approve once, approve for the session.
#[test]
fn decide_maps_answers_to_decisions() {
    assert_eq!(decide(false, false), ReviewDecision::Denied);
    assert_eq!(decide(false, true), ReviewDecision::Denied);
    assert_eq!(decide(true, false), ReviewDecision::Approved);
    assert_eq!(decide(true, true), ReviewDecision::ApprovedForSession);
}

/// `abort` is never produced by the yes/no mapping.
#[test]
fn decide_never_aborts() {
    for approved in [false, true] {
        for for_session in [false, true] {
            assert_ne!(decide(approved, for_session), ReviewDecision::Abort);
        }
    }
}

/// An exec approval request yields an `Exec` request keyed by the envelope id.
#[test]
fn exec_request_is_extracted() {
    let event = Event {
        id: "call-7".into(),
        msg: EventMsg::ExecApprovalRequest(ExecApprovalRequestEvent {
            command: vec!["rm".into(), "-rf".into(), "build".into()],
            cwd: PathBuf::from("/work"),
            reason: Some("clean build output".into()),
        }),
    };

    let request = ApprovalRequest::from_event(&event).expect("must be an approval request");

    assert_eq!(request.kind, ApprovalKind::Exec);
    assert_eq!(request.call_id, "call-7");
    assert_eq!(request.reason.as_deref(), Some("clean build output"));
    assert!(request.summary.contains("rm -rf build"), "{}", request.summary);
}

/// A patch approval request yields a `Patch` request naming the files.
#[test]
fn patch_request_is_extracted() {
    let mut changes = BTreeMap::new();
    changes.insert(PathBuf::from("src/a.rs"), FileChange::Delete);
    changes.insert(
        PathBuf::from("src/b.rs"),
        FileChange::Add {
            content: Some("fn main() {}\n".into()),
        },
    );
    let event = Event {
        id: "patch-1".into(),
        msg: EventMsg::ApplyPatchApprovalRequest(ApplyPatchApprovalRequestEvent {
            changes,
            reason: None,
            grant_root: None,
        }),
    };

    let request = ApprovalRequest::from_event(&event).expect("must be an approval request");

    assert_eq!(request.kind, ApprovalKind::Patch);
    assert_eq!(request.call_id, "patch-1");
    assert!(request.summary.contains("2 files"), "{}", request.summary);
    assert!(request.summary.contains("src/a.rs"));
}

/// Other events are not approval requests.
#[test]
fn other_events_are_not_requests() {
    let event = Event {
        id: "r".into(),
        msg: EventMsg::AgentMessage(AgentMessageEvent {
            message: "hi".into(),
        }),
    };
    assert!(ApprovalRequest::from_event(&event).is_none());
    assert!(ApprovalRequest::from_event(&Event::synthetic_error("x")).is_none());
}
