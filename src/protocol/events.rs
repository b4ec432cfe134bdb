//! Inbound events (agent → harness).

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event payload of an [`Event`](super::Event).
///
/// The set of tags is closed; anything else is rejected by the decoder and
/// surfaced as a protocol error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventMsg {
    /// Reasoning text produced by the model.
    AgentReasoning(AgentReasoningEvent),
    /// Assistant message addressed to the user.
    AgentMessage(AgentMessageEvent),
    /// The agent started working on a task.
    TaskStarted,
    /// The agent finished all actions for a task.
    TaskComplete(TaskCompleteEvent),
    /// A command is about to run.
    ExecCommandBegin(ExecCommandBeginEvent),
    /// A command finished.
    ExecCommandEnd(ExecCommandEndEvent),
    /// A patch is about to be applied.
    PatchApplyBegin(PatchApplyBeginEvent),
    /// A patch application finished.
    PatchApplyEnd(PatchApplyEndEvent),
    /// Acknowledges `configure_session`.
    SessionConfigured(SessionConfiguredEvent),
    /// Informational notice from the agent.
    BackgroundEvent(BackgroundEvent),
    /// The agent asks permission to run a command.
    ExecApprovalRequest(ExecApprovalRequestEvent),
    /// The agent asks permission to apply a patch.
    ApplyPatchApprovalRequest(ApplyPatchApprovalRequestEvent),
    /// An MCP tool call started.
    McpToolCallBegin(McpToolCallBeginEvent),
    /// An MCP tool call finished.
    McpToolCallEnd(McpToolCallEndEvent),
    /// A submission failed.
    Error(ErrorEvent),
    /// Answer to `get_history_entry_request`.
    GetHistoryEntryResponse(GetHistoryEntryResponseEvent),
}

impl EventMsg {
    /// Discriminant of this payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AgentReasoning(_) => EventKind::AgentReasoning,
            Self::AgentMessage(_) => EventKind::AgentMessage,
            Self::TaskStarted => EventKind::TaskStarted,
            Self::TaskComplete(_) => EventKind::TaskComplete,
            Self::ExecCommandBegin(_) => EventKind::ExecCommandBegin,
            Self::ExecCommandEnd(_) => EventKind::ExecCommandEnd,
            Self::PatchApplyBegin(_) => EventKind::PatchApplyBegin,
            Self::PatchApplyEnd(_) => EventKind::PatchApplyEnd,
            Self::SessionConfigured(_) => EventKind::SessionConfigured,
            Self::BackgroundEvent(_) => EventKind::BackgroundEvent,
            Self::ExecApprovalRequest(_) => EventKind::ExecApprovalRequest,
            Self::ApplyPatchApprovalRequest(_) => EventKind::ApplyPatchApprovalRequest,
            Self::McpToolCallBegin(_) => EventKind::McpToolCallBegin,
            Self::McpToolCallEnd(_) => EventKind::McpToolCallEnd,
            Self::Error(_) => EventKind::Error,
            Self::GetHistoryEntryResponse(_) => EventKind::GetHistoryEntryResponse,
        }
    }
}

/// Closed enumeration of inbound `type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `agent_reasoning`
    AgentReasoning,
    /// `agent_message`
    AgentMessage,
    /// `task_started`
    TaskStarted,
    /// `task_complete`
    TaskComplete,
    /// `exec_command_begin`
    ExecCommandBegin,
    /// `exec_command_end`
    ExecCommandEnd,
    /// `patch_apply_begin`
    PatchApplyBegin,
    /// `patch_apply_end`
    PatchApplyEnd,
    /// `session_configured`
    SessionConfigured,
    /// `background_event`
    BackgroundEvent,
    /// `exec_approval_request`
    ExecApprovalRequest,
    /// `apply_patch_approval_request`
    ApplyPatchApprovalRequest,
    /// `mcp_tool_call_begin`
    McpToolCallBegin,
    /// `mcp_tool_call_end`
    McpToolCallEnd,
    /// `error`
    Error,
    /// `get_history_entry_response`
    GetHistoryEntryResponse,
}

impl EventKind {
    /// Every known kind, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::AgentReasoning,
        Self::AgentMessage,
        Self::TaskStarted,
        Self::TaskComplete,
        Self::ExecCommandBegin,
        Self::ExecCommandEnd,
        Self::PatchApplyBegin,
        Self::PatchApplyEnd,
        Self::SessionConfigured,
        Self::BackgroundEvent,
        Self::ExecApprovalRequest,
        Self::ApplyPatchApprovalRequest,
        Self::McpToolCallBegin,
        Self::McpToolCallEnd,
        Self::Error,
        Self::GetHistoryEntryResponse,
    ];

    /// Wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AgentReasoning => "agent_reasoning",
            Self::AgentMessage => "agent_message",
            Self::TaskStarted => "task_started",
            Self::TaskComplete => "task_complete",
            Self::ExecCommandBegin => "exec_command_begin",
            Self::ExecCommandEnd => "exec_command_end",
            Self::PatchApplyBegin => "patch_apply_begin",
            Self::PatchApplyEnd => "patch_apply_end",
            Self::SessionConfigured => "session_configured",
            Self::BackgroundEvent => "background_event",
            Self::ExecApprovalRequest => "exec_approval_request",
            Self::ApplyPatchApprovalRequest => "apply_patch_approval_request",
            Self::McpToolCallBegin => "mcp_tool_call_begin",
            Self::McpToolCallEnd => "mcp_tool_call_end",
            Self::Error => "error",
            Self::GetHistoryEntryResponse => "get_history_entry_response",
        }
    }

    /// Look up a kind by its wire tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `agent_reasoning`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReasoningEvent {
    /// Reasoning text.
    pub text: String,
}

/// Payload of `agent_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessageEvent {
    /// Message text.
    pub message: String,
}

/// Payload of `task_complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompleteEvent {
    /// Final assistant message of the task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_agent_message: Option<String>,
}

/// Payload of `exec_command_begin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecCommandBeginEvent {
    /// Identifier pairing begin and end events.
    pub call_id: String,
    /// Command argv.
    pub command: Vec<String>,
    /// Working directory of the command.
    pub cwd: PathBuf,
}

/// Payload of `exec_command_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecCommandEndEvent {
    /// Identifier pairing begin and end events.
    pub call_id: String,
    /// Command argv, when echoed by the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i32,
}

/// Payload of `patch_apply_begin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchApplyBeginEvent {
    /// Identifier pairing begin and end events.
    pub call_id: String,
    /// Whether the patch was applied without asking the user.
    pub auto_approved: bool,
    /// Changes keyed by file path.
    pub changes: BTreeMap<PathBuf, FileChange>,
}

/// Payload of `patch_apply_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchApplyEndEvent {
    /// Identifier pairing begin and end events.
    pub call_id: String,
    /// Output of the patch tool.
    pub stdout: String,
    /// Error output of the patch tool.
    pub stderr: String,
    /// Whether every change applied cleanly.
    pub success: bool,
}

/// Payload of `session_configured`.
///
/// Every field defaults: the handshake settles on the message type, and some
/// agent builds omit the history counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguredEvent {
    /// Agent-side session identifier.
    pub session_id: String,
    /// Model the session runs on.
    pub model: String,
    /// Identifier of the persistent history log.
    pub history_log_id: u64,
    /// Number of entries currently in the history log.
    pub history_entry_count: u64,
}

/// Payload of `background_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundEvent {
    /// Notice text.
    pub message: String,
}

/// Payload of `exec_approval_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecApprovalRequestEvent {
    /// Command argv awaiting approval.
    pub command: Vec<String>,
    /// Working directory the command would run in.
    pub cwd: PathBuf,
    /// Why the agent wants to run it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload of `apply_patch_approval_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPatchApprovalRequestEvent {
    /// Changes keyed by file path.
    pub changes: BTreeMap<PathBuf, FileChange>,
    /// Why the agent wants to apply it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Root the agent asks write access to for the rest of the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_root: Option<PathBuf>,
}

/// Payload of `mcp_tool_call_begin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolCallBeginEvent {
    /// Identifier pairing begin and end events.
    pub call_id: String,
    /// MCP server name.
    pub server: String,
    /// Tool name.
    pub tool: String,
    /// Free-form tool arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Payload of `mcp_tool_call_end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolCallEndEvent {
    /// Identifier pairing begin and end events.
    pub call_id: String,
    /// Free-form tool result; may carry an `is_error` flag.
    pub result: Value,
}

impl McpToolCallEndEvent {
    /// `true` when the result carries `"is_error": true`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.result
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Human-readable error text.
    pub message: String,
}

/// Payload of `get_history_entry_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetHistoryEntryResponseEvent {
    /// Requested offset.
    pub offset: u64,
    /// Requested log.
    pub log_id: u64,
    /// The entry, absent when the offset is out of range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<Value>,
}

/// One file-level change inside a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileChange {
    /// New file.
    Add {
        /// Full file content.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Removed file.
    Delete,
    /// Modified and possibly moved file.
    Update {
        /// Unified diff of the modification.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unified_diff: Option<String>,
        /// Destination path when the file is moved.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        move_path: Option<PathBuf>,
    },
}
