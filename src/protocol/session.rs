//! Session configuration sent with `configure_session`.
//!
//! Callers describe the session with [`SessionOptions`], where every field is
//! optional. [`SessionConfig::resolve`] turns the options into the complete
//! wire payload, filling unset fields from the `DEFAULT_*` constants below.
//! Only `model` and `provider` have no default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Reasoning effort applied when the caller sets none.
pub const DEFAULT_REASONING_EFFORT: ReasoningEffort = ReasoningEffort::Low;

/// Reasoning summary verbosity applied when the caller sets none.
pub const DEFAULT_REASONING_SUMMARY: ReasoningSummary = ReasoningSummary::Concise;

/// Approval policy applied when the caller sets none.
pub const DEFAULT_APPROVAL_POLICY: AskForApproval = AskForApproval::UnlessAllowListed;

/// Sandbox permissions applied when the caller sets none.
pub const DEFAULT_SANDBOX_PERMISSIONS: &[SandboxPermission] = &[SandboxPermission::DiskWriteCwd];

/// Response storage toggle applied when the caller sets none.
pub const DEFAULT_DISABLE_RESPONSE_STORAGE: bool = false;

/// Wire dialect spoken by a model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireApi {
    /// Chat Completions API.
    Chat,
    /// Responses API.
    Responses,
}

/// Description of an OpenAI-compatible model provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProviderInfo {
    /// Friendly display name.
    pub name: String,
    /// Base URL of the provider API.
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub env_key: Option<String>,
    /// Instructions shown to the user when the key is missing.
    #[serde(default)]
    pub env_key_instructions: Option<String>,
    /// Wire dialect the provider expects.
    pub wire_api: WireApi,
}

/// Reasoning effort level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// No reasoning.
    None,
    /// Low effort.
    Low,
    /// Medium effort.
    Medium,
    /// High effort.
    High,
}

impl ReasoningEffort {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Reasoning summary verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummary {
    /// No summary.
    None,
    /// Let the model decide.
    Auto,
    /// Short summary.
    Concise,
    /// Long summary.
    Detailed,
}

impl ReasoningSummary {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Auto => "auto",
            Self::Concise => "concise",
            Self::Detailed => "detailed",
        }
    }
}

/// When the agent asks the user before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AskForApproval {
    /// Ask for everything outside the allow-list.
    UnlessAllowListed,
    /// Apply edits automatically, ask for commands.
    AutoEdit,
    /// Ask only when a sandboxed command fails.
    OnFailure,
    /// Never ask.
    Never,
}

impl AskForApproval {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnlessAllowListed => "unless-allow-listed",
            Self::AutoEdit => "auto-edit",
            Self::OnFailure => "on-failure",
            Self::Never => "never",
        }
    }
}

/// One capability granted to sandboxed commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxPermission {
    /// Read anywhere on disk.
    DiskFullReadAccess,
    /// Write the per-user temp folder.
    DiskWritePlatformUserTempFolder,
    /// Write the global temp folder.
    DiskWritePlatformGlobalTempFolder,
    /// Write the working directory.
    DiskWriteCwd,
    /// Write a configured folder.
    DiskWriteFolder,
    /// Write anywhere on disk.
    DiskFullWriteAccess,
    /// Unrestricted network.
    NetworkFullAccess,
}

impl SandboxPermission {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DiskFullReadAccess => "disk-full-read-access",
            Self::DiskWritePlatformUserTempFolder => "disk-write-platform-user-temp-folder",
            Self::DiskWritePlatformGlobalTempFolder => "disk-write-platform-global-temp-folder",
            Self::DiskWriteCwd => "disk-write-cwd",
            Self::DiskWriteFolder => "disk-write-folder",
            Self::DiskFullWriteAccess => "disk-full-write-access",
            Self::NetworkFullAccess => "network-full-access",
        }
    }
}

/// `{ "level": … }` wrapper for the reasoning effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningEffortConfig {
    /// Effort level.
    pub level: ReasoningEffort,
}

/// `{ "level": … }` wrapper for the reasoning summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningSummaryConfig {
    /// Summary level.
    pub level: ReasoningSummary,
}

/// Permissions granted to sandboxed commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    /// Granted permissions.
    pub permissions: Vec<SandboxPermission>,
}

/// Complete `configure_session` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model provider.
    pub provider: ModelProviderInfo,
    /// Model identifier.
    pub model: String,
    /// Reasoning effort.
    pub model_reasoning_effort: ReasoningEffortConfig,
    /// Reasoning summary verbosity.
    pub model_reasoning_summary: ReasoningSummaryConfig,
    /// Extra system instructions; `null` when unset.
    pub instructions: Option<String>,
    /// Approval policy.
    pub approval_policy: AskForApproval,
    /// Sandbox policy.
    pub sandbox_policy: SandboxPolicy,
    /// Ask the provider not to store responses.
    pub disable_response_storage: bool,
    /// Notification command argv; `null` when unset.
    pub notify: Option<Vec<String>>,
    /// Working directory of the session.
    pub cwd: PathBuf,
}

impl SessionConfig {
    /// Resolve `options` into a complete configuration.
    ///
    /// Unset fields take the `DEFAULT_*` values; an unset `cwd` becomes
    /// `default_cwd`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when `model` or `provider` is unset or
    /// `model` is blank.
    pub fn resolve(options: SessionOptions, default_cwd: &Path) -> Result<Self> {
        let model = options
            .model
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| AppError::Config("session model is required".into()))?;
        let provider = options
            .provider
            .ok_or_else(|| AppError::Config("session provider is required".into()))?;

        Ok(Self {
            provider,
            model,
            model_reasoning_effort: ReasoningEffortConfig {
                level: options
                    .model_reasoning_effort
                    .unwrap_or(DEFAULT_REASONING_EFFORT),
            },
            model_reasoning_summary: ReasoningSummaryConfig {
                level: options
                    .model_reasoning_summary
                    .unwrap_or(DEFAULT_REASONING_SUMMARY),
            },
            instructions: options.instructions,
            approval_policy: options.approval_policy.unwrap_or(DEFAULT_APPROVAL_POLICY),
            sandbox_policy: SandboxPolicy {
                permissions: options
                    .sandbox_permissions
                    .unwrap_or_else(|| DEFAULT_SANDBOX_PERMISSIONS.to_vec()),
            },
            disable_response_storage: options
                .disable_response_storage
                .unwrap_or(DEFAULT_DISABLE_RESPONSE_STORAGE),
            notify: options.notify,
            cwd: options.cwd.unwrap_or_else(|| default_cwd.to_path_buf()),
        })
    }
}

/// Caller-supplied, possibly partial session description.
///
/// Also the `[session]` table of the TOML launch configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct SessionOptions {
    /// Model identifier.
    #[serde(default)]
    pub model: Option<String>,
    /// Model provider.
    #[serde(default)]
    pub provider: Option<ModelProviderInfo>,
    /// Reasoning effort.
    #[serde(default)]
    pub model_reasoning_effort: Option<ReasoningEffort>,
    /// Reasoning summary verbosity.
    #[serde(default)]
    pub model_reasoning_summary: Option<ReasoningSummary>,
    /// Extra system instructions.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Approval policy.
    #[serde(default)]
    pub approval_policy: Option<AskForApproval>,
    /// Sandbox permissions.
    #[serde(default)]
    pub sandbox_permissions: Option<Vec<SandboxPermission>>,
    /// Ask the provider not to store responses.
    #[serde(default)]
    pub disable_response_storage: Option<bool>,
    /// Notification command argv.
    #[serde(default)]
    pub notify: Option<Vec<String>>,
    /// Working directory of the session.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl SessionOptions {
    /// Options with the two required fields set.
    #[must_use]
    pub fn new(model: impl Into<String>, provider: ModelProviderInfo) -> Self {
        Self {
            model: Some(model.into()),
            provider: Some(provider),
            ..Self::default()
        }
    }

    /// Set the system instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the approval policy.
    #[must_use]
    pub fn with_approval_policy(mut self, policy: AskForApproval) -> Self {
        self.approval_policy = Some(policy);
        self
    }

    /// Set the reasoning effort.
    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.model_reasoning_effort = Some(effort);
        self
    }

    /// Set the sandbox permissions.
    #[must_use]
    pub fn with_sandbox_permissions(mut self, permissions: Vec<SandboxPermission>) -> Self {
        self.sandbox_permissions = Some(permissions);
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Environment variable expected to carry the provider API key.
    #[must_use]
    pub fn api_key_env(&self) -> Option<&str> {
        self.provider
            .as_ref()
            .and_then(|provider| provider.env_key.as_deref())
    }
}
