//! Command-line construction for the agent process.

use std::fmt::Debug;

use crate::protocol::SessionOptions;

/// Puts the agent in non-interactive mode (it never prompts on its own tty).
pub const NON_INTERACTIVE_FLAG: &str = "-a=never";

/// Lets the agent run outside a git repository.
pub const SKIP_REPO_CHECK_FLAG: &str = "--skip-git-repo-check";

/// Subcommand selecting the stdio protocol mode; always the last argument.
pub const PROTOCOL_SUBCOMMAND: &str = "p";

/// Turns session options into agent command-line arguments.
pub trait ArgsEncoder: Debug + Send + Sync {
    /// Arguments derived from `options`. Unset options produce nothing.
    fn encode(&self, options: &SessionOptions) -> Vec<String>;
}

/// Default encoder emitting `--key=value` and bare `--flag` arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagArgs;

impl ArgsEncoder for FlagArgs {
    fn encode(&self, options: &SessionOptions) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(model) = &options.model {
            args.push(format!("--model={model}"));
        }
        if let Some(provider) = &options.provider {
            args.push(format!("--provider={}", provider.name));
        }
        if let Some(effort) = options.model_reasoning_effort {
            args.push(format!("--reasoning-effort={}", effort.as_str()));
        }
        if let Some(summary) = options.model_reasoning_summary {
            args.push(format!("--reasoning-summary={}", summary.as_str()));
        }
        if let Some(instructions) = &options.instructions {
            args.push(format!("--instructions={instructions}"));
        }
        if let Some(policy) = options.approval_policy {
            args.push(format!("--approval-policy={}", policy.as_str()));
        }
        for permission in options.sandbox_permissions.iter().flatten() {
            args.push(format!("--sandbox-permission={}", permission.as_str()));
        }
        if options.disable_response_storage == Some(true) {
            args.push("--disable-response-storage".to_owned());
        }

        args
    }
}

/// Full argument vector: `program_args`, the fixed protocol flags, the
/// encoder output, and the protocol subcommand.
#[must_use]
pub fn command_args(
    program_args: &[String],
    encoder: &dyn ArgsEncoder,
    options: &SessionOptions,
) -> Vec<String> {
    let mut args = program_args.to_vec();
    args.push(NON_INTERACTIVE_FLAG.to_owned());
    args.push(SKIP_REPO_CHECK_FLAG.to_owned());
    args.extend(encoder.encode(options));
    args.push(PROTOCOL_SUBCOMMAND.to_owned());
    args
}
