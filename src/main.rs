#![forbid(unsafe_code)]

//! `codex-harness` — drive one agent task from the command line.
//!
//! Starts the agent, configures the session, sends a single prompt, prints
//! every event as a JSON line on stdout, and answers approval requests
//! according to the command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use codex_harness::bus::Channel;
use codex_harness::protocol::{Event, EventMsg, InputItem, CONFIGURE_SESSION_ID};
use codex_harness::step::Step;
use codex_harness::supervisor::ProcessState;
use codex_harness::{AppError, LaunchConfig, Result, Session};

/// How often the event loop checks that the agent is still alive.
const LIVENESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "codex-harness", about = "Drive a codex agent over its stdio protocol", version, long_about = None)]
struct Cli {
    /// Path to the TOML launch configuration.
    #[arg(long)]
    config: PathBuf,

    /// Prompt sent once the session is configured.
    #[arg(long)]
    prompt: String,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Approve every command and patch request instead of denying it.
    #[arg(long)]
    auto_approve: bool,

    /// Make approvals apply to the rest of the session.
    #[arg(long)]
    approve_for_session: bool,

    /// Seconds to wait for `session_configured`.
    #[arg(long, default_value_t = 30)]
    configure_timeout_secs: u64,
}

impl LogFormat {
    /// Install the global subscriber. Stdout carries the event stream, so
    /// logs always go to stderr.
    fn install(self) -> Result<()> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
        let installed = match self {
            Self::Text => builder.try_init(),
            Self::Json => builder.json().try_init(),
        };
        installed.map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    args.log_format.install()?;
    info!("codex-harness starting");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = LaunchConfig::load_from_path(&args.config)?;
    config.load_credentials();
    info!(program = %config.program, "configuration loaded");

    let session = Session::new(config)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let response_tx = tx.clone();
    let response_sub = session.on_response(move |event| {
        let _ = response_tx.send((Channel::Response, event.clone()));
    });
    let error_sub = session.on_error(move |event| {
        let _ = tx.send((Channel::Error, event.clone()));
    });

    // ── Start and configure ─────────────────────────────
    session.start()?;

    let timeout = Duration::from_secs(args.configure_timeout_secs);
    match tokio::time::timeout(timeout, session.configure()).await {
        Ok(Ok(configured)) => {
            info!(session_id = %configured.session_id, model = %configured.model, "session ready");
        }
        Ok(Err(err)) => {
            error!(%err, "session configuration failed");
            session.stop();
            return Err(err);
        }
        Err(_elapsed) => {
            warn!(?timeout, "no answer to configure_session, aborting");
            if let Err(err) = session.abort(CONFIGURE_SESSION_ID).await {
                warn!(%err, "failed to interrupt configure_session");
            }
            session.stop();
            return Err(AppError::Session(format!(
                "agent did not configure the session within {timeout:?}"
            )));
        }
    }

    let run_id = session
        .send_user_message(vec![InputItem::text(args.prompt.as_str())], None)
        .await?;
    info!(%run_id, "prompt sent");

    // ── Event loop ──────────────────────────────────────
    let shutdown = termination_requested();
    tokio::pin!(shutdown);
    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);

    let outcome = loop {
        tokio::select! {
            signal = &mut shutdown => {
                info!(signal, "termination requested");
                if let Err(err) = session.abort(&run_id).await {
                    warn!(%err, "failed to interrupt task");
                }
                break Ok(());
            }

            _ = liveness.tick() => {
                if session.state() != ProcessState::Running {
                    break Err(AppError::Transport("agent process exited".into()));
                }
            }

            notice = rx.recv() => {
                let Some((channel, event)) = notice else {
                    break Ok(());
                };
                print_event(&event)?;
                match Step::of(channel, &event) {
                    Step::Continue => {
                        if let (Channel::Error, EventMsg::Error(err)) = (channel, &event.msg) {
                            warn!(message = %err.message, "agent diagnostic");
                        }
                    }
                    Step::Answer(request) => {
                        info!(
                            kind = request.kind.as_str(),
                            call_id = %request.call_id,
                            summary = %request.summary,
                            approved = args.auto_approve,
                            "answering approval request"
                        );
                        session
                            .respond(&request, args.auto_approve, args.approve_for_session)
                            .await?;
                    }
                    Step::Finish { last_message } => {
                        info!(?last_message, "task complete");
                        break Ok(());
                    }
                }
            }
        }
    };

    // ── Shutdown ────────────────────────────────────────
    response_sub.unsubscribe();
    error_sub.unsubscribe();
    session.stop();
    info!("codex-harness shut down");
    outcome
}

fn print_event(event: &Event) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

/// Resolve with the name of the first termination signal received.
///
/// A signal whose handler cannot be installed is never reported.
async fn termination_requested() -> &'static str {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(err) => {
                warn!(%err, "ctrl-c handler unavailable");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                "SIGTERM"
            }
            Err(err) => {
                warn!(%err, "SIGTERM handler unavailable");
                std::future::pending().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}
