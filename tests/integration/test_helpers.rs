//! Shared helpers for integration tests that drive real `sh` child processes
//! standing in for the agent.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use codex_harness::bus::{Channel, EventBus};
use codex_harness::protocol::session::{ModelProviderInfo, WireApi};
use codex_harness::protocol::{Event, SessionOptions};
use codex_harness::LaunchConfig;

/// Shell used as the fake agent binary.
pub const SH: &str = "/bin/sh";

/// Upper bound for any single wait in these tests.
pub const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// Launch configuration running `script` with `sh -c` inside `cwd`.
///
/// The protocol flags the supervisor appends become the script's positional
/// parameters and are otherwise ignored.
pub fn sh_config(script: &str, cwd: &Path) -> LaunchConfig {
    LaunchConfig {
        program: SH.to_owned(),
        program_args: vec!["-c".to_owned(), script.to_owned()],
        cwd: Some(cwd.to_path_buf()),
        ..LaunchConfig::default()
    }
}

/// Session options accepted by the fake agents.
pub fn fake_options() -> SessionOptions {
    SessionOptions::new(
        "fake-model",
        ModelProviderInfo {
            name: "fake".into(),
            base_url: "http://127.0.0.1:9".into(),
            env_key: None,
            env_key_instructions: None,
            wire_api: WireApi::Chat,
        },
    )
}

/// Events captured from one bus channel.
pub type Captured = Arc<Mutex<Vec<Event>>>;

/// Record every event published on `channel`.
pub fn capture(bus: &EventBus, channel: Channel) -> Captured {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let _sub = bus.subscribe(channel, move |event| {
        sink.lock().unwrap().push(event.clone());
    });
    captured
}

/// Poll `condition` until it holds, failing the test after [`WAIT_LIMIT`].
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// `true` while process `pid` exists (zombies included).
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(i32::try_from(pid).unwrap()), None).is_ok()
}
