//! Smoke tests for the `meshflood-node` binary.

#[cfg(unix)]
#[test]
fn binary_starts_and_stops_cleanly() {
    use std::io::{BufRead, BufReader};
    use std::process::{Command, Stdio};

    let bin = env!("CARGO_BIN_EXE_meshflood-node");

    let config_content = b"[node]\nnode_num = 0xC0\nrole = \"router\"\n";
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut config_file, config_content).unwrap();

    // tracing_subscriber writes to stdout by default
    let stdout_file = tempfile::NamedTempFile::new().unwrap();
    let stdout_writer = stdout_file.reopen().unwrap();

    let child = Command::new(bin)
        .args(["--config", config_file.path().to_str().unwrap()])
        .env("RUST_LOG_FORMAT", "json")
        .env("RUST_LOG", "info")
        .stdout(Stdio::from(stdout_writer))
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn meshflood-node");

    let pid = child.id();

    std::thread::sleep(std::time::Duration::from_millis(500));

    Command::new("kill")
        .args(["-INT", &pid.to_string()])
        .status()
        .expect("failed to send SIGINT");

    // Safety net if SIGINT is ignored
    let pid_for_guard = pid;
    let guard = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_secs(5));
        let _ = Command::new("kill")
            .args(["-9", &pid_for_guard.to_string()])
            .status();
    });

    let output = child.wait_with_output().expect("failed to wait on child");
    drop(guard);

    assert!(
        output.status.success(),
        "expected exit code 0, got {:?}",
        output.status.code()
    );

    let stdout_content = std::fs::read_to_string(stdout_file.path()).unwrap();
    let reader = BufReader::new(stdout_content.as_bytes());
    let has_json_line = reader
        .lines()
        .any(|line| line.is_ok_and(|l| l.starts_with('{')));
    assert!(
        has_json_line,
        "expected at least one JSON log line, got: {stdout_content}"
    );
}

#[test]
fn binary_runs_configured_simulation() {
    use std::process::{Command, Stdio};

    let bin = env!("CARGO_BIN_EXE_meshflood-node");

    let config_content = br#"
[sim]
seed = 5
duration_secs = 60

[[sim.nodes]]
node_num = 1

[[sim.nodes]]
node_num = 2

[[sim.nodes]]
node_num = 3

[[sim.links]]
a = 1
b = 2

[[sim.links]]
a = 2
b = 3

[[sim.messages]]
from = 1
text = "hello"
"#;
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut config_file, config_content).unwrap();

    let output = Command::new(bin)
        .args(["--config", config_file.path().to_str().unwrap()])
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .expect("failed to run meshflood-node");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("simulation finished"), "got: {stdout}");
    assert!(stdout.contains("message reach"), "got: {stdout}");
}

#[test]
fn binary_rejects_missing_config() {
    let bin = env!("CARGO_BIN_EXE_meshflood-node");
    let status = std::process::Command::new(bin)
        .args(["--config", "/nonexistent/meshflood.toml"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .expect("failed to run meshflood-node");
    assert_eq!(status.code(), Some(1));
}
