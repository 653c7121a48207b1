#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/slipcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn sliplink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sliplink"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn run_with_stdin(mut cmd: Command, input: &[u8]) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("command should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(input)
        .expect("stdin should accept input");
    child.wait_with_output().expect("command should finish")
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket {} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_or_kill(mut child: Child, timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        if child.try_wait().expect("child should be pollable").is_some() {
            return child.wait_with_output().expect("output should be readable");
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            return child.wait_with_output().expect("output should be readable");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn encode_raw_writes_wire_bytes() {
    let output = sliplink()
        .args(["--format", "raw", "encode", "--data", "AB"])
        .output()
        .expect("encode should run");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"\xC0AB\xC0");
}

#[test]
fn encode_json_describes_escaped_frame() {
    let mut cmd = sliplink();
    cmd.args(["--format", "json", "encode"]);
    let output = run_with_stdin(cmd, &[0xC0, 0xDB]);

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("encode output should be JSON");
    assert_eq!(value["datagram_size"], 2);
    assert_eq!(value["frame_size"], 6);
    assert_eq!(value["frame_hex"], "C0 DB DC DB DD C0");
}

#[test]
fn decode_prints_each_datagram() {
    let mut cmd = sliplink();
    cmd.args(["--format", "json", "decode"]);
    let output = run_with_stdin(cmd, b"\xC0\xC0one\xC0t\xDB\xDCo\xC0unterminated");

    assert!(output.status.success());
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["payload"], "one");
    assert_eq!(lines[1]["hex"], "74 C0 6F");
    assert_eq!(lines[1]["source"], "stdin");
}

#[test]
fn decode_from_file_matches_encode() {
    let dir = unique_temp_dir("decode-file");
    let wire = dir.join("frames.bin");

    let encoded = sliplink()
        .args(["--format", "raw", "encode", "--data", "round \u{00C0} trip"])
        .output()
        .expect("encode should run");
    std::fs::write(&wire, &encoded.stdout).expect("wire file should be writable");

    let output = sliplink()
        .args(["--format", "raw", "decode", "--file"])
        .arg(&wire)
        .output()
        .expect("decode should run");

    assert!(output.status.success());
    assert_eq!(output.stdout, "round \u{00C0} trip".as_bytes());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_overflow_returns_60_and_keeps_going() {
    let mut input = b"\xC0".to_vec();
    input.extend([b'x'; 200]);
    input.extend(b"\xC0ok\xC0");

    let mut cmd = sliplink();
    cmd.args(["--format", "raw", "decode", "--max-buffer", "16"]);
    let output = run_with_stdin(cmd, &input);

    assert_eq!(output.status.code(), Some(60));
    assert_eq!(output.stdout, b"ok");
}

#[test]
fn send_to_unrouted_next_hop_returns_64() {
    let output = sliplink()
        .args([
            "send",
            "--route",
            "10.0.0.2=/tmp/slipcli-does-not-exist.sock",
            "--next-hop",
            "10.0.0.9",
            "--data",
            "x",
        ])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("10.0.0.9"));
}

#[test]
fn send_to_missing_socket_returns_3() {
    let dir = unique_temp_dir("send-missing");
    let output = sliplink()
        .arg("send")
        .arg("--route")
        .arg(format!("10.0.0.2={}", dir.join("absent.sock").display()))
        .args(["--next-hop", "10.0.0.2", "--data", "x"])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_receives_what_send_routes() {
    let dir = unique_temp_dir("listen-send");
    let sock_path = dir.join("hop.sock");

    let child = sliplink()
        .args(["--format", "json", "listen"])
        .arg(&sock_path)
        .args(["--count", "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");

    wait_for_socket(&sock_path, Duration::from_secs(3));

    let sent = sliplink()
        .args(["--format", "json", "send", "--route"])
        .arg(format!("192.168.7.1={}", sock_path.display()))
        .args(["--next-hop", "192.168.7.1", "--data", "hello \u{00C0}\u{00DB}"])
        .output()
        .expect("send should run");
    assert!(sent.status.success(), "send failed: {}", String::from_utf8_lossy(&sent.stderr));
    let summary: serde_json::Value =
        serde_json::from_slice(&sent.stdout).expect("send output should be JSON");
    assert_eq!(summary["next_hop"], "192.168.7.1");

    let output = wait_or_kill(child, Duration::from_secs(5));
    assert!(output.status.success());
    let received: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("listen output should be JSON");
    assert_eq!(received["payload"], "hello \u{00C0}\u{00DB}");
    assert_eq!(received["source"], "conn-1");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_json_reports_package() {
    let output = sliplink()
        .args(["--format", "json", "version", "--extended"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version output should be JSON");
    assert_eq!(value["name"], "sliplink");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    let output = sliplink().arg("bogus").output().expect("cli should run");
    assert_eq!(output.status.code(), Some(2));
}
