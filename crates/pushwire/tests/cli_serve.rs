#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

fn unique_temp_file(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "pushwire-{tag}-{}-{}.jsonl",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

fn spawn_server(messages: &Path) -> (Child, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pushwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg("127.0.0.1:0")
        .arg("--messages")
        .arg(messages)
        .arg("--max-sessions")
        .arg("1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve command should start");

    let stdout = child.stdout.take().expect("stdout should be piped");
    let mut line = String::new();
    BufReader::new(stdout)
        .read_line(&mut line)
        .expect("serve should announce its address");
    let announced: serde_json::Value =
        serde_json::from_str(line.trim()).expect("announcement should be json");
    let addr = announced["listening"]
        .as_str()
        .expect("announcement should carry the address")
        .to_string();
    (child, addr)
}

fn listen(addr: &str, extra: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pushwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(addr)
        .arg("--timeout")
        .arg("5s")
        .args(extra)
        .output()
        .expect("listen should run")
}

fn received_types(stdout: &[u8]) -> Vec<(String, Option<i64>)> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| {
            let value: serde_json::Value =
                serde_json::from_str(line).expect("each output line should be json");
            (
                value["msg_type"].as_str().unwrap_or_default().to_string(),
                value["top_level"].as_i64(),
            )
        })
        .collect()
}

#[test]
fn serve_delivers_split_broadcast_then_breaks() {
    let payloads: Vec<String> = (0..61)
        .map(|i| format!(r#"{{"b":{i},"bloat":"{}"}}"#, "x".repeat(2048)))
        .collect();
    let broadcast = format!(
        r#"{{"T":"broadcast","ChanId":"0","TopLevel":61,"Payloads":[{}]}}"#,
        payloads.join(",")
    );
    let path = unique_temp_file("serve-broadcast");
    std::fs::write(
        &path,
        format!(
            "{broadcast}\n{}\n{}\n",
            r#"{"T":"connwarn","Reason":"unauthorized"}"#,
            r#"{"T":"connbroken","Reason":"host-mismatch"}"#
        ),
    )
    .expect("message file should be writable");

    let (mut server, addr) = spawn_server(&path);
    let output = listen(&addr, &[]);

    assert!(output.status.success(), "listen failed: {output:?}");
    let received = received_types(&output.stdout);
    let types: Vec<&str> = received.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(
        types,
        vec!["connack", "broadcast", "broadcast", "broadcast", "connwarn", "connbroken"]
    );
    assert_eq!(received[1].1, Some(30));
    assert_eq!(received[2].1, Some(60));
    assert_eq!(received[3].1, Some(61));

    let status = server.wait().expect("server should exit after one session");
    assert!(status.success());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn listen_stops_after_count() {
    let path = unique_temp_file("serve-count");
    std::fs::write(&path, "{\"T\":\"setparams\",\"SetCookie\":\"c1\"}\n")
        .expect("message file should be writable");

    let (mut server, addr) = spawn_server(&path);
    let output = listen(&addr, &["--count", "2"]);

    assert!(output.status.success(), "listen failed: {output:?}");
    let received = received_types(&output.stdout);
    assert_eq!(received.len(), 2);
    assert_eq!(received[1].0, "setparams");

    let status = server.wait().expect("server should exit after one session");
    assert!(status.success());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn serve_rejects_bad_message_file() {
    let path = unique_temp_file("serve-bad");
    std::fs::write(&path, "{\"T\":\"bogus\"}\n").expect("message file should be writable");

    let output = Command::new(env!("CARGO_BIN_EXE_pushwire"))
        .arg("serve")
        .arg("127.0.0.1:0")
        .arg("--messages")
        .arg(&path)
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(60));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn listen_connection_refused_fails() {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("probe bind should work");
    let addr = probe.local_addr().expect("probe addr").to_string();
    drop(probe);

    let output = listen(&addr, &[]);
    assert_eq!(output.status.code(), Some(1));
}
