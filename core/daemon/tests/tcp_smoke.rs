use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use winget_cnf_protocol::{HealthResult, Method, Request, Response, PROTOCOL_VERSION};

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    addr.to_string()
}

/// Points the daemon at a winget binary that does not exist, so it starts
/// with nothing registered and never spawns a real process.
fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let missing = dir.join("missing").join("winget.exe");
    let body = format!(
        "winget_path = '{}'\nquery_timeout_ms = 500\n",
        missing.to_string_lossy()
    );
    std::fs::write(&path, body).expect("write config");
    path
}

fn spawn_daemon(addr: &str, config: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_winget-cnf-daemon"))
        .env("WINGET_CNF_DAEMON_ADDR", addr)
        .env("WINGET_CNF_CONFIG", config)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn winget-cnf-daemon")
}

fn wait_for_listener(addr: &str, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if TcpStream::connect(addr).is_ok() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for daemon at {}", addr);
}

fn send_request(addr: &str, request: Request) -> Response {
    let mut stream = TcpStream::connect(addr).expect("Failed to connect to daemon");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set read timeout");
    serde_json::to_writer(&mut stream, &request).expect("Failed to serialize request");
    stream.write_all(b"\n").expect("Failed to write request");
    stream.flush().ok();

    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let end = buffer
        .iter()
        .position(|b| *b == b'\n')
        .unwrap_or(buffer.len());
    serde_json::from_slice(&buffer[..end]).expect("Failed to parse response JSON")
}

#[test]
fn daemon_without_package_manager_answers_empty() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(dir.path());
    let addr = free_addr();
    let child = spawn_daemon(&addr, &config);
    let _guard = DaemonGuard { child };

    wait_for_listener(&addr, Duration::from_secs(5));

    let health = send_request(
        &addr,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::GetHealth,
            id: Some("health-check".to_string()),
            params: None,
        },
    );
    assert!(health.ok, "health response was not ok");
    let health: HealthResult =
        serde_json::from_value(health.data.expect("health data")).expect("health payload");
    assert_eq!(health.status, "ok");
    assert!(!health.registered);
    assert_eq!(health.warmup, "disabled");

    let feedback = send_request(
        &addr,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::Feedback,
            id: Some("feedback-1".to_string()),
            params: Some(serde_json::json!({ "target": "gti" })),
        },
    );
    assert!(feedback.ok);
    assert_eq!(feedback.id.as_deref(), Some("feedback-1"));
    let items = feedback.data.expect("feedback data");
    assert_eq!(items["items"], serde_json::json!([]));

    let predict = send_request(
        &addr,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::Predict,
            id: None,
            params: Some(serde_json::json!({ "input": "winget" })),
        },
    );
    assert!(predict.ok);
    assert_eq!(
        predict.data.expect("predict data")["suggestions"],
        serde_json::json!([])
    );
}

#[test]
fn daemon_rejects_garbage_without_dying() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(dir.path());
    let addr = free_addr();
    let child = spawn_daemon(&addr, &config);
    let _guard = DaemonGuard { child };

    wait_for_listener(&addr, Duration::from_secs(5));

    let mut stream = TcpStream::connect(&addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set read timeout");
    stream.write_all(b"{not json}\n").expect("write garbage");
    let mut body = String::new();
    stream.read_to_string(&mut body).expect("read error response");
    let response: Response = serde_json::from_str(body.trim()).expect("error response JSON");
    assert!(!response.ok);
    assert_eq!(response.error.expect("error").code, "invalid_json");

    let health = send_request(
        &addr,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::GetHealth,
            id: None,
            params: None,
        },
    );
    assert!(health.ok);
}
