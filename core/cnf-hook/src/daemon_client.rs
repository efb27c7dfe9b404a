//! Client helper for sending shell events to the winget-cnf daemon.
//!
//! The daemon owns the session pool and the suggestion cache. Failures are
//! surfaced to the caller, which logs them and stays silent on stdout.

use chrono::Utc;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use winget_cnf_core::FeedbackItem;
use winget_cnf_protocol::{
    CommandAcceptedParams, FeedbackParams, Method, PredictParams, PredictResult, Request,
    Response, DAEMON_ADDR_ENV, DEFAULT_DAEMON_ADDR, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

const CONNECT_TIMEOUT_MS: u64 = 300;
const READ_TIMEOUT_MS: u64 = 600;
const WRITE_TIMEOUT_MS: u64 = 600;
const RETRY_DELAY_MS: u64 = 50;

// Feedback may run up to three package queries on a cold cache.
const FEEDBACK_READ_TIMEOUT_MS: u64 = 10_000;

#[derive(serde::Deserialize)]
struct FeedbackResult {
    #[serde(default)]
    items: Vec<FeedbackItem>,
}

pub fn send_feedback(target: &str, command_line: Option<&str>) -> Result<Vec<FeedbackItem>, String> {
    let params = FeedbackParams {
        target: target.to_string(),
        command_line: command_line.map(str::to_string),
        sent_at: Some(Utc::now().to_rfc3339()),
    };
    let result: FeedbackResult = call_with_retry(
        Method::Feedback,
        encode(params)?,
        FEEDBACK_READ_TIMEOUT_MS,
        "feedback",
    )?;
    Ok(result.items)
}

pub fn send_predict(input: &str) -> Result<Vec<String>, String> {
    let params = PredictParams {
        input: input.to_string(),
    };
    let result: PredictResult =
        call_with_retry(Method::Predict, encode(params)?, READ_TIMEOUT_MS, "predict")?;
    Ok(result.suggestions)
}

pub fn send_command_accepted(command_line: &str) -> Result<(), String> {
    let params = CommandAcceptedParams {
        command_line: command_line.to_string(),
        history: Vec::new(),
    };
    let _: Value = call_with_retry(
        Method::CommandAccepted,
        encode(params)?,
        READ_TIMEOUT_MS,
        "command-accepted",
    )?;
    Ok(())
}

pub fn daemon_health() -> Result<Value, String> {
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::GetHealth,
        id: Some("health-check".to_string()),
        params: None,
    };
    let response = send_request(request, READ_TIMEOUT_MS)?;
    into_data(response)
}

fn daemon_addr() -> Result<SocketAddr, String> {
    let raw = env::var(DAEMON_ADDR_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DAEMON_ADDR.to_string());
    raw.to_socket_addrs()
        .map_err(|err| format!("Invalid daemon address {}: {}", raw, err))?
        .next()
        .ok_or_else(|| format!("Daemon address {} did not resolve", raw))
}

fn encode<T: serde::Serialize>(params: T) -> Result<Value, String> {
    serde_json::to_value(params).map_err(|err| format!("Failed to serialize params: {}", err))
}

fn into_data(response: Response) -> Result<Value, String> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "Unknown daemon error".to_string()))
    }
}

fn call<T: DeserializeOwned>(
    method: Method,
    params: Value,
    request_id: &str,
    read_timeout_ms: u64,
) -> Result<T, String> {
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method,
        id: Some(request_id.to_string()),
        params: Some(params),
    };
    let data = into_data(send_request(request, read_timeout_ms)?)?;
    serde_json::from_value(data).map_err(|err| format!("Unexpected daemon payload: {}", err))
}

/// Sends once and retries once after a short delay, reusing the request id.
fn call_with_retry<T: DeserializeOwned>(
    method: Method,
    params: Value,
    read_timeout_ms: u64,
    label: &str,
) -> Result<T, String> {
    let request_id = make_request_id();
    match call(method, params.clone(), &request_id, read_timeout_ms) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to send {} to daemon", label);
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
            call(method, params, &request_id, read_timeout_ms).map_err(|retry_err| {
                tracing::warn!(
                    error = %retry_err,
                    "Retry failed sending {} to daemon",
                    label
                );
                retry_err
            })
        }
    }
}

fn send_request(request: Request, read_timeout_ms: u64) -> Result<Response, String> {
    let addr = daemon_addr()?;
    let mut stream = TcpStream::connect_timeout(&addr, Duration::from_millis(CONNECT_TIMEOUT_MS))
        .map_err(|err| format!("Failed to connect to daemon at {}: {}", addr, err))?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(read_timeout_ms)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    serde_json::to_writer(&mut stream, &request)
        .map_err(|err| format!("Failed to write request: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush request: {}", err))?;
    stream.flush().ok();

    read_response(&mut stream)
}

fn read_response<R: Read>(stream: &mut R) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

fn make_request_id() -> String {
    let mut random = rand::thread_rng();
    format!(
        "req-{}-{}-{:x}",
        Utc::now().timestamp_millis(),
        std::process::id(),
        random.next_u64()
    )
}
