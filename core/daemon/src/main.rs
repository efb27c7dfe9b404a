//! winget-cnf daemon entrypoint.
//!
//! A small long-lived host for the command-not-found providers. It owns the
//! session pool and the suggestion cache so that warm-up happens once and
//! predictions survive between hook invocations. Clients speak the
//! newline-delimited JSON protocol over loopback TCP.

use std::env;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chrono::{DateTime, Utc};
use serde_json::Value;
use winget_cnf_protocol::{
    parse_command_accepted, parse_feedback, parse_predict, ErrorInfo, Method, PredictResult,
    Request, Response, DAEMON_ADDR_ENV, DEFAULT_DAEMON_ADDR, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

mod state;

use state::SharedState;

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;
const DEBUG_LOG_ENV: &str = "WINGET_CNF_DEBUG_LOG";

fn main() {
    init_logging();

    let addr = daemon_addr();
    let listener = match TcpListener::bind(&addr) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr = %addr, "Failed to bind daemon address");
            std::process::exit(1);
        }
    };

    let config = winget_cnf_core::load_config();
    let shared_state = Arc::new(SharedState::new(config));
    let health = shared_state.health_snapshot();
    info!(
        addr = %addr,
        registered = health.registered,
        warmup = health.warmup,
        "winget-cnf daemon started"
    );

    serve(listener, shared_state);
}

fn serve(listener: TcpListener, state: Arc<SharedState>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&state);
                thread::spawn(move || handle_connection(stream, state));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn daemon_addr() -> String {
    env::var(DAEMON_ADDR_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DAEMON_ADDR.to_string())
}

fn handle_connection(mut stream: TcpStream, state: Arc<SharedState>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, &state);
    let _ = write_response(&mut stream, response);
}

fn read_request<R: Read>(stream: &mut R) -> Result<Request, ErrorInfo> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
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
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    if buffer.is_empty() {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let request_bytes = match newline_index {
        Some(index) => {
            if buffer.len() > index + 1 {
                let trailing = &buffer[index + 1..];
                if trailing.iter().any(|b| !b.is_ascii_whitespace()) {
                    warn!("Extra bytes detected after newline; ignoring trailing data");
                }
            }
            &buffer[..index]
        }
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: &SharedState) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    match request.method {
        Method::GetHealth => {
            let mut data = serde_json::json!({
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
            });
            if let Ok(Value::Object(snapshot)) = serde_json::to_value(state.health_snapshot()) {
                if let Some(object) = data.as_object_mut() {
                    object.extend(snapshot);
                }
            }
            Response::ok(request.id, data)
        }
        Method::Feedback => {
            let params = match parse_feedback(request.params) {
                Ok(params) => params,
                Err(err) => return Response::error_with_info(request.id, err),
            };
            let items = state.feedback(params.target.trim(), params.command_line.as_deref());
            tracing::debug!(
                token = %params.target,
                items = items.len(),
                latency_ms = ?request_latency_ms(params.sent_at.as_deref(), Utc::now()),
                "Feedback served"
            );
            match serde_json::to_value(&items) {
                Ok(value) => Response::ok(request.id, serde_json::json!({ "items": value })),
                Err(err) => Response::error(
                    request.id,
                    "serialization_error",
                    format!("Failed to serialize feedback: {}", err),
                ),
            }
        }
        Method::Predict => {
            let params = match parse_predict(request.params) {
                Ok(params) => params,
                Err(err) => return Response::error_with_info(request.id, err),
            };
            let result = PredictResult {
                suggestions: state.predict(&params.input),
            };
            match serde_json::to_value(result) {
                Ok(value) => Response::ok(request.id, value),
                Err(err) => Response::error(
                    request.id,
                    "serialization_error",
                    format!("Failed to serialize predictions: {}", err),
                ),
            }
        }
        Method::CommandAccepted => {
            let params = match parse_command_accepted(request.params) {
                Ok(params) => params,
                Err(err) => return Response::error_with_info(request.id, err),
            };
            let mut history = params.history;
            if !params.command_line.is_empty() {
                history.push(params.command_line);
            }
            state.command_accepted(&history);
            Response::ok(request.id, serde_json::json!({ "accepted": true }))
        }
    }
}

/// Milliseconds between the client stamping the request and `now`.
fn request_latency_ms(sent_at: Option<&str>, now: DateTime<Utc>) -> Option<i64> {
    let sent = DateTime::parse_from_rfc3339(sent_at?).ok()?;
    Some((now - sent.with_timezone(&Utc)).num_milliseconds())
}

fn write_response(stream: &mut TcpStream, response: Response) -> std::io::Result<()> {
    let _ = stream.set_write_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
