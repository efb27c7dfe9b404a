//! `winget search` backend.
//!
//! Each query spawns the CLI, polls it until exit so cancellation can kill it
//! mid-flight, then parses the table on stdout.

use super::table::parse_search_table;
use super::QueryBackend;
use crate::cancel::CancelToken;
use crate::config::CnfConfig;
use crate::error::{CnfError, Result};
use crate::setup;
use crate::types::{MatchMode, PackageQuery, PackageRecord};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

/// `APPINSTALLER_CLI_ERROR_NO_APPLICATIONS_FOUND`
pub const NO_APPLICATIONS_FOUND_EXIT_CODE: u32 = 0x8A15_0014;

const POLL_INTERVAL_MS: u64 = 10;
const MAX_DETAIL_CHARS: usize = 512;

pub fn is_no_results_exit_code(code: i32) -> bool {
    code as u32 == NO_APPLICATIONS_FOUND_EXIT_CODE
}

#[derive(Debug, Clone)]
pub struct WingetCli {
    executable: PathBuf,
}

impl WingetCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Resolves the executable from config or PATH.
    pub fn locate(config: &CnfConfig) -> Result<Self> {
        setup::find_package_manager(config).map(Self::new)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn build_args(query: &PackageQuery) -> Vec<String> {
        let mut args = vec!["search".to_string()];

        match query.field {
            Some(field) => {
                args.push(format!("--{}", field.as_str()));
                args.push(query.value.clone());
            }
            None if !query.value.is_empty() => {
                args.push("--query".to_string());
                args.push(query.value.clone());
            }
            None => {}
        }

        if let Some(source) = &query.source {
            args.push("--source".to_string());
            args.push(source.clone());
        }
        if let Some(count) = query.count {
            args.push("--count".to_string());
            args.push(count.to_string());
        }

        args.push("--accept-source-agreements".to_string());
        args.push("--disable-interactivity".to_string());
        args
    }

    fn command_label(&self, args: &[String]) -> String {
        format!("{} {}", self.executable.display(), args.join(" "))
    }

    fn run(&self, args: &[String], cancel: &CancelToken) -> Result<RunOutput> {
        let label = self.command_label(args);
        let mut child = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CnfError::Spawn {
                command: label.clone(),
                source,
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if cancel.is_cancelled() {
                        kill_quietly(&mut child);
                        tracing::debug!(command = %label, "Query cancelled; child killed");
                        return Err(CnfError::Cancelled);
                    }
                    thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
                }
                Err(err) => {
                    kill_quietly(&mut child);
                    return Err(CnfError::Io {
                        context: format!("waiting for {}", label),
                        source: err,
                    });
                }
            }
        };

        Ok(RunOutput {
            label,
            code: status.code(),
            success: status.success(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

struct RunOutput {
    label: String,
    code: Option<i32>,
    success: bool,
    stdout: String,
    stderr: String,
}

impl QueryBackend for WingetCli {
    fn name(&self) -> &str {
        "winget"
    }

    fn execute(&self, query: &PackageQuery, cancel: &CancelToken) -> Result<Vec<PackageRecord>> {
        let args = Self::build_args(query);
        let output = self.run(&args, cancel)?;

        if !output.success {
            if output.code.map(is_no_results_exit_code).unwrap_or(false) {
                return Ok(Vec::new());
            }
            return Err(CnfError::QueryFailed {
                command: output.label,
                details: failure_details(output.code, &output.stderr, &output.stdout),
            });
        }

        let mut records = parse_search_table(&output.stdout)?;
        if query.match_mode == MatchMode::EqualsCaseInsensitive {
            // The CLI has no case-insensitive equality mode; rows whose match
            // column differs from the query only matched a substring.
            records.retain(|record| {
                record
                    .matched
                    .as_deref()
                    .map(|matched| query.match_mode.matches(matched, &query.value))
                    .unwrap_or(true)
            });
        }
        Ok(records)
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn failure_details(code: Option<i32>, stderr: &str, stdout: &str) -> String {
    let message = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|text| !text.is_empty())
        .unwrap_or("no output");
    let message: String = message.chars().take(MAX_DETAIL_CHARS).collect();
    match code {
        Some(code) => format!("exit code 0x{:08X}: {}", code as u32, message),
        None => format!("terminated by signal: {}", message),
    }
}
