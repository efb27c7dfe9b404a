//! winget-cnf: shell hook CLI for the command-not-found daemon.
//!
//! Called by the shell's command-not-found and prediction hooks. Every
//! subcommand forwards one event to the daemon and prints what comes back.
//!
//! ## Subcommands
//!
//! - `feedback`: a command token the shell could not find
//! - `predict`: partial input typed so far, one suggestion per output line
//! - `accepted`: the user accepted a command line
//! - `health`: daemon status as JSON

mod daemon_client;
mod logging;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "winget-cnf")]
#[command(about = "Suggests WinGet packages for commands that were not found")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a command the shell could not find
    Feedback {
        /// The unresolved command token
        #[arg(value_name = "TOKEN")]
        target: String,

        /// Full command line the token came from
        #[arg(long)]
        command_line: Option<String>,
    },

    /// Print install suggestions matching the typed prefix
    Predict {
        #[arg(value_name = "INPUT", default_value = "")]
        input: String,
    },

    /// Notify that a command line was accepted
    Accepted {
        #[arg(value_name = "LINE")]
        line: Option<String>,
    },

    /// Show daemon health
    Health,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    // The shell must never see a failure from this hook; log and exit 0.
    match cli.command {
        Commands::Feedback {
            target,
            command_line,
        } => match daemon_client::send_feedback(&target, command_line.as_deref()) {
            Ok(items) => {
                for item in items {
                    println!("{}", item.render());
                }
            }
            Err(e) => tracing::warn!(error = %e, token = %target, "winget-cnf feedback failed"),
        },
        Commands::Predict { input } => match daemon_client::send_predict(&input) {
            Ok(suggestions) => {
                for suggestion in suggestions {
                    println!("{}", suggestion);
                }
            }
            Err(e) => tracing::warn!(error = %e, "winget-cnf predict failed"),
        },
        Commands::Accepted { line } => {
            if let Err(e) = daemon_client::send_command_accepted(line.as_deref().unwrap_or("")) {
                tracing::warn!(error = %e, "winget-cnf accepted failed");
            }
        }
        Commands::Health => match daemon_client::daemon_health() {
            Ok(health) => println!("{}", health),
            Err(e) => {
                tracing::warn!(error = %e, "winget-cnf health failed");
                println!("{}", serde_json::json!({ "status": "unreachable", "error": e }));
            }
        },
    }
}
