//! # autofollow-ctl
//!
//! Command-line front end for the auto-follow backend.
//!
//! - `autofollow-ctl watch` (default) — follow status, connection state and
//!   notifications until Ctrl-C
//! - `autofollow-ctl start <N>` — start following up to N accounts
//! - `autofollow-ctl stop` — stop the running job
//! - `autofollow-ctl console` — interactive prompt with live status

use std::path::PathBuf;
use std::sync::Arc;

use autofollow_ctl::{
    ClientError, CommandClient, CommandOutcome, Config, ConnectionStatus, FollowClient,
    Notification, StatusSnapshot, StatusSource, StatusStore,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Control client for the auto-follow backend.
#[derive(Parser)]
#[command(name = "autofollow-ctl", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream status updates (default when no subcommand given).
    Watch,
    /// Start the job with a target follow count.
    Start {
        /// Number of accounts to follow (positive integer).
        #[arg(allow_hyphen_values = true)]
        target_count: String,
    },
    /// Stop the running job.
    Stop,
    /// Interactive console: type `help` for commands.
    Console,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("autofollow-ctl: configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Logs go to stderr; stdout carries status output.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => run_watch(&config).await,
        Commands::Start { target_count } => run_start(&config, &target_count).await,
        Commands::Stop => run_stop(&config).await,
        Commands::Console => run_console(&config).await,
    };

    if let Err(e) = result {
        eprintln!("autofollow-ctl: {e}");
        std::process::exit(1);
    }
}

/// One-shot commands don't need the push channel.
fn command_client(config: &Config) -> Result<CommandClient, ClientError> {
    CommandClient::new(&config.backend.api_base(), &config.http, StatusStore::new())
}

async fn run_start(config: &Config, input: &str) -> Result<(), ClientError> {
    let outcome = command_client(config)?.start_from_input(input).await?;
    print_outcome("started", &outcome);
    Ok(())
}

async fn run_stop(config: &Config) -> Result<(), ClientError> {
    let outcome = command_client(config)?.stop().await?;
    print_outcome("stopped", &outcome);
    Ok(())
}

async fn run_watch(config: &Config) -> Result<(), ClientError> {
    let client = FollowClient::start(config)?;
    let mut status_rx = client.subscribe_status();
    let mut conn_rx = client.subscribe_connection();
    let mut notify_rx = client.subscribe_notifications();

    print_status(&client.status_snapshot());
    print_connection(&client.connection());

    loop {
        tokio::select! {
            Ok(()) = status_rx.changed() => print_status(&status_rx.borrow_and_update()),
            Ok(()) = conn_rx.changed() => print_connection(&conn_rx.borrow_and_update()),
            Ok(()) = notify_rx.changed() => {
                if let Some(n) = notify_rx.borrow_and_update().as_ref() {
                    print_notification(n);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT");
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

async fn run_console(config: &Config) -> Result<(), ClientError> {
    let client = Arc::new(FollowClient::start(config)?);
    let mut status_rx = client.subscribe_status();
    let mut conn_rx = client.subscribe_connection();
    let mut notify_rx = client.subscribe_notifications();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    print_status(&client.status_snapshot());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                if !handle_console_line(&client, line.trim()) {
                    break;
                }
            }
            Ok(()) = status_rx.changed() => print_status(&status_rx.borrow_and_update()),
            Ok(()) = conn_rx.changed() => print_connection(&conn_rx.borrow_and_update()),
            Ok(()) = notify_rx.changed() => {
                if let Some(n) = notify_rx.borrow_and_update().as_ref() {
                    print_notification(n);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown().await;
    Ok(())
}

/// Returns `false` when the user asked to quit.
fn handle_console_line(client: &Arc<FollowClient>, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => {}
        Some("start") => {
            let input = parts.next().unwrap_or("").to_string();
            if client.status().is_running {
                println!("already running; stop first");
                return true;
            }
            // Run off the input loop so push updates keep printing meanwhile.
            let client = Arc::clone(client);
            tokio::spawn(async move {
                match client.start_job_from_input(&input).await {
                    Ok(outcome) => print_outcome("started", &outcome),
                    Err(e) => println!("error: {e}"),
                }
            });
        }
        Some("stop") => {
            if !client.status().is_running {
                println!("not running");
                return true;
            }
            let client = Arc::clone(client);
            tokio::spawn(async move {
                match client.stop_job().await {
                    Ok(outcome) => print_outcome("stopped", &outcome),
                    Err(e) => println!("error: {e}"),
                }
            });
        }
        Some("status") => {
            print_status(&client.status_snapshot());
            print_connection(&client.connection());
        }
        Some("dismiss") => {
            if !client.dismiss_notification() {
                println!("no notification to dismiss");
            }
        }
        Some("reconnect") => client.reconnect(),
        Some("help") => print_help(),
        Some("quit" | "exit") => return false,
        Some(other) => println!("unknown command {other:?}; type `help`"),
    }
    true
}

fn print_help() {
    println!("commands: start <N> | stop | status | dismiss | reconnect | help | quit");
}

fn print_status(snapshot: &StatusSnapshot) {
    let status = snapshot.status;
    let marker = match snapshot.source {
        StatusSource::Optimistic => " (pending confirmation)",
        StatusSource::Initial | StatusSource::Push => "",
    };
    if status.target_count > 0 {
        println!("status: {status} {}%{marker}", status.progress_percent());
    } else {
        println!("status: {status}{marker}");
    }
}

fn print_connection(status: &ConnectionStatus) {
    match &status.last_error {
        Some(err) => println!("connection: {} ({err})", status.state),
        None => println!("connection: {}", status.state),
    }
}

fn print_notification(n: &Notification) {
    println!("notice #{}: {}", n.id, n.message);
}

fn print_outcome(verb: &str, outcome: &CommandOutcome) {
    if outcome.counts_known {
        println!("{verb}: {}", outcome.predicted);
    } else {
        println!("{verb}: accepted");
    }
}
