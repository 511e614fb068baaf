//! chat-relay: durable webhook outbox for multi-tenant chat sessions
//!
//! Entry point for the chat-relay application.

use chat_relay::config::{Cli, Command, ValidatedConfig, write_default_config};
use std::process::ExitCode;

mod app;
mod run;

use app::{exit_code, print_config_hint, setup_tracing};

/// Main entry point.
///
/// Excluded from coverage as it's the thin wrapper around testable components.
#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Handle init subcommand
    if let Some(Command::Init { output }) = &cli.command {
        return handle_init(output);
    }

    // Load and validate configuration
    let config = match ValidatedConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            print_config_hint(&e);
            return exit_code::CONFIG_ERROR;
        }
    };

    setup_tracing(config.verbose);

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    match cli.command {
        None | Some(Command::Init { .. }) => {
            tracing::info!("{config}");
            finish(runtime.block_on(run::execute(config)))
        }
        Some(Command::Enqueue {
            owner,
            session,
            event,
            data,
        }) => {
            let result = runtime.block_on(run::enqueue(
                &config,
                &owner,
                session.as_deref(),
                &event,
                &data,
            ));
            finish(result.map(|id| println!("Enqueued webhook event {id}")))
        }
        Some(Command::AddSession {
            owner,
            name,
            webhook,
            events,
        }) => {
            let result = runtime.block_on(run::add_session(
                &config,
                &owner,
                &name,
                webhook.as_deref(),
                &events,
            ));
            finish(result.map(|session| println!("Created session {}", session.id)))
        }
    }
}

/// Handles the `init` subcommand.
fn handle_init(output: &std::path::Path) -> ExitCode {
    match write_default_config(output) {
        Ok(()) => {
            println!("Configuration template written to: {}", output.display());
            exit_code::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code::CONFIG_ERROR
        }
    }
}

/// Maps a command result to an exit code.
fn finish(result: Result<(), run::RunError>) -> ExitCode {
    match result {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            tracing::error!("Application error: {e}");
            exit_code::runtime_error()
        }
    }
}
