//! CLI module providing command-line interface functionality
//!
//! This module handles argument parsing and routing to the command handlers.

pub mod commands;
pub mod context;
pub mod handlers;

use anyhow::Result;
use clap::Parser;

pub use commands::{Cli, Commands, ConfigAction, ListenArgs, SeenAction};
pub use context::CliContext;
pub use handlers::CommandHandler;

pub struct CliApp;

impl CliApp {
    /// Parse command line arguments and execute the requested command
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();

        let context = CliContext::new(cli.project.clone(), cli.verbose)?;
        let _log_guard = context.init_logging()?;

        let handler = CommandHandler::new(context);

        // Listening is the default when no subcommand is given
        let command = cli
            .command
            .unwrap_or_else(|| Commands::Listen(ListenArgs::default()));

        handler.handle_command(command).await
    }
}
