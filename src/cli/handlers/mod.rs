//! Command handlers
//!
//! Each handler borrows the [`CliContext`] and implements one group of
//! commands. [`CommandHandler`] routes a parsed command to the right one.

pub mod config;
pub mod listen;
pub mod seen;

use anyhow::Result;

use super::{CliContext, Commands};
pub use config::ConfigHandler;
pub use listen::ListenHandler;
pub use seen::SeenHandler;

/// Routes commands to their handlers
pub struct CommandHandler {
    context: CliContext,
}

impl CommandHandler {
    pub fn new(context: CliContext) -> Self {
        Self { context }
    }

    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Listen(args) => ListenHandler::new(&self.context).handle_listen(args).await,
            Commands::Check(args) => ListenHandler::new(&self.context).handle_check(&args),
            Commands::Init { global, force } => ConfigHandler::new(&self.context).handle_init(global, force),
            Commands::Config { action } => ConfigHandler::new(&self.context).handle_config(action),
            Commands::Seen { action, store } => SeenHandler::new(&self.context).handle_seen(action, store),
        }
    }
}
