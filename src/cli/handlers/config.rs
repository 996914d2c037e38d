//! Configuration management handler

use anyhow::{Context, Result};
use std::path::PathBuf;
use trumpet::config::ConfigManager;

use super::super::{CliContext, ConfigAction};

/// Handler for configuration operations
pub struct ConfigHandler<'a> {
    context: &'a CliContext,
}

impl<'a> ConfigHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    /// Write a default configuration file
    pub fn handle_init(&self, global: bool, force: bool) -> Result<()> {
        let config_path = if global {
            ConfigManager::global_config_path()?
        } else {
            let project = self
                .context
                .project_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("."));
            ConfigManager::project_config_path(&project)
        };

        if config_path.exists() && !force {
            println!("Configuration already initialized at: {}", config_path.display());
            println!("Use --force to overwrite");
            return Ok(());
        }

        ConfigManager::init(&config_path, force)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("Configuration initialized successfully at: {}", config_path.display());
        println!("Set notifications_endpoint before running `trumpet listen`");
        Ok(())
    }

    pub fn handle_config(&self, action: ConfigAction) -> Result<()> {
        let manager = &self.context.config_manager;
        match action {
            ConfigAction::Show => {
                if manager.is_loaded() {
                    println!("# {}", manager.config_path().display());
                } else {
                    println!("# no configuration file, built-in defaults apply");
                }
                println!("{}", toml::to_string_pretty(manager.file())?);
            }
            ConfigAction::Path => {
                println!("{}", manager.config_path().display());
            }
        }
        Ok(())
    }
}
