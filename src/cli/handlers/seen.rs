use anyhow::{bail, Result};
use std::path::PathBuf;
use trumpet::store::FileStore;

use super::super::{CliContext, SeenAction};

/// Handler for dedup store inspection
pub struct SeenHandler<'a> {
    context: &'a CliContext,
}

impl<'a> SeenHandler<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    pub fn handle_seen(&self, action: SeenAction, store: Option<PathBuf>) -> Result<()> {
        let path = match store {
            Some(path) => path,
            None => self.context.config_manager.store_path()?,
        };
        let store = FileStore::open(&path);
        if !store.is_available() {
            bail!("Dedup store at {} is unavailable", path.display());
        }

        match action {
            SeenAction::List => {
                let keys = store.keys();
                if keys.is_empty() {
                    println!("No notifications recorded in {}", path.display());
                }
                for key in keys {
                    println!("{key}");
                }
            }
            SeenAction::Clear => {
                let removed = store.clear()?;
                println!("Cleared {} notifications from {}", removed, path.display());
            }
        }
        Ok(())
    }
}
