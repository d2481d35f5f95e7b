// Application state module
// Immutable per-process state shared by every connection task

use std::path::PathBuf;

use super::types::Config;
use crate::error::ServerError;

/// Application state
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    /// Canonical root directory, resolved once at startup
    pub root: PathBuf,
}

impl AppState {
    /// Build state from configuration, resolving the root directory
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let root = config.resolve_root()?;
        Ok(Self { config, root })
    }

    #[inline]
    pub const fn access_log(&self) -> bool {
        self.config.logging.access_log
    }
}
