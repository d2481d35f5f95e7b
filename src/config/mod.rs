// Configuration module entry point
// Loads configuration, resolves the served root directory, and holds shared state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::ServerError;

// Re-export public types
pub use state::AppState;
pub use types::{Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Default configuration file name (without extension), looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "clock_server";

/// Environment variable prefix, e.g. `CLOCK_SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "CLOCK";

/// Directory served when `server.root` is unset, next to the executable
pub const DEFAULT_ROOT_DIR: &str = "public";

/// Fallback for binaries run from a source checkout (`cargo run`, tests)
const CHECKOUT_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/public");

impl Config {
    /// Load configuration from the default file name plus environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// A missing file is not an error; unset keys keep their defaults.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("http.index_files"),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|e| ServerError::Config(format!("Invalid address '{addr}': {e}")))
    }

    /// Resolve the served root directory to a canonical absolute path.
    ///
    /// Unset: [`DEFAULT_ROOT_DIR`] beside the running executable. Relative
    /// overrides are anchored at the same directory, never the working directory.
    pub fn resolve_root(&self) -> Result<PathBuf, ServerError> {
        let candidate = match self.server.root.as_deref() {
            None => default_root(&executable_dir()?),
            Some(root) if Path::new(root).is_absolute() => PathBuf::from(root),
            Some(root) => executable_dir()?.join(root),
        };

        let canonical = candidate
            .canonicalize()
            .map_err(|source| ServerError::RootDir {
                path: candidate.clone(),
                source,
            })?;

        if !canonical.is_dir() {
            return Err(ServerError::RootDir {
                path: candidate,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        Ok(canonical)
    }
}

fn default_root(exe_dir: &Path) -> PathBuf {
    let shipped = exe_dir.join(DEFAULT_ROOT_DIR);
    if shipped.is_dir() {
        shipped
    } else {
        PathBuf::from(CHECKOUT_ROOT)
    }
}

fn executable_dir() -> Result<PathBuf, ServerError> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| ServerError::Config(format!("Executable has no parent: {}", exe.display())))
}
