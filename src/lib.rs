//! Static file server for the CRBL fight clock page.
//!
//! Serves one root directory over HTTP/1.1 (default `0.0.0.0:8000`) with
//! tokio + hyper: one task per connection, path confinement to the root,
//! index files, directory listings, conditional and range requests, and
//! graceful shutdown on SIGINT/SIGTERM.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;

pub use config::Config;
pub use error::ServerError;
pub use server::{Server, ShutdownHandle};
