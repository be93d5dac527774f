//! gdup Drive - remote store adapters
//!
//! Provides:
//! - `DriveClient`: HTTP client for the Google Drive v2 API
//! - `DriveRemoteStore`: `IRemoteStore` backed by Google Drive
//! - `InMemoryRemoteStore`: `IRemoteStore` kept in memory (dry runs, tests)
//!
//! ## Modules
//!
//! - [`client`] - Drive v2 HTTP client (files.list, files.insert, multipart and resumable uploads)
//! - [`store`] - `IRemoteStore` over `DriveClient`
//! - [`memory`] - In-memory hierarchical store

pub mod client;
pub mod memory;
pub mod store;

use gdup_core::ports::remote_store::RemoteError;
use thiserror::Error;

pub use client::DriveClient;
pub use memory::InMemoryRemoteStore;
pub use store::DriveRemoteStore;

/// Errors that can occur when communicating with the Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    /// The API answered with a non-success status
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The local file being uploaded could not be read
    #[error("Local read error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DriveError> for RemoteError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::Status { code, message } => RemoteError::Status { code, message },
            DriveError::NetworkError(e) => RemoteError::Transport(e.to_string()),
            DriveError::InvalidResponse(msg) => RemoteError::Transport(msg),
            DriveError::Io(e) => RemoteError::Transport(format!("local read: {e}")),
        }
    }
}
