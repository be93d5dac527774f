//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Hierarchical remote object store (Google Drive, in-memory)
//! - [`IAuditSink`] - Destination for transaction log records

pub mod audit_sink;
pub mod remote_store;

pub use audit_sink::IAuditSink;
pub use remote_store::{
    IRemoteStore, RemoteChild, RemoteError, RemoteKind, RemoteObjectStat, FOLDER_MIME_TYPE,
};
