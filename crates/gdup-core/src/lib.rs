//! gdup Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `UploadTask`, `AuditRecord`, `RemoteObjectStat`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `IAuditSink`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`gdup-drive` for the remote store, `gdup-audit` for the audit sink).
//! The synchronization engine in `gdup-sync` orchestrates both.

pub mod config;
pub mod domain;
pub mod ports;
