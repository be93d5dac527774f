//! Integration tests for gdup-drive
//!
//! Uses wiremock to simulate the Drive v2 API and checks the requests the
//! client sends and how responses and errors reach the remote store port.

mod common;

mod test_lookup;
mod test_upload;
