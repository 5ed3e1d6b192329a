//! rollcall daemon library.
//!
//! Issues short-lived device certificates in exchange for one-time
//! enrollment tokens and records daily attendance check-ins authenticated
//! by certificate id. The binary in `main.rs` wires these pieces to the
//! command line and an HTTP listener.

pub mod authority;
pub mod checkin;
pub mod config;
pub mod db;
pub mod http;
pub mod ledger;
pub mod services;
