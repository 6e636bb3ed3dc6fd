//! xkcd-dns - Serve xkcd comics over DNS TXT records.
//!
//! This crate provides the core functionality for the xkcd-dns server,
//! exposed as a library for testing and integration purposes.

pub mod body;
pub mod comic;
pub mod config;
pub mod dns;
pub mod error;
pub mod logging;
pub mod tokio_io;
