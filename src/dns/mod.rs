//! DNS front end: wire codec, query classification, answer building and the UDP server.

mod classify;
mod response;
mod server;
pub mod wire;

pub use classify::classify;
pub use response::{build_answers, response_code_for};
pub use server::{handle_dns_query, run_dns_server};
