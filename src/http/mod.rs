//! HTTP server module.
//!
//! Serves the router on plain HTTP; TLS terminates at API Gateway or a
//! reverse proxy in front of the process. The server includes:
//! - Graceful shutdown on SIGTERM/SIGINT with a bounded drain period

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
