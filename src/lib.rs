//! healthstack: the health API's deployment graph and its one HTTP route.
//!
//! The graph side declares the stack's cloud resources as typed declarations
//! wired by computed attributes and explicit ordering, validates the result
//! and hands it to an orchestration engine. The HTTP side serves
//! `GET /health`.

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod http;
pub mod middleware;
pub mod policy;
pub mod routes;
pub mod stack;

pub use error::*;
