//! HTTP transport to the orchestration engine

pub mod client;

pub use client::XlrClient;
