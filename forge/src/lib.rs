//! Relforge Library
//!
//! Core modules for the release-template forge.

pub mod api;
pub mod app;
pub mod config;
pub mod envmap;
pub mod errors;
pub mod http;
pub mod logs;
pub mod planner;
pub mod pruner;
pub mod registry;
pub mod tasks;
pub mod variables;
