//! Deployment specification loading and validation

pub mod load;
pub mod model;

pub use load::load_config;
pub use model::*;
