//! Task emitters, one module per task category

pub mod controlm;
pub mod deploy;
pub mod groups;
pub mod jenkins;
pub mod notify;
pub mod script;
pub mod sun;
pub mod technical;
