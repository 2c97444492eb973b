//! CLI command implementations

pub mod config;
pub mod history;
pub mod run;

pub use config::*;
pub use history::*;
pub use run::*;
