//! CLI command implementations

pub mod config;
pub mod show;

pub use config::execute as config;
pub use show::execute as show;
