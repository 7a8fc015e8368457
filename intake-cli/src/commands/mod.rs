//! CLI command implementations

pub mod config;
pub mod serve;
pub mod token;

pub use config::ConfigCommand;
pub use serve::ServeCommand;
pub use token::TokenCommand;
