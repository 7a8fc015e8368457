//! intake CLI library

#![forbid(unsafe_code)]

pub mod commands;

pub use commands::{ConfigCommand, ServeCommand, TokenCommand};
