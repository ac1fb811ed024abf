//! Library half of the `mserv` binary, split out so commands are testable.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod styles;
