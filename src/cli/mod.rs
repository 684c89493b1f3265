//! CLI module
//!
//! Command-line driver around the batch load processor.
//!
//! # Commands
//!
//! - `properties` - Show declared properties, relationships and attributes
//! - `schema` - Translate a JSON field list into a table schema
//! - `validate` - Check a loader configuration offline
//! - `load` - Load files, one unit each

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
