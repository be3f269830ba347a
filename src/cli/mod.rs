//! CLI module - argument parsing, prompts and subcommands

mod args;
pub mod inspect;
mod prompts;

pub use args::{Cli, Commands, InvolvementArg};
pub use prompts::*;
