//! CLI subcommands.

pub mod bootstrap;
pub mod prepare;
pub mod run;
