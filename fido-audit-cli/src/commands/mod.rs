//! CLI subcommands.

pub mod verify;
