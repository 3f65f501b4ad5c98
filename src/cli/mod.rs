//! CLI module for manimator - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for one-shot creation,
//! interactive chat, settings, and model listing.

pub mod commands;
pub mod display;

pub use commands::Cli;
