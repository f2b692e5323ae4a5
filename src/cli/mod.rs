//! Command-line interface for songbridge.
//!
//! Exposes resolution, downloads, cache pre-warming and duplicate lookup
//! as subcommands over a shared [`Engine`](crate::Engine).

mod commands;

pub use commands::{Cli, Commands, DownloadArgs, run_command};
