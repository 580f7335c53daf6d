//! CLI entry point for Luminary.

pub mod chat;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Luminary chat assistant
#[derive(Parser, Debug)]
#[command(name = "luminary", version, about = "Luminary: streaming chat assistant with tools")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to luminary.toml
    #[arg(long, global = true, env = "LUMINARY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Run one chat turn and print it
    Chat(ChatArgs),
}

/// Arguments for `luminary serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides the configured bind address)
    #[arg(long)]
    pub bind: Option<String>,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model id; namespaced ids (vendor/model) route to OpenRouter
    #[arg(short, long)]
    pub model: Option<String>,

    /// Temperature (0.0 - 1.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Maximum tool-dispatch rounds
    #[arg(long)]
    pub max_tool_steps: Option<u32>,

    /// Send the turn to a running server instead of in-process
    #[arg(long)]
    pub server: Option<String>,

    /// User prompt
    pub prompt: String,
}
