// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use clap::Parser;
use cli::{Cli, Commands, OutputFormatArg};
use ragchat_render::{ChatMessage, HighlightCache, Renderer, SyntectSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Commands::Completions { shell } = &cli.command {
        cli::print_completions(*shell);
        return Ok(());
    }

    let config = ragchat_config::load(cli.config.as_deref())?;
    HighlightCache::install_global(SyntectSource::from_config(&config.render));

    match &cli.command {
        Commands::Render { input, format } => {
            let message = read_message(input)?;
            let rendered = Renderer::new(&config.render).render(&message).await;
            match format {
                OutputFormatArg::Html => print!("{}", rendered.html),
                OutputFormatArg::Json => {
                    println!("{}", serde_json::to_string_pretty(&rendered)?)
                }
            }
        }
        Commands::References { input } => {
            let message = read_message(input)?;
            let references = Renderer::new(&config.render).references(&message);
            println!("{}", serde_json::to_string_pretty(&references)?);
        }
        Commands::Stylesheet => {
            let highlighter = HighlightCache::global()
                .ensure()
                .await
                .context("loading syntax highlighter")?;
            print!("{}", highlighter.stylesheet()?);
        }
        Commands::ShowConfig => {
            println!("{}", toml::to_string(&config)?);
        }
        Commands::Completions { .. } => {}
    }
    Ok(())
}

/// Read a chat message as JSON from `path`, or from stdin when `path` is `-`.
fn read_message(path: &Path) -> anyhow::Result<ChatMessage> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("reading message from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading message file {}", path.display()))?
    };
    debug!(bytes = text.len(), "read message");
    serde_json::from_str(&text).context("parsing chat message JSON")
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
