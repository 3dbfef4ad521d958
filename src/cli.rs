// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

/// Output format of `ragchat render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormatArg {
    /// The sanitized HTML fragment only.
    #[default]
    Html,
    /// HTML, references, status and regenerate key as JSON.
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "ragchat",
    about = "Render retrieval-augmented chat replies into sanitized HTML",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render one chat message (JSON) to HTML.
    Render {
        /// Message file; `-` reads stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: PathBuf,
        #[arg(long, short = 'f', value_enum, default_value = "html")]
        format: OutputFormatArg,
    },
    /// Print the ranked reference list of a chat message (JSON).
    References {
        /// Message file; `-` reads stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: PathBuf,
    },
    /// Print the CSS for highlighted code blocks
    Stylesheet,
    /// Print the effective configuration and exit
    ShowConfig,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "ragchat", &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn render_defaults_to_stdin_and_html() {
        let cli = Cli::parse_from(["ragchat", "render"]);
        match cli.command {
            Commands::Render { input, format } => {
                assert_eq!(input, PathBuf::from("-"));
                assert_eq!(format, OutputFormatArg::Html);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ragchat", "references", "msg.json", "-vv", "-c", "x.toml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }
}
