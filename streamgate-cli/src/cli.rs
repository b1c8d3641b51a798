//! Command-line argument definitions.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "streamgate",
    version,
    about = "Resolve sports live-stream URLs and re-serve them through a local HLS proxy"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve the playable links behind an event page URL
    Resolve {
        /// Event page URL (ppv.land, strimsy.top, streambtw.com, streamed.su, ...)
        url: String,

        /// Referer to send with page fetches
        #[arg(long)]
        referer: Option<String>,

        /// Cookie string to send with page fetches ("k=v; k2=v2")
        #[arg(long)]
        cookies: Option<String>,

        /// Keep only the highest-quality link
        #[arg(long)]
        best: bool,

        /// Start the local proxy and print proxied URLs instead of upstream ones
        #[arg(long)]
        proxy: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Run the HLS-rewriting proxy until interrupted
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show or reset the configuration
    Config {
        /// Print the current configuration
        #[arg(long)]
        show: bool,

        /// Reset the configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Pretty,
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    JsonCompact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn resolve_parses_flags() {
        let args = Args::parse_from([
            "streamgate",
            "resolve",
            "https://streambtw.com/live/nfl1.php",
            "--best",
            "--output",
            "json",
        ]);
        match args.command {
            Commands::Resolve {
                url, best, output, ..
            } => {
                assert_eq!(url, "https://streambtw.com/live/nfl1.php");
                assert!(best);
                assert_eq!(output, OutputFormat::Json);
            }
            _ => panic!("expected resolve command"),
        }
    }
}
