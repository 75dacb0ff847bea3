//! Puzzle tracker CLI - builds the tracker workbook from JSON datasets

use anyhow::{Context, Result};
use clap::Parser;
use puzzle_tracker::{completion_message, TrackerBuilder, TrackerConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "puzzle-tracker")]
#[command(
    author,
    version,
    about = "Build a color-coded puzzle progress tracker workbook from JSON datasets"
)]
struct Cli {
    /// JSON config file; omitted fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing easy.json, medium.json, hard.json and deadly.json
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Output workbook path (default: brainstellar_tracker.xlsx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => TrackerConfig::default(),
        };
        if let Some(input_dir) = self.input_dir {
            config.input_dir = input_dir;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = cli.into_config()?;
    tracing::debug!(?config, "resolved configuration");

    let builder = TrackerBuilder::new(config).context("invalid configuration")?;
    let output = builder
        .run()
        .with_context(|| format!("failed to build {}", builder.config().output.display()))?;

    println!("{}", completion_message(&output));
    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };

    let filter = EnvFilter::try_from_env("PUZZLE_TRACKER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_no_flags_is_default_config() {
        let cli = Cli::try_parse_from(["puzzle-tracker"]).unwrap();
        assert!(!cli.verbose);
        assert_eq!(cli.into_config().unwrap(), TrackerConfig::default());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("tracker.json");
        std::fs::write(&config_path, r#"{"input_dir": "data", "output": "from-file.xlsx"}"#)
            .unwrap();

        let cli = Cli::try_parse_from([
            "puzzle-tracker",
            "--config",
            config_path.to_str().unwrap(),
            "--output",
            "flag.xlsx",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);

        let config = cli.into_config().unwrap();
        assert_eq!(config.input_dir, Path::new("data"));
        assert_eq!(config.output, Path::new("flag.xlsx"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["puzzle-tracker", "--config", "/nonexistent/tracker.json"])
            .unwrap();
        assert!(cli.into_config().is_err());
    }
}
