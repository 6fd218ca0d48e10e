//! Command line arguments

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use slotdb_store::Configuration;
use slotdb_store::config::{LOAD_FACTOR, TEMP_DIR};
use std::fs;
use std::path::PathBuf;

/// Build and inspect immutable slotdb key-value files
#[derive(Debug, Parser)]
#[command(name = "slotdb", about = "Build and inspect immutable slotdb key-value files", version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a store from a dump of `hex(key)<TAB>hex(value)` lines
    Build(BuildArgs),
    /// Print the metadata of a store file
    Inspect(InspectArgs),
}

/// Arguments of `slotdb build`
#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Dump file to read, `-` for stdin
    #[arg(long, short)]
    pub input: PathBuf,

    /// Store file to write
    #[arg(long, short)]
    pub output: PathBuf,

    /// Slot table load factor, in (0, 1)
    #[arg(long, env = "SLOTDB_LOAD_FACTOR")]
    pub load_factor: Option<f64>,

    /// Parent directory for scratch files
    #[arg(long, env = "SLOTDB_TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// JSON object of writer settings, applied before the flags above
    #[arg(long, env = "SLOTDB_SETTINGS")]
    pub settings: Option<PathBuf>,
}

impl BuildArgs {
    /// Writer configuration from the settings file and flags
    pub fn configuration(&self) -> Result<Configuration> {
        let mut config = match &self.settings {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings {}", path.display()))?;
                Configuration::from_json(&json)
                    .with_context(|| format!("Invalid settings in {}", path.display()))?
            }
            None => Configuration::default(),
        };

        if let Some(load_factor) = self.load_factor {
            config.set(LOAD_FACTOR, load_factor.to_string());
        }
        if let Some(tmp_dir) = &self.tmp_dir {
            config.set(TEMP_DIR, tmp_dir.to_string_lossy());
        }

        Ok(config)
    }
}

/// Arguments of `slotdb inspect`
#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Store file to read
    pub store: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::float_cmp)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_flags_override_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.json");
        fs::write(&settings, r#"{"load.factor": "0.5", "tmp.dir": "/from/settings"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "slotdb",
            "build",
            "--input",
            "dump.tsv",
            "--output",
            "out.slotdb",
            "--load-factor",
            "0.9",
            "--settings",
            settings.to_str().unwrap(),
        ])
        .unwrap();

        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        let config = args.configuration().unwrap();
        assert_eq!(config.get_f64(LOAD_FACTOR).unwrap(), 0.9);
        assert_eq!(config.get(TEMP_DIR), Some("/from/settings"));
    }

    #[test]
    fn test_inspect_args() {
        let cli = Cli::try_parse_from(["slotdb", "inspect", "store.slotdb", "--json"]).unwrap();
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.store, PathBuf::from("store.slotdb"));
        assert!(args.json);
    }
}
