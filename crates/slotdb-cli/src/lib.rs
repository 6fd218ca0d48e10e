//! Command line front end for slotdb
//!
//! `slotdb build` turns a hex dump into a store file, `slotdb inspect` prints
//! a store's metadata. The binary is a thin wrapper around [`run`].

#![warn(missing_docs)]

pub mod cli;
pub mod dump;
pub mod inspect;

use anyhow::{Context, Result};
use cli::{BuildArgs, Cli, Command, InspectArgs};
use dump::DumpReader;
use inspect::StoreReport;
use slotdb_store::{StoreMetadata, StoreWriter, WriteSummary};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tracing::info;

/// Run a parsed command, writing human output to `out`
pub fn run<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    match cli.command {
        Command::Build(args) => {
            let summary = build(&args)?;
            writeln!(
                out,
                "Wrote {} keys ({} distinct values, {} collisions) to {} ({} bytes)",
                summary.key_count,
                summary.value_count,
                summary.collisions,
                args.output.display(),
                summary.bytes_written
            )?;
        }
        Command::Inspect(args) => {
            let report = inspect(&args)?;
            if args.json {
                serde_json::to_writer_pretty(&mut *out, &report)?;
                writeln!(out)?;
            } else {
                write!(out, "{report}")?;
            }
        }
    }
    Ok(())
}

/// Build a store from the dump named in `args`
pub fn build(args: &BuildArgs) -> Result<WriteSummary> {
    let config = args.configuration()?;
    let mut writer = StoreWriter::create(&args.output, config)
        .with_context(|| format!("Failed to open {}", args.output.display()))?;

    let input = open_input(&args.input)?;
    for pair in DumpReader::new(input) {
        let (key, value) =
            pair.with_context(|| format!("Failed to read {}", args.input.display()))?;
        writer.put(&key, &value)?;
    }

    info!("Read {} pairs, writing {}", writer.key_count(), args.output.display());

    writer
        .close()
        .with_context(|| format!("Failed to write {}", args.output.display()))
}

/// Read the metadata of the store named in `args`
pub fn inspect(args: &InspectArgs) -> Result<StoreReport> {
    let file = File::open(&args.store)
        .with_context(|| format!("Failed to open {}", args.store.display()))?;
    let metadata = StoreMetadata::read(&mut BufReader::new(file))
        .with_context(|| format!("Failed to read metadata of {}", args.store.display()))?;
    Ok(StoreReport::from(&metadata))
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}
