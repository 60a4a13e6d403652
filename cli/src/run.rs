use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as AnyhowContext;
use clap::{self, Args};

use polex::collector::EndReason;
use polex::{Algorithm, Config, Context, Mode, RunOptions, Session, SessionSummary};

use crate::parsers::{read_identifier_lines, IdentifierSet};
use crate::utils::{DeviceArgs, UsageError};

/// Exit status when the session ended but not every identifier made it
const INCOMPLETE_EXIT_CODE: u8 = 2;

#[derive(Args)]
pub struct Run {
    /// Application identifier to process, may be given multiple times
    #[arg(short = 'p', long = "package")]
    pub packages: Vec<String>,

    /// Read identifiers from a file, one per line
    ///
    /// Blank lines and lines starting with `#` are ignored.
    #[arg(short = 'F', long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub device: DeviceArgs,

    /// Search algorithm for the harness: DFS, BFS, RS or OS
    ///
    /// Unknown values fall back to OS.
    #[arg(short = 'a', long)]
    pub algorithm: Option<String>,

    /// Extract a structural model of the policy (XML) instead of its text
    #[arg(short = 'm', long)]
    pub model: bool,

    /// Directory to write the results to, overrides `output.dir`
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Leave the harness installed when done
    #[arg(long)]
    pub keep_installed: bool,

    /// Assume the harness is already installed
    #[arg(long)]
    pub no_install: bool,
}

impl Run {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<ExitCode> {
        let ids = self.identifiers()?;
        for bad in &ids.rejected {
            eprintln!("warning: skipping invalid identifier {:?}", bad);
        }
        if ids.is_empty() {
            return Err(UsageError::new("run", "no valid application identifiers given").into());
        }

        let device = self.device.select_required(ctx, "run")?;
        let config = Config::new(
            Mode::from_model_flag(self.model),
            Algorithm::resolve(self.algorithm.as_deref()),
            device.clone(),
        );
        log::info!(
            "extracting {} identifier(s) on {} (mode {}, algorithm {})",
            ids.valid.len(),
            config.device,
            config.mode,
            config.algorithm
        );

        let mut session = Session::new(ctx, config)?;
        if let Some(out) = &self.output {
            session = session.with_output_dir(out.clone());
        }

        let opts = RunOptions {
            install: !self.no_install,
            cleanup: !self.keep_installed,
            ..RunOptions::default()
        };
        let summary = session
            .run(&ids.valid, &opts)
            .with_context(|| format!("extracting on {}", device))?;

        if let Some(path) = &self.report {
            write_report(path, &summary)?;
        }
        print_summary(&summary);

        if !summary.is_complete() {
            return Ok(ExitCode::from(INCOMPLETE_EXIT_CODE));
        }
        Ok(ExitCode::SUCCESS)
    }

    fn identifiers(&self) -> anyhow::Result<IdentifierSet> {
        let mut entries = self.packages.clone();
        if let Some(file) = &self.file {
            entries.extend(read_identifier_lines(file)?);
        }
        Ok(IdentifierSet::from_entries(entries))
    }
}

fn write_report(path: &Path, summary: &SessionSummary) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary).with_context(|| "serializing the report")?;
    fs::write(path, json)
        .with_context(|| format!("writing report to {}", path.to_string_lossy()))?;
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    for it in &summary.written {
        println!("{} -> {}", it.identifier, it.path.to_string_lossy());
    }
    for it in &summary.failed {
        eprintln!("failed: {}: {}", it.identifier, it.reason);
    }
    for it in &summary.missing {
        eprintln!("no result: {}", it);
    }
    if !summary.violations.is_empty() {
        eprintln!(
            "{} protocol violation(s), see the log for details",
            summary.violations.len()
        );
    }
    match summary.end {
        EndReason::Sentinel => {}
        EndReason::StreamClosed => eprintln!("the harness disconnected before finishing"),
        EndReason::TimedOut => eprintln!("timed out waiting for the harness"),
    }
    if let Some(cleanup) = &summary.cleanup {
        for f in &cleanup.failures {
            eprintln!("cleanup: {}", f);
        }
    }
}
