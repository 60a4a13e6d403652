use std::borrow::Cow;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as AnyhowContext;
use clap::{Parser, Subcommand};
use flexi_logger::{FileSpec, LevelFilter, LogSpecification, Logger, LoggerHandle, WriteMode};

use polex::{Context, DefaultContext};

mod parsers;
mod utils;
use utils::UsageError;

mod run;
use run::Run;

mod devices;
use devices::Devices;

mod package;
use package::{Install, Uninstall};

const SIMPLE_VERSION_STRING: &'static str =
    include!(concat!(env!("OUT_DIR"), "/simple_version_string"));
const VERSION_STRING: &'static str = include!(concat!(env!("OUT_DIR"), "/version_string"));

const LOG_FILE_NAME: &'static str = "polex.log";

#[derive(Parser)]
#[command(name = "polex")]
#[command(version(SIMPLE_VERSION_STRING))]
#[command(long_version(VERSION_STRING))]
struct Cli {
    /// `-e`, `--log-stderr`: Flag value, when enabled will cause logs to be output to `stderr`
    /// instead of a log file. Disabled by default (logs go to a file by default)
    #[arg(short = 'e', long, help = "Log to stderr instead of a file", action = clap::ArgAction::SetTrue, default_value_t = false)]
    log_stderr: bool,

    /// `-f`, `--log-file`: Path to desired log output file location. Optional, defaults to
    /// `polex.log` in the output directory
    #[arg(short = 'f', long, help = "Send log output to the given file")]
    log_file: Option<PathBuf>,

    /// `-s`, `--log-spec`: Debug options for [flexi_logger](https://docs.rs/flexi_logger/latest/flexi_logger/struct.LogSpecification.html)
    #[arg(short = 's', long, help = "Log spec for flexi_logger")]
    log_spec: Option<String>,

    /// `-l`, `--log-level`: Set the desired log verbosity. Defaults to 0, all values are listed
    /// below:
    ///
    /// | Value | Log Level |
    /// | ----- | --------- |
    /// | **0** | **Warn** |
    /// | 1 | Info |
    /// | 2 | Debug |
    /// | 3 | Trace |
    #[arg(
        short = 'l',
        long,
        help = "Set the log level, 0 = warn, 1 = info, etc",
        long_help = None,
        default_value_t = 0
    )]
    log_level: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the full version string and exit
    #[command()]
    Version,

    /// Extract privacy policies for a list of applications
    ///
    /// Installs the harness on the selected device, launches it on the given
    /// identifiers and writes one file per identifier into the output
    /// directory.
    #[command()]
    Run(Run),

    /// List the attached devices
    #[command()]
    Devices(Devices),

    /// Only install the harness on a device
    #[command()]
    Install(Install),

    /// Remove the harness and any files a run left on a device
    #[command()]
    Uninstall(Uninstall),
}

fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl Cli {
    fn configure_loggers(&self, ctx: &DefaultContext) -> anyhow::Result<LoggerHandle> {
        let log_spec = match &self.log_spec {
            Some(s) => {
                LogSpecification::parse(s).with_context(|| format!("parsing log spec {}", s))?
            }
            None => {
                if self.log_level > 0 {
                    let lvl = level_filter(self.log_level);
                    LogSpecification::builder()
                        .module("polex", lvl)
                        .module("polex_cli", lvl)
                        .build()
                } else {
                    LogSpecification::env().with_context(|| "getting log spec from env")?
                }
            }
        };

        let mut logger = Logger::with(log_spec);

        if !self.log_stderr {
            let path = match &self.log_file {
                Some(v) => {
                    if v.is_absolute() {
                        Some(Cow::Borrowed(v))
                    } else {
                        let full_path = std::env::current_dir()?.join(v);
                        Some(Cow::Owned(full_path))
                    }
                }
                None => {
                    let dir = match self.output_dir_override() {
                        Some(v) => Ok(v),
                        None => ctx.get_output_dir(),
                    };
                    dir.map(|it| Cow::Owned(it.join(LOG_FILE_NAME))).ok()
                }
            };

            if let Some(p) = &path {
                logger = logger
                    .log_to_file(
                        FileSpec::try_from(p.as_ref()).with_context(|| "creating filespec")?,
                    )
                    .append()
                    .write_mode(WriteMode::BufferAndFlush);
            }
        }

        Ok(logger.start().with_context(|| "starting logger")?)
    }

    fn output_dir_override(&self) -> Option<PathBuf> {
        match &self.command {
            Commands::Run(r) => r.output.clone(),
            _ => None,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::Version = &cli.command {
        println!("{}", VERSION_STRING);
        return Ok(ExitCode::SUCCESS);
    }

    let ctx = DefaultContext::default();

    let log_handle = cli.configure_loggers(&ctx)?;

    let res = match cli.command {
        Commands::Run(c) => c.run(&ctx),
        Commands::Devices(c) => c.run(&ctx),
        Commands::Install(c) => c.run(&ctx),
        Commands::Uninstall(c) => c.run(&ctx),

        Commands::Version => panic!("unreachable"),
    };

    log_handle.flush();
    match res {
        Err(e) => match e.downcast_ref::<UsageError>() {
            Some(usage) => Ok(usage.report()),
            None => Err(e),
        },
        ok => ok,
    }
}
