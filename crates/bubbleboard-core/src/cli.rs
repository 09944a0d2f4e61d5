use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::datetime::parse_date_key;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// One `--rc key=value` override.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub key: String,
    pub value: String,
}

impl FromStr for Override {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        split_override(s, &['='])
            .map(|(key, value)| Self { key, value })
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))
    }
}

fn split_override(raw: &str, separators: &[char]) -> Option<(String, String)> {
    let (key, value) = raw.split_once(separators)?;
    let key = key.trim();
    (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bubbleboard",
    version,
    about = "Bubble task board: talk, get task suggestions, pop bubbles"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Override>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<Override>,

    #[arg(long = "boardrc")]
    pub boardrc: Option<PathBuf>,

    /// Pin "today" instead of reading the clock.
    #[arg(long = "today", value_parser = clap::builder::ValueParser::new(|s: &str| parse_date_key(s)))]
    pub today: Option<NaiveDate>,

    /// Seed the bubble placement RNG.
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Advance the physics only through the `tick` command.
    #[arg(long = "no-ticker")]
    pub no_ticker: bool,
}

/// Log level used when `RUST_LOG` is unset. Quiet flags win over verbose ones.
pub fn default_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (q, _) if q >= 2 => "error",
        (1, _) => "warn",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level(verbose, quiet))
            .map_err(|e| anyhow!("invalid log filter: {e}"))?,
    };

    // stderr keeps logs out of the command output on stdout.
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = installed {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }
    Ok(())
}

/// Pulls `rc.key=value` (or `rc.key:value`) positionals out of the argument list.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned_args = Vec::with_capacity(raw.len());
    let mut rc_overrides = Vec::new();

    for (idx, arg) in raw.iter().enumerate() {
        let positional = arg
            .to_str()
            .filter(|_| idx > 0)
            .and_then(|s| s.strip_prefix("rc."))
            .and_then(|rest| split_override(rest, &['=', ':']));

        match positional {
            Some((key, value)) => {
                debug!(key = %key, value = %value, "captured positional rc override");
                rc_overrides.push((format!("rc.{key}"), value));
            }
            None => cleaned_args.push(arg.clone()),
        }
    }

    Ok(PreprocessedArgs {
        cleaned_args,
        rc_overrides,
    })
}
