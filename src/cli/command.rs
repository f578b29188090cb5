use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser as ClapParser, ValueEnum};

use hdcd::Config;
use hdcd::structs::config::DEFAULT_LUMP_SECONDS;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ngit:       ",
    env!("VERGEN_GIT_DESCRIBE"),
    "\nbuilt:     ",
    env!("BUILD_TIMESTAMP"),
    "\nhdcd lib:  ",
    env!("HDCD_VERSION"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Detect HDCD in CD-quality PCM files and replace them with decoded 24-bit audio",
    long_about   = None,
)]
pub struct Cli {
    /// Increase verbosity (-v for results, -vv for diagnostics).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Set the log level, overriding -v.
    #[arg(long, value_enum)]
    pub loglevel: Option<LogLevel>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show a progress bar over the files.
    #[arg(long)]
    pub progress: bool,

    /// Replace files without keeping the original as <file>.hdcd.
    #[arg(short = 'b', long)]
    pub no_backup: bool,

    /// Only report whether a single file contains HDCD (exit 0 yes, 1 no, 2 error).
    #[arg(short, long)]
    pub scan: bool,

    /// Seconds of audio decoded per block; a file with no HDCD in the first
    /// block is skipped.
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_LUMP_SECONDS,
        value_parser = clap::value_parser!(u32).range(1..),
    )]
    pub lump_seconds: u32,

    /// Audio files to process.
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Rejects option combinations clap cannot express on its own.
    pub fn validate(&self) -> Result<(), clap::Error> {
        if self.scan && self.files.len() != 1 {
            return Err(Cli::command().error(
                ErrorKind::WrongNumberOfValues,
                format!("--scan takes exactly one file, got {}", self.files.len()),
            ));
        }
        Ok(())
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        match (self.loglevel, self.verbose) {
            (Some(level), _) => level.to_level_filter(),
            (None, 0) => log::LevelFilter::Warn,
            (None, 1) => log::LevelFilter::Info,
            (None, _) => log::LevelFilter::Debug,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            scan_only: self.scan,
            backup: !self.no_backup,
            lump_seconds: self.lump_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors (default).
    Warn,
    /// Show per-file results as well.
    Info,
    /// Show why each file was skipped or kept.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("hdcd-fixup").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cli = parse(&["a.wav", "b.wav"]).unwrap();
        assert_eq!(cli.files, vec![PathBuf::from("a.wav"), PathBuf::from("b.wav")]);
        assert_eq!(cli.level_filter(), log::LevelFilter::Warn);
        assert_eq!(cli.config(), Config::default());
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn verbosity_counts_and_loglevel_wins() {
        assert_eq!(parse(&["-v", "a.wav"]).unwrap().level_filter(), log::LevelFilter::Info);
        assert_eq!(parse(&["-vv", "a.wav"]).unwrap().level_filter(), log::LevelFilter::Debug);
        assert_eq!(
            parse(&["-vv", "--loglevel", "error", "a.wav"])
                .unwrap()
                .level_filter(),
            log::LevelFilter::Error
        );
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse(&["-b", "--lump-seconds", "3", "a.wav"]).unwrap();
        assert_eq!(
            cli.config(),
            Config {
                scan_only: false,
                backup: false,
                lump_seconds: 3,
            }
        );

        let cli = parse(&["-s", "a.wav"]).unwrap();
        assert!(cli.config().scan_only);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn scan_takes_exactly_one_file() {
        let cli = parse(&["-s", "a.wav", "b.wav"]).unwrap();
        let err = cli.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongNumberOfValues);
    }

    #[test]
    fn files_are_required() {
        assert!(parse(&["-v"]).is_err());
    }

    #[test]
    fn zero_lump_is_rejected() {
        assert!(parse(&["--lump-seconds", "0", "a.wav"]).is_err());
    }
}
