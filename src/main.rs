use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::command::{Cli, LogFormat};
use cli::fixup::{SCAN_ERROR, cmd_fixup, cmd_scan};
use container::NativeContainers;
use hdcd::backend::DecoderFactory;
use hdcd::process::Fixup;

mod cli;
mod container;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        e.exit();
    }

    let multi = MultiProgress::new();
    if let Err(e) = init_logging(&cli, &multi) {
        eprintln!("unable to initialise logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli, &multi) {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(if cli.scan { SCAN_ERROR } else { 1 })
        }
    }
}

fn init_logging(cli: &Cli, multi: &MultiProgress) -> Result<()> {
    let mut env_builder = env_logger::Builder::from_default_env();
    env_builder
        .filter_level(cli.level_filter())
        .filter_module("flacenc", log::LevelFilter::Warn);
    match cli.log_format {
        LogFormat::Plain => {
            env_builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            env_builder.format(|buf, record| {
                use std::io::Write;
                let line = json_line(
                    &buf.timestamp().to_string(),
                    record.level(),
                    &record.args().to_string(),
                );
                writeln!(buf, "{line}")
            });
        }
    }

    if cli.progress {
        let logger = env_builder.build();
        LogWrapper::new(multi.clone(), logger).try_init()?;
    } else {
        env_builder.try_init()?;
    }
    Ok(())
}

fn json_line(ts: &str, level: log::Level, msg: &str) -> String {
    serde_json::json!({ "ts": ts, "lvl": level.as_str(), "msg": msg }).to_string()
}

fn run(cli: &Cli, multi: &MultiProgress) -> Result<u8> {
    log::debug!(
        "{} {} (hdcd {}, {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("HDCD_VERSION"),
        env!("BUILD_TIMESTAMP")
    );

    let decoders = decoder_factory()?;
    let config = cli.config();
    let fixup = Fixup::new(&config, &NativeContainers, decoders.as_ref());

    if config.scan_only {
        return Ok(cmd_scan(&fixup, &cli.files[0]));
    }

    let progress = cli.progress.then_some(multi);
    let summary = cmd_fixup(&fixup, &cli.files, progress)?;
    Ok(summary.exit_status())
}

#[cfg(feature = "libhdcd")]
fn decoder_factory() -> Result<Box<dyn DecoderFactory>> {
    let (major, minor) = hdcd::ffi::lib_version();
    log::debug!("using libhdcd {major}.{minor}");
    Ok(Box::new(hdcd::ffi::LibHdcdFactory))
}

#[cfg(not(feature = "libhdcd"))]
fn decoder_factory() -> Result<Box<dyn DecoderFactory>> {
    Err(hdcd::utils::errors::DecoderError::Unavailable.into())
}
