use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::backend::{AudioSink, ContainerBackend, DecoderFactory, Detection};
use crate::structs::config::{Config, Mode};
use crate::structs::stream::StreamDescriptor;

/// Sample representation bridging.
///
/// Low-justified widening for decoder input and pass-through emission of
/// decoded output.
pub mod bridge;

/// The lump-by-lump decode loop with its early exits.
pub mod driver;

/// HDCD eligibility of a stream.
pub mod gate;

/// Verdict to action mapping.
pub mod outcome;

/// Staged output with atomic commit or discard.
pub mod transaction;

use driver::{DecodeDriver, Termination};
use outcome::{Action, Outcome};
use transaction::OutputTransaction;

/// Runs the detect-and-transcode pipeline on individual files.
///
/// Each call to [`process_file`](Self::process_file) is self-contained:
/// every handle, buffer, decoder and temporary file it acquires is released
/// before it returns, whatever the result.
pub struct Fixup<'a> {
    config: &'a Config,
    containers: &'a dyn ContainerBackend,
    decoders: &'a dyn DecoderFactory,
}

impl<'a> Fixup<'a> {
    pub fn new(
        config: &'a Config,
        containers: &'a dyn ContainerBackend,
        decoders: &'a dyn DecoderFactory,
    ) -> Self {
        Self {
            config,
            containers,
            decoders,
        }
    }

    /// Scans one file and, outside scan mode, replaces it with decoded
    /// samples when it carries effectual HDCD.
    ///
    /// `Err` means the file could not be processed; the original is intact.
    pub fn process_file(&self, path: &Path) -> Result<Outcome> {
        log::debug!("{}: scanning for HDCD", path.display());

        let metadata =
            fs::metadata(path).with_context(|| format!("{}: unable to stat", path.display()))?;

        let mut source = self
            .containers
            .open_read(path)
            .with_context(|| format!("{}: unable to open for reading", path.display()))?;
        let descriptor = source.descriptor();
        log::debug!("{}: {descriptor}", path.display());

        if let Err(reason) = gate::check(&descriptor) {
            match reason {
                gate::Ineligibility::UnsupportedContainer(_) => {
                    log::info!("{}: {reason}", path.display())
                }
                gate::Ineligibility::NotCdQuality => log::debug!("{}: {reason}", path.display()),
            }
            return Ok(Outcome::Ineligible(reason));
        }

        let mut transaction = match self.config.mode() {
            Mode::Full => Some(OutputTransaction::open(
                path,
                &metadata,
                source.as_ref(),
                self.containers,
                self.config.backup,
            )?),
            Mode::ScanOnly => None,
        };

        let decoder = self
            .decoders
            .create()
            .with_context(|| format!("{}: unable to create HDCD decoder", path.display()))?;

        let sink = match transaction.as_mut() {
            Some(tx) => tx.sink_mut().map(|s| s as &mut dyn AudioSink),
            None => None,
        };
        let report = DecodeDriver::new(path, decoder, &descriptor, self.config)
            .run(source.as_mut(), sink)
            .with_context(|| format!("{}: processing failed", path.display()))?;

        if report.termination == Termination::EndOfStream {
            log_verdict(path, report.detection, report.packets, report.samples, &descriptor);
        }

        let (action, outcome) = outcome::classify(self.config.mode(), &report);
        match (action, transaction) {
            (Action::Commit, Some(tx)) => {
                let committed = tx.commit()?;
                if let Some(backup) = &committed.backup {
                    log::debug!("{}: original kept as {}", path.display(), backup.display());
                }
                Ok(match outcome {
                    Outcome::Processed {
                        packets, samples, ..
                    } => Outcome::Processed {
                        packets,
                        samples,
                        backup: committed.backup,
                    },
                    other => other,
                })
            }
            (_, Some(tx)) => {
                tx.discard();
                Ok(outcome)
            }
            (_, None) => Ok(outcome),
        }
    }
}

fn log_verdict(
    path: &Path,
    detection: Detection,
    packets: u32,
    samples: u64,
    descriptor: &StreamDescriptor,
) {
    match detection {
        Detection::Effectual => log::info!(
            "{}: contained {packets} effectual HDCD packets, {samples} samples converted ({:.1}s)",
            path.display(),
            descriptor.seconds_for_samples(samples)
        ),
        _ if packets > 0 => log::info!(
            "{}: contained {packets} HDCD packets to no effect",
            path.display()
        ),
        _ => log::debug!("{}: no HDCD found", path.display()),
    }
}
