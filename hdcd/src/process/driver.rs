use std::path::Path;

use anyhow::Result;

use super::bridge;
use crate::backend::{AudioSink, AudioSource, Detection, HdcdDecoder};
use crate::structs::chunk::SampleChunk;
use crate::structs::config::{Config, Mode};
use crate::structs::stream::StreamDescriptor;

/// How the decode loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The whole stream was read.
    EndOfStream,
    /// A full lump went by without any HDCD packet.
    AbsentAfterLump,
    /// Scan mode saw an effectual packet; the rest was not needed.
    Confirmed,
}

/// Result of driving one file through the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveReport {
    pub detection: Detection,
    pub packets: u32,
    /// Interleaved samples fed to the decoder.
    pub samples: u64,
    pub termination: Termination,
}

/// Feeds one file through an HDCD decoder in lumps.
///
/// The decoder is owned for the lifetime of the file and dropped when
/// [`run`](Self::run) returns, on every path.
pub struct DecodeDriver<'a> {
    path: &'a Path,
    decoder: Box<dyn HdcdDecoder>,
    mode: Mode,
    channels: u32,
    lump: usize,
    processed: u64,
    hdcd_found: bool,
}

impl<'a> DecodeDriver<'a> {
    pub fn new(
        path: &'a Path,
        decoder: Box<dyn HdcdDecoder>,
        descriptor: &StreamDescriptor,
        config: &Config,
    ) -> Self {
        let lump = descriptor
            .samples_for_seconds(config.lump_seconds.max(1))
            .max(descriptor.channels.max(1) as usize);

        Self {
            path,
            decoder,
            mode: config.mode(),
            channels: descriptor.channels,
            lump,
            processed: 0,
            hdcd_found: false,
        }
    }

    /// Interleaved samples handled per iteration.
    pub fn lump_size(&self) -> usize {
        self.lump
    }

    /// Runs the decode loop to completion or to an early exit.
    ///
    /// With a `sink`, every decoded lump is written to it as soon as it is
    /// decoded, whatever the detection state so far.
    pub fn run(
        mut self,
        source: &mut dyn AudioSource,
        mut sink: Option<&mut dyn AudioSink>,
    ) -> Result<DriveReport> {
        let mut input = SampleChunk::<i16>::with_capacity(self.lump)?;
        let mut decoded = SampleChunk::<i32>::with_capacity(self.lump)?;

        loop {
            let read = source.read_i16(input.storage_mut())?;
            if read == 0 {
                return Ok(self.report(Termination::EndOfStream));
            }
            input.set_len(read);

            bridge::widen(&input, &mut decoded);
            let frames = decoded.frames(self.channels);
            self.decoder.process(decoded.valid_mut(), frames)?;
            self.processed += read as u64;

            if !self.hdcd_found && self.processed >= self.lump as u64 {
                if self.decoder.detection() == Detection::None {
                    log::debug!(
                        "{}: no HDCD found in first few seconds, skipping",
                        self.path.display()
                    );
                    return Ok(self.report(Termination::AbsentAfterLump));
                }

                log::debug!(
                    "{}: may contain HDCD packets, scanning whole file",
                    self.path.display()
                );
                self.hdcd_found = true;
            }

            if let Some(sink) = sink.as_deref_mut() {
                bridge::emit(sink, &decoded)?;
            }

            if self.mode == Mode::ScanOnly && self.decoder.detection() == Detection::Effectual {
                log::info!(
                    "{}: contains at least one effective HDCD packet",
                    self.path.display()
                );
                return Ok(self.report(Termination::Confirmed));
            }
        }
    }

    fn report(&self, termination: Termination) -> DriveReport {
        DriveReport {
            detection: self.decoder.detection(),
            packets: self.decoder.packets(),
            samples: self.processed,
            termination,
        }
    }
}
