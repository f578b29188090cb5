use std::fs::File;
use std::path::Path;

use anyhow::Result;

use crate::structs::stream::{OutputSpec, StreamDescriptor};
use crate::structs::tags::TagSlot;

/// A stream opened for reading.
pub trait AudioSource {
    fn descriptor(&self) -> StreamDescriptor;

    /// Reads interleaved signed 16-bit samples into `buf`.
    ///
    /// Returns the number of samples read; 0 means end of stream.
    fn read_i16(&mut self, buf: &mut [i16]) -> Result<usize>;

    fn tag(&self, slot: TagSlot) -> Option<String>;
}

/// A stream opened for writing.
pub trait AudioSink {
    fn set_tag(&mut self, slot: TagSlot, value: &str) -> Result<()>;

    /// Requests a compression level in `0.0..=1.0`.
    ///
    /// Returns whether the container honours compression at all.
    fn set_compression_level(&mut self, level: f64) -> Result<bool>;

    /// Writes interleaved full-scale 32-bit samples.
    ///
    /// The sink keeps the most significant bits that fit its output depth.
    fn write_i32(&mut self, samples: &[i32]) -> Result<()>;

    /// Finalises headers and flushes everything to stable storage.
    fn sync(&mut self) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens streams on behalf of the pipeline.
pub trait ContainerBackend {
    fn open_read(&self, path: &Path) -> Result<Box<dyn AudioSource>>;

    /// Starts a new stream of shape `spec` on an already created file.
    fn open_write(&self, file: File, spec: &OutputSpec) -> Result<Box<dyn AudioSink>>;
}
