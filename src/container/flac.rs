//! FLAC reading through claxon and writing through flacenc.
//!
//! flacenc encodes a whole stream at once, so the writer holds the decoded
//! samples in memory until [`AudioSink::sync`]. Vorbis comments are spliced
//! in as a metadata block after encoding.

use std::io::Read;
use std::mem;

use anyhow::{Result, anyhow};
use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::error::Verify;
use flacenc::source::MemSource;
use hdcd::backend::{AudioSink, AudioSource};
use hdcd::structs::stream::{ContainerFormat, OutputSpec, SampleFormat, StreamDescriptor};
use hdcd::structs::tags::TagSlot;
use hdcd::utils::errors::{AllocError, ContainerError};

use super::Storage;

const VORBIS_COMMENT: u8 = 4;
const LAST_BLOCK: u8 = 0x80;
const MAX_BLOCK_LEN: usize = (1 << 24) - 1;

const VENDOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Vorbis comment field names per slot. The first name is the one written.
fn vorbis_names(slot: TagSlot) -> &'static [&'static str] {
    match slot {
        TagSlot::Title => &["TITLE"],
        TagSlot::Copyright => &["COPYRIGHT"],
        TagSlot::Software => &["ENCODER"],
        TagSlot::Artist => &["ARTIST"],
        TagSlot::Comment => &["COMMENT", "DESCRIPTION"],
        TagSlot::Date => &["DATE"],
        TagSlot::Album => &["ALBUM"],
        TagSlot::License => &["LICENSE"],
        TagSlot::TrackNumber => &["TRACKNUMBER"],
        TagSlot::Genre => &["GENRE"],
    }
}

fn malformed(reason: impl Into<String>) -> ContainerError {
    ContainerError::Malformed {
        container: ContainerFormat::FLAC,
        reason: reason.into(),
    }
}

fn sample_format(bits: u32) -> SampleFormat {
    match bits {
        8 => SampleFormat::PCM_S8,
        16 => SampleFormat::PCM_16,
        24 => SampleFormat::PCM_24,
        _ => SampleFormat::PCM_32,
    }
}

/// Decoded FLAC stream, handed out one frame block at a time.
pub struct FlacSource<R: Read> {
    reader: claxon::FlacReader<R>,
    descriptor: StreamDescriptor,
    tags: Vec<(TagSlot, String)>,
    pending: Vec<i16>,
    offset: usize,
    block: Vec<i32>,
    finished: bool,
}

impl<R: Read> FlacSource<R> {
    pub fn new(input: R) -> Result<Self> {
        let reader = claxon::FlacReader::new(input).map_err(|e| malformed(e.to_string()))?;
        let info = reader.streaminfo();
        let descriptor = StreamDescriptor {
            container: ContainerFormat::FLAC,
            sample_format: sample_format(info.bits_per_sample),
            sample_rate: info.sample_rate,
            channels: info.channels,
        };

        let mut tags = Vec::new();
        for slot in TagSlot::ALL {
            let names = vorbis_names(slot);
            let value = reader
                .tags()
                .find(|(name, _)| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
                .map(|(_, value)| value.to_string());
            if let Some(value) = value {
                tags.push((slot, value));
            }
        }

        Ok(Self {
            reader,
            descriptor,
            tags,
            pending: Vec::new(),
            offset: 0,
            block: Vec::new(),
            finished: false,
        })
    }

    /// Decodes the next frame into `pending`. Returns false at end of stream.
    fn refill(&mut self) -> Result<bool> {
        let buffer = mem::take(&mut self.block);
        let block = self
            .reader
            .blocks()
            .read_next_or_eof(buffer)
            .map_err(|e| malformed(e.to_string()))?;
        let Some(block) = block else {
            self.finished = true;
            return Ok(false);
        };

        self.pending.clear();
        self.offset = 0;
        for i in 0..block.duration() {
            for ch in 0..block.channels() {
                self.pending.push(block.sample(ch, i) as i16);
            }
        }
        self.block = block.into_buffer();
        Ok(true)
    }
}

impl<R: Read> AudioSource for FlacSource<R> {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn read_i16(&mut self, buf: &mut [i16]) -> Result<usize> {
        if self.descriptor.sample_format != SampleFormat::PCM_16 {
            return Err(ContainerError::SampleFormatMismatch {
                found: self.descriptor.sample_format.to_string(),
            }
            .into());
        }

        let mut filled = 0;
        while filled < buf.len() {
            if self.offset == self.pending.len() && (self.finished || !self.refill()?) {
                break;
            }
            let count = (buf.len() - filled).min(self.pending.len() - self.offset);
            buf[filled..filled + count]
                .copy_from_slice(&self.pending[self.offset..self.offset + count]);
            self.offset += count;
            filled += count;
        }
        Ok(filled)
    }

    fn tag(&self, slot: TagSlot) -> Option<String> {
        self.tags
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, value)| value.clone())
    }
}

/// Block size of the FLAC reference presets 0..=8.
fn preset_block_size(preset: u32) -> usize {
    if preset <= 2 { 1152 } else { 4096 }
}

/// FLAC writer for 16- and 24-bit PCM.
pub struct FlacWriter<W: Storage> {
    inner: W,
    channels: usize,
    sample_rate: usize,
    bits: u32,
    preset: u32,
    samples: Vec<i32>,
    comments: Vec<(&'static str, String)>,
    finished: bool,
}

impl<W: Storage> FlacWriter<W> {
    pub fn new(inner: W, spec: &OutputSpec) -> Result<Self, ContainerError> {
        let bits = spec.bits_per_sample();
        if !matches!(bits, 16 | 24) {
            return Err(ContainerError::UnsupportedOutputDepth { bits });
        }

        Ok(Self {
            inner,
            channels: spec.channels as usize,
            sample_rate: spec.sample_rate as usize,
            bits,
            preset: 5,
            samples: Vec::new(),
            comments: Vec::new(),
            finished: false,
        })
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut config = flacenc::config::Encoder::default();
        config.block_size = preset_block_size(self.preset);
        let config = config
            .into_verified()
            .map_err(|e| anyhow!("invalid FLAC encoder configuration: {e:?}"))?;

        let source = MemSource::from_samples(
            &self.samples,
            self.channels,
            self.bits as usize,
            self.sample_rate,
        );
        let stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
            .map_err(|e| anyhow!("FLAC encoding failed: {e:?}"))?;

        let mut sink = ByteSink::new();
        stream
            .write(&mut sink)
            .map_err(|e| anyhow!("FLAC stream serialisation failed: {e:?}"))?;
        let bytes = sink.into_inner();

        if self.comments.is_empty() {
            return Ok(bytes);
        }
        Ok(insert_comments(bytes, &self.comments)?)
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Storage> AudioSink for FlacWriter<W> {
    fn set_tag(&mut self, slot: TagSlot, value: &str) -> Result<()> {
        self.comments.push((vorbis_names(slot)[0], value.to_string()));
        Ok(())
    }

    /// Maps `0.0..=1.0` onto the reference presets 0..=8.
    fn set_compression_level(&mut self, level: f64) -> Result<bool> {
        self.preset = (level.clamp(0.0, 1.0) * 8.0).round() as u32;
        Ok(true)
    }

    fn write_i32(&mut self, samples: &[i32]) -> Result<()> {
        let shift = 32 - self.bits;
        self.samples
            .try_reserve(samples.len())
            .map_err(|_| AllocError {
                samples: self.samples.len() + samples.len(),
            })?;
        self.samples.extend(samples.iter().map(|&s| s >> shift));
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if !self.finished {
            let bytes = self.encode()?;
            self.inner.write_all(&bytes)?;
            self.samples = Vec::new();
            self.finished = true;
        }
        self.inner.flush()?;
        self.inner.sync_storage()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        this.inner.flush()?;
        Ok(())
    }
}

/// Adds a VORBIS_COMMENT block after the last metadata block of `stream`.
fn insert_comments(
    mut stream: Vec<u8>,
    comments: &[(&str, String)],
) -> Result<Vec<u8>, ContainerError> {
    if stream.len() < 4 || &stream[..4] != b"fLaC" {
        return Err(malformed("encoder output lacks the fLaC marker"));
    }

    let mut pos = 4;
    let end_of_metadata = loop {
        if pos + 4 > stream.len() {
            return Err(malformed("truncated metadata block header"));
        }
        let header = stream[pos];
        let len = u32::from_be_bytes([0, stream[pos + 1], stream[pos + 2], stream[pos + 3]]);
        let next = pos + 4 + len as usize;
        if header & LAST_BLOCK != 0 {
            stream[pos] = header & !LAST_BLOCK;
            break next;
        }
        pos = next;
    };
    if end_of_metadata > stream.len() {
        return Err(malformed("truncated metadata block"));
    }

    let mut body = Vec::new();
    body.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
    body.extend_from_slice(VENDOR.as_bytes());
    body.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for (name, value) in comments {
        let field = format!("{name}={value}");
        body.extend_from_slice(&(field.len() as u32).to_le_bytes());
        body.extend_from_slice(field.as_bytes());
    }
    if body.len() > MAX_BLOCK_LEN {
        return Err(ContainerError::TooLarge {
            container: ContainerFormat::FLAC,
            bytes: body.len() as u64,
        });
    }

    let mut out = Vec::with_capacity(stream.len() + body.len() + 4);
    out.extend_from_slice(&stream[..end_of_metadata]);
    out.push(LAST_BLOCK | VORBIS_COMMENT);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(&body);
    out.extend_from_slice(&stream[end_of_metadata..]);
    Ok(out)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::io::Cursor;

    /// A 16-bit CD-format FLAC file holding `samples`, tagged with `tags`.
    pub fn cd_flac(samples: &[i16], tags: &[(TagSlot, &str)]) -> Vec<u8> {
        let spec = OutputSpec {
            container: ContainerFormat::FLAC,
            sample_format: SampleFormat::PCM_16,
            sample_rate: 44100,
            channels: 2,
        };
        let mut writer = FlacWriter::new(Cursor::new(Vec::new()), &spec).unwrap();
        for (slot, value) in tags {
            writer.set_tag(*slot, value).unwrap();
        }
        let wide: Vec<i32> = samples.iter().map(|&s| i32::from(s) << 16).collect();
        writer.write_i32(&wide).unwrap();
        writer.sync().unwrap();
        writer.into_inner().into_inner()
    }
}
