//! Native RIFF/WAVE, Sony Wave64 and FLAC backend.
//!
//! Other signatures are recognised so the error names the container
//! instead of failing as an unknown file.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::Result;
use hdcd::backend::{AudioSink, AudioSource, ContainerBackend};
use hdcd::structs::stream::{ContainerFormat, OutputSpec, SampleFormat, StreamDescriptor};
use hdcd::structs::tags::TagSlot;
use hdcd::utils::errors::ContainerError;

pub mod flac;
pub mod format;
pub mod riff;
pub mod w64;

use format::WaveFormat;

/// Seekable output that can be flushed to stable storage.
pub trait Storage: Write + Seek {
    fn sync_storage(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Storage for File {
    fn sync_storage(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl Storage for Cursor<Vec<u8>> {}

/// Location and shape of the sample data found while parsing a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStream {
    pub container: ContainerFormat,
    pub format: WaveFormat,
    pub data_start: u64,
    pub data_len: u64,
    pub tags: Vec<(TagSlot, String)>,
}

impl ParsedStream {
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            container: self.container,
            sample_format: self.format.sample_format(),
            sample_rate: self.format.sample_rate,
            channels: u32::from(self.format.channels),
        }
    }
}

/// Identifies a container from the first bytes of a file.
pub fn probe(header: &[u8]) -> Result<ContainerFormat, ContainerError> {
    if header.len() >= 16 && header[..16] == w64::W64_RIFF_GUID {
        return Ok(ContainerFormat::W64);
    }
    if header.len() < 4 {
        return Err(ContainerError::UnknownSignature);
    }
    match &header[..4] {
        b"RIFF" if header.len() >= 12 && &header[8..12] == b"WAVE" => Ok(ContainerFormat::WAV),
        b"RF64" => Ok(ContainerFormat::RF64),
        b"FORM" => Ok(ContainerFormat::AIFF),
        b".snd" => Ok(ContainerFormat::AU),
        b"fLaC" => Ok(ContainerFormat::FLAC),
        b"OggS" => Ok(ContainerFormat::OGG),
        b"caff" => Ok(ContainerFormat::CAF),
        _ => Err(ContainerError::UnknownSignature),
    }
}

/// Reads until `buf` is full or the reader is exhausted.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Appends `samples` to `out` keeping the top `bits` of each value,
/// little-endian.
pub fn pack_high(samples: &[i32], bits: u32, out: &mut Vec<u8>) -> Result<(), ContainerError> {
    match bits {
        16 => {
            out.reserve(samples.len() * 2);
            for &sample in samples {
                out.extend_from_slice(&((sample >> 16) as i16).to_le_bytes());
            }
        }
        24 => {
            out.reserve(samples.len() * 3);
            for &sample in samples {
                out.extend_from_slice(&(sample >> 8).to_le_bytes()[..3]);
            }
        }
        32 => {
            out.reserve(samples.len() * 4);
            for &sample in samples {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
        bits => return Err(ContainerError::UnsupportedOutputDepth { bits }),
    }
    Ok(())
}

/// Interleaved PCM reader over the data chunk of a parsed stream.
pub struct PcmSource<R> {
    reader: R,
    descriptor: StreamDescriptor,
    remaining: u64,
    tags: Vec<(TagSlot, String)>,
    bytes: Vec<u8>,
}

impl<R: Read + Seek> PcmSource<R> {
    pub fn new(mut reader: R, stream: ParsedStream) -> io::Result<Self> {
        reader.seek(SeekFrom::Start(stream.data_start))?;
        Ok(Self {
            reader,
            descriptor: stream.descriptor(),
            remaining: stream.data_len,
            tags: stream.tags,
            bytes: Vec::new(),
        })
    }
}

impl<R: Read> AudioSource for PcmSource<R> {
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

        let want = (buf.len() as u64 * 2).min(self.remaining & !1) as usize;
        self.bytes.resize(want, 0);
        let got = read_full(&mut self.reader, &mut self.bytes)?;
        if got < want {
            // Truncated file: stop at what is there.
            self.remaining = 0;
        } else {
            self.remaining -= got as u64;
        }

        let count = got / 2;
        for (sample, pair) in buf.iter_mut().zip(self.bytes[..count * 2].chunks_exact(2)) {
            *sample = i16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(count)
    }

    fn tag(&self, slot: TagSlot) -> Option<String> {
        self.tags
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, value)| value.clone())
    }
}

/// [`ContainerBackend`] for RIFF/WAVE, WAVE_FORMAT_EXTENSIBLE, Wave64 and FLAC.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeContainers;

impl ContainerBackend for NativeContainers {
    fn open_read(&self, path: &Path) -> Result<Box<dyn AudioSource>> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; 16];
        let len = read_full(&mut reader, &mut header)?;
        reader.seek(SeekFrom::Start(0))?;

        let stream = match probe(&header[..len])? {
            ContainerFormat::WAV => riff::parse(&mut reader)?,
            ContainerFormat::W64 => w64::parse(&mut reader)?,
            ContainerFormat::FLAC => return Ok(Box::new(flac::FlacSource::new(reader)?)),
            other => return Err(ContainerError::UnsupportedContainer(other).into()),
        };
        log::trace!(
            "{}: data at {} ({} bytes)",
            path.display(),
            stream.data_start,
            stream.data_len
        );

        Ok(Box::new(PcmSource::new(reader, stream)?))
    }

    fn open_write(&self, file: File, spec: &OutputSpec) -> Result<Box<dyn AudioSink>> {
        match spec.container {
            ContainerFormat::WAV | ContainerFormat::WAVEX => {
                Ok(Box::new(riff::WavWriter::new(file, spec)?))
            }
            ContainerFormat::W64 => Ok(Box::new(w64::W64Writer::new(file, spec)?)),
            ContainerFormat::FLAC => Ok(Box::new(flac::FlacWriter::new(file, spec)?)),
            other => Err(ContainerError::UnsupportedContainer(other).into()),
        }
    }
}
