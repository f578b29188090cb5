//! Deterministic stand-ins for the container and decoder collaborators.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::backend::{
    AudioSink, AudioSource, ContainerBackend, DecoderFactory, Detection, HdcdDecoder,
};
use crate::structs::stream::{ContainerFormat, OutputSpec, SampleFormat, StreamDescriptor};
use crate::structs::tags::TagSlot;

pub const CD_WAV: StreamDescriptor = StreamDescriptor {
    container: ContainerFormat::WAV,
    sample_format: SampleFormat::PCM_16,
    sample_rate: 44100,
    channels: 2,
};

pub struct MemorySource {
    descriptor: StreamDescriptor,
    samples: Vec<i16>,
    position: usize,
    tags: HashMap<TagSlot, String>,
    reads: Rc<Cell<u64>>,
}

impl MemorySource {
    pub fn new(descriptor: StreamDescriptor, samples: Vec<i16>) -> Self {
        Self {
            descriptor,
            samples,
            position: 0,
            tags: HashMap::new(),
            reads: Rc::new(Cell::new(0)),
        }
    }

    pub fn samples_read(&self) -> u64 {
        self.reads.get()
    }
}

impl AudioSource for MemorySource {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn read_i16(&mut self, buf: &mut [i16]) -> Result<usize> {
        let count = buf.len().min(self.samples.len() - self.position);
        buf[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        self.reads.set(self.reads.get() + count as u64);
        Ok(count)
    }

    fn tag(&self, slot: TagSlot) -> Option<String> {
        self.tags.get(&slot).cloned()
    }
}

#[derive(Default)]
pub struct MemorySink {
    written: Vec<i32>,
}

impl MemorySink {
    pub fn written(&self) -> Vec<i32> {
        self.written.clone()
    }
}

impl AudioSink for MemorySink {
    fn set_tag(&mut self, _slot: TagSlot, _value: &str) -> Result<()> {
        Ok(())
    }

    fn set_compression_level(&mut self, _level: f64) -> Result<bool> {
        Ok(false)
    }

    fn write_i32(&mut self, samples: &[i32]) -> Result<()> {
        self.written.extend_from_slice(samples);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Decoder whose detection level follows a script keyed on frames processed.
///
/// Output is the input shifted to full scale, which is what a decoder does
/// with a packet-free signal.
pub struct ScriptedDecoder {
    script: Vec<(u64, Detection, u32)>,
    frames: u64,
    fail: bool,
}

impl ScriptedDecoder {
    /// `script` holds `(frames, level, packets)` steps in ascending order.
    pub fn new(script: Vec<(u64, Detection, u32)>) -> Self {
        Self {
            script,
            frames: 0,
            fail: false,
        }
    }

    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::silent()
        }
    }

    fn step(&self) -> Option<&(u64, Detection, u32)> {
        self.script
            .iter()
            .rev()
            .find(|(frames, _, _)| *frames <= self.frames)
    }
}

impl HdcdDecoder for ScriptedDecoder {
    fn process(&mut self, samples: &mut [i32], frames: usize) -> Result<()> {
        if self.fail {
            bail!("scripted decoder failure");
        }
        for sample in samples.iter_mut() {
            *sample <<= 16;
        }
        self.frames += frames as u64;
        Ok(())
    }

    fn detection(&self) -> Detection {
        self.step().map_or(Detection::None, |&(_, level, _)| level)
    }

    fn packets(&self) -> u32 {
        self.step().map_or(0, |&(_, _, packets)| packets)
    }
}

pub fn scripted(script: Vec<(u64, Detection, u32)>) -> impl DecoderFactory {
    move || -> Result<Box<dyn HdcdDecoder>> { Ok(Box::new(ScriptedDecoder::new(script.clone()))) }
}

// On-disk layout used by `MockContainers`:
//   b"MOCK", container, sample format, rate, channels, tag count (u32 LE each),
//   tags as (slot index u8, length u32, utf-8 bytes),
//   then i16 samples (16-bit files) or i32 samples (anything else).

const MAGIC: &[u8; 4] = b"MOCK";

/// Container backend over a trivial file layout, counting samples read and
/// recording every compression level requested of its sinks.
#[derive(Default)]
pub struct MockContainers {
    reads: Rc<Cell<u64>>,
    compression: Rc<RefCell<Vec<f64>>>,
}

impl MockContainers {
    pub fn samples_read(&self) -> u64 {
        self.reads.get()
    }

    pub fn compression_requests(&self) -> Vec<f64> {
        self.compression.borrow().clone()
    }
}

pub struct MockFile {
    pub descriptor: StreamDescriptor,
    pub tags: Vec<(TagSlot, String)>,
    pub samples: Vec<i32>,
}

fn slot_index(slot: TagSlot) -> u8 {
    TagSlot::ALL.iter().position(|&s| s == slot).unwrap_or(0) as u8
}

fn encode(file: &MockFile) -> Vec<u8> {
    let d = &file.descriptor;
    let mut out = MAGIC.to_vec();
    for v in [
        d.container.0,
        d.sample_format.0,
        d.sample_rate,
        d.channels,
        file.tags.len() as u32,
    ] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for (slot, value) in &file.tags {
        out.push(slot_index(*slot));
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    for &sample in &file.samples {
        if d.sample_format == SampleFormat::PCM_16 {
            out.extend_from_slice(&(sample as i16).to_le_bytes());
        } else {
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }
    out
}

pub fn write_mock_file(path: &Path, file: &MockFile) {
    fs::write(path, encode(file)).unwrap();
}

pub fn read_mock_file(path: &Path) -> Result<MockFile> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() < 24 || &bytes[..4] != MAGIC {
        bail!("not a mock file");
    }

    let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let descriptor = StreamDescriptor {
        container: ContainerFormat(word(4)),
        sample_format: SampleFormat(word(8)),
        sample_rate: word(12),
        channels: word(16),
    };

    let mut at = 24;
    let mut tags = Vec::new();
    for _ in 0..word(20) {
        let slot = TagSlot::ALL[bytes[at] as usize];
        let len = word(at + 1) as usize;
        let value = String::from_utf8(bytes[at + 5..at + 5 + len].to_vec())?;
        tags.push((slot, value));
        at += 5 + len;
    }

    let samples = if descriptor.sample_format == SampleFormat::PCM_16 {
        bytes[at..]
            .chunks_exact(2)
            .map(|c| i32::from(i16::from_le_bytes([c[0], c[1]])))
            .collect()
    } else {
        bytes[at..]
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    };

    Ok(MockFile {
        descriptor,
        tags,
        samples,
    })
}

impl ContainerBackend for MockContainers {
    fn open_read(&self, path: &Path) -> Result<Box<dyn AudioSource>> {
        let file = read_mock_file(path)?;
        let mut source = MemorySource::new(
            file.descriptor,
            file.samples.iter().map(|&s| s as i16).collect(),
        );
        source.tags = file.tags.into_iter().collect();
        source.reads = Rc::clone(&self.reads);
        Ok(Box::new(source))
    }

    fn open_write(&self, file: File, spec: &OutputSpec) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(MockFileSink {
            file,
            compression: Rc::clone(&self.compression),
            contents: MockFile {
                descriptor: StreamDescriptor {
                    container: spec.container,
                    sample_format: spec.sample_format,
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                },
                tags: Vec::new(),
                samples: Vec::new(),
            },
        }))
    }
}

struct MockFileSink {
    file: File,
    compression: Rc<RefCell<Vec<f64>>>,
    contents: MockFile,
}

impl AudioSink for MockFileSink {
    fn set_tag(&mut self, slot: TagSlot, value: &str) -> Result<()> {
        self.contents.tags.push((slot, value.to_string()));
        Ok(())
    }

    fn set_compression_level(&mut self, level: f64) -> Result<bool> {
        self.compression.borrow_mut().push(level);
        Ok(self.contents.descriptor.container == ContainerFormat::FLAC)
    }

    fn write_i32(&mut self, samples: &[i32]) -> Result<()> {
        self.contents.samples.extend_from_slice(samples);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.write_all(&encode(&self.contents))?;
        self.file.sync_all()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
