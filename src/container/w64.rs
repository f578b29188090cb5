use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

use anyhow::Result;
use hdcd::backend::AudioSink;
use hdcd::structs::stream::{ContainerFormat, OutputSpec};
use hdcd::structs::tags::TagSlot;
use hdcd::utils::errors::ContainerError;

use super::format::WaveFormat;
use super::{ParsedStream, Storage, pack_high};

// Sony Wave64 chunk GUIDs
pub const W64_RIFF_GUID: [u8; 16] = [
    0x72, 0x69, 0x66, 0x66, 0x2E, 0x91, 0xCF, 0x11, 0xA5, 0xD6, 0x28, 0xDB, 0x04, 0xC1, 0x00, 0x00,
];
pub const W64_WAVE_GUID: [u8; 16] = [
    0x77, 0x61, 0x76, 0x65, 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];
pub const W64_FMT_GUID: [u8; 16] = [
    0x66, 0x6D, 0x74, 0x20, 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];
pub const W64_DATA_GUID: [u8; 16] = [
    0x64, 0x61, 0x74, 0x61, 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];

/// GUID plus 64-bit size.
const CHUNK_HEADER_LEN: u64 = 24;

fn malformed(reason: impl Into<String>) -> ContainerError {
    ContainerError::Malformed {
        container: ContainerFormat::W64,
        reason: reason.into(),
    }
}

fn align8(n: u64) -> u64 {
    (n + 7) & !7
}

/// Parses a Wave64 header. Chunk sizes include their 24-byte header and
/// chunks are 8-byte aligned.
pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<ParsedStream, ContainerError> {
    let mut header = [0u8; 40];
    reader.read_exact(&mut header)?;
    if header[0..16] != W64_RIFF_GUID || header[24..40] != W64_WAVE_GUID {
        return Err(malformed("missing riff/wave GUIDs"));
    }

    let file_len = reader.seek(SeekFrom::End(0))?;
    let mut pos = reader.seek(SeekFrom::Start(40))?;

    let mut format = None;
    let mut data = None;

    while pos + CHUNK_HEADER_LEN <= file_len {
        let mut chunk = [0u8; 24];
        reader.read_exact(&mut chunk)?;
        let mut size_bytes = [0u8; 8];
        size_bytes.copy_from_slice(&chunk[16..24]);
        let size = u64::from_le_bytes(size_bytes);
        if size < CHUNK_HEADER_LEN {
            return Err(malformed(format!("chunk at {pos} has size {size}")));
        }

        let body_start = pos + CHUNK_HEADER_LEN;
        let body_len = (size - CHUNK_HEADER_LEN).min(file_len - body_start);

        if chunk[0..16] == W64_FMT_GUID {
            let mut body = vec![0u8; body_len as usize];
            reader.read_exact(&mut body)?;
            format = Some(WaveFormat::parse(&body).map_err(|e| malformed(e.to_string()))?);
        } else if chunk[0..16] == W64_DATA_GUID {
            data = Some((body_start, body_len));
        }

        pos = match pos.checked_add(align8(size)) {
            Some(next) if next < file_len => next,
            _ => break,
        };
        reader.seek(SeekFrom::Start(pos))?;
    }

    let format = format.ok_or_else(|| malformed("no fmt chunk"))?;
    let (data_start, data_len) = data.ok_or_else(|| malformed("no data chunk"))?;

    Ok(ParsedStream {
        container: ContainerFormat::W64,
        format,
        data_start,
        data_len,
        tags: Vec::new(),
    })
}

/// Sony Wave64 writer for integer PCM.
pub struct W64Writer<W: Storage> {
    writer: BufWriter<W>,
    format: WaveFormat,
    file_size_position: u64,
    data_size_position: u64,
    data_written: u64,
    packed: Vec<u8>,
    finished: bool,
}

impl<W: Storage> W64Writer<W> {
    pub fn new(inner: W, spec: &OutputSpec) -> Result<Self, ContainerError> {
        let bits = spec.bits_per_sample();
        if !matches!(bits, 16 | 24 | 32) {
            return Err(ContainerError::UnsupportedOutputDepth { bits });
        }

        let mut writer = Self {
            writer: BufWriter::new(inner),
            format: WaveFormat::pcm(spec.channels, spec.sample_rate, bits, false),
            file_size_position: 0,
            data_size_position: 0,
            data_written: 0,
            packed: Vec::new(),
            finished: false,
        };
        writer.write_header()?;
        Ok(writer)
    }

    fn write_header(&mut self) -> io::Result<()> {
        // W64 RIFF chunk
        self.writer.write_all(&W64_RIFF_GUID)?;
        self.file_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u64.to_le_bytes())?; // File size (to be updated later)
        self.writer.write_all(&W64_WAVE_GUID)?;

        let fmt = self.format.to_bytes();
        self.writer.write_all(&W64_FMT_GUID)?;
        self.writer
            .write_all(&(CHUNK_HEADER_LEN + fmt.len() as u64).to_le_bytes())?;
        self.writer.write_all(&fmt)?;

        // W64 data chunk
        self.writer.write_all(&W64_DATA_GUID)?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u64.to_le_bytes())?; // Data size (to be updated later)

        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let data_chunk_size = self.data_written + CHUNK_HEADER_LEN;
        let padding = align8(data_chunk_size) - data_chunk_size;
        self.writer.write_all(&[0u8; 7][..padding as usize])?;

        let current_pos = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer.write_all(&data_chunk_size.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.file_size_position))?;
        self.writer.write_all(&current_pos.to_le_bytes())?;

        // Return to end of file
        self.writer.seek(SeekFrom::Start(current_pos))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Storage> AudioSink for W64Writer<W> {
    fn set_tag(&mut self, slot: TagSlot, _value: &str) -> Result<()> {
        log::debug!("Wave64 output carries no tags, dropping {slot}");
        Ok(())
    }

    fn set_compression_level(&mut self, _level: f64) -> Result<bool> {
        Ok(false)
    }

    fn write_i32(&mut self, samples: &[i32]) -> Result<()> {
        self.packed.clear();
        pack_high(samples, u32::from(self.format.bits_per_sample), &mut self.packed)?;
        self.writer.write_all(&self.packed)?;
        self.data_written += self.packed.len() as u64;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if !self.finished {
            self.finish()?;
            self.finished = true;
        }
        self.writer.flush()?;
        self.writer.get_mut().sync_storage()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        this.writer.flush()?;
        Ok(())
    }
}
