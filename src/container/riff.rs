use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};

use anyhow::Result;
use hdcd::backend::AudioSink;
use hdcd::structs::stream::{ContainerFormat, OutputSpec};
use hdcd::structs::tags::TagSlot;
use hdcd::utils::errors::ContainerError;

use super::format::WaveFormat;
use super::{ParsedStream, Storage, pack_high};

/// RIFF INFO ids for each tag slot. The license slot has no INFO id.
const INFO_IDS: [(TagSlot, &[u8; 4]); 9] = [
    (TagSlot::Title, b"INAM"),
    (TagSlot::Copyright, b"ICOP"),
    (TagSlot::Software, b"ISFT"),
    (TagSlot::Artist, b"IART"),
    (TagSlot::Comment, b"ICMT"),
    (TagSlot::Date, b"ICRD"),
    (TagSlot::Album, b"IPRD"),
    (TagSlot::TrackNumber, b"ITRK"),
    (TagSlot::Genre, b"IGNR"),
];

fn info_id(slot: TagSlot) -> Option<&'static [u8; 4]> {
    INFO_IDS.iter().find(|(s, _)| *s == slot).map(|(_, id)| *id)
}

fn info_slot(id: &[u8]) -> Option<TagSlot> {
    INFO_IDS.iter().find(|(_, i)| &i[..] == id).map(|(s, _)| *s)
}

fn malformed(reason: impl Into<String>) -> ContainerError {
    ContainerError::Malformed {
        container: ContainerFormat::WAV,
        reason: reason.into(),
    }
}

/// Parses a RIFF/WAVE header, collecting `fmt `, `data` and `LIST/INFO`.
///
/// Chunks after `data` are visited too, since INFO lists often trail the
/// samples.
pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<ParsedStream, ContainerError> {
    let mut header = [0u8; 12];
    reader.read_exact(&mut header)?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(malformed("missing RIFF/WAVE signature"));
    }

    let file_len = reader.seek(SeekFrom::End(0))?;
    let mut pos = reader.seek(SeekFrom::Start(12))?;

    let mut format = None;
    let mut data = None;
    let mut tags = Vec::new();

    while pos + 8 <= file_len {
        let mut chunk = [0u8; 8];
        reader.read_exact(&mut chunk)?;
        let size = u64::from(u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]));
        let body_start = pos + 8;
        let available = file_len - body_start;

        match &chunk[0..4] {
            b"fmt " => {
                let mut body = vec![0u8; size.min(available) as usize];
                reader.read_exact(&mut body)?;
                format = Some(WaveFormat::parse(&body).map_err(|e| malformed(e.to_string()))?);
            }
            b"data" => {
                // Streamed files leave the size unset; take everything.
                let len = if size == u64::from(u32::MAX) {
                    available
                } else {
                    size.min(available)
                };
                data = Some((body_start, len));
            }
            b"LIST" => {
                let mut body = vec![0u8; size.min(available) as usize];
                reader.read_exact(&mut body)?;
                if body.len() >= 4 && &body[0..4] == b"INFO" {
                    tags = parse_info(&body[4..]);
                }
            }
            _ => {}
        }

        pos = body_start + size + (size & 1);
        if pos >= file_len {
            break;
        }
        reader.seek(SeekFrom::Start(pos))?;
    }

    let format = format.ok_or_else(|| malformed("no fmt chunk"))?;
    let (data_start, data_len) = data.ok_or_else(|| malformed("no data chunk"))?;

    Ok(ParsedStream {
        container: if format.extensible {
            ContainerFormat::WAVEX
        } else {
            ContainerFormat::WAV
        },
        format,
        data_start,
        data_len,
        tags,
    })
}

fn parse_info(body: &[u8]) -> Vec<(TagSlot, String)> {
    let mut tags = Vec::new();
    let mut at = 0;
    while at + 8 <= body.len() {
        let id = &body[at..at + 4];
        let size =
            u32::from_le_bytes([body[at + 4], body[at + 5], body[at + 6], body[at + 7]]) as usize;
        let end = (at + 8).saturating_add(size).min(body.len());
        let raw = &body[at + 8..end];

        if let Some(slot) = info_slot(id) {
            let value = String::from_utf8_lossy(raw)
                .trim_end_matches('\0')
                .to_string();
            if !value.is_empty() {
                tags.push((slot, value));
            }
        }
        at = end + (size & 1);
    }
    tags
}

/// RIFF/WAVE writer for integer PCM.
///
/// Sizes are written as placeholders and patched by [`sync`](AudioSink::sync).
/// Tags go into a `LIST/INFO` chunk after the sample data.
pub struct WavWriter<W: Storage> {
    writer: BufWriter<W>,
    container: ContainerFormat,
    format: WaveFormat,
    data_size_position: u64,
    data_written: u64,
    tags: Vec<(TagSlot, String)>,
    packed: Vec<u8>,
    finished: bool,
}

impl<W: Storage> WavWriter<W> {
    pub fn new(inner: W, spec: &OutputSpec) -> Result<Self, ContainerError> {
        let bits = spec.bits_per_sample();
        if !matches!(bits, 16 | 24 | 32) {
            return Err(ContainerError::UnsupportedOutputDepth { bits });
        }

        let extensible = spec.container == ContainerFormat::WAVEX;
        let mut writer = Self {
            writer: BufWriter::new(inner),
            container: spec.container,
            format: WaveFormat::pcm(spec.channels, spec.sample_rate, bits, extensible),
            data_size_position: 0,
            data_written: 0,
            tags: Vec::new(),
            packed: Vec::new(),
            finished: false,
        };
        writer.write_header()?;
        Ok(writer)
    }

    fn write_header(&mut self) -> io::Result<()> {
        self.writer.write_all(b"RIFF")?;
        self.writer.write_all(&0u32.to_le_bytes())?; // patched at sync
        self.writer.write_all(b"WAVE")?;

        let fmt = self.format.to_bytes();
        self.writer.write_all(b"fmt ")?;
        self.writer.write_all(&(fmt.len() as u32).to_le_bytes())?;
        self.writer.write_all(&fmt)?;

        self.writer.write_all(b"data")?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // patched at sync
        Ok(())
    }

    fn info_chunk(&self) -> Vec<u8> {
        let mut body = b"INFO".to_vec();
        for (slot, value) in &self.tags {
            let Some(id) = info_id(*slot) else { continue };
            let size = value.len() + 1;
            body.extend_from_slice(id);
            body.extend_from_slice(&(size as u32).to_le_bytes());
            body.extend_from_slice(value.as_bytes());
            body.push(0);
            if size & 1 == 1 {
                body.push(0);
            }
        }

        let mut chunk = b"LIST".to_vec();
        chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
        chunk.extend_from_slice(&body);
        chunk
    }

    fn finish(&mut self) -> Result<(), ContainerError> {
        if self.data_written & 1 == 1 {
            self.writer.write_all(&[0])?;
        }
        if !self.tags.is_empty() {
            let info = self.info_chunk();
            self.writer.write_all(&info)?;
        }

        let end = self.writer.stream_position()?;
        let too_large = || ContainerError::TooLarge {
            container: self.container,
            bytes: end,
        };
        let riff_size = u32::try_from(end - 8).map_err(|_| too_large())?;
        let data_size = u32::try_from(self.data_written).map_err(|_| too_large())?;

        self.writer.seek(SeekFrom::Start(4))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer.write_all(&data_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Storage> AudioSink for WavWriter<W> {
    fn set_tag(&mut self, slot: TagSlot, value: &str) -> Result<()> {
        if info_id(slot).is_none() {
            log::debug!("RIFF INFO has no field for the {slot} tag, dropping it");
            return Ok(());
        }
        match self.tags.iter_mut().find(|(s, _)| *s == slot) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.tags.push((slot, value.to_string())),
        }
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
