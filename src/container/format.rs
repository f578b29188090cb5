use std::io;

use hdcd::structs::stream::SampleFormat;

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_MS_ADPCM: u16 = 0x0002;
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const WAVE_FORMAT_ALAW: u16 = 0x0006;
pub const WAVE_FORMAT_MULAW: u16 = 0x0007;
pub const WAVE_FORMAT_IMA_ADPCM: u16 = 0x0011;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// KSDATAFORMAT_SUBTYPE_PCM with the format code in the first two bytes.
const SUBTYPE_GUID_TAIL: [u8; 14] = [
    0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Contents of a `fmt ` chunk, shared by RIFF/WAVE and Wave64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    /// Format tag, or the sub-format code for extensible streams.
    pub format_tag: u16,
    pub extensible: bool,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    pub fn pcm(channels: u32, sample_rate: u32, bits_per_sample: u32, extensible: bool) -> Self {
        Self {
            format_tag: WAVE_FORMAT_PCM,
            extensible,
            channels: channels as u16,
            sample_rate,
            bits_per_sample: bits_per_sample as u16,
        }
    }

    pub fn parse(data: &[u8]) -> io::Result<Self> {
        if data.len() < 16 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "fmt chunk shorter than 16 bytes",
            ));
        }

        let u16_at = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]);
        let mut format_tag = u16_at(0);
        let channels = u16_at(2);
        let sample_rate = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let bits_per_sample = u16_at(14);

        let extensible = format_tag == WAVE_FORMAT_EXTENSIBLE;
        if extensible {
            // cbSize(2) validBits(2) channelMask(4) subFormat(16)
            if data.len() < 40 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "extensible fmt chunk shorter than 40 bytes",
                ));
            }
            format_tag = u16_at(24);
        }

        Ok(Self {
            format_tag,
            extensible,
            channels,
            sample_rate,
            bits_per_sample,
        })
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample.div_ceil(8)
    }

    /// Sample encoding this fmt chunk describes.
    pub fn sample_format(&self) -> SampleFormat {
        match (self.format_tag, self.bits_per_sample) {
            (WAVE_FORMAT_PCM, 8) => SampleFormat::PCM_U8,
            (WAVE_FORMAT_PCM, 16) => SampleFormat::PCM_16,
            (WAVE_FORMAT_PCM, 24) => SampleFormat::PCM_24,
            (WAVE_FORMAT_PCM, 32) => SampleFormat::PCM_32,
            (WAVE_FORMAT_IEEE_FLOAT, 64) => SampleFormat::DOUBLE,
            (WAVE_FORMAT_IEEE_FLOAT, _) => SampleFormat::FLOAT,
            (WAVE_FORMAT_ALAW, _) => SampleFormat::ALAW,
            (WAVE_FORMAT_MULAW, _) => SampleFormat::ULAW,
            (WAVE_FORMAT_MS_ADPCM, _) => SampleFormat::MS_ADPCM,
            (WAVE_FORMAT_IMA_ADPCM, _) => SampleFormat::IMA_ADPCM,
            _ => SampleFormat(0),
        }
    }

    /// Serialised chunk body (without id and size).
    pub fn to_bytes(&self) -> Vec<u8> {
        let block_align = self.block_align();
        let byte_rate = self.sample_rate * u32::from(block_align);

        let mut out = Vec::with_capacity(40);
        let tag = if self.extensible {
            WAVE_FORMAT_EXTENSIBLE
        } else {
            self.format_tag
        };
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&self.bits_per_sample.to_le_bytes());

        if self.extensible {
            out.extend_from_slice(&22u16.to_le_bytes());
            out.extend_from_slice(&self.bits_per_sample.to_le_bytes());
            out.extend_from_slice(&channel_mask(self.channels).to_le_bytes());
            out.extend_from_slice(&self.format_tag.to_le_bytes());
            out.extend_from_slice(&SUBTYPE_GUID_TAIL);
        }
        out
    }
}

fn channel_mask(channels: u16) -> u32 {
    match channels {
        1 => 0x4,
        2 => 0x3,
        _ => 0,
    }
}
