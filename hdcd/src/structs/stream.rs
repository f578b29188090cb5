use std::fmt;

/// Container format code.
///
/// Codes follow the major-format numbering of the common C audio container
/// library so values coming from other backends can be passed through
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerFormat(pub u32);

impl ContainerFormat {
    pub const WAV: Self = Self(0x01_0000);
    pub const AIFF: Self = Self(0x02_0000);
    pub const AU: Self = Self(0x03_0000);
    pub const RAW: Self = Self(0x04_0000);
    pub const W64: Self = Self(0x0B_0000);
    pub const WAVEX: Self = Self(0x13_0000);
    pub const FLAC: Self = Self(0x17_0000);
    pub const CAF: Self = Self(0x18_0000);
    pub const OGG: Self = Self(0x20_0000);
    pub const RF64: Self = Self(0x22_0000);
    pub const MPEG: Self = Self(0x23_0000);
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::utils::names::container_name(*self))
    }
}

/// Sample encoding code inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleFormat(pub u32);

impl SampleFormat {
    pub const PCM_S8: Self = Self(0x0001);
    pub const PCM_16: Self = Self(0x0002);
    pub const PCM_24: Self = Self(0x0003);
    pub const PCM_32: Self = Self(0x0004);
    pub const PCM_U8: Self = Self(0x0005);
    pub const FLOAT: Self = Self(0x0006);
    pub const DOUBLE: Self = Self(0x0007);
    pub const ULAW: Self = Self(0x0010);
    pub const ALAW: Self = Self(0x0011);
    pub const IMA_ADPCM: Self = Self(0x0012);
    pub const MS_ADPCM: Self = Self(0x0013);
    pub const VORBIS: Self = Self(0x0060);
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::utils::names::sample_format_name(*self))
    }
}

/// Shape of an opened audio stream, as reported by the container backend.
///
/// Immutable once the stream is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub container: ContainerFormat,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u32,
}

impl StreamDescriptor {
    /// Number of interleaved samples covering `seconds` of audio.
    pub fn samples_for_seconds(&self, seconds: u32) -> usize {
        seconds as usize * self.sample_rate as usize * self.channels as usize
    }

    /// Duration in seconds of `samples` interleaved samples.
    pub fn seconds_for_samples(&self, samples: u64) -> f64 {
        let per_second = self.sample_rate as u64 * self.channels as u64;
        if per_second == 0 {
            return 0.0;
        }
        samples as f64 / per_second as f64
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}), {} channel{}, {}Hz",
            self.container,
            self.sample_format,
            self.channels,
            if self.channels != 1 { "s" } else { "" },
            self.sample_rate
        )
    }
}

/// Requested shape of a staged output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub container: ContainerFormat,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u32,
}

impl OutputSpec {
    /// Same container, rate and layout as `source`, re-encoded as 24-bit PCM.
    pub fn pcm24_like(source: &StreamDescriptor) -> Self {
        Self {
            container: source.container,
            sample_format: SampleFormat::PCM_24,
            sample_rate: source.sample_rate,
            channels: source.channels,
        }
    }

    pub fn bits_per_sample(&self) -> u32 {
        match self.sample_format {
            SampleFormat::PCM_S8 | SampleFormat::PCM_U8 => 8,
            SampleFormat::PCM_16 => 16,
            SampleFormat::PCM_24 => 24,
            _ => 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CD: StreamDescriptor = StreamDescriptor {
        container: ContainerFormat::WAV,
        sample_format: SampleFormat::PCM_16,
        sample_rate: 44100,
        channels: 2,
    };

    #[test]
    fn lump_of_ten_seconds_at_cd_rate() {
        assert_eq!(CD.samples_for_seconds(10), 882_000);
        assert_eq!(CD.seconds_for_samples(882_000), 10.0);
    }

    #[test]
    fn display_names_formats() {
        assert_eq!(
            CD.to_string(),
            "Microsoft WAV (Signed 16 bit), 2 channels, 44100Hz"
        );
    }

    #[test]
    fn output_keeps_container_and_goes_24_bit() {
        let spec = OutputSpec::pcm24_like(&CD);
        assert_eq!(spec.container, ContainerFormat::WAV);
        assert_eq!(spec.bits_per_sample(), 24);
    }
}
