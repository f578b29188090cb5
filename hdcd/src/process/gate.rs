use std::fmt::Display;

use crate::structs::stream::{ContainerFormat, SampleFormat, StreamDescriptor};

/// Containers likely to carry HDCD. Ogg is included because it may wrap FLAC.
pub const SUPPORTED_CONTAINERS: [ContainerFormat; 8] = [
    ContainerFormat::WAV,
    ContainerFormat::AIFF,
    ContainerFormat::AU,
    ContainerFormat::W64,
    ContainerFormat::WAVEX,
    ContainerFormat::FLAC,
    ContainerFormat::OGG,
    ContainerFormat::RF64,
];

pub const CD_SAMPLE_RATE: u32 = 44100;
pub const CD_CHANNELS: u32 = 2;

/// Why a stream cannot contain HDCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    UnsupportedContainer(ContainerFormat),
    NotCdQuality,
}

impl Display for Ineligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ineligibility::UnsupportedContainer(_) => write!(f, "unsupported container format"),
            Ineligibility::NotCdQuality => write!(f, "not CD quality, cannot contain HDCD"),
        }
    }
}

/// Checks a stream against the HDCD preconditions: a known container and
/// 44.1 kHz stereo signed 16-bit PCM.
pub fn check(descriptor: &StreamDescriptor) -> Result<(), Ineligibility> {
    if !SUPPORTED_CONTAINERS.contains(&descriptor.container) {
        return Err(Ineligibility::UnsupportedContainer(descriptor.container));
    }

    if descriptor.sample_rate != CD_SAMPLE_RATE
        || descriptor.channels != CD_CHANNELS
        || descriptor.sample_format != SampleFormat::PCM_16
    {
        return Err(Ineligibility::NotCdQuality);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cd(container: ContainerFormat) -> StreamDescriptor {
        StreamDescriptor {
            container,
            sample_format: SampleFormat::PCM_16,
            sample_rate: 44100,
            channels: 2,
        }
    }

    #[test]
    fn every_supported_container_passes() {
        for container in SUPPORTED_CONTAINERS {
            assert_eq!(check(&cd(container)), Ok(()));
        }
    }

    #[test]
    fn unknown_container_is_rejected_before_quality() {
        let mut descriptor = cd(ContainerFormat::CAF);
        descriptor.sample_rate = 48000;
        assert_eq!(
            check(&descriptor),
            Err(Ineligibility::UnsupportedContainer(ContainerFormat::CAF))
        );
    }

    #[test]
    fn each_quality_mismatch_is_rejected() {
        let rate = StreamDescriptor {
            sample_rate: 48000,
            ..cd(ContainerFormat::WAV)
        };
        let mono = StreamDescriptor {
            channels: 1,
            ..cd(ContainerFormat::WAV)
        };
        let depth = StreamDescriptor {
            sample_format: SampleFormat::PCM_24,
            ..cd(ContainerFormat::FLAC)
        };

        for descriptor in [rate, mono, depth] {
            assert_eq!(check(&descriptor), Err(Ineligibility::NotCdQuality));
        }
    }
}
