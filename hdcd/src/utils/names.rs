//! Human-readable names for container and sample format codes.
//!
//! Diagnostics only. Eligibility never consults these tables.

use crate::structs::stream::{ContainerFormat, SampleFormat};

/// Sorted by code.
const CONTAINER_NAMES: &[(u32, &str)] = &[
    (ContainerFormat::WAV.0, "Microsoft WAV"),
    (ContainerFormat::AIFF.0, "Apple AIFF"),
    (ContainerFormat::AU.0, "Sun AU"),
    (ContainerFormat::W64.0, "Sonic Foundry WAV64"),
    (ContainerFormat::WAVEX.0, "Microsoft WAV Extended"),
    (ContainerFormat::FLAC.0, "FLAC"),
    (ContainerFormat::CAF.0, "Apple CAF"),
    (ContainerFormat::OGG.0, "Ogg Container"),
    (ContainerFormat::RF64.0, "RF64 WAV"),
];

/// Sorted by code.
const SAMPLE_FORMAT_NAMES: &[(u32, &str)] = &[
    (SampleFormat::PCM_S8.0, "Signed 8 bit"),
    (SampleFormat::PCM_16.0, "Signed 16 bit"),
    (SampleFormat::PCM_24.0, "Signed 24 bit"),
    (SampleFormat::PCM_32.0, "Signed 32 bit"),
    (SampleFormat::PCM_U8.0, "Unsigned 8 bit"),
    (SampleFormat::FLOAT.0, "32 bit float"),
    (SampleFormat::DOUBLE.0, "64 bit float"),
    (SampleFormat::ULAW.0, "U-Law"),
    (SampleFormat::ALAW.0, "A-Law"),
    (SampleFormat::IMA_ADPCM.0, "IMA ADPCM"),
    (SampleFormat::MS_ADPCM.0, "Microsoft ADPCM"),
    (SampleFormat::VORBIS.0, "Vorbis"),
];

fn lookup(table: &'static [(u32, &'static str)], key: u32) -> Option<&'static str> {
    table
        .binary_search_by_key(&key, |&(code, _)| code)
        .ok()
        .map(|idx| table[idx].1)
}

pub fn container_name(format: ContainerFormat) -> &'static str {
    lookup(CONTAINER_NAMES, format.0).unwrap_or("Unknown container")
}

pub fn sample_format_name(format: SampleFormat) -> &'static str {
    lookup(SAMPLE_FORMAT_NAMES, format.0).unwrap_or("Unknown sample format")
}
