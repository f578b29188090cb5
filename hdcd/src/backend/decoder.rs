use std::fmt::Display;

use anyhow::Result;

/// Cumulative HDCD detection level of a decoder instance.
///
/// Ordered: a decoder only ever moves up this scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Detection {
    /// No HDCD packets seen.
    None,
    /// Packets seen, but none altered a sample.
    Ineffectual,
    /// At least one packet altered samples.
    Effectual,
}

impl Display for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Detection::None => write!(f, "none"),
            Detection::Ineffectual => write!(f, "ineffectual"),
            Detection::Effectual => write!(f, "effectual"),
        }
    }
}

/// One HDCD decoder instance, owned by a single file's processing.
///
/// State is monotonic for the lifetime of the instance; there is no reset.
pub trait HdcdDecoder {
    /// Decodes `frames` stereo frames in place.
    ///
    /// Input values carry the 16-bit sample in the least significant bits;
    /// output values are full-scale 32-bit.
    fn process(&mut self, samples: &mut [i32], frames: usize) -> Result<()>;

    fn detection(&self) -> Detection;

    /// Cumulative count of HDCD packets seen so far.
    fn packets(&self) -> u32;
}

/// Builds a fresh decoder for each file.
pub trait DecoderFactory {
    fn create(&self) -> Result<Box<dyn HdcdDecoder>>;
}

impl<F> DecoderFactory for F
where
    F: Fn() -> Result<Box<dyn HdcdDecoder>>,
{
    fn create(&self) -> Result<Box<dyn HdcdDecoder>> {
        self()
    }
}
