//! Sample representation bridging between the container and the decoder.
//!
//! The two directions use opposite justification. Input samples are
//! sign-extended into the *low* bits of an `i32`, as the decoder requires.
//! Decoded output is already full-scale and goes to the sink untouched; the
//! sink keeps the high bits for its own depth.

use anyhow::Result;

use crate::backend::AudioSink;
use crate::structs::chunk::SampleChunk;

#[inline]
pub fn widen_sample(sample: i16) -> i32 {
    i32::from(sample)
}

/// Widens the valid samples of `input` into `output`.
///
/// `output` must have at least the capacity of `input`.
pub fn widen(input: &SampleChunk<i16>, output: &mut SampleChunk<i32>) {
    let len = input.len();
    output.set_len(len);
    for (dst, &src) in output.valid_mut().iter_mut().zip(input.valid()) {
        *dst = widen_sample(src);
    }
}

/// Forwards decoded samples to the staged output.
pub fn emit(sink: &mut dyn AudioSink, decoded: &SampleChunk<i32>) -> Result<()> {
    sink.write_i32(decoded.valid())
}
