use crate::utils::errors::AllocError;

/// A bounded buffer of interleaved samples plus the count of valid ones.
///
/// The valid count is a multiple of the channel count except, possibly, for
/// the final chunk of a file.
#[derive(Debug)]
pub struct SampleChunk<T> {
    samples: Vec<T>,
    len: usize,
}

impl<T: Copy + Default> SampleChunk<T> {
    /// Allocates a chunk holding up to `capacity` samples.
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(capacity)
            .map_err(|_| AllocError { samples: capacity })?;
        samples.resize(capacity, T::default());
        Ok(Self { samples, len: 0 })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whole-frame count for `channels` interleaved channels.
    pub fn frames(&self, channels: u32) -> usize {
        match channels {
            0 => 0,
            n => self.len / n as usize,
        }
    }

    /// Marks the first `len` samples as valid, clamped to capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.samples.len());
    }

    /// The whole backing storage, for filling by a reader.
    pub fn storage_mut(&mut self) -> &mut [T] {
        &mut self.samples
    }

    pub fn valid(&self) -> &[T] {
        &self.samples[..self.len]
    }

    pub fn valid_mut(&mut self) -> &mut [T] {
        &mut self.samples[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_final_chunk() {
        let mut chunk = SampleChunk::<i16>::with_capacity(8).unwrap();
        assert!(chunk.is_empty());

        chunk.storage_mut()[..5].copy_from_slice(&[1, 2, 3, 4, 5]);
        chunk.set_len(5);

        assert_eq!(chunk.valid(), &[1, 2, 3, 4, 5]);
        assert_eq!(chunk.frames(2), 2);
    }

    #[test]
    fn set_len_is_clamped() {
        let mut chunk = SampleChunk::<i32>::with_capacity(4).unwrap();
        chunk.set_len(100);
        assert_eq!(chunk.len(), 4);
    }

    #[test]
    fn impossible_allocation_is_an_error() {
        let err = SampleChunk::<i32>::with_capacity(usize::MAX / 2).unwrap_err();
        assert_eq!(err.samples, usize::MAX / 2);
    }
}
