//! Binding to the system `libhdcd` decoder (`hdcd/hdcd_simple.h`).

use std::ffi::c_int;
use std::ptr::NonNull;

use anyhow::Result;

use crate::backend::{DecoderFactory, Detection, HdcdDecoder};
use crate::utils::errors::DecoderError;

#[repr(C)]
struct HdcdSimple {
    _private: [u8; 0],
}

// hdcd_dv
const HDCD_NONE: c_int = 0;
const HDCD_NO_EFFECT: c_int = 1;
const HDCD_EFFECTUAL: c_int = 2;

#[link(name = "hdcd")]
unsafe extern "C" {
    fn hdcd_new() -> *mut HdcdSimple;
    fn hdcd_free(s: *mut HdcdSimple);
    fn hdcd_process(s: *mut HdcdSimple, samples: *mut c_int, count: c_int);
    fn hdcd_detected(s: *mut HdcdSimple) -> c_int;
    fn hdcd_detect_total_packets(s: *mut HdcdSimple) -> c_int;
    fn hdcd_lib_version(major: *mut c_int, minor: *mut c_int);
}

/// `(major, minor)` of the linked library.
pub fn lib_version() -> (i32, i32) {
    let (mut major, mut minor) = (0, 0);
    // SAFETY: both pointers are valid for writes for the duration of the call.
    unsafe { hdcd_lib_version(&mut major, &mut minor) };
    (major, minor)
}

/// A stereo `hdcd_simple` decoder instance.
pub struct LibHdcd {
    raw: NonNull<HdcdSimple>,
}

impl LibHdcd {
    pub fn new() -> Result<Self, DecoderError> {
        // SAFETY: no preconditions; a null return is handled below.
        let raw = unsafe { hdcd_new() };
        NonNull::new(raw)
            .map(|raw| Self { raw })
            .ok_or(DecoderError::CreateFailed)
    }
}

impl Drop for LibHdcd {
    fn drop(&mut self) {
        // SAFETY: `raw` came from hdcd_new and is freed exactly once.
        unsafe { hdcd_free(self.raw.as_ptr()) };
    }
}

impl HdcdDecoder for LibHdcd {
    fn process(&mut self, samples: &mut [i32], frames: usize) -> Result<()> {
        if frames * 2 > samples.len() {
            return Err(DecoderError::ProcessFailed { frames }.into());
        }
        let count = c_int::try_from(frames).map_err(|_| DecoderError::ProcessFailed { frames })?;
        // SAFETY: the buffer holds at least `frames` interleaved stereo frames.
        unsafe { hdcd_process(self.raw.as_ptr(), samples.as_mut_ptr(), count) };
        Ok(())
    }

    fn detection(&self) -> Detection {
        // SAFETY: `raw` is a live decoder instance.
        match unsafe { hdcd_detected(self.raw.as_ptr()) } {
            HDCD_EFFECTUAL => Detection::Effectual,
            HDCD_NO_EFFECT => Detection::Ineffectual,
            HDCD_NONE => Detection::None,
            other => {
                log::warn!("libhdcd reported unknown detection value {other}");
                Detection::None
            }
        }
    }

    fn packets(&self) -> u32 {
        // SAFETY: `raw` is a live decoder instance.
        let packets = unsafe { hdcd_detect_total_packets(self.raw.as_ptr()) };
        u32::try_from(packets).unwrap_or(0)
    }
}

/// Creates one [`LibHdcd`] per file.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibHdcdFactory;

impl DecoderFactory for LibHdcdFactory {
    fn create(&self) -> Result<Box<dyn HdcdDecoder>> {
        Ok(Box::new(LibHdcd::new()?))
    }
}
