//! Detection and removal of HDCD encoding in CD-quality PCM files.
//!
//! ## Technical Overview
//!
//! HDCD hides control packets in the least significant bit of 16-bit,
//! 44.1 kHz stereo PCM. A decoder that understands the packets can recover
//! a wider dynamic range; a file that carries *effectual* packets is worth
//! rewriting as 24-bit PCM.
//!
//! The pipeline for one file:
//!
//! 1. [`process::gate`] checks the stream is a candidate at all.
//! 2. [`process::transaction`] stages a temporary output next to the source.
//! 3. [`process::driver`] feeds the file through a decoder in lumps,
//!    widening samples with [`process::bridge`] and stopping early when the
//!    answer is already known.
//! 4. [`process::outcome`] turns the decoder verdict into a commit or
//!    discard of the staged output.
//!
//! Container I/O and the HDCD bit-level decoder are collaborators behind
//! the traits in [`backend`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hdcd::{Config, process::Fixup};
//! # fn run(
//! #     containers: &dyn hdcd::backend::ContainerBackend,
//! #     decoders: &dyn hdcd::backend::DecoderFactory,
//! # ) -> anyhow::Result<()> {
//! let config = Config::default();
//! let fixup = Fixup::new(&config, containers, decoders);
//!
//! let outcome = fixup.process_file("track01.wav".as_ref())?;
//! if outcome.is_positive() {
//!     println!("replaced with decoded samples");
//! }
//! # Ok(())
//! # }
//! ```

/// Collaborator interfaces for container I/O and HDCD decoding.
///
/// - **Containers** ([`backend::container`]): stream open, block read/write, tags
/// - **Decoders** ([`backend::decoder`]): per-file decoder instances and their verdicts
pub mod backend;

/// The per-file detect-and-transcode pipeline.
pub mod process;

/// Data model shared by the pipeline and its collaborators.
pub mod structs;

/// Error types and presentation helpers.
pub mod utils;

#[cfg(feature = "libhdcd")]
pub mod ffi;

#[cfg(test)]
pub(crate) mod testing;

pub use process::outcome::Outcome;
pub use structs::config::Config;
