/// Audio container access.
///
/// Provides [`ContainerBackend`](container::ContainerBackend) for opening
/// streams and the [`AudioSource`](container::AudioSource) /
/// [`AudioSink`](container::AudioSink) handles it yields.
pub mod container;

/// HDCD decoding.
///
/// Provides the [`HdcdDecoder`](decoder::HdcdDecoder) contract and the
/// [`Detection`](decoder::Detection) levels it reports.
pub mod decoder;

pub use container::{AudioSink, AudioSource, ContainerBackend};
pub use decoder::{DecoderFactory, Detection, HdcdDecoder};
