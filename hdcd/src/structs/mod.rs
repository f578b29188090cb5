//! Data structures describing streams, sample buffers and run configuration.

pub mod chunk;
pub mod config;
pub mod stream;
pub mod tags;
