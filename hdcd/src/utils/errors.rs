use std::io;
use std::path::PathBuf;

use crate::structs::stream::ContainerFormat;

#[derive(thiserror::Error, Debug)]
#[error("unable to allocate buffer memory for {samples} samples")]
pub struct AllocError {
    pub samples: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum ContainerError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("unrecognised file signature")]
    UnknownSignature,

    #[error("{0} is not supported by the native backend")]
    UnsupportedContainer(ContainerFormat),

    #[error("malformed {container} stream: {reason}")]
    Malformed {
        container: ContainerFormat,
        reason: String,
    },

    #[error("cannot read {found} samples as 16-bit PCM")]
    SampleFormatMismatch { found: String },

    #[error("cannot write {bits}-bit samples")]
    UnsupportedOutputDepth { bits: u32 },

    #[error("{container} output of {bytes} bytes exceeds the container size limit")]
    TooLarge {
        container: ContainerFormat,
        bytes: u64,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum DecoderError {
    #[error("no HDCD decoder backend is available in this build (enable the `libhdcd` feature)")]
    Unavailable,

    #[error("decoder could not be created")]
    CreateFailed,

    #[error("decoder rejected a block of {frames} frames")]
    ProcessFailed { frames: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum TransactionError {
    #[error("source path {0} has no file name")]
    NoFileName(PathBuf),

    #[error("unable to backup to {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
