use std::fmt::Display;
use std::path::PathBuf;

use super::driver::DriveReport;
use super::gate::Ineligibility;
use crate::backend::Detection;
use crate::structs::config::Mode;

/// What to do with the staged output once the verdict is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Commit,
    Discard,
    /// Scan mode: nothing was staged.
    Nothing,
}

/// Per-file result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The stream cannot carry HDCD; nothing was read past the header.
    Ineligible(Ineligibility),
    /// No HDCD packets were found.
    NoHdcd,
    /// Packets were present but changed nothing; the file was left alone.
    NoActionNeeded { packets: u32 },
    /// Scan mode: no effectual packets.
    NotDetected,
    /// Scan mode: at least one effectual packet.
    Detected { packets: u32 },
    /// The file was replaced with decoded 24-bit samples.
    Processed {
        packets: u32,
        samples: u64,
        backup: Option<PathBuf>,
    },
}

impl Outcome {
    /// True for the "detected / processed" side of the tri-state result.
    pub fn is_positive(&self) -> bool {
        matches!(self, Outcome::Detected { .. } | Outcome::Processed { .. })
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Ineligible(reason) => write!(f, "skipped ({reason})"),
            Outcome::NoHdcd => write!(f, "no HDCD"),
            Outcome::NoActionNeeded { .. } => write!(f, "no action needed"),
            Outcome::NotDetected => write!(f, "not detected"),
            Outcome::Detected { .. } => write!(f, "detected"),
            Outcome::Processed { .. } => write!(f, "processed"),
        }
    }
}

/// Maps the final decoder state and run mode to an action and a result.
///
/// In scan mode an ineffectual verdict reports the same as no HDCD at all:
/// there is nothing to be done about the file.
pub fn classify(mode: Mode, report: &DriveReport) -> (Action, Outcome) {
    match (mode, report.detection) {
        (Mode::ScanOnly, Detection::Effectual) => (
            Action::Nothing,
            Outcome::Detected {
                packets: report.packets,
            },
        ),
        (Mode::ScanOnly, _) => (Action::Nothing, Outcome::NotDetected),
        (Mode::Full, Detection::Effectual) => (
            Action::Commit,
            Outcome::Processed {
                packets: report.packets,
                samples: report.samples,
                backup: None,
            },
        ),
        (Mode::Full, Detection::Ineffectual) => (
            Action::Discard,
            Outcome::NoActionNeeded {
                packets: report.packets,
            },
        ),
        (Mode::Full, Detection::None) => (Action::Discard, Outcome::NoHdcd),
    }
}
