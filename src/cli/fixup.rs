use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use indicatif::{HumanDuration, MultiProgress, ProgressBar, ProgressStyle};

use hdcd::Outcome;
use hdcd::process::Fixup;

/// Scan mode exit statuses.
pub const SCAN_DETECTED: u8 = 0;
pub const SCAN_NOT_DETECTED: u8 = 1;
pub const SCAN_ERROR: u8 = 2;

/// Tally of a batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub files: usize,
    pub processed: usize,
    pub failed: Vec<PathBuf>,
}

impl BatchSummary {
    pub fn exit_status(&self) -> u8 {
        if self.failed.is_empty() { 0 } else { 1 }
    }
}

/// Processes every file in turn. A failed file is logged and the batch
/// moves on.
pub fn cmd_fixup(
    fixup: &Fixup,
    files: &[PathBuf],
    multi: Option<&MultiProgress>,
) -> Result<BatchSummary> {
    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new(files.len() as u64));
            pb.set_style(ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} files ({percent}%)\n{msg} | elapsed: {elapsed_precise}",
            )?);
            Some(pb)
        }
        None => None,
    };

    let start = Instant::now();
    let mut summary = BatchSummary::default();

    for path in files {
        if let Some(pb) = &pb {
            pb.set_message(path.display().to_string());
        }

        summary.files += 1;
        match fixup.process_file(path) {
            Ok(outcome) => {
                log::trace!("{}: {outcome}", path.display());
                if matches!(outcome, Outcome::Processed { .. }) {
                    summary.processed += 1;
                }
            }
            Err(e) => {
                log::error!("{e:#}");
                summary.failed.push(path.clone());
            }
        }

        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    let message = format!(
        "{} files, {} replaced, {} failed in {}",
        summary.files,
        summary.processed,
        summary.failed.len(),
        HumanDuration(start.elapsed())
    );
    match &pb {
        Some(pb) => pb.finish_with_message(message),
        None => log::info!("{message}"),
    }

    Ok(summary)
}

/// Reports on one file without touching it.
pub fn cmd_scan(fixup: &Fixup, path: &Path) -> u8 {
    match fixup.process_file(path) {
        Ok(outcome) if outcome.is_positive() => SCAN_DETECTED,
        Ok(outcome) => {
            log::debug!("{}: {outcome}", path.display());
            SCAN_NOT_DETECTED
        }
        Err(e) => {
            log::error!("{e:#}");
            SCAN_ERROR
        }
    }
}
