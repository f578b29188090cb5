/// Default lump duration in seconds.
pub const DEFAULT_LUMP_SECONDS: u32 = 10;

/// Suffix appended to the original path when a backup is kept.
pub const BACKUP_SUFFIX: &str = ".hdcd";

/// Options that apply to every file in a run.
///
/// Built once before the first file and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Report detection only; never touch the filesystem.
    pub scan_only: bool,

    /// Keep the original as `<file>.hdcd` when replacing it.
    pub backup: bool,

    /// Duration of audio handled per decode iteration, and the window
    /// after which a file with no HDCD at all is abandoned.
    pub lump_seconds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_only: false,
            backup: true,
            lump_seconds: DEFAULT_LUMP_SECONDS,
        }
    }
}

impl Config {
    pub fn mode(&self) -> Mode {
        if self.scan_only { Mode::ScanOnly } else { Mode::Full }
    }
}

/// Whether a run only reports or also rewrites files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ScanOnly,
    Full,
}
