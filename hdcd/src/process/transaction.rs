use std::ffi::OsString;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::backend::{AudioSink, AudioSource, ContainerBackend};
use crate::structs::config::BACKUP_SUFFIX;
use crate::structs::stream::{ContainerFormat, OutputSpec};
use crate::structs::tags::TagSlot;
use crate::utils::errors::TransactionError;

/// Compression level requested for FLAC output.
const FLAC_COMPRESSION_LEVEL: f64 = 1.0;

/// What a successful commit left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub backup: Option<PathBuf>,
}

/// Staged replacement of one source file.
///
/// The decoded stream goes to a temporary file in the source's directory so
/// the final rename stays on one filesystem. The source is not touched until
/// [`commit`](Self::commit). Dropping the transaction without committing
/// removes the temporary file.
pub struct OutputTransaction {
    source: PathBuf,
    backup: Option<PathBuf>,
    // Declared before `temp` so the stream handle is closed before the
    // temporary file is removed.
    sink: Option<Box<dyn AudioSink>>,
    temp: Option<NamedTempFile>,
}

impl OutputTransaction {
    /// Creates the temporary output, mirrors the source's permissions and
    /// ownership onto it, opens a 24-bit stream in the source's container
    /// and copies every tag the source carries.
    pub fn open(
        path: &Path,
        metadata: &Metadata,
        source: &dyn AudioSource,
        containers: &dyn ContainerBackend,
        keep_backup: bool,
    ) -> Result<Self> {
        let file_name = path
            .file_name()
            .ok_or_else(|| TransactionError::NoFileName(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut prefix = file_name.to_os_string();
        prefix.push(".");
        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .rand_bytes(6)
            .tempfile_in(dir)
            .with_context(|| {
                format!(
                    "{}: unable to create temporary file in {}",
                    path.display(),
                    dir.display()
                )
            })?;
        log::debug!("{}: staging output in {}", path.display(), temp.path().display());

        copy_ownership(path, &temp, metadata);

        let descriptor = source.descriptor();
        let spec = OutputSpec::pcm24_like(&descriptor);
        let file = temp.as_file().try_clone()?;
        let mut sink = containers.open_write(file, &spec).with_context(|| {
            format!(
                "{}: unable to open {} for writing",
                path.display(),
                temp.path().display()
            )
        })?;

        if descriptor.container == ContainerFormat::FLAC {
            sink.set_compression_level(FLAC_COMPRESSION_LEVEL)?;
        }

        for slot in TagSlot::ALL {
            if let Some(value) = source.tag(slot) {
                if let Err(e) = sink.set_tag(slot, &value) {
                    log::debug!("{}: could not copy {slot} tag: {e:#}", path.display());
                }
            }
        }

        Ok(Self {
            source: path.to_path_buf(),
            backup: keep_backup.then(|| backup_path(path)),
            sink: Some(sink),
            temp: Some(temp),
        })
    }

    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_ref().map(|t| t.path())
    }

    pub fn sink_mut(&mut self) -> Option<&mut (dyn AudioSink + 'static)> {
        self.sink.as_deref_mut()
    }

    /// Finalises the staged output and moves it over the source.
    ///
    /// With backups enabled the source is first renamed to its backup path.
    /// If the final rename fails the backup is moved back into place.
    pub fn commit(mut self) -> Result<Committed> {
        if let Some(mut sink) = self.sink.take() {
            sink.sync()
                .with_context(|| format!("{}: unable to flush output", self.source.display()))?;
            sink.close()?;
        }

        let Some(temp) = self.temp.take() else {
            anyhow::bail!("{}: transaction already resolved", self.source.display());
        };

        replace_with_backup(&self.source, self.backup.as_deref(), |dest| {
            temp.persist(dest).map(drop).map_err(|e| e.error)
        })?;

        Ok(Committed {
            backup: self.backup.take(),
        })
    }

    /// Closes and removes the staged output. The source is left as it was.
    pub fn discard(mut self) {
        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                log::debug!("{}: closing staged output: {e:#}", self.source.display());
            }
        }
        if let Some(temp) = self.temp.take() {
            let temp_path = temp.path().to_path_buf();
            if let Err(e) = temp.close() {
                log::warn!("{}: unable to remove {}: {e}", self.source.display(), temp_path.display());
            }
        }
    }
}

/// Moves `source` aside to `backup` (when given), then runs `install` to put
/// the new file at `source`. If `install` fails the backup is moved back.
fn replace_with_backup(
    source: &Path,
    backup: Option<&Path>,
    install: impl FnOnce(&Path) -> io::Result<()>,
) -> Result<(), TransactionError> {
    if let Some(backup) = backup {
        fs::rename(source, backup).map_err(|e| TransactionError::Backup {
            path: backup.to_path_buf(),
            source: e,
        })?;
    }

    if let Err(e) = install(source) {
        if let Some(backup) = backup {
            if let Err(restore) = fs::rename(backup, source) {
                log::error!(
                    "{}: unable to restore original from {}: {restore}",
                    source.display(),
                    backup.display()
                );
            }
        }
        return Err(TransactionError::Replace {
            path: source.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Best effort: failures leave the temporary file with default permissions.
fn copy_ownership(path: &Path, temp: &NamedTempFile, metadata: &Metadata) {
    if let Err(e) = fs::set_permissions(temp.path(), metadata.permissions()) {
        log::debug!("{}: could not copy permissions: {e}", path.display());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let Err(e) =
            std::os::unix::fs::fchown(temp.as_file(), Some(metadata.uid()), Some(metadata.gid()))
        {
            log::debug!("{}: could not copy ownership: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::stream::StreamDescriptor;
    use crate::testing::{CD_WAV, MockContainers, MockFile, read_mock_file, write_mock_file};
    use anyhow::bail;
    use std::fs::File;
    use tempfile::TempDir;

    const CD_FLAC: StreamDescriptor = StreamDescriptor {
        container: ContainerFormat::FLAC,
        ..CD_WAV
    };

    fn source_file(dir: &TempDir) -> PathBuf {
        source_with(dir, "track.wav", CD_WAV)
    }

    fn source_with(dir: &TempDir, name: &str, descriptor: StreamDescriptor) -> PathBuf {
        let path = dir.path().join(name);
        write_mock_file(
            &path,
            &MockFile {
                descriptor,
                tags: vec![
                    (TagSlot::Title, "Song".to_string()),
                    (TagSlot::Artist, "Band".to_string()),
                ],
                samples: vec![1, -1, 2, -2],
            },
        );
        path
    }

    fn open(path: &Path, containers: &MockContainers, keep_backup: bool) -> OutputTransaction {
        let metadata = fs::metadata(path).unwrap();
        let source = containers.open_read(path).unwrap();
        OutputTransaction::open(path, &metadata, source.as_ref(), containers, keep_backup).unwrap()
    }

    fn dir_entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn temp_file_lives_next_to_source() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        let tx = open(&path, &MockContainers::default(), true);

        let temp = tx.temp_path().unwrap();
        assert_eq!(temp.parent(), path.parent());
        assert!(
            temp.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("track.wav.")
        );
        tx.discard();
    }

    #[test]
    fn discard_removes_temp_and_keeps_source() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        let before = fs::read(&path).unwrap();

        let mut tx = open(&path, &MockContainers::default(), true);
        tx.sink_mut().unwrap().write_i32(&[7, 8]).unwrap();
        tx.discard();

        assert_eq!(dir_entries(&dir), vec!["track.wav"]);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn dropping_without_resolution_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        drop(open(&path, &MockContainers::default(), false));

        assert_eq!(dir_entries(&dir), vec!["track.wav"]);
    }

    #[test]
    fn commit_with_backup_keeps_original_bytes() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        let before = fs::read(&path).unwrap();

        let mut tx = open(&path, &MockContainers::default(), true);
        tx.sink_mut().unwrap().write_i32(&[1 << 16, -1 << 16]).unwrap();
        let committed = tx.commit().unwrap();

        let backup = dir.path().join("track.wav.hdcd");
        assert_eq!(committed.backup.as_deref(), Some(backup.as_path()));
        assert_eq!(fs::read(&backup).unwrap(), before);
        assert_eq!(dir_entries(&dir), vec!["track.wav", "track.wav.hdcd"]);

        let replaced = read_mock_file(&path).unwrap();
        assert_eq!(replaced.descriptor.sample_format, crate::structs::stream::SampleFormat::PCM_24);
        assert_eq!(replaced.samples, vec![1 << 16, -1 << 16]);
        assert_eq!(
            replaced.tags,
            vec![
                (TagSlot::Title, "Song".to_string()),
                (TagSlot::Artist, "Band".to_string()),
            ]
        );
    }

    #[test]
    fn commit_without_backup_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);

        let tx = open(&path, &MockContainers::default(), false);
        let committed = tx.commit().unwrap();

        assert_eq!(committed.backup, None);
        assert_eq!(dir_entries(&dir), vec!["track.wav"]);
    }

    #[cfg(unix)]
    #[test]
    fn permissions_follow_the_source() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let tx = open(&path, &MockContainers::default(), false);
        let mode = fs::metadata(tx.temp_path().unwrap()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        tx.discard();
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/music/a.flac")),
            PathBuf::from("/music/a.flac.hdcd")
        );
    }

    #[test]
    fn flac_output_asks_for_maximum_compression() {
        let dir = TempDir::new().unwrap();
        let path = source_with(&dir, "track.flac", CD_FLAC);
        let containers = MockContainers::default();

        open(&path, &containers, false).discard();
        assert_eq!(containers.compression_requests(), vec![1.0]);
    }

    #[test]
    fn wav_output_leaves_compression_alone() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        let containers = MockContainers::default();

        open(&path, &containers, false).discard();
        assert!(containers.compression_requests().is_empty());
    }

    /// Reads through the mock layout but cannot create output streams.
    struct ReadOnlyContainers(MockContainers);

    impl ContainerBackend for ReadOnlyContainers {
        fn open_read(&self, path: &Path) -> Result<Box<dyn AudioSource>> {
            self.0.open_read(path)
        }

        fn open_write(&self, _file: File, spec: &OutputSpec) -> Result<Box<dyn AudioSink>> {
            bail!("no writer for {}", spec.container)
        }
    }

    #[test]
    fn failed_open_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = source_with(&dir, "track.flac", CD_FLAC);
        let containers = ReadOnlyContainers(MockContainers::default());

        let metadata = fs::metadata(&path).unwrap();
        let source = containers.open_read(&path).unwrap();
        let result = OutputTransaction::open(&path, &metadata, source.as_ref(), &containers, true);

        let Err(e) = result else {
            panic!("open succeeded without a writer");
        };
        assert!(format!("{e:#}").contains("unable to open"));
        assert_eq!(dir_entries(&dir), vec!["track.flac"]);
    }

    #[test]
    fn failed_backup_keeps_the_original() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        let before = fs::read(&path).unwrap();

        // a non-empty directory squatting on the backup name
        let squatter = dir.path().join("track.wav.hdcd");
        fs::create_dir(&squatter).unwrap();
        fs::write(squatter.join("keep"), b"x").unwrap();

        let mut tx = open(&path, &MockContainers::default(), true);
        tx.sink_mut().unwrap().write_i32(&[1 << 16, -1 << 16]).unwrap();
        let err = tx.commit().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TransactionError>(),
            Some(TransactionError::Backup { .. })
        ));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(dir_entries(&dir), vec!["track.wav", "track.wav.hdcd"]);
        assert!(squatter.join("keep").is_file());
    }

    #[test]
    fn failed_replace_restores_the_backup() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        let before = fs::read(&path).unwrap();
        let backup = backup_path(&path);

        let err = replace_with_backup(&path, Some(&backup), |dest| {
            assert!(!dest.exists());
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        })
        .unwrap_err();

        assert!(matches!(err, TransactionError::Replace { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(dir_entries(&dir), vec!["track.wav"]);
    }

    #[test]
    fn replace_installs_after_the_backup_is_taken() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir);
        let before = fs::read(&path).unwrap();
        let backup = backup_path(&path);

        replace_with_backup(&path, Some(&backup), |dest| fs::write(dest, b"decoded")).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"decoded");
        assert_eq!(fs::read(&backup).unwrap(), before);
    }
}
