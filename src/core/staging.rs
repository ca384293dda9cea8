//! Staged file replacement.
//!
//! New content is written to a temporary file next to its target and only
//! renamed over the target once every file of the group is staged. Pairs are
//! replaced together: if the second rename fails, the first target is put
//! back the way it was.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::error::{ReleaseError, ReleaseResult};

/// Mode given to files that did not exist before.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Content staged for one target.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Stage `content` for `target`.
    ///
    /// An existing target keeps its permissions; a new one gets `0644`.
    /// Fails before anything is written if the target is a directory.
    pub fn new(target: impl Into<PathBuf>, content: &str) -> ReleaseResult<Self> {
        let target = target.into();
        let io_err = |e: io::Error| ReleaseError::io(&target, e);

        let existing = fs::metadata(&target).ok();
        if existing.as_ref().is_some_and(fs::Metadata::is_dir) {
            return Err(io_err(io::Error::other("target is a directory")));
        }

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
        file.write_all(content.as_bytes()).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;

        match existing {
            Some(metadata) => fs::set_permissions(file.path(), metadata.permissions()).map_err(io_err)?,
            None => set_new_file_mode(file.path()).map_err(io_err)?,
        }

        Ok(Self { file, target })
    }

    fn persist(self) -> ReleaseResult<PathBuf> {
        let Self { file, target } = self;
        file.persist(&target).map_err(|e| ReleaseError::io(&target, e.error))?;
        Ok(target)
    }
}

#[cfg(unix)]
fn set_new_file_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn set_new_file_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Replace both targets, or neither.
///
/// The first target's previous content is held in memory; if the second
/// rename fails it is written back (or the first target removed when it did
/// not exist before) and the rename error is returned.
pub fn persist_pair(first: StagedFile, second: StagedFile) -> ReleaseResult<()> {
    let backup = match fs::read(&first.target) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(ReleaseError::io(&first.target, e)),
    };

    let first_target = first.persist()?;
    if let Err(err) = second.persist() {
        let restored = match &backup {
            Some(bytes) => fs::write(&first_target, bytes),
            None => fs::remove_file(&first_target),
        };
        if let Err(restore_err) = restored {
            tracing::warn!(
                path = %first_target.display(),
                error = %restore_err,
                "Failed to restore file after partial write"
            );
        }
        return Err(err);
    }

    Ok(())
}
