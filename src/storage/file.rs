use super::{StorageBackend, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory name used under the platform config directory
pub const APP_DIR_NAME: &str = "letter-reel";

/// JSON-file storage backend: one file per key inside a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous value intact. The directory is
/// created on first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<platform config dir>/letter-reel`
    ///
    /// e.g. `~/.config/letter-reel/` on Linux.
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| StorageError::Unavailable("cannot determine config directory".into()))?;
        Ok(Self::new(base.join(APP_DIR_NAME)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl StorageBackend for FileStore {
    fn name(&self) -> &str {
        "FileStore"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;

        tracing::debug!(path = %path.display(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
