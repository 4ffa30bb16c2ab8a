//! Directory-of-files artifact store.
//!
//! Resolves [`ArtifactKey`]s to paths under `<base>/autotune/` and performs
//! the few file operations the pipeline needs. Replacing writes go through a
//! temporary sibling and a rename, so a reader never observes a half-written
//! working profile.

use crate::partition::BucketWriter;
use at_common::{ArtifactKey, Error, Result, WeekdaySelector};
use at_config::AutotuneConfig;
use chrono::NaiveDate;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Settings file holding the operator's pump profile.
pub const PUMP_PROFILE_FILE: &str = "pumpprofile.json";

/// Settings file holding an operator-maintained working profile.
pub const SETTINGS_PROFILE_FILE: &str = "profile.json";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    settings_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, settings_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings_dir: settings_dir.into(),
        }
    }

    pub fn from_config(config: &AutotuneConfig) -> Self {
        Self::new(config.autotune_dir(), config.settings_dir())
    }

    /// Create the working directory if needed.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    pub fn settings_path(&self, name: &str) -> PathBuf {
        self.settings_dir.join(name)
    }

    pub fn exists(&self, key: &ArtifactKey) -> bool {
        self.path(key).is_file()
    }

    pub fn read(&self, key: &ArtifactKey) -> Result<Vec<u8>> {
        let path = self.path(key);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::MissingArtifact { path: path.clone() },
            _ => Error::io(&path, e),
        })
    }

    pub fn read_to_string(&self, key: &ArtifactKey) -> Result<String> {
        let bytes = self.read(key)?;
        String::from_utf8(bytes).map_err(|e| {
            Error::io(
                self.path(key),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Size in bytes; a missing artifact counts as empty.
    pub fn byte_len(&self, key: &ArtifactKey) -> u64 {
        fs::metadata(self.path(key)).map(|m| m.len()).unwrap_or(0)
    }

    /// Atomically write `bytes` to `key`.
    pub fn write(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        write_atomic(&path, bytes)?;
        trace!(
            artifact = %key,
            kind = %key.kind(),
            bytes = bytes.len(),
            "artifact written"
        );
        Ok(path)
    }

    /// Atomically write an unkeyed file (run summaries) into the working directory.
    pub fn write_named(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(name);
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    /// Atomically replace `to` with the contents of `from`.
    pub fn copy(&self, from: &ArtifactKey, to: &ArtifactKey) -> Result<()> {
        let bytes = self.read(from)?;
        self.write(to, &bytes)?;
        debug!(from = %from, to = %to, "artifact copied");
        Ok(())
    }

    /// Atomically copy a file from outside the working directory into `to`.
    pub fn import(&self, source: &Path, to: &ArtifactKey) -> Result<()> {
        let bytes = fs::read(source).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::MissingArtifact {
                path: source.to_path_buf(),
            },
            _ => Error::io(source, e),
        })?;
        self.write(to, &bytes)?;
        debug!(from = %source.display(), to = %to, "artifact imported");
        Ok(())
    }

    /// Open `key` for writing, truncating any previous content.
    ///
    /// Used to capture a tool's standard output directly into its artifact.
    pub fn create(&self, key: &ArtifactKey) -> Result<(File, PathBuf)> {
        let path = self.path(key);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        Ok((file, path))
    }
}

impl BucketWriter for ArtifactStore {
    fn write_bucket(&self, weekday: WeekdaySelector, dates: &[NaiveDate]) -> Result<()> {
        let body = crate::partition::render_bucket(dates);
        self.write(&ArtifactKey::DateList { weekday }, body.as_bytes())?;
        Ok(())
    }

    fn write_listing(&self, listing: &str) -> Result<()> {
        self.write(&ArtifactKey::DateListing, listing.as_bytes())?;
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| Error::io(&tmp_path, e))?;
        file.write_all(bytes).map_err(|e| Error::io(&tmp_path, e))?;
        file.flush().map_err(|e| Error::io(&tmp_path, e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))
}
