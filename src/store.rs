//! Working-file store: the memoization layer shared by every stage.
//!
//! A stage's output is addressed by `(source path, stage, cache token)`. The
//! first request computes the output into a temp file in the target directory
//! and atomically renames it into place; later requests with the same address
//! find the file and skip recomputation. A failed computation never leaves a
//! file at the working path.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cache_key::digest_token;
use crate::config::PipelineConfig;
use crate::constants::store::{STAGE_SEPARATOR, TEMP_PREFIX, TOKEN_SEPARATOR};
use crate::errors::PipelineError;
use crate::stages::StageKind;

/// Whether a working file has been published yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactState {
    /// Nothing has been published at the working path.
    Pending,
    /// The working file exists at this path.
    Ready(PathBuf),
}

/// A published working file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Materialized {
    /// Working-file path.
    pub path: PathBuf,
    /// True when the file was already present and `compute` was not called.
    pub cache_hit: bool,
}

/// Keyed store of derived record sets.
#[derive(Clone, Debug)]
pub struct WorkingStore {
    root: Option<PathBuf>,
    delimiter: u8,
}

impl Default for WorkingStore {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl WorkingStore {
    /// Create a store from pipeline settings.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            root: config.cache_root.clone(),
            delimiter: config.delimiter,
        }
    }

    /// Field delimiter used for every record set in this store.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Injected cache root, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Derive the working-file path for `stage` applied to `source`.
    ///
    /// The name keeps the source stem and extension and appends
    /// `.<stage>-<token>`, so chained stages accumulate suffixes in order.
    pub fn working_path(
        &self,
        source: &Path,
        stage: StageKind,
        token: &str,
    ) -> Result<PathBuf, PipelineError> {
        let stem = source
            .file_stem()
            .ok_or_else(|| stage.error(format!("'{}' has no file name", source.display())))?;
        let mut name = OsString::from(stem);
        name.push(format!("{STAGE_SEPARATOR}{}{TOKEN_SEPARATOR}{token}", stage.name()));
        if let Some(ext) = source.extension() {
            name.push(STAGE_SEPARATOR.to_string());
            name.push(ext);
        }
        Ok(self.target_dir(source)?.join(name))
    }

    /// Report whether the working file for this address exists.
    pub fn lookup(
        &self,
        source: &Path,
        stage: StageKind,
        token: &str,
    ) -> Result<ArtifactState, PipelineError> {
        let path = self.working_path(source, stage, token)?;
        if path.is_file() {
            Ok(ArtifactState::Ready(path))
        } else {
            Ok(ArtifactState::Pending)
        }
    }

    /// Return the existing working file, or run `compute` and publish its output.
    ///
    /// `compute` writes the full record set (header first) into a private temp
    /// file. The file is published with a no-clobber rename; if a concurrent
    /// writer won the race, the freshly computed copy is discarded.
    pub fn materialize<F>(
        &self,
        source: &Path,
        stage: StageKind,
        token: &str,
        compute: F,
    ) -> Result<Materialized, PipelineError>
    where
        F: FnOnce(&mut File) -> Result<(), PipelineError>,
    {
        let path = match self.lookup(source, stage, token)? {
            ArtifactState::Ready(path) => {
                debug!(
                    "[tablecache:store] cache hit for {} at {}",
                    stage.name(),
                    path.display()
                );
                return Ok(Materialized {
                    path,
                    cache_hit: true,
                });
            }
            ArtifactState::Pending => self.working_path(source, stage, token)?,
        };
        let dir = path
            .parent()
            .ok_or_else(|| stage.error(format!("'{}' has no parent", path.display())))?;
        fs::create_dir_all(dir).map_err(|err| stage.error(err))?;
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(|err| stage.error(err))?;
        if let Err(err) = compute(temp.as_file_mut()) {
            warn!(
                "[tablecache:store] {} computation failed, discarding partial output: {}",
                stage.name(),
                err
            );
            return Err(err);
        }
        temp.as_file().sync_all().map_err(|err| stage.error(err))?;
        match temp.persist_noclobber(&path) {
            Ok(_) => {
                info!(
                    "[tablecache:store] materialized {} at {}",
                    stage.name(),
                    path.display()
                );
                Ok(Materialized {
                    path,
                    cache_hit: false,
                })
            }
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(
                    "[tablecache:store] {} already published by a concurrent writer at {}",
                    stage.name(),
                    path.display()
                );
                Ok(Materialized {
                    path,
                    cache_hit: false,
                })
            }
            Err(err) => Err(stage.error(err.error)),
        }
    }

    fn target_dir(&self, source: &Path) -> Result<PathBuf, PipelineError> {
        let parent = match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let Some(root) = &self.root else {
            return Ok(parent);
        };
        if parent.starts_with(root) {
            return Ok(parent);
        }
        // Working files from different source directories must not share names.
        let identity = std::path::absolute(&parent)?;
        let bucket = digest_token(&identity.to_string_lossy());
        Ok(root.join(bucket))
    }
}
