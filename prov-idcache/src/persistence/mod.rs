//! Bulk persistence of the identifier index
//!
//! The whole index is read once at start and written once at stop. The
//! on-disk syntax is pluggable through [`CacheCodec`]; [`CacheStore`] binds a
//! codec to a file and takes care of missing files and atomic replacement.

mod json_lines;

pub use json_lines::JsonLinesCodec;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CacheResult;
use crate::proxy::{IdentifiableProxy, IdentifierProxy};

/// One persisted index entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub proxy: IdentifiableProxy,
    pub identifiers: Vec<IdentifierProxy>,
}

/// Encoder/decoder for a sequence of [`CacheRecord`]s
pub trait CacheCodec: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Decode every record from `reader`, handing each to `sink` as soon as
    /// it is decoded. Returns the number of records decoded.
    fn read(&self, reader: &mut dyn BufRead, sink: &mut dyn FnMut(CacheRecord)) -> CacheResult<usize>;

    /// Encode `records` to `writer`. Returns the number of records written.
    fn write(&self, writer: &mut dyn Write, records: &[CacheRecord]) -> CacheResult<usize>;
}

/// A codec bound to a cache file
pub struct CacheStore {
    path: PathBuf,
    codec: Box<dyn CacheCodec>,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>, codec: Box<dyn CacheCodec>) -> Self {
        Self {
            path: path.into(),
            codec,
        }
    }

    /// Store using the default JSON Lines format
    pub fn json_lines(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Box::new(JsonLinesCodec))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Stream every stored record into `sink`
    ///
    /// A missing file is an empty cache, not an error.
    pub fn read(&self, sink: &mut dyn FnMut(CacheRecord)) -> CacheResult<usize> {
        if !self.exists() {
            info!(path = %self.path.display(), "No identifier cache file, starting empty");
            return Ok(0);
        }

        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let count = self.codec.read(&mut reader, sink)?;

        debug!(
            path = %self.path.display(),
            codec = self.codec.name(),
            records = count,
            "Read identifier cache"
        );
        Ok(count)
    }

    /// Replace the stored records with `records`
    ///
    /// Writes to a sibling temp file and renames it over the target, so a
    /// failed write leaves the previous cache intact.
    pub fn write(&self, records: &[CacheRecord]) -> CacheResult<usize> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.temp_path();
        let result = self.write_to(&temp_path, records);
        let count = match result {
            Ok(count) => count,
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                return Err(e);
            }
        };
        std::fs::rename(&temp_path, &self.path)?;

        debug!(
            path = %self.path.display(),
            codec = self.codec.name(),
            records = count,
            "Wrote identifier cache"
        );
        Ok(count)
    }

    fn write_to(&self, temp_path: &Path, records: &[CacheRecord]) -> CacheResult<usize> {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        let count = self.codec.write(&mut writer, records)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(count)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
