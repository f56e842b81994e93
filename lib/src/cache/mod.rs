use std::{
    error,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
};

use derive_more::{Display, From};

/// The serialized indexes
mod object_cache;
pub use object_cache::{ObjectCache, MIN_CACHE_SIZE};

/// Change detection for mod directories
mod fingerprint;
pub use fingerprint::{fingerprint_root, Fingerprints};

/// An error that occured while reading or writing the cache
#[derive(Debug, From, Display)]
pub enum CacheError {
    /// Something went wrong with stdlib IO
    IoError(io::Error),
    /// The cache file is not valid JSON, or not in the expected shape
    JsonError(serde_json::Error),
    /// The cache does not hold the given category
    #[display("the cache has no entry for category {_0}")]
    #[from(ignore)]
    MissingCategory(String),
    /// A line of the fingerprint file could not be understood
    #[display("malformed fingerprint line {_0:?}")]
    #[from(ignore)]
    MalformedFingerprint(String),
}

impl error::Error for CacheError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::JsonError(err) => Some(err),
            _ => None,
        }
    }
}

/// Write a file through a temporary sibling and a rename, so that readers
/// never see a half written file
fn write_atomically<F>(path: &Path, write: F) -> Result<(), CacheError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), CacheError>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    let temporary = path.with_file_name(name);
    let mut writer = BufWriter::new(File::create(&temporary)?);
    let result = write(&mut writer).and_then(|_| writer.flush().map_err(CacheError::from));
    drop(writer);
    if let Err(e) = result {
        let _ = fs::remove_file(&temporary);
        return Err(e);
    }
    fs::rename(&temporary, path)?;
    Ok(())
}
