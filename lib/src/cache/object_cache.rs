use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{write_atomically, CacheError};
use crate::{
    index::{Category, ObjectIndex, Roots},
    script::{ObjectCollection, ScriptObject},
};

/// A cache file smaller than this cannot hold a meaningful index
pub const MIN_CACHE_SIZE: u64 = 200;

/// One object as stored in the cache, `[path, line]` or `[path, line, color]`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CachedObject {
    Colored(PathBuf, usize, String),
    Plain(PathBuf, usize),
}

impl CachedObject {
    fn new(obj: &ScriptObject) -> Self {
        match obj.color() {
            Some(color) => {
                CachedObject::Colored(obj.path().to_path_buf(), obj.line(), color.to_owned())
            }
            None => CachedObject::Plain(obj.path().to_path_buf(), obj.line()),
        }
    }

    fn into_object(self, key: String) -> ScriptObject {
        match self {
            CachedObject::Colored(path, line, color) => {
                ScriptObject::new(key, path, line).with_color(color)
            }
            CachedObject::Plain(path, line) => ScriptObject::new(key, path, line),
        }
    }
}

/// category name -> key -> location
type CacheDocument = IndexMap<String, IndexMap<String, CachedObject>>;

/// The on-disk form of every index of a session, one JSON document
#[derive(Debug, Clone)]
pub struct ObjectCache {
    path: PathBuf,
}

impl ObjectCache {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ObjectCache { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the indexes, replacing whatever was cached before
    pub fn write<'a, I: IntoIterator<Item = &'a ObjectIndex>>(
        &self,
        indexes: I,
    ) -> Result<(), CacheError> {
        let document: CacheDocument = indexes
            .into_iter()
            .map(|index| {
                let objects = index
                    .iter()
                    .map(|obj| (obj.key().to_owned(), CachedObject::new(obj)))
                    .collect();
                (index.name().to_owned(), objects)
            })
            .collect();
        write_atomically(&self.path, |writer| {
            serde_json::to_writer(writer, &document)?;
            Ok(())
        })?;
        info!(path = %self.path.display(), categories = document.len(), "wrote object cache");
        Ok(())
    }

    /// Reconstruct an index for every category, without touching any script
    /// file. Fails if the cache is unreadable or lacks one of the categories.
    pub fn read(
        &self,
        categories: &[Category],
        roots: &Roots,
    ) -> Result<Vec<ObjectIndex>, CacheError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut document: CacheDocument = serde_json::from_reader(reader)?;
        let mut indexes = Vec::with_capacity(categories.len());
        for category in categories {
            let objects = document
                .swap_remove(category.name())
                .ok_or_else(|| CacheError::MissingCategory(category.name().to_owned()))?;
            let objects: ObjectCollection = objects
                .into_iter()
                .map(|(key, cached)| cached.into_object(key))
                .collect();
            indexes.push(ObjectIndex::with_objects(category.clone(), roots.clone(), objects));
        }
        Ok(indexes)
    }

    /// Whether the file is too small or lacks a category. A cache whose mods
    /// changed is also stale, see [super::Fingerprints].
    pub fn is_stale(&self, categories: &[Category]) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() >= MIN_CACHE_SIZE => {}
            _ => {
                debug!(path = %self.path.display(), "cache missing or too small");
                return true;
            }
        }
        let document: serde_json::Map<String, serde_json::Value> =
            match File::open(&self.path).map(BufReader::new) {
                Ok(reader) => match serde_json::from_reader(reader) {
                    Ok(document) => document,
                    Err(_) => return true,
                },
                Err(_) => return true,
            };
        categories.iter().any(|c| !document.contains_key(c.name()))
    }
}
