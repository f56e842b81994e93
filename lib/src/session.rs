use std::{
    error,
    path::{self, Path, PathBuf},
};

use derive_more::{Display, From};
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::{
    cache::{CacheError, Fingerprints, ObjectCache},
    index::{category, Category, ObjectIndex, RootKind, Roots},
    loader::{LoadReport, ParallelLoader, WorkerFailure},
    script::{ScanError, ScriptObject},
    settings::{Settings, SettingsError},
};

/// The name of the object cache file in the cache directory
pub const CACHE_FILE: &str = "object_cache.json";
/// The name of the mod fingerprint file in the cache directory
pub const FINGERPRINT_FILE: &str = "mod_fingerprints.txt";

/// An error that stops a session from loading or saving its indexes
#[derive(Debug, From, Display)]
pub enum SessionError {
    SettingsError(SettingsError),
    CacheError(CacheError),
}

impl error::Error for SessionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::SettingsError(err) => Some(err),
            Self::CacheError(err) => Some(err),
        }
    }
}

/// Where the indexes of a load came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoadSource {
    #[display("cache")]
    Cache,
    /// The cache, with the categories that changed since rescanned
    #[display("cache and rescan")]
    Incremental,
    #[display("scan")]
    Scan,
}

/// What happened during [Session::load] or [Session::rebuild]
#[derive(Debug)]
pub struct LoadOutcome {
    pub source: LoadSource,
    /// Mod roots that changed since the cache was written
    pub changed_mods: Vec<PathBuf>,
    /// The categories that were scanned rather than read from the cache
    pub rescanned: Vec<String>,
    pub warnings: Vec<ScanError>,
    pub failures: Vec<WorkerFailure>,
}

/// Every index of one game installation and its mods, plus the cache they
/// are persisted in.
pub struct Session {
    settings: Settings,
    roots: Roots,
    categories: Vec<Category>,
    cache: ObjectCache,
    fingerprint_path: PathBuf,
    /// The fingerprints the loaded indexes are known to match
    loaded: Option<Fingerprints>,
    indexes: IndexMap<String, ObjectIndex>,
}

impl Session {
    /// Create a session for every Victoria 3 category
    pub fn new(settings: Settings) -> Result<Self, SessionError> {
        Session::with_categories(settings, category::victoria3())
    }

    /// Create a session indexing only the given categories
    pub fn with_categories(
        settings: Settings,
        categories: Vec<Category>,
    ) -> Result<Self, SessionError> {
        settings.validate()?;
        let absolute = |p: &PathBuf| path::absolute(p).unwrap_or_else(|_| p.clone());
        let roots = Roots::new(
            settings.game_files_path.as_ref().map(absolute),
            settings.paths_to_mod_files.iter().map(absolute).collect(),
        );
        let cache_dir = settings.cache_dir();
        Ok(Session {
            cache: ObjectCache::new(cache_dir.join(CACHE_FILE)),
            fingerprint_path: cache_dir.join(FINGERPRINT_FILE),
            settings,
            roots,
            categories,
            loaded: None,
            indexes: IndexMap::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// A loader over the categories of this session
    pub fn loader(&self) -> ParallelLoader<'_> {
        ParallelLoader::new(&self.categories, &self.roots, self.settings.file_override_policy)
            .with_threads(self.settings.loader_threads)
    }

    /// The current fingerprints of the roots, under this session's policy
    fn fingerprints(&self) -> Fingerprints {
        Fingerprints::compute(
            &self.roots,
            &self.categories,
            self.settings.file_override_policy,
        )
    }

    /// Load the indexes from the cache if it is still valid. If only some
    /// categories changed under the mods since, those are rescanned on top
    /// of the cache. Otherwise every root is scanned and the cache rewritten.
    pub fn load(&mut self, progress: &(dyn Fn(&str) + Sync)) -> Result<LoadOutcome, SessionError> {
        let current = self.fingerprints();
        let stored = match Fingerprints::read(&self.fingerprint_path) {
            Ok(stored) if stored.same_layout(&current) => Some(stored),
            Ok(_) => {
                info!("game path, mod list or override policy changed, rebuilding");
                None
            }
            Err(e) => {
                info!("no usable fingerprints, rebuilding: {}", e);
                None
            }
        };
        let changed_mods: Vec<PathBuf> = match &stored {
            Some(stored) => current
                .changed_since(stored)
                .into_iter()
                .map(Path::to_path_buf)
                .collect(),
            None => self.roots.mods().to_vec(),
        };
        let cached = match stored {
            Some(_) if self.cache.is_stale(&self.categories) => {
                info!(path = %self.cache.path().display(), "cache is stale, rebuilding");
                None
            }
            Some(stored) => match self.cache.read(&self.categories, &self.roots) {
                Ok(indexes) => Some((stored, indexes)),
                Err(e) => {
                    warn!("discarding unreadable cache: {}", e);
                    None
                }
            },
            None => None,
        };
        let Some((stored, indexes)) = cached else {
            let mut outcome = self.scan(current, progress)?;
            outcome.changed_mods = changed_mods;
            return Ok(outcome);
        };
        self.set_indexes(indexes);
        info!(path = %self.cache.path().display(), "loaded indexes from cache");
        let changed = current.changed_categories(&stored);
        let (rescanned, warnings) =
            self.rebuild_categories(|c| changed.iter().any(|n| n == c.name()), progress);
        if !rescanned.is_empty() {
            info!(categories = ?rescanned, "rescanned changed categories");
            self.cache.write(self.indexes.values())?;
        }
        if !changed_mods.is_empty() {
            current.write(&self.fingerprint_path)?;
        }
        self.loaded = Some(current);
        Ok(LoadOutcome {
            source: if rescanned.is_empty() {
                LoadSource::Cache
            } else {
                LoadSource::Incremental
            },
            changed_mods,
            rescanned,
            warnings,
            failures: Vec::new(),
        })
    }

    /// Scan every root regardless of the cache, then rewrite the cache
    pub fn rebuild(
        &mut self,
        progress: &(dyn Fn(&str) + Sync),
    ) -> Result<LoadOutcome, SessionError> {
        let current = self.fingerprints();
        self.scan(current, progress)
    }

    fn scan(
        &mut self,
        fingerprints: Fingerprints,
        progress: &(dyn Fn(&str) + Sync),
    ) -> Result<LoadOutcome, SessionError> {
        let LoadReport {
            indexes,
            warnings,
            failures,
        } = self.loader().load(progress);
        self.set_indexes(indexes);
        self.cache.write(self.indexes.values())?;
        // a failed worker leaves holes, so the next start has to scan again
        if failures.is_empty() {
            fingerprints.write(&self.fingerprint_path)?;
            self.loaded = Some(fingerprints);
        } else {
            self.loaded = None;
        }
        Ok(LoadOutcome {
            source: LoadSource::Scan,
            changed_mods: Vec::new(),
            rescanned: self.categories.iter().map(|c| c.name().to_owned()).collect(),
            warnings,
            failures,
        })
    }

    fn set_indexes(&mut self, indexes: Vec<ObjectIndex>) {
        self.indexes = indexes
            .into_iter()
            .map(|index| (index.name().to_owned(), index))
            .collect();
    }

    /// Rebuild the indexes of the wanted categories in place, returning
    /// their names and every skipped file
    fn rebuild_categories<F: Fn(&Category) -> bool>(
        &mut self,
        wanted: F,
        progress: &(dyn Fn(&str) + Sync),
    ) -> (Vec<String>, Vec<ScanError>) {
        let policy = self.settings.file_override_policy;
        let mut rebuilt = Vec::new();
        let mut warnings = Vec::new();
        for category in &self.categories {
            if !wanted(category) {
                continue;
            }
            let index = self
                .indexes
                .entry(category.name().to_owned())
                .or_insert_with(|| ObjectIndex::new(category.clone(), self.roots.clone()));
            warnings.extend(index.rebuild(policy));
            progress(category.name());
            rebuilt.push(category.name().to_owned());
        }
        (rebuilt, warnings)
    }

    /// Rebuild every category the saved file belongs to and rewrite the
    /// cache. Returns the names of the refreshed categories, empty if the
    /// file is not part of any.
    ///
    /// The stored fingerprints are only brought up to date if nothing but
    /// the refreshed categories changed since the load, so that other
    /// changes still get picked up by the next start.
    pub fn refresh_file<P: AsRef<Path>>(&mut self, file: P) -> Result<Vec<String>, SessionError> {
        let file = file.as_ref();
        let file = path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
        let Some(root) = self.roots.root_of(&file) else {
            return Ok(Vec::new());
        };
        let Ok(relative) = file.strip_prefix(root.path) else {
            return Ok(Vec::new());
        };
        let relative = relative.to_path_buf();
        let (refreshed, _) =
            self.rebuild_categories(|c| c.scanner().matches(&relative), &|_: &str| {});
        if refreshed.is_empty() {
            return Ok(refreshed);
        }
        info!(file = %file.display(), categories = ?refreshed, "refreshed");
        self.cache.write(self.indexes.values())?;
        let current = self.fingerprints();
        let only_refreshed = self.loaded.as_ref().is_some_and(|loaded| {
            loaded.same_layout(&current)
                && current
                    .changed_categories(loaded)
                    .iter()
                    .all(|name| refreshed.contains(name))
        });
        if only_refreshed {
            current.write(&self.fingerprint_path)?;
            self.loaded = Some(current);
        } else {
            info!("other mod files changed since loading, keeping the stored fingerprints");
        }
        Ok(refreshed)
    }

    /// Every loaded index
    pub fn objects(&self) -> impl Iterator<Item = &ObjectIndex> {
        self.indexes.values()
    }

    pub fn get(&self, category: &str) -> Option<&ObjectIndex> {
        self.indexes.get(category)
    }

    /// Every category declaring the key, with the declaration
    pub fn find(&self, key: &str) -> Vec<(&str, &ScriptObject)> {
        self.indexes
            .values()
            .filter_map(|index| index.access(key).map(|obj| (index.name(), obj)))
            .collect()
    }

    /// Whether the file lives under one of the mod roots rather than the game
    pub fn is_in_mod<P: AsRef<Path>>(&self, file: P) -> bool {
        let file = file.as_ref();
        let file = path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
        matches!(self.roots.root_of(file).map(|r| r.kind), Some(RootKind::Mod(_)))
    }
}
