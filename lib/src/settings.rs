use std::{
    env, error,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::{
    index::{OverridePolicy, Roots},
    loader::DEFAULT_THREADS,
};

/// The name of the directory the cache lives in, under the platform cache
/// directory
const CACHE_DIR_NAME: &str = "victools";

/// An error that occured while loading the settings
#[derive(Debug, From, Display)]
pub enum SettingsError {
    /// The settings file could not be read
    IoError(io::Error),
    /// The settings file is not valid JSON
    JsonError(serde_json::Error),
    /// A value is out of range or points nowhere
    #[display("invalid setting {_0}: {_1}")]
    InvalidValue(&'static str, String),
}

impl error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::JsonError(err) => Some(err),
            Self::InvalidValue(_, _) => None,
        }
    }
}

/// User configuration, stored as JSON. Unknown keys are ignored so that a
/// full editor settings file can be pointed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    /// The `game` directory of the Victoria 3 installation
    #[serde(default)]
    pub game_files_path: Option<PathBuf>,
    /// Mod directories, in load order
    #[serde(default)]
    pub paths_to_mod_files: Vec<PathBuf>,
    #[serde(default)]
    pub file_override_policy: OverridePolicy,
    #[serde(default = "default_threads")]
    pub loader_threads: usize,
    /// Where the object cache and the fingerprints are kept
    #[serde(default)]
    pub cache_directory: Option<PathBuf>,
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            game_files_path: None,
            paths_to_mod_files: Vec::new(),
            file_override_policy: OverridePolicy::default(),
            loader_threads: DEFAULT_THREADS,
            cache_directory: None,
        }
    }
}

impl Settings {
    /// Read the settings from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Check that the settings can be used to build an index
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.loader_threads == 0 {
            return Err(SettingsError::InvalidValue(
                "LoaderThreads",
                "must be at least 1".to_owned(),
            ));
        }
        if let Some(game) = &self.game_files_path {
            if !game.is_dir() {
                return Err(SettingsError::InvalidValue(
                    "GameFilesPath",
                    format!("{} is not a directory", game.display()),
                ));
            }
        }
        if self.game_files_path.is_none() && self.paths_to_mod_files.is_empty() {
            return Err(SettingsError::InvalidValue(
                "GameFilesPath",
                "neither a game path nor any mod paths are configured".to_owned(),
            ));
        }
        Ok(())
    }

    /// The search roots described by the settings
    pub fn roots(&self) -> Roots {
        Roots::new(
            self.game_files_path.clone(),
            self.paths_to_mod_files.clone(),
        )
    }

    /// The configured cache directory, or `victools` under the platform
    /// cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_directory.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(env::temp_dir)
                .join(CACHE_DIR_NAME)
        })
    }
}
