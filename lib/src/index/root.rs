use std::path::{Path, PathBuf};

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// What a root directory holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// The game's own files
    Base,
    /// A mod, with its place in the load order
    Mod(usize),
}

/// A directory that gets searched for script files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRoot<'a> {
    pub path: &'a Path,
    pub kind: RootKind,
}

/// How files of a later root interact with identically named files of the
/// roots folded before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverridePolicy {
    /// Only redeclared keys are overwritten, everything else stays
    #[default]
    #[display("merge")]
    Merge,
    /// A file with the same root relative path fully supersedes the earlier one
    #[display("replace")]
    Replace,
}

impl OverridePolicy {
    /// The policy with the given lowercase name, as printed by `Display`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "merge" => Some(OverridePolicy::Merge),
            "replace" => Some(OverridePolicy::Replace),
            _ => None,
        }
    }
}

/// The base game directory and the mod directories in load order.
///
/// Roots are folded in increasing priority: the base game first, then the
/// mods in the order they were configured, so a later mod wins over an
/// earlier one and every mod wins over the base game.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roots {
    base: Option<PathBuf>,
    mods: Vec<PathBuf>,
}

impl Roots {
    pub fn new<P: Into<PathBuf>>(base: Option<P>, mods: Vec<PathBuf>) -> Self {
        Roots {
            base: base.map(Into::into),
            mods,
        }
    }

    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// The mod directories in load order
    pub fn mods(&self) -> &[PathBuf] {
        &self.mods
    }

    /// Every root, lowest priority first
    pub fn fold_order(&self) -> impl Iterator<Item = SearchRoot<'_>> {
        self.base
            .iter()
            .map(|path| SearchRoot {
                path,
                kind: RootKind::Base,
            })
            .chain(self.mods.iter().enumerate().map(|(i, path)| SearchRoot {
                path,
                kind: RootKind::Mod(i),
            }))
    }

    /// The root the given file lives under, the highest priority one if
    /// roots are nested
    pub fn root_of<P: AsRef<Path>>(&self, file: P) -> Option<SearchRoot<'_>> {
        let file = file.as_ref();
        self.fold_order()
            .filter(|root| file.starts_with(root.path))
            .last()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_none() && self.mods.is_empty()
    }
}

/// The name of a mod, the last component of its directory
pub fn mod_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .components()
        .last()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}
