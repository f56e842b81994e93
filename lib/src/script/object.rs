use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use indexmap::{map::Values, IndexMap};

/// A declaration found in a script file.
///
/// Identity is the key alone: two objects with the same key compare equal
/// regardless of where they were found. The location (and the optional color
/// literal of color-bearing categories) is payload that gets overwritten when
/// a later source redeclares the key.
#[derive(Debug, Clone)]
pub struct ScriptObject {
    key: String,
    path: PathBuf,
    line: usize,
    color: Option<String>,
}

impl ScriptObject {
    /// Create a new object declared at `line` (1-based) of `path`
    pub fn new<K: Into<String>, P: Into<PathBuf>>(key: K, path: P, line: usize) -> Self {
        ScriptObject {
            key: key.into(),
            path: path.into(),
            line,
            color: None,
        }
    }

    /// Attach a color literal, as found in `named_colors` style declarations
    pub fn with_color<C: Into<String>>(mut self, color: C) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The file the object was last declared in
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Take over the location (and color) of another declaration of the same key
    fn relocate(&mut self, other: ScriptObject) {
        self.path = other.path;
        self.line = other.line;
        self.color = other.color;
    }
}

impl PartialEq for ScriptObject {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ScriptObject {}

impl PartialEq<str> for ScriptObject {
    fn eq(&self, other: &str) -> bool {
        self.key == other
    }
}

impl PartialEq<&str> for ScriptObject {
    fn eq(&self, other: &&str) -> bool {
        self.key == *other
    }
}

impl PartialOrd for ScriptObject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScriptObject {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for ScriptObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// An ordered set of [ScriptObject]s, unique by key.
///
/// Merging another collection into this one overwrites the location of every
/// key that is already present and appends the rest, so whatever is merged
/// last wins.
#[derive(Debug, Clone, Default)]
pub struct ObjectCollection {
    objects: IndexMap<String, ScriptObject>,
}

impl ObjectCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `other` into this collection, `other` taking priority
    pub fn merge(&mut self, other: ObjectCollection) {
        for obj in other.objects.into_values() {
            self.insert(obj);
        }
    }

    /// Insert a single object, overwriting the location of an existing key
    pub fn insert(&mut self, obj: ScriptObject) {
        if let Some(existing) = self.objects.get_mut(obj.key()) {
            existing.relocate(obj);
        } else {
            self.objects.insert(obj.key.clone(), obj);
        }
    }

    pub fn get(&self, key: &str) -> Option<&ScriptObject> {
        self.objects.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Remove the object with the given key, returning it if it was present
    pub fn remove(&mut self, key: &str) -> Option<ScriptObject> {
        self.objects.shift_remove(key)
    }

    /// Keep only the objects matching the predicate
    pub fn retain<F: FnMut(&ScriptObject) -> bool>(&mut self, mut f: F) {
        self.objects.retain(|_, obj| f(obj));
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Sort the objects by key
    pub fn sort(&mut self) {
        self.objects.sort_keys();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Values<'_, String, ScriptObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl FromIterator<ScriptObject> for ObjectCollection {
    fn from_iter<T: IntoIterator<Item = ScriptObject>>(iter: T) -> Self {
        let mut collection = ObjectCollection::new();
        collection.extend(iter);
        collection
    }
}

impl Extend<ScriptObject> for ObjectCollection {
    fn extend<T: IntoIterator<Item = ScriptObject>>(&mut self, iter: T) {
        for obj in iter {
            self.insert(obj);
        }
    }
}

impl<'a> IntoIterator for &'a ObjectCollection {
    type Item = &'a ScriptObject;
    type IntoIter = Values<'a, String, ScriptObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.values()
    }
}

impl IntoIterator for ObjectCollection {
    type Item = ScriptObject;
    type IntoIter = indexmap::map::IntoValues<String, ScriptObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_values()
    }
}
