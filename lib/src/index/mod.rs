use std::{fmt, path::Path};

use tracing::info;

use crate::script::{ObjectCollection, ScanError, ScriptObject};

/// Search roots and load order
mod root;
pub use root::{mod_name, OverridePolicy, RootKind, Roots, SearchRoot};

/// The category table
pub mod category;
pub use category::Category;

/// Folding several roots into one collection
mod merger;
pub use merger::{merge_roots, MergeOutput};

/// Every declaration of one category, merged across the base game and the
/// configured mods.
///
/// The index remembers what it was built from so that it can be rebuilt
/// in place when a file of the category changes.
#[derive(Debug, Clone)]
pub struct ObjectIndex {
    category: Category,
    roots: Roots,
    objects: ObjectCollection,
}

impl ObjectIndex {
    /// Create an empty index
    pub fn new(category: Category, roots: Roots) -> Self {
        ObjectIndex {
            category,
            roots,
            objects: ObjectCollection::new(),
        }
    }

    /// Create an index from objects that were already collected, for example
    /// read back from the cache
    pub fn with_objects(category: Category, roots: Roots, objects: ObjectCollection) -> Self {
        ObjectIndex {
            category,
            roots,
            objects,
        }
    }

    /// Scan every root and build the index, returning the warnings
    /// encountered on the way
    pub fn build(
        category: Category,
        roots: Roots,
        policy: OverridePolicy,
    ) -> (Self, Vec<ScanError>) {
        let mut index = ObjectIndex::new(category, roots);
        let warnings = index.rebuild(policy);
        (index, warnings)
    }

    /// Throw away the current objects and scan the roots again
    pub fn rebuild(&mut self, policy: OverridePolicy) -> Vec<ScanError> {
        let output = merge_roots(&self.category.scanner(), &self.roots, policy);
        info!(
            category = self.category.name(),
            objects = output.objects.len(),
            files = output.files,
            "indexed category"
        );
        self.objects = output.objects;
        output.warnings
    }

    pub fn name(&self) -> &str {
        self.category.name()
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    pub fn objects(&self) -> &ObjectCollection {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains(key)
    }

    /// Every key, in index order
    pub fn keys(&self) -> Vec<&str> {
        self.objects.keys().collect()
    }

    /// The object declared under the given key
    pub fn access(&self, key: &str) -> Option<&ScriptObject> {
        self.objects.get(key)
    }

    /// Whether the given file lives under one of the mod roots
    pub fn is_in_mod<P: AsRef<Path>>(&self, path: P) -> bool {
        matches!(
            self.roots.root_of(path).map(|r| r.kind),
            Some(RootKind::Mod(_))
        )
    }

    pub fn sort(&mut self) {
        self.objects.sort();
    }

    /// Add an object, overwriting the location of an existing key
    pub fn add(&mut self, obj: ScriptObject) {
        self.objects.insert(obj);
    }

    pub fn remove(&mut self, key: &str) -> Option<ScriptObject> {
        self.objects.remove(key)
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptObject> {
        self.objects.iter()
    }
}

impl<'a> IntoIterator for &'a ObjectIndex {
    type Item = &'a ScriptObject;
    type IntoIter = indexmap::map::Values<'a, String, ScriptObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

impl fmt::Display for ObjectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for obj in &self.objects {
            writeln!(
                f,
                "Key: {} -- File: {} -- Line: {}",
                obj.key(),
                obj.path().display(),
                obj.line()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{create_dir_all, write},
        path::PathBuf,
    };

    use tempfile::TempDir;

    use super::*;

    fn write_file(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        create_dir_all(path.parent().unwrap()).unwrap();
        write(path, contents).unwrap();
    }

    /// Base game V and one mod M, M redeclaring building_x next to a nested
    /// field and an excluded block
    fn scenario() -> (TempDir, ObjectIndex) {
        let dir = TempDir::new().unwrap();
        let v = dir.path().join("V");
        let m = dir.path().join("M");
        write_file(
            &v,
            "common/buildings/01_x.txt",
            "building_x = {\n}\nbuilding_y = {\n}\n",
        );
        write_file(
            &m,
            "common/buildings/01_x.txt",
            "building_x = {\n    icon = \"gfx/x.dds\"\n}\nsome_excluded_key = {\n}\n",
        );
        let (index, warnings) = ObjectIndex::build(
            Category::new("buildings", "common/buildings").excluding(["some_excluded_key"]),
            Roots::new(Some(v), vec![m]),
            OverridePolicy::Merge,
        );
        assert!(warnings.is_empty());
        (dir, index)
    }

    #[test]
    fn test_mod_overrides_base() {
        let (dir, index) = scenario();
        assert_eq!(index.keys(), vec!["building_x", "building_y"]);
        assert!(!index.contains("icon"));
        assert!(!index.contains("some_excluded_key"));
        let x = index.access("building_x").unwrap();
        assert_eq!(x.path(), dir.path().join("M/common/buildings/01_x.txt"));
        assert_eq!(x.line(), 1);
        assert!(index.is_in_mod(x.path()));
        let y = index.access("building_y").unwrap();
        assert_eq!(y.path(), dir.path().join("V/common/buildings/01_x.txt"));
        assert_eq!(y.line(), 3);
        assert!(!index.is_in_mod(y.path()));
    }

    #[test]
    fn test_utility_operations() {
        let (_dir, mut index) = scenario();
        index.add(ScriptObject::new("building_a", "/elsewhere.txt", 3));
        assert_eq!(index.keys(), vec!["building_x", "building_y", "building_a"]);
        index.sort();
        assert_eq!(index.keys(), vec!["building_a", "building_x", "building_y"]);
        assert!(index.remove("building_a").is_some());
        assert!(!index.contains("building_a"));
        assert!(index.access("nope").is_none());
        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_rebuild_picks_up_changes() {
        let (dir, mut index) = scenario();
        write_file(
            &dir.path().join("M"),
            "common/buildings/02_new.txt",
            "building_new = {\n}\n",
        );
        assert!(!index.contains("building_new"));
        index.rebuild(OverridePolicy::Merge);
        assert!(index.contains("building_new"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_display() {
        let index = ObjectIndex::with_objects(
            Category::new("buildings", "common/buildings"),
            Roots::default(),
            vec![ScriptObject::new("building_x", PathBuf::from("/m/01_x.txt"), 4)]
                .into_iter()
                .collect(),
        );
        assert_eq!(
            index.to_string(),
            "Key: building_x -- File: /m/01_x.txt -- Line: 4\n"
        );
    }
}
