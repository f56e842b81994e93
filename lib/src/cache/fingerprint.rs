use std::{
    fmt::Write as _,
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, UNIX_EPOCH},
};

use indexmap::{IndexMap, IndexSet};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use super::{write_atomically, CacheError};
use crate::{
    index::{mod_name, Category, OverridePolicy, Roots},
    script::Scanner,
};

/// Extensions of the files whose modification times are fingerprinted
const FINGERPRINTED: [&str; 2] = ["txt", "gui"];

/// Script files under the root, as root relative paths with their
/// modification times
fn script_files(root: &Path) -> impl Iterator<Item = (PathBuf, Duration)> + '_ {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FINGERPRINTED.contains(&ext))
        })
        .filter_map(move |e| {
            let modified = e
                .metadata()
                .ok()?
                .modified()
                .ok()?
                .duration_since(UNIX_EPOCH)
                .ok()?;
            let relative = e.path().strip_prefix(root).ok()?.to_path_buf();
            Some((relative, modified))
        })
}

fn to_hex(hasher: Sha256) -> String {
    hasher.finalize().iter().fold(String::with_capacity(64), |mut hex, byte| {
        let _ = write!(hex, "{:02x}", byte);
        hex
    })
}

/// The digest of the whole root, and one digest per category that has at
/// least one file under it
fn digest_root(root: &Path, scanners: &[(&str, Scanner)]) -> (String, IndexMap<String, String>) {
    let name = mod_name(root);
    let mut whole = Sha256::new();
    let mut per_category: Vec<Option<Sha256>> = scanners.iter().map(|_| None).collect();
    for (relative, modified) in script_files(root) {
        let stamp = format!("{}.{:09}", modified.as_secs(), modified.subsec_nanos());
        whole.update(name.as_bytes());
        whole.update(stamp.as_bytes());
        for ((_, scanner), hasher) in scanners.iter().zip(per_category.iter_mut()) {
            if scanner.matches(&relative) {
                let hasher = hasher.get_or_insert_with(Sha256::new);
                hasher.update(relative.to_string_lossy().as_bytes());
                hasher.update(b"\0");
                hasher.update(stamp.as_bytes());
            }
        }
    }
    let categories = scanners
        .iter()
        .zip(per_category)
        .filter_map(|((name, _), hasher)| Some(((*name).to_owned(), to_hex(hasher?))))
        .collect();
    (to_hex(whole), categories)
}

/// A SHA-256 digest, in lowercase hex, over the modification times of every
/// script file under a mod root
pub fn fingerprint_root<P: AsRef<Path>>(root: P) -> String {
    digest_root(root.as_ref(), &[]).0
}

/// What the indexes were built from: the override policy, the base game,
/// and a fingerprint of every mod root in load order, both whole and per
/// category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprints {
    policy: OverridePolicy,
    base: Option<PathBuf>,
    roots: IndexMap<PathBuf, String>,
    categories: IndexMap<PathBuf, IndexMap<String, String>>,
}

impl Fingerprints {
    /// Fingerprint the current state of the roots
    pub fn compute(roots: &Roots, categories: &[Category], policy: OverridePolicy) -> Self {
        let scanners: Vec<_> = categories.iter().map(|c| (c.name(), c.scanner())).collect();
        let mut prints = Fingerprints {
            policy,
            base: roots.base().map(Path::to_path_buf),
            ..Default::default()
        };
        for root in roots.mods() {
            let (digest, per_category) = digest_root(root, &scanners);
            prints.roots.insert(root.clone(), digest);
            prints.categories.insert(root.clone(), per_category);
        }
        prints
    }

    /// Read fingerprints stored by [Fingerprints::write]
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let contents = fs::read_to_string(path)?;
        let mut prints = Fingerprints::default();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let malformed = || CacheError::MalformedFingerprint(line.to_owned());
            let (tag, rest) = line.split_once(' ').ok_or_else(malformed)?;
            match tag {
                "policy" => prints.policy = OverridePolicy::from_name(rest).ok_or_else(malformed)?,
                "base" => prints.base = Some(PathBuf::from(rest)),
                "root" => {
                    let (digest, root) = rest.split_once(' ').ok_or_else(malformed)?;
                    prints.roots.insert(PathBuf::from(root), digest.to_owned());
                    prints.categories.entry(PathBuf::from(root)).or_default();
                }
                "category" => {
                    let mut parts = rest.splitn(3, ' ');
                    let (Some(digest), Some(name), Some(root)) =
                        (parts.next(), parts.next(), parts.next())
                    else {
                        return Err(malformed());
                    };
                    prints
                        .categories
                        .entry(PathBuf::from(root))
                        .or_default()
                        .insert(name.to_owned(), digest.to_owned());
                }
                _ => return Err(malformed()),
            }
        }
        Ok(prints)
    }

    /// Store the fingerprints. The policy and base come first, then a
    /// `root <digest> <root>` line per mod, each followed by its
    /// `category <digest> <name> <root>` lines.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), CacheError> {
        write_atomically(path.as_ref(), |writer| {
            writeln!(writer, "policy {}", self.policy)?;
            if let Some(base) = &self.base {
                writeln!(writer, "base {}", base.display())?;
            }
            for (root, digest) in &self.roots {
                writeln!(writer, "root {} {}", digest, root.display())?;
                for (name, digest) in self.categories.get(root).into_iter().flatten() {
                    writeln!(writer, "category {} {} {}", digest, name, root.display())?;
                }
            }
            Ok(())
        })
    }

    pub fn policy(&self) -> OverridePolicy {
        self.policy
    }

    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    pub fn get<P: AsRef<Path>>(&self, root: P) -> Option<&str> {
        self.roots.get(root.as_ref()).map(String::as_str)
    }

    /// Whether both describe the same override policy, base game and mod
    /// load order. Indexes built under another layout can't be reused.
    pub fn same_layout(&self, other: &Fingerprints) -> bool {
        self.policy == other.policy
            && self.base == other.base
            && self.roots.keys().eq(other.roots.keys())
    }

    /// The mod roots whose fingerprint differs from, or is missing in, `stored`.
    /// Roots that disappeared since count as changed too.
    pub fn changed_since<'a>(&'a self, stored: &'a Fingerprints) -> Vec<&'a Path> {
        let mut changed: Vec<&Path> = self
            .roots
            .iter()
            .filter(|(root, digest)| stored.roots.get(*root) != Some(*digest))
            .map(|(root, _)| root.as_path())
            .collect();
        changed.extend(
            stored
                .roots
                .keys()
                .filter(|root| !self.roots.contains_key(*root))
                .map(PathBuf::as_path),
        );
        if !changed.is_empty() {
            debug!(changed = changed.len(), "mod roots changed");
        }
        changed
    }

    /// The categories that gained, lost or modified a file under any mod
    /// root since `stored`
    pub fn changed_categories(&self, stored: &Fingerprints) -> Vec<String> {
        let none = IndexMap::new();
        let mut changed = IndexSet::new();
        let all_roots: IndexSet<&PathBuf> =
            self.categories.keys().chain(stored.categories.keys()).collect();
        for root in all_roots {
            let now = self.categories.get(root).unwrap_or(&none);
            let before = stored.categories.get(root).unwrap_or(&none);
            for (name, digest) in now {
                if before.get(name) != Some(digest) {
                    changed.insert(name.clone());
                }
            }
            for name in before.keys() {
                if !now.contains_key(name) {
                    changed.insert(name.clone());
                }
            }
        }
        if !changed.is_empty() {
            debug!(categories = ?changed, "categories changed");
        }
        changed.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{create_dir_all, write, File},
        time::SystemTime,
    };

    use tempfile::TempDir;

    use super::*;

    fn fixture() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("My Mod");
        create_dir_all(root.join("common/buildings")).unwrap();
        create_dir_all(root.join("common/laws")).unwrap();
        write(root.join("common/buildings/01.txt"), "a = {\n}\n").unwrap();
        write(root.join("common/laws/01.txt"), "law_a = {\n}\n").unwrap();
        write(root.join("descriptor.mod"), "name = x").unwrap();
        (dir, root)
    }

    fn categories() -> Vec<Category> {
        vec![
            Category::new("buildings", "common/buildings"),
            Category::new("laws", "common/laws"),
            Category::new("goods", "common/goods"),
        ]
    }

    fn compute(root: &Path) -> Fingerprints {
        let roots = Roots::new(Some("/game"), vec![root.to_path_buf()]);
        Fingerprints::compute(&roots, &categories(), OverridePolicy::Merge)
    }

    fn touch(path: &Path, secs: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_stable() {
        let (_dir, root) = fixture();
        let first = fingerprint_root(&root);
        assert_eq!(first.len(), 64);
        assert_eq!(first, fingerprint_root(&root));
    }

    #[test]
    fn test_mtime_changes_digest() {
        let (_dir, root) = fixture();
        let file = root.join("common/buildings/01.txt");
        touch(&file, 1_000_000);
        let before = fingerprint_root(&root);
        touch(&file, 2_000_000);
        assert_ne!(before, fingerprint_root(&root));
        // files other than script files are ignored
        let again = fingerprint_root(&root);
        touch(&root.join("descriptor.mod"), 3_000_000);
        assert_eq!(again, fingerprint_root(&root));
    }

    #[test]
    fn test_read_write_compare() {
        let (dir, root) = fixture();
        let path = dir.path().join("fingerprints");
        let prints = compute(&root);
        prints.write(&path).unwrap();
        let stored = Fingerprints::read(&path).unwrap();
        assert_eq!(stored, prints);
        assert!(prints.same_layout(&stored));
        assert!(prints.changed_since(&stored).is_empty());
        assert!(prints.changed_categories(&stored).is_empty());
        assert_eq!(stored.get(&root), prints.get(&root));
        assert_eq!(stored.base(), Some(Path::new("/game")));

        let other = dir.path().join("Other");
        create_dir_all(&other).unwrap();
        let roots = Roots::new(Some("/game"), vec![root.clone(), other.clone()]);
        let more = Fingerprints::compute(&roots, &categories(), OverridePolicy::Merge);
        assert_eq!(more.changed_since(&stored), vec![other.as_path()]);
        assert!(!more.same_layout(&stored));
        assert_eq!(Fingerprints::default().changed_since(&stored), vec![root.as_path()]);
    }

    #[test]
    fn test_changed_categories() {
        let (_dir, root) = fixture();
        touch(&root.join("common/buildings/01.txt"), 1_000_000);
        let stored = compute(&root);
        touch(&root.join("common/buildings/01.txt"), 2_000_000);
        assert_eq!(compute(&root).changed_categories(&stored), vec!["buildings"]);

        create_dir_all(root.join("common/goods")).unwrap();
        write(root.join("common/goods/01.txt"), "coal = {\n}\n").unwrap();
        let mut changed = compute(&root).changed_categories(&stored);
        changed.sort();
        assert_eq!(changed, vec!["buildings", "goods"]);
    }

    #[test]
    fn test_layout() {
        let (_dir, root) = fixture();
        let merge = compute(&root);
        let mods = vec![root.clone()];
        let replace = Fingerprints::compute(
            &Roots::new(Some("/game"), mods.clone()),
            &categories(),
            OverridePolicy::Replace,
        );
        assert!(!replace.same_layout(&merge));
        assert_eq!(replace.policy(), OverridePolicy::Replace);
        let moved = Fingerprints::compute(
            &Roots::new(Some("/other/game"), mods),
            &categories(),
            OverridePolicy::Merge,
        );
        assert!(!moved.same_layout(&merge));
        assert!(moved.changed_since(&merge).is_empty());
    }

    #[test]
    fn test_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fingerprints");
        write(&path, "nospace\n").unwrap();
        assert!(matches!(
            Fingerprints::read(&path),
            Err(CacheError::MalformedFingerprint(_))
        ));
        write(&path, "policy sometimes\n").unwrap();
        assert!(Fingerprints::read(&path).is_err());
    }
}
