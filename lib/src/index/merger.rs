use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use tracing::debug;

use super::{OverridePolicy, Roots};
use crate::script::{ObjectCollection, ScanError, Scanner};

/// The outcome of folding every root of one category
#[derive(Debug, Default)]
pub struct MergeOutput {
    pub objects: ObjectCollection,
    /// Skipped files and roots, across every root
    pub warnings: Vec<ScanError>,
    /// How many files were scanned in total
    pub files: usize,
}

/// Scan every root in fold order and merge the results, later roots taking
/// priority.
///
/// Under [OverridePolicy::Replace] a file of a later root removes every
/// object an earlier root declared in a file with the same root relative
/// path, before the later file's objects are merged in.
pub fn merge_roots(scanner: &Scanner, roots: &Roots, policy: OverridePolicy) -> MergeOutput {
    let mut output = MergeOutput::default();
    // absolute file path -> path relative to its root
    let mut origins: HashMap<PathBuf, PathBuf> = HashMap::new();
    for root in roots.fold_order() {
        let scanned = scanner.scan(root.path);
        output.warnings.extend(scanned.warnings);
        output.files += scanned.files.len();
        if policy == OverridePolicy::Replace && !output.objects.is_empty() {
            let replaced: HashSet<&PathBuf> = scanned.files.iter().collect();
            let before = output.objects.len();
            output.objects.retain(|obj| {
                origins
                    .get(obj.path())
                    .map_or(true, |relative| !replaced.contains(relative))
            });
            let removed = before - output.objects.len();
            if removed > 0 {
                debug!(root = %root.path.display(), removed, "replaced overridden files");
            }
        }
        for relative in &scanned.files {
            origins.insert(scanned.root.join(relative), relative.clone());
        }
        output.objects.merge(scanned.objects);
    }
    output
}
