use std::{
    any::Any,
    path,
    sync::OnceLock,
    thread,
    time::Instant,
};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use super::{balance, Bin};
use crate::{
    index::{Category, ObjectIndex, OverridePolicy, Roots},
    script::{ScanError, Scanner},
};

/// How many workers are used when nothing else is configured
pub const DEFAULT_THREADS: usize = 6;

/// A worker that did not finish its batch
#[derive(Debug, Clone)]
pub struct WorkerFailure {
    /// The position of the batch in the plan
    pub batch: usize,
    /// The categories of the batch that came back empty
    pub categories: Vec<String>,
    pub message: String,
}

/// Everything a load produced
#[derive(Debug, Default)]
pub struct LoadReport {
    /// One index per category, in the order the categories were given
    pub indexes: Vec<ObjectIndex>,
    pub warnings: Vec<ScanError>,
    pub failures: Vec<WorkerFailure>,
}

/// Builds the indexes of many categories at once, one OS thread per batch of
/// categories.
///
/// Every category gets its own write-once slot. The slots are only read
/// after every worker was joined.
#[derive(Debug)]
pub struct ParallelLoader<'a> {
    categories: &'a [Category],
    roots: &'a Roots,
    policy: OverridePolicy,
    threads: usize,
}

impl<'a> ParallelLoader<'a> {
    pub fn new(categories: &'a [Category], roots: &'a Roots, policy: OverridePolicy) -> Self {
        ParallelLoader {
            categories,
            roots,
            policy,
            threads: DEFAULT_THREADS,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// The number of files each category would scan, across every root, at
    /// least one. Each root is walked once.
    pub fn weights(&self) -> Vec<usize> {
        let scanners: Vec<Scanner> = self.categories.iter().map(Category::scanner).collect();
        let mut weights = vec![0; self.categories.len()];
        for root in self.roots.fold_order() {
            let Ok(base) = path::absolute(root.path) else {
                continue;
            };
            for entry in WalkDir::new(&base)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let Ok(relative) = entry.path().strip_prefix(&base) else {
                    continue;
                };
                for (weight, scanner) in weights.iter_mut().zip(&scanners) {
                    if scanner.matches(relative) {
                        *weight += 1;
                    }
                }
            }
        }
        weights.into_iter().map(|w| w.max(1)).collect()
    }

    /// Split the categories into balanced batches of category positions
    pub fn plan(&self) -> Vec<Bin<usize>> {
        let weighted = self.weights().into_iter().enumerate().collect();
        balance(weighted, self.threads)
    }

    /// The plan, with category names instead of positions
    pub fn named_plan(&self) -> Vec<Bin<&'a str>> {
        let categories = self.categories;
        self.plan()
            .into_iter()
            .map(|bin| bin.map(|i| categories[i].name()))
            .collect()
    }

    /// Build every category. `progress` is called with the category name
    /// every time an index is finished.
    pub fn load(&self, progress: &(dyn Fn(&str) + Sync)) -> LoadReport {
        let roots = self.roots;
        let policy = self.policy;
        self.load_with(
            |category| ObjectIndex::build(category.clone(), roots.clone(), policy),
            progress,
        )
    }

    fn load_with<F>(&self, build: F, progress: &(dyn Fn(&str) + Sync)) -> LoadReport
    where
        F: Fn(&Category) -> (ObjectIndex, Vec<ScanError>) + Sync,
    {
        let start = Instant::now();
        let plan = self.plan();
        let slots: Vec<OnceLock<(ObjectIndex, Vec<ScanError>)>> =
            self.categories.iter().map(|_| OnceLock::new()).collect();
        let mut failures = Vec::new();
        thread::scope(|scope| {
            let mut handles = Vec::new();
            for (batch, bin) in plan.iter().enumerate().filter(|(_, bin)| !bin.is_empty()) {
                let (slots, build) = (&slots, &build);
                let categories = self.categories;
                let worker = thread::Builder::new()
                    .name(format!("loader-{}", batch))
                    .spawn_scoped(scope, move || {
                        for &i in bin.items() {
                            let category = &categories[i];
                            let _ = slots[i].set(build(category));
                            debug!(category = category.name(), "worker finished category");
                            progress(category.name());
                        }
                    });
                handles.push((batch, bin, worker));
            }
            for (batch, bin, worker) in handles {
                let outcome = match worker {
                    Ok(handle) => handle.join().map_err(panic_message),
                    Err(e) => Err(format!("could not spawn worker: {}", e)),
                };
                if let Err(message) = outcome {
                    let categories: Vec<String> = bin
                        .items()
                        .iter()
                        .filter(|i| slots[**i].get().is_none())
                        .map(|i| self.categories[*i].name().to_owned())
                        .collect();
                    error!(batch, ?categories, "loader worker failed: {}", message);
                    failures.push(WorkerFailure {
                        batch,
                        categories,
                        message,
                    });
                }
            }
        });
        let mut report = LoadReport {
            failures,
            ..Default::default()
        };
        for (category, slot) in self.categories.iter().zip(slots) {
            match slot.into_inner() {
                Some((index, warnings)) => {
                    report.indexes.push(index);
                    report.warnings.extend(warnings);
                }
                None => report
                    .indexes
                    .push(ObjectIndex::new(category.clone(), self.roots.clone())),
            }
        }
        info!(
            categories = report.indexes.len(),
            objects = report.indexes.iter().map(ObjectIndex::len).sum::<usize>(),
            warnings = report.warnings.len(),
            "loaded in {:.3} seconds",
            start.elapsed().as_secs_f64()
        );
        report
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{create_dir_all, write},
        path::Path,
        sync::Mutex,
    };

    use tempfile::TempDir;

    use super::*;

    fn write_file(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        create_dir_all(path.parent().unwrap()).unwrap();
        write(path, contents).unwrap();
    }

    fn categories() -> Vec<Category> {
        vec![
            Category::new("buildings", "common/buildings"),
            Category::new("goods", "common/goods"),
            Category::new("laws", "common/laws"),
            Category::new("parties", "common/parties"),
        ]
    }

    fn fixture() -> (TempDir, Roots) {
        let dir = TempDir::new().unwrap();
        let game = dir.path().join("game");
        for i in 0..3 {
            write_file(
                &game,
                &format!("common/buildings/{:02}.txt", i),
                &format!("building_{} = {{\n}}\n", i),
            );
        }
        write_file(&game, "common/goods/00.txt", "grain = {\n}\n");
        write_file(&game, "common/laws/00.txt", "law_x = {\n}\nlaw_y = {\n}\n");
        let roots = Roots::new(Some(game), Vec::new());
        (dir, roots)
    }

    #[test]
    fn test_weights() {
        let (_dir, roots) = fixture();
        let categories = categories();
        let loader = ParallelLoader::new(&categories, &roots, OverridePolicy::Merge);
        assert_eq!(loader.weights(), vec![3, 1, 1, 1]);
        let plan = loader.with_threads(2).named_plan();
        assert_eq!(plan[0].items(), &["buildings"]);
        assert_eq!(plan[1].items(), &["goods", "laws", "parties"]);
    }

    #[test]
    fn test_load_everything() {
        let (_dir, roots) = fixture();
        let categories = categories();
        let seen = Mutex::new(Vec::new());
        let report = ParallelLoader::new(&categories, &roots, OverridePolicy::Merge)
            .with_threads(3)
            .load(&|name: &str| seen.lock().unwrap().push(name.to_owned()));
        assert!(report.failures.is_empty());
        assert_eq!(report.indexes.len(), 4);
        let names: Vec<_> = report.indexes.iter().map(ObjectIndex::name).collect();
        assert_eq!(names, vec!["buildings", "goods", "laws", "parties"]);
        assert_eq!(report.indexes[0].len(), 3);
        assert_eq!(report.indexes[2].len(), 2);
        assert!(report.indexes[3].is_empty());
        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, vec!["buildings", "goods", "laws", "parties"]);
    }

    #[test]
    fn test_worker_panic_is_isolated() {
        let (_dir, roots) = fixture();
        let categories = categories();
        let loader =
            ParallelLoader::new(&categories, &roots, OverridePolicy::Merge).with_threads(2);
        let report = loader.load_with(
            |category| {
                if category.name() == "buildings" {
                    panic!("boom");
                }
                ObjectIndex::build(category.clone(), roots.clone(), OverridePolicy::Merge)
            },
            &|_: &str| {},
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].categories, vec!["buildings"]);
        assert_eq!(report.failures[0].message, "boom");
        assert!(report.indexes[0].is_empty());
        assert_eq!(report.indexes[0].name(), "buildings");
        assert_eq!(report.indexes[2].len(), 2);
    }
}
