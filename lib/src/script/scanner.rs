use std::{
    collections::HashSet,
    error,
    fs, io,
    path::{self, Path, PathBuf},
    string::FromUtf8Error,
};

use derive_more::Display;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{ObjectCollection, Recognizer, ScriptObject};

/// The byte order mark some of the game files start with
const BOM: char = '\u{feff}';

/// A problem with a single file or root, never fatal to a scan
#[derive(Debug, Display)]
pub enum ScanError {
    /// The root directory does not exist
    #[display("root {} does not exist", _0.display())]
    MissingRoot(PathBuf),
    /// Walking the directory tree failed somewhere
    #[display("error while walking the directory tree: {_0}")]
    Walk(walkdir::Error),
    /// The file could not be read
    #[display("could not read {}: {}", path.display(), source)]
    Io { path: PathBuf, source: io::Error },
    /// The file is not valid UTF-8
    #[display("{} is not valid UTF-8: {}", path.display(), source)]
    Decode {
        path: PathBuf,
        source: FromUtf8Error,
    },
}

impl error::Error for ScanError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ScanError::Walk(e) => Some(e),
            ScanError::Io { source, .. } => Some(source),
            ScanError::Decode { source, .. } => Some(source),
            ScanError::MissingRoot(_) => None,
        }
    }
}

/// The result of scanning one root
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// The absolute root the relative paths are based on
    pub root: PathBuf,
    /// Everything declared in the scanned files
    pub objects: ObjectCollection,
    /// Paths, relative to the root, of every file that was scanned
    pub files: Vec<PathBuf>,
    /// Files and directories that had to be skipped
    pub warnings: Vec<ScanError>,
}

/// Walks a root directory and collects the declarations of one category.
///
/// A file is scanned when its parent directory, relative to the root,
/// contains the sub-path as whole components and its extension matches.
/// Files that cannot be read or decoded are skipped with a warning.
#[derive(Debug, Clone)]
pub struct Scanner {
    sub_path: String,
    extension: String,
    ignored: HashSet<String>,
    included: HashSet<String>,
    recognizer: Recognizer,
}

impl Scanner {
    /// Create a scanner for files with `extension` (without the dot) under
    /// any directory containing `sub_path`
    pub fn new<S: AsRef<str>>(sub_path: S, extension: S, recognizer: Recognizer) -> Self {
        Scanner {
            sub_path: normalize(sub_path.as_ref()),
            extension: extension.as_ref().trim_start_matches('.').to_owned(),
            ignored: HashSet::new(),
            included: HashSet::new(),
            recognizer,
        }
    }

    /// File names that should never be scanned
    pub fn ignoring<I: IntoIterator<Item = S>, S: Into<String>>(mut self, files: I) -> Self {
        self.ignored.extend(files.into_iter().map(Into::into));
        self
    }

    /// If not empty, only files with these names are scanned
    pub fn including<I: IntoIterator<Item = S>, S: Into<String>>(mut self, files: I) -> Self {
        self.included.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn recognizer(&self) -> &Recognizer {
        &self.recognizer
    }

    /// Whether the file at this root relative path belongs to the category
    pub fn matches<P: AsRef<Path>>(&self, relative: P) -> bool {
        let relative = relative.as_ref();
        if relative.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
            return false;
        }
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.ignored.contains(name) {
            return false;
        }
        if !self.included.is_empty() && !self.included.contains(name) {
            return false;
        }
        relative
            .parent()
            .map(|parent| {
                contains_components(&normalize(&parent.to_string_lossy()), &self.sub_path)
            })
            .unwrap_or(false)
    }

    /// Scan every matching file under the root
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> ScanOutput {
        let mut output = ScanOutput::default();
        let root = root.as_ref();
        if !root.is_dir() {
            warn!(root = %root.display(), "skipping missing root");
            output.warnings.push(ScanError::MissingRoot(root.to_path_buf()));
            return output;
        }
        let root = path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        let files: Vec<_> = self.walk(&root, &mut output.warnings).collect();
        output.root = root;
        for (path, relative) in files {
            match self.scan_file(&path) {
                Ok(objects) => {
                    debug!(file = %path.display(), found = objects.len(), "scanned");
                    output.objects.merge(objects);
                    output.files.push(relative);
                }
                Err(e) => {
                    warn!("skipping file: {}", e);
                    output.warnings.push(e);
                }
            }
        }
        output
    }

    /// Matching files under the root, as absolute and root relative paths
    fn walk<'a>(
        &'a self,
        root: &'a Path,
        warnings: &'a mut Vec<ScanError>,
    ) -> impl Iterator<Item = (PathBuf, PathBuf)> + 'a {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("{}", e);
                    warnings.push(ScanError::Walk(e));
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let relative = entry.path().strip_prefix(root).ok()?.to_path_buf();
                if self.matches(&relative) {
                    Some((entry.into_path(), relative))
                } else {
                    None
                }
            })
    }

    /// Scan a single file
    pub fn scan_file<P: AsRef<Path>>(&self, path: P) -> Result<ObjectCollection, ScanError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let contents = String::from_utf8(bytes).map_err(|source| ScanError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.scan_str(&contents, path))
    }

    /// Scan already decoded file contents, attributing declarations to `path`
    pub fn scan_str<P: AsRef<Path>>(&self, contents: &str, path: P) -> ObjectCollection {
        let path = path.as_ref();
        let contents = contents.strip_prefix(BOM).unwrap_or(contents);
        let mut objects = ObjectCollection::new();
        for (i, line) in contents.lines().enumerate() {
            if let Some(declaration) = self.recognizer.recognize(line) {
                let mut obj = ScriptObject::new(declaration.key, path, i + 1);
                if let Some(color) = declaration.color {
                    obj = obj.with_color(color);
                }
                objects.insert(obj);
            }
        }
        objects
    }
}

/// Forward slashes, no leading or trailing separators
fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_owned()
}

/// Whether `needle` appears in `haystack` as a run of whole path components
fn contains_components(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack: Vec<&str> = haystack.split('/').collect();
    let needle: Vec<&str> = needle.split('/').collect();
    haystack.windows(needle.len()).any(|window| window == needle.as_slice())
}
