//! Map short filenames to where they live under the configured roots.
//!
//! The filename is compared literally against directory entries. Nothing is
//! globbed or handed to a shell.

use std::{
    cell::RefCell,
    collections::HashMap,
    ffi::OsStr,
    path::{self, Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::WalkDir;

pub trait PathResolver {
    /// Every path under the roots whose final component is `filename`.
    /// Misses and search errors both yield an empty list.
    fn resolve(&self, filename: &str) -> Vec<PathBuf>;
}

/// Walks each root on every call. Roots are made absolute up front, so every
/// path it returns is absolute.
#[derive(Debug, Clone)]
pub struct WalkResolver {
    roots: Vec<PathBuf>,
}

impl WalkResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let roots = roots
            .into_iter()
            .filter_map(|root| match path::absolute(&root) {
                Ok(abs) => {
                    if !abs.is_dir() {
                        warn!(root = %abs.display(), "search root is not a directory");
                    }
                    Some(abs)
                }
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping search root");
                    None
                }
            })
            .collect();
        Self { roots }
    }

    fn search_root(root: &Path, name: &OsStr, found: &mut Vec<PathBuf>) {
        for entry in WalkDir::new(root).follow_links(false) {
            match entry {
                Ok(entry) if entry.depth() > 0 && entry.file_name() == name => {
                    found.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => debug!(root = %root.display(), error = %e, "skipping unreadable entry"),
            }
        }
    }
}

impl PathResolver for WalkResolver {
    fn resolve(&self, filename: &str) -> Vec<PathBuf> {
        if filename.is_empty() || filename.contains('/') {
            return Vec::new();
        }

        let name = OsStr::new(filename);
        let mut found = Vec::new();
        for root in &self.roots {
            Self::search_root(root, name, &mut found);
        }
        found.sort();
        found.dedup();
        found
    }
}

/// Remembers answers for the life of the run. Used by the live view, which
/// re-resolves the same handful of files on every redraw.
pub struct CachedResolver<R> {
    inner: R,
    cache: RefCell<HashMap<String, Vec<PathBuf>>>,
}

impl<R: PathResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

impl<R: PathResolver> PathResolver for CachedResolver<R> {
    fn resolve(&self, filename: &str) -> Vec<PathBuf> {
        if let Some(hit) = self.cache.borrow().get(filename) {
            return hit.clone();
        }
        let paths = self.inner.resolve(filename);
        self.cache
            .borrow_mut()
            .insert(filename.to_string(), paths.clone());
        paths
    }
}
