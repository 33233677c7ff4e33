//! Fair rotation of attached media resources
//!
//! The pool draws uniformly from catalog entries not yet used, marks the
//! pick used and persists the used set before handing it out. Once every
//! entry has been used the set is cleared and rotation starts over, so the
//! pool never reports exhaustion while the catalog is non-empty.

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::store;
use crate::types::MediaRef;

/// Image extensions accepted by default for directory catalogs
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Where the set of available media comes from
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// Regular files in a directory whose extension is in `extensions`
    Directory {
        path: PathBuf,
        extensions: Vec<String>,
    },
    /// A fixed list of identifiers
    Static(Vec<String>),
}

impl CatalogSource {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        CatalogSource::Directory {
            path: path.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn resolve(&self, id: &str) -> Option<PathBuf> {
        match self {
            CatalogSource::Directory { path, .. } => Some(path.join(id)),
            CatalogSource::Static(_) => None,
        }
    }
}

pub struct MediaPool {
    source: CatalogSource,
    usage_path: PathBuf,
    used: BTreeSet<String>,
    rng: StdRng,
}

impl MediaPool {
    /// Load the used set from `usage_path`, falling back to empty on any
    /// read problem.
    pub fn load(source: CatalogSource, usage_path: impl Into<PathBuf>) -> Self {
        Self::load_with_rng(source, usage_path, StdRng::from_entropy())
    }

    /// Like [`MediaPool::load`] with an explicit random source
    pub fn load_with_rng(
        source: CatalogSource,
        usage_path: impl Into<PathBuf>,
        rng: StdRng,
    ) -> Self {
        let usage_path = usage_path.into();
        let used = match store::read_document::<Vec<String>>(&usage_path) {
            Ok(Some(list)) => list.into_iter().collect(),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                warn!(path = %usage_path.display(), error = %e, "Unreadable media usage, starting empty");
                BTreeSet::new()
            }
        };

        Self {
            source,
            usage_path,
            used,
            rng,
        }
    }

    /// Enumerate the catalog.
    ///
    /// A missing catalog directory is created and treated as empty; any other
    /// listing failure is logged and also treated as empty.
    pub fn list_catalog(&self) -> BTreeSet<String> {
        match &self.source {
            CatalogSource::Static(ids) => ids.iter().cloned().collect(),
            CatalogSource::Directory { path, extensions } => list_directory(path, extensions),
        }
    }

    /// Draw one unused resource, marking and persisting it before returning.
    ///
    /// Returns `Ok(None)` when the catalog is empty. If the write fails the
    /// mark is undone and the error returned.
    pub fn draw_unused(&mut self) -> Result<Option<MediaRef>, StorageError> {
        self.draw_preferred(None)
    }

    /// Draw `hint` when its file name is in the catalog, otherwise behave
    /// like [`MediaPool::draw_unused`]. A hinted entry is handed out even if
    /// it was already used in this rotation.
    pub fn draw_preferred(&mut self, hint: Option<&str>) -> Result<Option<MediaRef>, StorageError> {
        let catalog = self.list_catalog();
        if catalog.is_empty() {
            debug!("Media catalog is empty, drawing nothing");
            return Ok(None);
        }

        let before = self.used.clone();

        // Entries removed from the catalog no longer count as used
        self.used.retain(|id| catalog.contains(id));

        let hinted = hint
            .map(|h| h.rsplit(['/', '\\']).next().unwrap_or(h))
            .filter(|name| catalog.contains(*name));

        let mut pick = match hinted {
            Some(name) => Some(name.to_string()),
            None => catalog
                .iter()
                .filter(|id| !self.used.contains(*id))
                .choose(&mut self.rng)
                .cloned(),
        };

        if pick.is_none() {
            info!(catalog_size = catalog.len(), "All media used, resetting rotation");
            self.used.clear();
            pick = catalog.iter().choose(&mut self.rng).cloned();
        }

        let Some(id) = pick else {
            return Ok(None);
        };

        self.used.insert(id.clone());
        if let Err(e) = self.flush() {
            self.used = before;
            return Err(e);
        }

        debug!(media = %id, used = self.used.len(), "Drew media");
        Ok(Some(MediaRef {
            path: self.source.resolve(&id),
            id,
        }))
    }

    /// Identifiers currently marked used
    pub fn used(&self) -> &BTreeSet<String> {
        &self.used
    }

    /// Clear the used set and persist
    pub fn reset(&mut self) -> Result<(), StorageError> {
        let before = std::mem::take(&mut self.used);
        if let Err(e) = self.flush() {
            self.used = before;
            return Err(e);
        }
        Ok(())
    }

    pub fn usage_path(&self) -> &Path {
        &self.usage_path
    }

    fn flush(&self) -> Result<(), StorageError> {
        let list: Vec<&String> = self.used.iter().collect();
        store::write_document(&self.usage_path, &list)
    }
}

fn list_directory(path: &Path, extensions: &[String]) -> BTreeSet<String> {
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path) {
            warn!(path = %path.display(), error = %e, "Could not create media directory");
        } else {
            info!(path = %path.display(), "Created empty media directory");
        }
        return BTreeSet::new();
    }

    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not list media directory");
            return BTreeSet::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| has_extension(name, extensions))
        .collect()
}

fn has_extension(name: &str, extensions: &[String]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
