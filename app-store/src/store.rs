// app-store/src/store.rs
use common::{read_metadata, Sku};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use crate::packaging::{self, PackageError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Can't find store source directory: {0}")]
    MissingSource(PathBuf),

    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Package(#[from] PackageError),
}

/// One catalog entry and the source directory it is packaged from
#[derive(Debug, Clone)]
struct Listing {
    sku: Sku,
    source: PathBuf,
}

#[derive(Default)]
struct Snapshot {
    listings: Vec<Listing>,
    loaded_at: Option<SystemTime>,
}

/// Application sources, their packaged archives and the catalog built from them
pub struct Store {
    source_dir: PathBuf,
    deploy_dir: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl Store {
    pub fn new(source_dir: impl Into<PathBuf>, deploy_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            deploy_dir: deploy_dir.into(),
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Require the sources and start from an empty deploy directory
    pub fn prepare(&self) -> Result<(), StoreError> {
        if !self.source_dir.is_dir() {
            return Err(StoreError::MissingSource(self.source_dir.clone()));
        }
        match fs::remove_dir_all(&self.deploy_dir) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.deploy_dir.clone(),
                    source,
                })
            },
        }
        fs::create_dir_all(&self.deploy_dir).map_err(|source| StoreError::Io {
            path: self.deploy_dir.clone(),
            source,
        })
    }

    /// Re-read every `<source>/<app>/metadata.js` and repackage every app.
    /// Apps with unreadable metadata are left out.
    pub fn reload(&self) -> Result<usize, StoreError> {
        let started = SystemTime::now();
        let entries = fs::read_dir(&self.source_dir).map_err(|source| StoreError::Io {
            path: self.source_dir.clone(),
            source,
        })?;

        let mut listings = Vec::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let context = entry.file_name().to_string_lossy().into_owned();
            let meta = match read_metadata(&dir) {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!("Unable to load app: {} ({}).", context, e);
                    continue;
                },
            };

            listings.push(Listing {
                sku: Sku {
                    xrn: meta.xrn,
                    name: meta.name,
                    description: meta.description,
                    version: meta.version,
                    date: meta.date,
                    author: meta.author,
                    context: Some(context),
                    download_url: None,
                    is_installed: false,
                },
                source: dir,
            });
        }
        listings.sort_by(|a, b| a.sku.xrn.cmp(&b.sku.xrn));

        for listing in &listings {
            tracing::info!(" - Packaging {}.", listing.sku.name);
            packaging::zip_dir(&listing.source, &self.archive_path(&listing.sku.xrn))?;
        }

        let count = listings.len();
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.listings = listings;
        snapshot.loaded_at = Some(started);
        Ok(count)
    }

    /// Reload when anything under the source directory changed since the last load
    pub fn reload_if_changed(&self) -> Result<bool, StoreError> {
        let loaded_at = self.snapshot.read().unwrap_or_else(PoisonError::into_inner).loaded_at;
        let latest = packaging::latest_change(&self.source_dir)?;
        if loaded_at.map_or(true, |at| latest > at) {
            tracing::info!("Monitor: '{}' has been updated, and should be re-packaged.", self.source_dir.display());
            self.reload()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn archive_path(&self, xrn: &str) -> PathBuf {
        self.deploy_dir.join(format!("{}.zip", xrn))
    }

    /// Catalog with download links pointing back at `host`
    pub fn catalog(&self, host: &str) -> Vec<Sku> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listings
            .iter()
            .map(|listing| Sku {
                download_url: Some(format!("http://{}/download/{}.zip", host, listing.sku.xrn)),
                ..listing.sku.clone()
            })
            .collect()
    }

    /// Packaged archive by file name, if it exists
    pub fn download(&self, file: &str) -> Option<PathBuf> {
        if file.is_empty() || file.contains(['/', '\\']) || file.starts_with('.') {
            return None;
        }
        let path = self.deploy_dir.join(file);
        path.is_file().then_some(path)
    }
}
