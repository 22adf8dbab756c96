//! Result store
//!
//! One `ResultStore` holds the authoritative, ordered region list of one
//! image. Every mutation takes the store's write lock, so readers never see
//! a half-applied change. Stores are independent: there is no cross-image
//! locking.
//!
//! `ResultRepository` maps image references to stores and mirrors each store
//! into `<dir>/<image_ref>.json`. The in-memory store is authoritative: a
//! failed write is logged and the next successful one catches the file up.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::clean::clean_regions;
use super::types::{DetectedRegion, RegionStatus};
use crate::storage::ImageRef;

/// Result store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Result index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid result file: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk layout of a result file
#[derive(Debug, Default, Serialize, Deserialize)]
struct ResultFile {
    #[serde(default)]
    items: Vec<DetectedRegion>,
}

struct StoreState {
    regions: Vec<DetectedRegion>,
    /// Bumped on every mutation
    generation: u64,
}

/// Authoritative region list for a single image
pub struct ResultStore {
    image_ref: ImageRef,
    state: RwLock<StoreState>,
    /// Last generation written to disk; also serialises writers
    flushed: tokio::sync::Mutex<u64>,
}

impl ResultStore {
    pub fn new(image_ref: ImageRef, regions: Vec<DetectedRegion>) -> Self {
        Self {
            image_ref,
            state: RwLock::new(StoreState {
                regions,
                generation: 0,
            }),
            flushed: tokio::sync::Mutex::new(0),
        }
    }

    pub fn image_ref(&self) -> &ImageRef {
        &self.image_ref
    }

    /// Snapshot of the current list
    pub fn list(&self) -> Vec<DetectedRegion> {
        self.state.read().regions.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the text of the region at `index`
    pub fn rename(&self, index: usize, text: impl Into<String>) -> Result<DetectedRegion, StoreError> {
        let text = text.into();
        self.modify(index, move |region| region.text = text)
    }

    /// Set the soft-delete status of the region at `index`
    pub fn set_status(&self, index: usize, status: RegionStatus) -> Result<DetectedRegion, StoreError> {
        self.modify(index, |region| region.status = status)
    }

    /// Apply an optional rename and an optional status change in one step
    pub fn update(
        &self,
        index: usize,
        text: Option<String>,
        status: Option<RegionStatus>,
    ) -> Result<DetectedRegion, StoreError> {
        self.modify(index, move |region| {
            if let Some(text) = text {
                region.text = text;
            }
            if let Some(status) = status {
                region.status = status;
            }
        })
    }

    /// Resolve overlapping detections and return the full list
    pub fn clean(&self) -> Vec<DetectedRegion> {
        let mut state = self.state.write();
        let removed = clean_regions(&mut state.regions);
        if removed > 0 {
            state.generation += 1;
        }
        tracing::debug!(image_ref = %self.image_ref, removed, "Cleaned overlapping regions");
        state.regions.clone()
    }

    /// Swap in a freshly produced result list
    pub fn replace(&self, regions: Vec<DetectedRegion>) {
        let mut state = self.state.write();
        state.regions = regions;
        state.generation += 1;
    }

    fn modify<F>(&self, index: usize, apply: F) -> Result<DetectedRegion, StoreError>
    where
        F: FnOnce(&mut DetectedRegion),
    {
        let mut state = self.state.write();
        let len = state.regions.len();
        let region = state
            .regions
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })?;
        apply(region);
        let updated = region.clone();
        state.generation += 1;
        Ok(updated)
    }

    fn snapshot(&self) -> (u64, Vec<DetectedRegion>) {
        let state = self.state.read();
        (state.generation, state.regions.clone())
    }
}

// ============================================================================
// Repository
// ============================================================================

/// All result stores, optionally mirrored to disk
#[derive(Clone)]
pub struct ResultRepository {
    inner: Arc<ResultRepositoryInner>,
}

struct ResultRepositoryInner {
    stores: RwLock<HashMap<ImageRef, Arc<ResultStore>>>,
    dir: Option<PathBuf>,
}

impl ResultRepository {
    /// Repository without persistence
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(ResultRepositoryInner {
                stores: RwLock::new(HashMap::new()),
                dir: None,
            }),
        }
    }

    /// Open a repository backed by `dir`, loading every existing result file
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut stores = HashMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let image_ref = ImageRef::new(stem);

            let raw = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<ResultFile>(&raw) {
                Ok(file) => {
                    stores.insert(
                        image_ref.clone(),
                        Arc::new(ResultStore::new(image_ref, file.items)),
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable result file");
                }
            }
        }

        tracing::info!(count = stores.len(), dir = %dir.display(), "Loaded result stores");

        Ok(Self {
            inner: Arc::new(ResultRepositoryInner {
                stores: RwLock::new(stores),
                dir: Some(dir),
            }),
        })
    }

    /// Store for an image, if results exist
    pub fn get(&self, image_ref: &ImageRef) -> Option<Arc<ResultStore>> {
        self.inner.stores.read().get(image_ref).cloned()
    }

    /// Store for an image, created empty when missing
    pub fn get_or_create(&self, image_ref: &ImageRef) -> Arc<ResultStore> {
        if let Some(store) = self.get(image_ref) {
            return store;
        }
        let mut stores = self.inner.stores.write();
        stores
            .entry(image_ref.clone())
            .or_insert_with(|| Arc::new(ResultStore::new(image_ref.clone(), Vec::new())))
            .clone()
    }

    /// Image references that have a result store, sorted
    pub fn image_refs(&self) -> Vec<ImageRef> {
        let mut refs: Vec<ImageRef> = self.inner.stores.read().keys().cloned().collect();
        refs.sort();
        refs
    }

    /// Current list for an image (empty when no results exist yet)
    pub fn list(&self, image_ref: &ImageRef) -> Vec<DetectedRegion> {
        self.get(image_ref).map(|s| s.list()).unwrap_or_default()
    }

    pub async fn rename(
        &self,
        image_ref: &ImageRef,
        index: usize,
        text: impl Into<String>,
    ) -> Result<DetectedRegion, StoreError> {
        let store = self.existing(image_ref, index)?;
        let updated = store.rename(index, text)?;
        self.write_through(&store).await;
        Ok(updated)
    }

    pub async fn set_status(
        &self,
        image_ref: &ImageRef,
        index: usize,
        status: RegionStatus,
    ) -> Result<DetectedRegion, StoreError> {
        let store = self.existing(image_ref, index)?;
        let updated = store.set_status(index, status)?;
        self.write_through(&store).await;
        Ok(updated)
    }

    /// Rename and/or change status under a single lock, with one write
    pub async fn update(
        &self,
        image_ref: &ImageRef,
        index: usize,
        text: Option<String>,
        status: Option<RegionStatus>,
    ) -> Result<DetectedRegion, StoreError> {
        let store = self.existing(image_ref, index)?;
        let updated = store.update(index, text, status)?;
        self.write_through(&store).await;
        Ok(updated)
    }

    pub async fn clean(&self, image_ref: &ImageRef) -> Result<Vec<DetectedRegion>, StoreError> {
        let Some(store) = self.get(image_ref) else {
            return Ok(Vec::new());
        };
        let regions = store.clean();
        self.write_through(&store).await;
        Ok(regions)
    }

    /// Replace an image's results and write them through to disk
    pub async fn commit(&self, image_ref: &ImageRef, regions: Vec<DetectedRegion>) {
        let store = self.get_or_create(image_ref);
        store.replace(regions);
        self.write_through(&store).await;
    }

    async fn write_through(&self, store: &ResultStore) {
        if let Err(e) = self.persist(store).await {
            tracing::warn!(
                image_ref = %store.image_ref(),
                error = %e,
                "Failed to write result file; keeping in-memory results"
            );
        }
    }

    /// Write the latest snapshot of a store to disk
    ///
    /// A snapshot older than the last one written is skipped, so concurrent
    /// callers can never roll the file back.
    pub async fn persist(&self, store: &ResultStore) -> Result<(), StoreError> {
        let Some(dir) = &self.inner.dir else {
            return Ok(());
        };

        let mut flushed = store.flushed.lock().await;
        let (generation, regions) = store.snapshot();
        if generation <= *flushed && generation != 0 {
            return Ok(());
        }

        let body = serde_json::to_vec(&ResultFile { items: regions })?;
        let path = dir.join(format!("{}.json", store.image_ref()));
        let tmp = dir.join(format!("{}.json.tmp", store.image_ref()));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        *flushed = generation;
        Ok(())
    }

    fn existing(&self, image_ref: &ImageRef, index: usize) -> Result<Arc<ResultStore>, StoreError> {
        self.get(image_ref)
            .ok_or(StoreError::IndexOutOfRange { index, len: 0 })
    }
}
