//! Edit reconciliation
//!
//! The server's region list can change underneath the reviewer at any time
//! (a job finishes, another editor removes a region, a clean runs). Indices
//! seen earlier are therefore never trusted. Every edit runs the same
//! protocol:
//!
//! 1. read the latest list
//! 2. locate the target by its geometry-derived identity
//! 3. mutate at the index found now, or adopt the fresh list and stop
//! 4. re-read and adopt the server's list
//!
//! A miss in step 2 (or a `NotFound` in step 3) is an expected outcome and is
//! reported as [`EditOutcome::Stale`]. Transport failures are returned to the
//! caller and leave the local view and undo stack as they were.
//!
//! Two regions with identical geometry share one identity; edits then apply
//! to the first of them in list order.

use std::collections::VecDeque;
use std::sync::Arc;

use super::api::{ClientError, ReviewApi};
use crate::config::ClientConfig;
use crate::results::{self, DetectedRegion, Point, RegionIdentity, RegionStatus};
use crate::storage::ImageRef;

/// A reversible removal
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub image_ref: ImageRef,
    pub identity: RegionIdentity,
    pub previous_status: RegionStatus,
}

/// LIFO stack that forgets its oldest entries past `capacity`
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: UndoEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&UndoEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Outcome of a rename or remove
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Applied(DetectedRegion),
    /// Target no longer present; the fresh list was adopted instead
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UndoOutcome {
    Restored(DetectedRegion),
    Stale,
    /// Nothing to undo
    Empty,
    /// Entry belonged to another image and was dropped
    OtherImage,
}

enum Mutation {
    Rename(String),
    SetStatus(RegionStatus),
}

/// Committed mutation
struct Committed {
    region: DetectedRegion,
    previous_status: RegionStatus,
}

/// Client-side editor for the regions of one open image
pub struct EditReconciler {
    api: Arc<dyn ReviewApi>,
    image_ref: Option<ImageRef>,
    view: Vec<DetectedRegion>,
    undo: UndoStack,
}

impl EditReconciler {
    pub fn new(api: Arc<dyn ReviewApi>, undo_capacity: usize) -> Self {
        Self {
            api,
            image_ref: None,
            view: Vec::new(),
            undo: UndoStack::new(undo_capacity),
        }
    }

    /// Undo depth from `CLIENT_UNDO_CAPACITY`
    pub fn from_config(api: Arc<dyn ReviewApi>, config: &ClientConfig) -> Self {
        Self::new(api, config.undo_capacity)
    }

    /// Make `image_ref` the active image and load its regions
    pub async fn open(&mut self, image_ref: ImageRef) -> Result<&[DetectedRegion], ClientError> {
        let regions = self.api.list_results(&image_ref).await?;
        self.image_ref = Some(image_ref);
        self.view = regions;
        Ok(&self.view)
    }

    pub async fn refresh(&mut self) -> Result<&[DetectedRegion], ClientError> {
        let image_ref = self.active()?;
        self.view = self.api.list_results(&image_ref).await?;
        Ok(&self.view)
    }

    /// Locally adopted list; may lag behind the server
    pub fn view(&self) -> &[DetectedRegion] {
        &self.view
    }

    pub fn active_image(&self) -> Option<&ImageRef> {
        self.image_ref.as_ref()
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    /// Region of the local view under `point`
    pub fn hit(&self, point: Point) -> Option<&DetectedRegion> {
        results::hit(point, &self.view).and_then(|i| self.view.get(i))
    }

    pub async fn rename(
        &mut self,
        target: RegionIdentity,
        text: &str,
    ) -> Result<EditOutcome, ClientError> {
        let image_ref = self.active()?;
        match self
            .locate_and_mutate(&image_ref, target, Mutation::Rename(text.to_string()))
            .await?
        {
            Some(committed) => {
                self.reread(&image_ref).await?;
                Ok(EditOutcome::Applied(committed.region))
            }
            None => Ok(EditOutcome::Stale),
        }
    }

    /// Soft-remove a region and record it for undo
    pub async fn remove(&mut self, target: RegionIdentity) -> Result<EditOutcome, ClientError> {
        let image_ref = self.active()?;
        match self
            .locate_and_mutate(&image_ref, target, Mutation::SetStatus(RegionStatus::Removed))
            .await?
        {
            Some(committed) => {
                // removing an already removed region leaves nothing to undo
                if committed.previous_status == RegionStatus::Active {
                    self.undo.push(UndoEntry {
                        image_ref: image_ref.clone(),
                        identity: target,
                        previous_status: committed.previous_status,
                    });
                }
                self.reread(&image_ref).await?;
                Ok(EditOutcome::Applied(committed.region))
            }
            None => Ok(EditOutcome::Stale),
        }
    }

    /// Revert the most recent removal on the active image
    pub async fn undo(&mut self) -> Result<UndoOutcome, ClientError> {
        let Some(entry) = self.undo.pop() else {
            return Ok(UndoOutcome::Empty);
        };
        if self.image_ref.as_ref() != Some(&entry.image_ref) {
            tracing::debug!(image_ref = %entry.image_ref, "Dropping undo entry for inactive image");
            return Ok(UndoOutcome::OtherImage);
        }

        let image_ref = entry.image_ref.clone();
        let mutation = Mutation::SetStatus(entry.previous_status);
        let committed = match self.locate_and_mutate(&image_ref, entry.identity, mutation).await {
            Ok(committed) => committed,
            Err(e) => {
                self.undo.push(entry);
                return Err(e);
            }
        };

        match committed {
            Some(committed) => {
                self.reread(&image_ref).await?;
                Ok(UndoOutcome::Restored(committed.region))
            }
            None => Ok(UndoOutcome::Stale),
        }
    }

    /// Resolve overlaps server-side and adopt the result
    pub async fn clean(&mut self) -> Result<&[DetectedRegion], ClientError> {
        let image_ref = self.active()?;
        self.view = self.api.clean(&image_ref).await?;
        Ok(&self.view)
    }

    fn active(&self) -> Result<ImageRef, ClientError> {
        self.image_ref.clone().ok_or(ClientError::NoActiveImage)
    }

    /// Steps 1-3 of the protocol; `None` means the target is gone and the
    /// fresh list has been adopted
    async fn locate_and_mutate(
        &mut self,
        image_ref: &ImageRef,
        target: RegionIdentity,
        mutation: Mutation,
    ) -> Result<Option<Committed>, ClientError> {
        let latest = self.api.list_results(image_ref).await?;

        let Some(index) = target.locate(&latest) else {
            tracing::debug!(image_ref = %image_ref, identity = %target, "Edit target vanished");
            self.view = latest;
            return Ok(None);
        };
        let previous_status = latest[index].status;

        let result = match mutation {
            Mutation::Rename(text) => self.api.rename(image_ref, index, &text).await,
            Mutation::SetStatus(status) => self.api.set_status(image_ref, index, status).await,
        };

        match result {
            Ok(region) => Ok(Some(Committed {
                region,
                previous_status,
            })),
            Err(ClientError::NotFound(_)) => {
                tracing::debug!(image_ref = %image_ref, index, "Edit target moved during mutation");
                self.reread(image_ref).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn reread(&mut self, image_ref: &ImageRef) -> Result<(), ClientError> {
        self.view = self.api.list_results(image_ref).await?;
        Ok(())
    }
}
