//! Image storage
//!
//! The OCR worker and the HTTP layer only see the `ImageStore` trait.

mod local;
mod types;

use async_trait::async_trait;

pub use local::LocalImageStore;
pub use types::{ImageInfo, ImageRef, StorageError, StoredImage};

/// Storage collaborator for uploaded images
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store an upload; identical bytes resolve to the existing image
    async fn put(&self, filename: &str, data: &[u8]) -> Result<StoredImage, StorageError>;

    /// Raw bytes of an image
    async fn fetch_image(&self, image_ref: &ImageRef) -> Result<Vec<u8>, StorageError>;

    /// All stored images, oldest first
    async fn list_images(&self) -> Result<Vec<ImageInfo>, StorageError>;

    /// Metadata of one image, `None` when unknown
    async fn info(&self, image_ref: &ImageRef) -> Result<Option<ImageInfo>, StorageError>;

    /// Image whose content hash matches
    async fn find_by_hash(&self, sha256: &str) -> Result<Option<ImageInfo>, StorageError>;
}

#[cfg(test)]
pub(crate) use local::tests::png_bytes;
