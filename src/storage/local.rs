//! Local filesystem image store
//!
//! Images are written to `<root>/<image_ref>_<filename>`. The index is rebuilt
//! from the directory on open, so uploads survive a restart.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use super::types::{ImageInfo, ImageRef, StorageError, StoredImage};
use super::ImageStore;

/// Image store rooted at a local directory
pub struct LocalImageStore {
    root: PathBuf,
    index: RwLock<HashMap<ImageRef, ImageInfo>>,
}

impl LocalImageStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        let mut index = HashMap::new();
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let key = entry.file_name().to_string_lossy().to_string();
            let Some((id, filename)) = key.split_once('_') else {
                continue;
            };
            let image_ref = ImageRef::new(id);
            if !image_ref.is_safe() {
                continue;
            }

            let data = tokio::fs::read(entry.path()).await?;
            let uploaded_at = entry
                .metadata()
                .await?
                .modified()
                .map(chrono::DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let mut info = describe(image_ref.clone(), filename, &data);
            info.uploaded_at = uploaded_at;
            index.insert(image_ref, info);
        }

        tracing::info!(count = index.len(), root = %root.display(), "Opened image store");

        Ok(Self {
            root,
            index: RwLock::new(index),
        })
    }

    fn path_for(&self, info: &ImageInfo) -> PathBuf {
        self.root.join(format!("{}_{}", info.image_ref, info.filename))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, filename: &str, data: &[u8]) -> Result<StoredImage, StorageError> {
        if data.is_empty() {
            return Err(StorageError::EmptyUpload(filename.to_string()));
        }

        let filename = sanitize_filename(filename);
        let info = describe(ImageRef::generate(), &filename, data);

        if info.width.is_none() {
            return Err(StorageError::InvalidImage(filename));
        }

        if let Some(existing) = self.find_by_hash(&info.sha256).await? {
            tracing::info!(
                image_ref = %existing.image_ref,
                filename = %filename,
                "Upload matches stored image"
            );
            return Ok(StoredImage {
                info: existing,
                is_duplicate: true,
            });
        }

        tokio::fs::write(self.path_for(&info), data).await?;
        self.index.write().insert(info.image_ref.clone(), info.clone());

        tracing::info!(
            image_ref = %info.image_ref,
            filename = %info.filename,
            size = info.size,
            "Stored image"
        );

        Ok(StoredImage {
            info,
            is_duplicate: false,
        })
    }

    async fn fetch_image(&self, image_ref: &ImageRef) -> Result<Vec<u8>, StorageError> {
        let info = self
            .info(image_ref)
            .await?
            .ok_or_else(|| StorageError::NotFound(image_ref.to_string()))?;

        match tokio::fs::read(self.path_for(&info)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(image_ref.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>, StorageError> {
        let mut images: Vec<ImageInfo> = self.index.read().values().cloned().collect();
        images.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.image_ref.cmp(&b.image_ref))
        });
        Ok(images)
    }

    async fn info(&self, image_ref: &ImageRef) -> Result<Option<ImageInfo>, StorageError> {
        Ok(self.index.read().get(image_ref).cloned())
    }

    async fn find_by_hash(&self, sha256: &str) -> Result<Option<ImageInfo>, StorageError> {
        Ok(self
            .index
            .read()
            .values()
            .find(|info| info.sha256 == sha256)
            .cloned())
    }
}

/// Build metadata for a blob, probing its dimensions
fn describe(image_ref: ImageRef, filename: &str, data: &[u8]) -> ImageInfo {
    let dimensions = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    ImageInfo {
        image_ref,
        filename: filename.to_string(),
        size: data.len() as u64,
        sha256: hex::encode(Sha256::digest(data)),
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
        uploaded_at: Utc::now(),
    }
}

/// Keep only the final path component and drop characters unsafe on disk
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    if cleaned.trim().is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A 2x3 PNG
    pub(crate) fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 3, image::Rgb([255, 0, 0]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[tokio::test]
    async fn test_put_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::open(dir.path()).await.unwrap();
        let data = png_bytes();

        let stored = store.put("scan.png", &data).await.unwrap();
        assert!(!stored.is_duplicate);
        assert_eq!(stored.info.filename, "scan.png");
        assert_eq!(stored.info.width, Some(2));
        assert_eq!(stored.info.height, Some(3));

        let fetched = store.fetch_image(&stored.info.image_ref).await.unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn test_duplicate_upload_returns_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::open(dir.path()).await.unwrap();
        let data = png_bytes();

        let first = store.put("a.png", &data).await.unwrap();
        let second = store.put("b.png", &data).await.unwrap();

        assert!(second.is_duplicate);
        assert_eq!(second.info.image_ref, first.info.image_ref);
        assert_eq!(store.list_images().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_empty_and_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::open(dir.path()).await.unwrap();

        assert!(matches!(
            store.put("empty.png", &[]).await,
            Err(StorageError::EmptyUpload(_))
        ));
        assert!(matches!(
            store.put("notes.txt", b"hello").await,
            Err(StorageError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let image_ref = {
            let store = LocalImageStore::open(dir.path()).await.unwrap();
            store.put("page_1.png", &png_bytes()).await.unwrap().info.image_ref
        };

        let store = LocalImageStore::open(dir.path()).await.unwrap();
        let info = store.info(&image_ref).await.unwrap().unwrap();
        assert_eq!(info.filename, "page_1.png");
        assert!(store.info(&ImageRef::from("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::open(dir.path()).await.unwrap();
        let err = store.fetch_image(&ImageRef::from("nope")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\scans\\a?.png"), "a.png");
        assert_eq!(sanitize_filename("  "), "image");
    }
}
