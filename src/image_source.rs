//! Locally chosen images and their revocable preview handles.
//!
//! An [`ImageSource`] is a cheap, clonable reference to the bytes the user
//! picked. Previews are opened through a [`PreviewRegistry`], which counts
//! live handles so that superseded previews can be shown to be released.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use imagesize::ImageType;

use crate::geometry::Dimensions;

#[derive(Debug)]
struct ImageBlob {
    bytes: Vec<u8>,
    dimensions: Option<Dimensions>,
    content_type: &'static str,
}

/// An image selected for upload.
#[derive(Clone, Debug)]
pub struct ImageSource {
    file_name: String,
    blob: Arc<ImageBlob>,
}

impl ImageSource {
    /// Wraps in-memory image bytes.
    ///
    /// The original dimensions and content type are sniffed from the bytes.
    /// An unrecognised format is still accepted; it just has no known size,
    /// which leaves pixel-space boxes unmappable.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let dimensions = match imagesize::blob_size(&bytes) {
            Ok(size) => Some(Dimensions::new(size.width as f64, size.height as f64)),
            Err(err) => {
                log::warn!("could not read dimensions of '{}': {}", file_name, err);
                None
            }
        };
        let content_type = imagesize::image_type(&bytes)
            .map(content_type_for)
            .unwrap_or("application/octet-stream");

        Self {
            file_name,
            blob: Arc::new(ImageBlob {
                bytes,
                dimensions,
                content_type,
            }),
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.blob.bytes
    }

    pub fn content_type(&self) -> &'static str {
        self.blob.content_type
    }

    /// Decoded size of the original image, if the format was recognised.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.blob.dimensions
    }

    /// True if both sources share the same underlying bytes.
    pub fn same_blob(&self, other: &ImageSource) -> bool {
        Arc::ptr_eq(&self.blob, &other.blob)
    }
}

fn content_type_for(kind: ImageType) -> &'static str {
    match kind {
        ImageType::Jpeg => "image/jpeg",
        ImageType::Png => "image/png",
        ImageType::Gif => "image/gif",
        ImageType::Bmp => "image/bmp",
        ImageType::Webp => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live: AtomicUsize,
}

/// Issues preview handles and tracks how many are still open.
#[derive(Clone, Debug, Default)]
pub struct PreviewRegistry {
    inner: Arc<RegistryInner>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, source: &ImageSource) -> PreviewHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.live.fetch_add(1, Ordering::AcqRel);
        PreviewHandle {
            id,
            source: Some(source.clone()),
            registry: Arc::clone(&self.inner),
        }
    }

    /// Number of previews opened and not yet revoked.
    pub fn live_count(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }
}

/// A displayable preview of an [`ImageSource`].
///
/// Revoking releases the handle's reference to the image bytes. Dropping an
/// unrevoked handle revokes it.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    source: Option<ImageSource>,
    registry: Arc<RegistryInner>,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The previewed image, or `None` once revoked.
    pub fn source(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    pub fn is_revoked(&self) -> bool {
        self.source.is_none()
    }

    /// Releases the preview. Calling it again does nothing.
    pub fn revoke(&mut self) {
        if self.source.take().is_some() {
            self.registry.live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.revoke();
    }
}
