//! Temp-file staging for uploaded images.
//!
//! Each in-flight request owns exactly one staged file. Uniqueness comes
//! from the temp-file mechanism, not from naming convention, so concurrent
//! requests can never collide.

use std::io::Write;
use std::path::Path;

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::error::CaptionError;

/// Uploaded-filename extensions we trust enough to carry onto the staged
/// file name as a format hint. Anything else gets a neutral suffix.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

/// An uploaded image written to a uniquely named temporary file.
///
/// The file is removed when the guard drops, so every exit path out of a
/// request handler, including panic unwinds, releases it.
pub struct StagedImage {
    file: Option<NamedTempFile>,
}

impl StagedImage {
    /// Writes `bytes` to a fresh temp file. The uploaded filename's
    /// extension is untrusted input: it becomes the suffix only when it
    /// matches the allow-list.
    pub fn stage(bytes: &[u8], filename: Option<&str>) -> Result<Self, CaptionError> {
        let suffix = format!(".{}", image_extension(filename));
        let mut file = Builder::new()
            .prefix("caption-upload-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|err| CaptionError::ImagePipeline(err.into()))?;
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|err| CaptionError::ImagePipeline(err.into()))?;
        debug!(path = %file.path().display(), size = bytes.len(), "staged uploaded image");
        Ok(Self { file: Some(file) })
    }

    pub fn path(&self) -> &Path {
        self.file
            .as_ref()
            .expect("staged file present until drop")
            .path()
    }
}

impl Drop for StagedImage {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            match file.close() {
                Ok(()) => debug!(path = %path.display(), "removed staged image"),
                Err(err) => warn!(path = %path.display(), %err, "failed to remove staged image"),
            }
        }
    }
}

fn image_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_paths_are_unique() {
        let a = StagedImage::stage(b"one", Some("cat.png")).unwrap();
        let b = StagedImage::stage(b"two", Some("cat.png")).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn staged_file_holds_the_uploaded_bytes() {
        let staged = StagedImage::stage(b"pixel soup", Some("cat.jpg")).unwrap();
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"pixel soup");
    }

    #[test]
    fn drop_removes_the_staged_file() {
        let path = {
            let staged = StagedImage::stage(b"bytes", Some("dog.jpg")).unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn extension_comes_from_the_allow_list() {
        assert_eq!(image_extension(Some("photo.JPG")), "jpg");
        assert_eq!(image_extension(Some("weird.name.png")), "png");
        assert_eq!(image_extension(Some("archive.tar.gz")), "bin");
        assert_eq!(image_extension(Some("../../etc/passwd")), "bin");
        assert_eq!(image_extension(Some("noextension")), "bin");
        assert_eq!(image_extension(None), "bin");
    }

    #[test]
    fn unlisted_extension_falls_back_to_neutral_suffix() {
        let staged = StagedImage::stage(b"x", Some("script.sh")).unwrap();
        assert!(staged.path().extension().is_some_and(|ext| ext == "bin"));
    }
}
