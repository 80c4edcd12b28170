use crate::{AppError, AppResult};
use logicleap_sdk::ImagePart;
use std::path::Path;

const INVALID_TYPE_MESSAGE: &str = "Invalid file type. Only images are supported.";
const EMPTY_DATA_MESSAGE: &str = "Failed to read file data. The file might be empty or corrupted.";

/// An image attached to a submission, already base64-encoded for inline
/// transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    mime_type: String,
    data: String,
    byte_len: usize,
    file_name: Option<String>,
}

impl ImageAttachment {
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> AppResult<Self> {
        if !mime_type.starts_with("image/") {
            return Err(AppError::Attachment(INVALID_TYPE_MESSAGE.to_string()));
        }
        if bytes.is_empty() {
            return Err(AppError::Attachment(EMPTY_DATA_MESSAGE.to_string()));
        }

        let part = ImagePart::from_bytes(bytes, mime_type);
        Ok(Self {
            mime_type: part.mime_type,
            data: part.image_data,
            byte_len: bytes.len(),
            file_name: None,
        })
    }

    /// Read an image file. The MIME type comes from the file extension.
    pub async fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let mime_type = mime_type_for_path(path)
            .ok_or_else(|| AppError::Attachment(INVALID_TYPE_MESSAGE.to_string()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Attachment(format!("File could not be read: {e}")))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "image attached");

        let mut attachment = Self::from_bytes(&bytes, mime_type)?;
        attachment.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(attachment)
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    #[must_use]
    pub fn into_part(self) -> ImagePart {
        ImagePart::new(self.data, self.mime_type)
    }
}

/// MIME type for common image extensions. `None` for anything else.
#[must_use]
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => return None,
    };
    Some(mime_type)
}
