use crate::{config::UploadConfig, model::Notice};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const IMAGE_FIELD: &str = "image";
const SOURCE_FIELD: &str = "source";

/// How the file reached the form. Both paths share validation and submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadSource {
    #[default]
    Picker,
    Drop,
}

#[derive(Error, Debug, PartialEq)]
pub enum UploadError {
    #[error("Please select an image file to upload.")]
    NoImage,
    #[error("Please select an image smaller than {}MB.", .limit / (1024 * 1024))]
    TooLarge { limit: usize },
    #[error("Please select a JPG, PNG, WEBP, or GIF image.")]
    InvalidType(String),
    #[error("Failed to read the image file.")]
    Read(String),
}

impl UploadError {
    pub fn title(&self) -> &'static str {
        match self {
            UploadError::NoImage => "No image selected",
            UploadError::TooLarge { .. } => "File too large",
            UploadError::InvalidType(_) => "Invalid file type",
            UploadError::Read(_) => "Error Reading File",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::NoImage | UploadError::Read(_) => StatusCode::BAD_REQUEST,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::InvalidType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            UploadError::NoImage => "no_image",
            UploadError::TooLarge { .. } => "too_large",
            UploadError::InvalidType(_) => "invalid_type",
            UploadError::Read(_) => "read",
        }
    }

    pub fn notice(&self) -> Notice {
        Notice::error(self.title(), self.to_string())
    }

    pub fn from_multipart(err: MultipartError, limit: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge { limit }
        } else {
            UploadError::Read(err.body_text())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub source: UploadSource,
}

impl ImageUpload {
    /// Size is checked before type, empty payloads count as no selection.
    pub fn validate(&self, config: &UploadConfig) -> Result<(), UploadError> {
        if self.bytes.is_empty() {
            return Err(UploadError::NoImage);
        }
        if self.bytes.len() > config.max_bytes {
            return Err(UploadError::TooLarge {
                limit: config.max_bytes,
            });
        }
        if !config
            .allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&self.content_type))
        {
            return Err(UploadError::InvalidType(self.content_type.clone()));
        }
        Ok(())
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type.to_ascii_lowercase(),
            STANDARD.encode(&self.bytes)
        )
    }

    /// Reads the `image` file field and the optional `source` field.
    pub async fn from_multipart(
        mut multipart: Multipart,
        config: &UploadConfig,
    ) -> Result<Self, UploadError> {
        let mut upload: Option<ImageUpload> = None;
        let mut source = UploadSource::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::from_multipart(e, config.max_bytes))?
        {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some(IMAGE_FIELD) => {
                    let file_name = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| UploadError::from_multipart(e, config.max_bytes))?;
                    upload = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                        source: UploadSource::default(),
                    });
                }
                Some(SOURCE_FIELD) => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| UploadError::from_multipart(e, config.max_bytes))?;
                    source = match text.trim() {
                        "drop" => UploadSource::Drop,
                        _ => UploadSource::Picker,
                    };
                }
                _ => {}
            }
        }

        let mut upload = upload.ok_or(UploadError::NoImage)?;
        upload.source = source;
        upload.validate(config)?;

        Ok(upload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: "photo".to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from(vec![7u8; len]),
            source: UploadSource::Picker,
        }
    }

    #[test]
    fn test_accepts_allowed_types_up_to_limit() {
        let config = UploadConfig::default();
        for content_type in ["image/jpeg", "image/png", "image/webp", "image/gif"] {
            assert_eq!(upload(content_type, config.max_bytes).validate(&config), Ok(()));
        }
    }

    #[test]
    fn test_rejects_oversized_file() {
        let config = UploadConfig::default();
        let err = upload("image/png", config.max_bytes + 1)
            .validate(&config)
            .unwrap_err();

        assert_eq!(err, UploadError::TooLarge { limit: config.max_bytes });
        assert_eq!(err.to_string(), "Please select an image smaller than 5MB.");
        assert_eq!(err.title(), "File too large");
    }

    #[test]
    fn test_rejects_other_types() {
        let config = UploadConfig::default();
        for content_type in ["image/bmp", "image/svg+xml", "application/pdf", ""] {
            let err = upload(content_type, 10).validate(&config).unwrap_err();
            assert!(matches!(err, UploadError::InvalidType(_)));
        }
    }

    #[test]
    fn test_size_is_checked_before_type() {
        let config = UploadConfig::default();
        let err = upload("application/pdf", config.max_bytes + 1)
            .validate(&config)
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { .. }));
    }

    #[test]
    fn test_empty_file_counts_as_no_selection() {
        let config = UploadConfig::default();
        assert_eq!(
            upload("image/png", 0).validate(&config),
            Err(UploadError::NoImage)
        );
    }

    #[test]
    fn test_data_uri() {
        let upload = ImageUpload {
            file_name: "red.png".to_string(),
            content_type: "image/PNG".to_string(),
            bytes: Bytes::from_static(b"\x89PNG"),
            source: UploadSource::Drop,
        };
        assert_eq!(upload.to_data_uri(), "data:image/png;base64,iVBORw==");
    }
}
