use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

#[derive(Error, Debug)]
pub enum DataUriError {
    #[error("photo data uri must start with `data:`")]
    MissingScheme,
    #[error("photo data uri must be base64 encoded (`;base64,` marker missing)")]
    NotBase64,
    #[error("photo data uri has no mime type")]
    EmptyMimeType,
    #[error("photo data uri has no image data")]
    EmptyPayload,
    #[error("photo data uri payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Borrowed view over a `data:<mime>;base64,<data>` string.
#[derive(Debug, PartialEq)]
pub struct DataUri<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

impl<'a> DataUri<'a> {
    pub fn parse(uri: &'a str) -> Result<Self, DataUriError> {
        let rest = uri.strip_prefix(SCHEME).ok_or(DataUriError::MissingScheme)?;
        let (mime_type, data) = rest
            .split_once(BASE64_MARKER)
            .ok_or(DataUriError::NotBase64)?;

        if mime_type.trim().is_empty() {
            return Err(DataUriError::EmptyMimeType);
        }
        if data.is_empty() {
            return Err(DataUriError::EmptyPayload);
        }
        STANDARD.decode(data)?;

        Ok(Self { mime_type, data })
    }
}
