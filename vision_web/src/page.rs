use crate::{
    config::UploadConfig,
    model::ClassificationResult,
    upload::{ImageUpload, UploadError, UploadSource},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PageError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// A validated file staged in the upload form.
#[derive(Debug, Clone)]
pub struct Selection {
    pub upload: ImageUpload,
    pub preview_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionView {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub source: UploadSource,
    pub preview_url: String,
}

impl From<&Selection> for SelectionView {
    fn from(selection: &Selection) -> Self {
        Self {
            file_name: selection.upload.file_name.clone(),
            content_type: selection.upload.content_type.clone(),
            size: selection.upload.bytes.len(),
            source: selection.upload.source,
            preview_url: selection.preview_url.clone(),
        }
    }
}

/// Idle → Loading → Result | Error → Idle.
///
/// Result and error live in different variants, so at most one of them is
/// ever present.
#[derive(Debug, Clone)]
pub enum PageState {
    Idle {
        selection: Option<Selection>,
    },
    Loading {
        preview_url: String,
    },
    Result {
        result: ClassificationResult,
        preview_url: String,
    },
    Error {
        message: String,
    },
}

impl Default for PageState {
    fn default() -> Self {
        Self::new()
    }
}

impl PageState {
    pub fn new() -> Self {
        PageState::Idle { selection: None }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageState::Idle { .. } => "idle",
            PageState::Loading { .. } => "loading",
            PageState::Result { .. } => "result",
            PageState::Error { .. } => "error",
        }
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            PageState::Result { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PageState::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn preview_url(&self) -> Option<&str> {
        match self {
            PageState::Idle {
                selection: Some(selection),
            } => Some(&selection.preview_url),
            PageState::Loading { preview_url } | PageState::Result { preview_url, .. } => {
                Some(preview_url)
            }
            _ => None,
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            PageState::Idle { selection } => selection.as_ref(),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PageState::Loading { .. })
    }

    fn invalid(&self, action: &'static str) -> PageError {
        PageError::InvalidTransition {
            action,
            state: self.name(),
        }
    }

    /// Stages a file in the form. Rejected files leave the state untouched.
    pub fn select(
        &mut self,
        upload: ImageUpload,
        config: &UploadConfig,
    ) -> Result<&Selection, PageError> {
        let PageState::Idle { selection } = self else {
            return Err(self.invalid("select an image"));
        };

        upload.validate(config)?;
        let preview_url = upload.to_data_uri();
        Ok(selection.insert(Selection {
            upload,
            preview_url,
        }))
    }

    pub fn clear_selection(&mut self) -> Result<(), PageError> {
        match self {
            PageState::Idle { selection } => {
                *selection = None;
                Ok(())
            }
            _ => Err(self.invalid("clear the selection")),
        }
    }

    /// Idle → Loading. Returns the encoded image to submit.
    pub fn begin(&mut self) -> Result<String, PageError> {
        let PageState::Idle { selection } = self else {
            return Err(self.invalid("submit"));
        };
        let selection = selection.take().ok_or(UploadError::NoImage)?;

        let photo_data_uri = selection.preview_url;
        *self = PageState::Loading {
            preview_url: photo_data_uri.clone(),
        };
        Ok(photo_data_uri)
    }

    /// Loading → Result or Error.
    pub fn complete(
        &mut self,
        outcome: Result<ClassificationResult, String>,
    ) -> Result<(), PageError> {
        let PageState::Loading { preview_url } = self else {
            return Err(self.invalid("complete a classification"));
        };

        *self = match outcome {
            Ok(result) => PageState::Result {
                result,
                preview_url: std::mem::take(preview_url),
            },
            Err(message) => PageState::Error { message },
        };
        Ok(())
    }

    /// "Scan again": back to an empty form from any state.
    pub fn scan_again(&mut self) {
        *self = PageState::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn png(len: usize) -> ImageUpload {
        ImageUpload {
            file_name: "red.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: Bytes::from(vec![1u8; len]),
            source: UploadSource::Picker,
        }
    }

    fn result() -> ClassificationResult {
        ClassificationResult {
            labels: vec![],
            description: "A red square.".to_string(),
        }
    }

    fn assert_initial(state: &PageState) {
        assert_eq!(state.name(), "idle");
        assert!(state.result().is_none());
        assert!(state.error().is_none());
        assert!(state.preview_url().is_none());
        assert!(state.selection().is_none());
    }

    #[test]
    fn test_happy_path() {
        let config = UploadConfig::default();
        let mut state = PageState::new();

        let preview = state.select(png(3), &config).unwrap().preview_url.clone();
        let submitted = state.begin().unwrap();
        assert_eq!(submitted, preview);
        assert!(state.is_loading());
        assert_eq!(state.preview_url(), Some(preview.as_str()));

        state.complete(Ok(result())).unwrap();
        assert_eq!(state.name(), "result");
        assert!(state.result().is_some());
        assert!(state.error().is_none());
        assert_eq!(state.preview_url(), Some(preview.as_str()));
    }

    #[test]
    fn test_failure_path() {
        let mut state = PageState::new();
        state.select(png(3), &UploadConfig::default()).unwrap();
        state.begin().unwrap();

        state.complete(Err("Model returned no output".to_string())).unwrap();
        assert_eq!(state.error(), Some("Model returned no output"));
        assert!(state.result().is_none());
    }

    #[test]
    fn test_rejected_upload_keeps_state() {
        let config = UploadConfig::default();
        let mut state = PageState::new();

        let err = state.select(png(config.max_bytes + 1), &config).unwrap_err();
        assert!(matches!(err, PageError::Upload(UploadError::TooLarge { .. })));
        assert_initial(&state);
    }

    #[test]
    fn test_submit_without_selection() {
        let mut state = PageState::new();
        assert_eq!(
            state.begin(),
            Err(PageError::Upload(UploadError::NoImage))
        );
        assert_initial(&state);
    }

    #[test]
    fn test_clear_selection() {
        let mut state = PageState::new();
        state.select(png(3), &UploadConfig::default()).unwrap();
        state.clear_selection().unwrap();
        assert_initial(&state);
    }

    #[test]
    fn test_no_second_submission_while_loading() {
        let mut state = PageState::new();
        state.select(png(3), &UploadConfig::default()).unwrap();
        state.begin().unwrap();

        assert!(matches!(
            state.begin(),
            Err(PageError::InvalidTransition { state: "loading", .. })
        ));
        assert!(state.select(png(3), &UploadConfig::default()).is_err());
    }

    #[test]
    fn test_complete_requires_loading() {
        let mut state = PageState::new();
        assert!(state.complete(Ok(result())).is_err());
        assert_initial(&state);
    }

    #[test]
    fn test_scan_again_from_every_state() {
        let config = UploadConfig::default();

        let mut from_result = PageState::new();
        from_result.select(png(3), &config).unwrap();
        from_result.begin().unwrap();
        from_result.complete(Ok(result())).unwrap();
        from_result.scan_again();
        assert_initial(&from_result);

        let mut from_error = PageState::new();
        from_error.select(png(3), &config).unwrap();
        from_error.begin().unwrap();
        from_error.complete(Err("boom".to_string())).unwrap();
        from_error.scan_again();
        assert_initial(&from_error);

        let mut from_loading = PageState::new();
        from_loading.select(png(3), &config).unwrap();
        from_loading.begin().unwrap();
        from_loading.scan_again();
        assert_initial(&from_loading);
    }
}
