//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore che il coordinator può restituire al chiamante.
//!
//! ## Responsabilità:
//! - Definisce `PickerError` enum per categorizzare tutti gli errori possibili
//! - Associa a ogni variante un codice stabile (`already_active`, `invalid_image`, ...)
//! - Converte gli errori nel triplo serializzabile `PickFailure` (code, message, details)
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - **Permessi**: `camera_access_denied`, `camera_access_restricted`
//! - **Dispositivo**: `no_available_camera`
//! - **Risoluzione**: `no_valid_*_uri`, `missing_valid_*_uri`, `no_valid_media_uri`
//! - **Elaborazione**: `invalid_image`, `create_error`, `flutter_image_picker_copy_video_error`
//! - **Protocollo**: `already_active`, `invalid_source`, `invalid_argument`
//!
//! ## Esempio:
//! ```ignore
//! let failure = PickerError::AlreadyActive.into_failure();
//! assert_eq!(failure.code, "already_active");
//! ```

use crate::request::MediaKind;
use serde::{Deserialize, Serialize};

/// Errors surfaced by the picker, each mapped to a stable code
#[derive(thiserror::Error, Debug)]
pub enum PickerError {
    #[error("Image picker is already active")]
    AlreadyActive,

    #[error("The user did not allow camera access.")]
    CameraAccessDenied,

    #[error("The user is not allowed to use the camera.")]
    CameraAccessRestricted,

    #[error("No cameras available for taking pictures.")]
    NoAvailableCamera,

    #[error("Couldn't find the {kind} uri")]
    Resolution {
        kind: MediaKind,
        multiple: bool,
        detail: Option<String>,
    },

    #[error("Cannot decode image")]
    InvalidImage(String),

    #[error("Invalid image source.")]
    InvalidSource(String),

    #[error("Could not create the capture target file")]
    CreateError(String),

    #[error("Could not cache the video file.")]
    CopyVideo(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recovery state error: {0}")]
    State(String),
}

impl PickerError {
    /// Resolution failure for a request of the given shape
    pub fn resolution(kind: MediaKind, multiple: bool, detail: impl Into<String>) -> Self {
        Self::Resolution {
            kind,
            multiple,
            detail: Some(detail.into()),
        }
    }

    /// Stable code reported to the caller
    pub fn code(&self) -> &'static str {
        match self {
            PickerError::AlreadyActive => "already_active",
            PickerError::CameraAccessDenied => "camera_access_denied",
            PickerError::CameraAccessRestricted => "camera_access_restricted",
            PickerError::NoAvailableCamera => "no_available_camera",
            PickerError::Resolution { kind, multiple, .. } => match (kind, multiple) {
                (MediaKind::Image, false) => "no_valid_image_uri",
                (MediaKind::Image, true) => "missing_valid_image_uri",
                (MediaKind::Video, false) => "no_valid_video_uri",
                (MediaKind::Video, true) => "missing_valid_video_uri",
                (MediaKind::Mixed, _) => "no_valid_media_uri",
            },
            PickerError::InvalidImage(_) => "invalid_image",
            PickerError::InvalidSource(_) => "invalid_source",
            PickerError::CreateError(_) => "create_error",
            PickerError::CopyVideo(_) => "flutter_image_picker_copy_video_error",
            PickerError::InvalidArgument(_) => "invalid_argument",
            PickerError::Io(_) => "io_error",
            PickerError::State(_) => "state_error",
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            PickerError::Resolution { detail, .. } => detail.clone(),
            PickerError::InvalidImage(d)
            | PickerError::InvalidSource(d)
            | PickerError::CreateError(d)
            | PickerError::CopyVideo(d)
            | PickerError::State(d) => Some(d.clone()),
            PickerError::Io(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Convert into the triple that crosses the coordinator boundary
    pub fn into_failure(self) -> PickFailure {
        PickFailure {
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

impl From<image::ImageError> for PickerError {
    fn from(e: image::ImageError) -> Self {
        PickerError::InvalidImage(e.to_string())
    }
}

/// Error triple delivered to the caller's completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickFailure {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<PickerError> for PickFailure {
    fn from(e: PickerError) -> Self {
        e.into_failure()
    }
}

impl std::fmt::Display for PickFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for PickFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_codes_follow_request_shape() {
        let cases = [
            (MediaKind::Image, false, "no_valid_image_uri"),
            (MediaKind::Image, true, "missing_valid_image_uri"),
            (MediaKind::Video, false, "no_valid_video_uri"),
            (MediaKind::Video, true, "missing_valid_video_uri"),
            (MediaKind::Mixed, false, "no_valid_media_uri"),
            (MediaKind::Mixed, true, "no_valid_media_uri"),
        ];
        for (kind, multiple, code) in cases {
            assert_eq!(PickerError::resolution(kind, multiple, "x").code(), code);
        }
    }

    #[test]
    fn test_failure_triple() {
        let failure = PickerError::resolution(MediaKind::Video, false, "content://1").into_failure();
        assert_eq!(failure.code, "no_valid_video_uri");
        assert_eq!(failure.message, "Couldn't find the video uri");
        assert_eq!(failure.details.as_deref(), Some("content://1"));

        let failure = PickerError::AlreadyActive.into_failure();
        assert_eq!(failure.message, "Image picker is already active");
        assert!(failure.details.is_none());
    }

    #[test]
    fn test_copy_video_code() {
        let failure = PickFailure::from(PickerError::CopyVideo("disk full".into()));
        assert_eq!(failure.code, "flutter_image_picker_copy_video_error");
        assert_eq!(failure.to_string(), "flutter_image_picker_copy_video_error: Could not cache the video file. (disk full)");
    }
}
