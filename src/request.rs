//! # Request Model Module
//!
//! Questo modulo definisce il modello tipizzato di richieste e risultati.
//!
//! ## Responsabilità:
//! - `PickRequest`: la richiesta del chiamante (tipo media, sorgente, vincoli, flag)
//! - `SelectionConstraints`: vincoli opzionali validati indipendentemente
//! - `ImageOptions`: la parte dei vincoli che guida il resize (persistita nella cache)
//! - `MediaResult`: il record normalizzato `(path, source_locator?, mime_type?)`
//! - `PickPayload`: unione taggata prodotta dal normalizer
//! - `RequestCode`: identifica il lancio di una UI di sistema
//!
//! ## Operazioni del chiamante:
//! - `PickRequest::single_image()` / `multi_image()`
//! - `PickRequest::single_video()` / `multi_video()`
//! - `PickRequest::media()`

use crate::error::{PickFailure, PickerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Kind of media a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Mixed,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Mixed => "media",
        };
        f.write_str(noun)
    }
}

impl FromStr for MediaKind {
    type Err = PickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "mixed" | "media" => Ok(MediaKind::Mixed),
            other => Err(PickerError::InvalidArgument(format!("unknown media kind: {}", other))),
        }
    }
}

/// Where the media comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Camera,
    Gallery,
}

impl FromStr for ImageSource {
    type Err = PickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "camera" => Ok(ImageSource::Camera),
            "gallery" => Ok(ImageSource::Gallery),
            other => Err(PickerError::InvalidSource(other.to_string())),
        }
    }
}

/// Preferred camera when capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraDevice {
    #[default]
    Rear,
    Front,
}

/// Optional constraints on a pick, each validated on its own
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionConstraints {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Re-encode quality (0-100)
    pub quality: Option<u8>,
    pub max_duration: Option<Duration>,
    /// Maximum number of items for multi-select
    pub limit: Option<u32>,
}

impl SelectionConstraints {
    pub fn validate(&self, multiple: bool) -> Result<(), PickerError> {
        if self.max_width == Some(0) {
            return Err(PickerError::InvalidArgument("max_width must be greater than 0".into()));
        }
        if self.max_height == Some(0) {
            return Err(PickerError::InvalidArgument("max_height must be greater than 0".into()));
        }
        if let Some(quality) = self.quality {
            if quality > 100 {
                return Err(PickerError::InvalidArgument(format!(
                    "quality must be between 0 and 100, got {}",
                    quality
                )));
            }
        }
        match self.limit {
            Some(0) => Err(PickerError::InvalidArgument("limit must be greater than 0".into())),
            Some(limit) if multiple && limit < 2 => Err(PickerError::InvalidArgument(format!(
                "limit for multiple selection cannot be lower than 2, got {}",
                limit
            ))),
            _ => Ok(()),
        }
    }

    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: self.quality,
        }
    }
}

/// Resize/recompress parameters for the post-processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<u8>,
}

/// A caller's pick request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickRequest {
    pub kind: MediaKind,
    pub source: ImageSource,
    pub constraints: SelectionConstraints,
    pub camera_device: CameraDevice,
    /// Carry the original asset's embedded metadata into the output
    pub full_metadata: bool,
    pub multiple: bool,
}

impl PickRequest {
    fn new(kind: MediaKind, source: ImageSource, multiple: bool) -> Self {
        Self {
            kind,
            source,
            constraints: SelectionConstraints::default(),
            camera_device: CameraDevice::default(),
            full_metadata: true,
            multiple,
        }
    }

    pub fn single_image(source: ImageSource) -> Self {
        Self::new(MediaKind::Image, source, false)
    }

    pub fn multi_image() -> Self {
        Self::new(MediaKind::Image, ImageSource::Gallery, true)
    }

    pub fn single_video(source: ImageSource) -> Self {
        Self::new(MediaKind::Video, source, false)
    }

    pub fn multi_video() -> Self {
        Self::new(MediaKind::Video, ImageSource::Gallery, true)
    }

    pub fn media(multiple: bool) -> Self {
        Self::new(MediaKind::Mixed, ImageSource::Gallery, multiple)
    }

    pub fn with_constraints(mut self, constraints: SelectionConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_camera_device(mut self, device: CameraDevice) -> Self {
        self.camera_device = device;
        self
    }

    pub fn with_full_metadata(mut self, full_metadata: bool) -> Self {
        self.full_metadata = full_metadata;
        self
    }

    pub fn validate(&self) -> Result<(), PickerError> {
        if self.source == ImageSource::Camera {
            if self.multiple {
                return Err(PickerError::InvalidSource(
                    "camera does not support multiple selection".into(),
                ));
            }
            if self.kind == MediaKind::Mixed {
                return Err(PickerError::InvalidSource(
                    "camera cannot capture mixed media".into(),
                ));
            }
        }
        self.constraints.validate(self.multiple)
    }

    pub fn image_options(&self) -> ImageOptions {
        self.constraints.image_options()
    }
}

/// Normalized output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResult {
    pub path: PathBuf,
    /// Platform URI or Photos local identifier the item came from
    pub source_locator: Option<String>,
    pub mime_type: Option<String>,
}

/// Per-item output of the result normalizer
#[derive(Debug, Clone, PartialEq)]
pub enum PickPayload {
    Image(MediaResult),
    Video(MediaResult),
    Error(PickFailure),
}

/// What the caller's completion receives. Cancellation is `Ok` with no items.
pub type PickResult = Result<Vec<MediaResult>, PickFailure>;

/// Identifies a system UI launch; hosts echo it back with the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCode {
    ChooseImage,
    ChooseMultiImage,
    ChooseVideo,
    ChooseMultiVideo,
    ChooseMedia,
    TakeImage,
    TakeVideo,
}

impl RequestCode {
    pub fn for_request(request: &PickRequest) -> Self {
        match (request.source, request.kind, request.multiple) {
            (ImageSource::Camera, MediaKind::Video, _) => RequestCode::TakeVideo,
            (ImageSource::Camera, _, _) => RequestCode::TakeImage,
            (ImageSource::Gallery, MediaKind::Image, false) => RequestCode::ChooseImage,
            (ImageSource::Gallery, MediaKind::Image, true) => RequestCode::ChooseMultiImage,
            (ImageSource::Gallery, MediaKind::Video, false) => RequestCode::ChooseVideo,
            (ImageSource::Gallery, MediaKind::Video, true) => RequestCode::ChooseMultiVideo,
            (ImageSource::Gallery, MediaKind::Mixed, _) => RequestCode::ChooseMedia,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            RequestCode::ChooseImage | RequestCode::ChooseMultiImage | RequestCode::TakeImage => {
                MediaKind::Image
            }
            RequestCode::ChooseVideo | RequestCode::ChooseMultiVideo | RequestCode::TakeVideo => {
                MediaKind::Video
            }
            RequestCode::ChooseMedia => MediaKind::Mixed,
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, RequestCode::ChooseMultiImage | RequestCode::ChooseMultiVideo)
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, RequestCode::TakeImage | RequestCode::TakeVideo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parsing() {
        assert_eq!("camera".parse::<ImageSource>().unwrap(), ImageSource::Camera);
        assert_eq!("Gallery".parse::<ImageSource>().unwrap(), ImageSource::Gallery);
        let err = "scanner".parse::<ImageSource>().unwrap_err();
        assert_eq!(err.code(), "invalid_source");
    }

    #[test]
    fn test_constraints_validation() {
        let mut constraints = SelectionConstraints::default();
        assert!(constraints.validate(true).is_ok());

        constraints.quality = Some(101);
        assert_eq!(constraints.validate(false).unwrap_err().code(), "invalid_argument");

        constraints.quality = Some(100);
        constraints.max_width = Some(0);
        assert!(constraints.validate(false).is_err());

        constraints.max_width = Some(640);
        constraints.limit = Some(1);
        assert!(constraints.validate(false).is_ok());
        assert!(constraints.validate(true).is_err());

        constraints.limit = Some(0);
        assert!(constraints.validate(false).is_err());
    }

    #[test]
    fn test_camera_rejects_multi_and_mixed() {
        let mut request = PickRequest::multi_image();
        request.source = ImageSource::Camera;
        assert_eq!(request.validate().unwrap_err().code(), "invalid_source");

        let mut request = PickRequest::media(false);
        request.source = ImageSource::Camera;
        assert_eq!(request.validate().unwrap_err().code(), "invalid_source");

        assert!(PickRequest::single_video(ImageSource::Camera).validate().is_ok());
    }

    #[test]
    fn test_request_codes() {
        assert_eq!(
            RequestCode::for_request(&PickRequest::single_image(ImageSource::Camera)),
            RequestCode::TakeImage
        );
        assert_eq!(RequestCode::for_request(&PickRequest::multi_video()), RequestCode::ChooseMultiVideo);
        assert_eq!(RequestCode::for_request(&PickRequest::media(true)), RequestCode::ChooseMedia);
        assert_eq!(RequestCode::ChooseMedia.kind(), MediaKind::Mixed);
        assert!(RequestCode::ChooseMultiImage.is_multiple());
        assert!(!RequestCode::ChooseMedia.is_multiple());
        assert!(RequestCode::TakeVideo.is_camera());
    }
}
