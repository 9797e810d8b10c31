//! # Item Task Module
//!
//! Lavoro eseguito da un worker per ogni elemento selezionato.
//!
//! ## Responsabilità:
//! - Normalizzazione (copia nella scratch directory)
//! - Resize/ricompressione delle immagini secondo le opzioni della richiesta
//! - Pulizia della cattura originale quando la fotocamera è stata ridimensionata

use crate::content::ContentLocator;
use crate::coordinator::pending::Origin;
use crate::error::{PickFailure, PickerError};
use crate::file_manager::FileManager;
use crate::normalizer::ResultNormalizer;
use crate::request::{ImageOptions, MediaKind, MediaResult, PickPayload};
use crate::resize::ImageResizer;
use std::path::Path;
use tracing::{debug, warn};

/// Shape of the request an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemJob {
    /// The call the result is delivered to
    pub origin: Origin,
    pub kind: MediaKind,
    pub multiple: bool,
    /// `None` skips the resize pass (it runs again on retrieval)
    pub options: Option<ImageOptions>,
    pub keep_metadata: bool,
}

pub struct ItemProcessor {
    normalizer: ResultNormalizer,
    resizer: ImageResizer,
}

impl ItemProcessor {
    pub fn new(normalizer: ResultNormalizer, resizer: ImageResizer) -> Self {
        Self { normalizer, resizer }
    }

    /// Gallery item: copy, then scale if it is an image
    pub fn process_selected(&self, locator: &ContentLocator, job: ItemJob) -> Result<MediaResult, PickFailure> {
        match self.normalizer.normalize(locator, job.kind, job.multiple) {
            PickPayload::Error(failure) => Err(failure),
            PickPayload::Video(result) => Ok(result),
            PickPayload::Image(result) => self.scale(result, job),
        }
    }

    /// Camera capture already written to `path`
    pub fn process_captured(&self, path: &Path, job: ItemJob) -> Result<MediaResult, PickFailure> {
        match self.normalizer.normalize_captured(path, job.kind) {
            PickPayload::Error(failure) => Err(failure),
            PickPayload::Video(result) => Ok(result),
            PickPayload::Image(result) => {
                let scaled = self.scale(result, job)?;
                if scaled.path != path {
                    debug!("Removing original capture {}", path.display());
                    if let Err(e) = std::fs::remove_file(path) {
                        warn!("Could not remove original capture {}: {}", path.display(), e);
                    }
                }
                Ok(scaled)
            }
        }
    }

    /// Re-apply the resize pass to an already materialized item
    pub fn rescale(&self, item: MediaResult, job: ItemJob) -> Result<MediaResult, PickFailure> {
        let is_image = match item.mime_type.as_deref() {
            Some(mime) => FileManager::is_image_mime(mime),
            None => !FileManager::is_video(&item.path),
        };
        if !is_image {
            return Ok(item);
        }
        self.scale(item, job)
    }

    fn scale(&self, mut result: MediaResult, job: ItemJob) -> Result<MediaResult, PickFailure> {
        let Some(options) = job.options else {
            return Ok(result);
        };

        let scaled = self
            .resizer
            .resize_if_needed(&result.path, &options, job.keep_metadata)
            .map_err(PickerError::into_failure)?;

        if scaled != result.path {
            result.mime_type = FileManager::mime_for_path(&scaled)
                .map(str::to_string)
                .or(result.mime_type);
            result.path = scaled;
        }
        Ok(result)
    }
}
