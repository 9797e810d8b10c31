//! # Result Normalizer Module
//!
//! Converte i payload della piattaforma in record uniformi `(path, source_locator?, mime_type?)`.
//!
//! ## Responsabilità:
//! - Materializza un path stabile copiando il contenuto nella scratch directory
//! - Conserva il locator originale e il MIME type quando ottenibile
//! - Classifica ogni elemento come immagine o video (`PickPayload`)
//! - Mappa gli errori di risoluzione sul codice corretto per la forma della richiesta

use crate::content::{ContentLocator, ContentResolver};
use crate::error::PickerError;
use crate::file_manager::FileManager;
use crate::request::{MediaKind, MediaResult, PickPayload};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ResultNormalizer {
    resolver: Arc<dyn ContentResolver>,
    scratch_dir: PathBuf,
}

impl ResultNormalizer {
    pub fn new(resolver: Arc<dyn ContentResolver>, scratch_dir: PathBuf) -> Self {
        Self {
            resolver,
            scratch_dir,
        }
    }

    /// Resolve one selected item into a local file
    pub fn normalize(&self, locator: &ContentLocator, kind: MediaKind, multiple: bool) -> PickPayload {
        let mime = self.resolver.mime_type(locator);
        let display_name = self.resolver.display_name(locator);
        let mime = mime.or_else(|| {
            display_name
                .as_deref()
                .and_then(|n| FileManager::mime_for_path(Path::new(n)))
                .map(str::to_string)
        });

        let is_video = Self::classify(kind, mime.as_deref());

        let mut reader = match self.resolver.open(locator) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Could not open {}: {}", locator, e);
                return PickPayload::Error(
                    PickerError::resolution(kind, multiple, format!("{}: {}", locator, e)).into_failure(),
                );
            }
        };

        let file_name = FileManager::file_name_for(display_name.as_deref(), mime.as_deref());
        let path = match FileManager::copy_to_scratch(&mut reader, &self.scratch_dir, &file_name) {
            Ok(path) => path,
            Err(e) if is_video => {
                warn!("Could not cache video {}: {}", locator, e);
                return PickPayload::Error(PickerError::CopyVideo(e.to_string()).into_failure());
            }
            Err(e) => {
                warn!("Could not copy {}: {}", locator, e);
                return PickPayload::Error(
                    PickerError::resolution(kind, multiple, format!("{}: {}", locator, e)).into_failure(),
                );
            }
        };

        debug!("Resolved {} -> {}", locator, path.display());
        let result = MediaResult {
            path,
            source_locator: Some(locator.as_str().to_string()),
            mime_type: mime,
        };
        if is_video {
            PickPayload::Video(result)
        } else {
            PickPayload::Image(result)
        }
    }

    /// Wrap a camera capture that is already on disk
    pub fn normalize_captured(&self, path: &Path, kind: MediaKind) -> PickPayload {
        let non_empty = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        if !non_empty {
            return PickPayload::Error(
                PickerError::resolution(kind, false, format!("empty capture: {}", path.display()))
                    .into_failure(),
            );
        }

        let result = MediaResult {
            path: path.to_path_buf(),
            source_locator: None,
            mime_type: FileManager::mime_for_path(path).map(str::to_string),
        };
        match kind {
            MediaKind::Video => PickPayload::Video(result),
            _ => PickPayload::Image(result),
        }
    }

    fn classify(kind: MediaKind, mime: Option<&str>) -> bool {
        match kind {
            MediaKind::Image => false,
            MediaKind::Video => true,
            MediaKind::Mixed => mime.is_some_and(FileManager::is_video_mime),
        }
    }
}
