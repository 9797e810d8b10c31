//! # State Management Module
//!
//! Questo modulo gestisce la cache di recovery per i risultati persi.
//!
//! ## Responsabilità:
//! - Persiste la forma della richiesta attiva prima che la UI ospite venga distrutta
//! - Persiste un risultato (o un errore) arrivato quando nessuna richiesta era in attesa
//! - Ripristina il file di destinazione della fotocamera dopo la morte del processo
//! - Consegna il risultato perso al massimo una volta, poi si svuota
//!
//! ## Macchina a stati:
//! `Idle -> RequestActive -> (ActivityBackgrounded -> StatePersisted)* -> ResultAvailable -> Idle`
//!
//! ## Strategia di persistence:
//! - Un file JSON per host (basato su hash dell'host id)
//! - Salvataggio in `<state_dir>/picker_state_<hash>.json`
//! - La completion del chiamante non viene mai persistita
//! - Un file corrotto viene trattato come vuoto
//!
//! ## Esempio struttura state file:
//! ```json
//! {
//!   "kind": "image",
//!   "options": { "max_width": 1000, "max_height": null, "quality": 80 },
//!   "pending_camera_target": "/cache/media-picker/image_picker_a1b2.jpg",
//!   "items": [
//!     { "path": "/cache/media-picker/image_picker_a1b2.jpg", "source_locator": null, "mime_type": "image/jpeg" }
//!   ],
//!   "error": null
//! }
//! ```

use crate::error::PickFailure;
use crate::request::{ImageOptions, MediaKind, MediaResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What survives process death
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub kind: Option<MediaKind>,
    pub options: Option<ImageOptions>,
    pub pending_camera_target: Option<PathBuf>,
    pub items: Option<Vec<MediaResult>>,
    pub error: Option<PickFailure>,
}

impl RecoveryRecord {
    pub fn has_result(&self) -> bool {
        self.items.as_ref().is_some_and(|items| !items.is_empty()) || self.error.is_some()
    }

    fn is_empty(&self) -> bool {
        *self == RecoveryRecord::default()
    }
}

/// File-backed recovery cache for one host
pub struct RecoveryCache {
    state_file_path: PathBuf,
    record: RecoveryRecord,
}

impl RecoveryCache {
    /// Open (or create) the cache for `host_id` under `state_dir`
    pub fn open(state_dir: &Path, host_id: &str) -> Result<Self> {
        fs::create_dir_all(state_dir)?;

        let mut hasher = Sha256::new();
        hasher.update(host_id.as_bytes());
        let hash = hex::encode(hasher.finalize())[..16].to_string();

        let state_file_path = state_dir.join(format!("picker_state_{}.json", hash));

        let record = if state_file_path.exists() {
            let content = fs::read_to_string(&state_file_path)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Discarding unreadable recovery state {}: {}", state_file_path.display(), e);
                RecoveryRecord::default()
            })
        } else {
            RecoveryRecord::default()
        };

        Ok(Self {
            state_file_path,
            record,
        })
    }

    pub fn path(&self) -> &Path {
        &self.state_file_path
    }

    pub fn record(&self) -> &RecoveryRecord {
        &self.record
    }

    fn save(&self) -> Result<()> {
        if self.record.is_empty() {
            if self.state_file_path.exists() {
                fs::remove_file(&self.state_file_path)?;
            }
            return Ok(());
        }
        let content = serde_json::to_string_pretty(&self.record)?;
        fs::write(&self.state_file_path, content)?;
        Ok(())
    }

    /// Persist the shape of the active request
    pub fn save_request_state(
        &mut self,
        kind: MediaKind,
        options: ImageOptions,
        camera_target: Option<&Path>,
    ) -> Result<()> {
        self.record.kind = Some(kind);
        self.record.options = Some(options);
        self.record.pending_camera_target = camera_target.map(Path::to_path_buf);
        debug!("Persisted request state ({:?}) to {}", kind, self.state_file_path.display());
        self.save()
    }

    /// Persist a result nobody was waiting for
    pub fn save_result(
        &mut self,
        kind: MediaKind,
        items: Option<Vec<MediaResult>>,
        error: Option<PickFailure>,
    ) -> Result<()> {
        self.record.kind = Some(kind);
        self.record.items = items;
        self.record.error = error;
        debug!("Persisted lost result to {}", self.state_file_path.display());
        self.save()
    }

    pub fn pending_camera_target(&self) -> Option<PathBuf> {
        self.record.pending_camera_target.clone()
    }

    /// Take the stored result, if any. The cache is cleared either way.
    pub fn take(&mut self) -> Result<Option<RecoveryRecord>> {
        let record = std::mem::take(&mut self.record);
        self.save()?;
        Ok(record.has_result().then_some(record))
    }

    /// Take the stored result but keep the request state of an active call
    pub fn take_result(&mut self) -> Result<Option<RecoveryRecord>> {
        let record = RecoveryRecord {
            items: self.record.items.take(),
            error: self.record.error.take(),
            ..self.record.clone()
        };
        self.save()?;
        Ok(record.has_result().then_some(record))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.record = RecoveryRecord::default();
        self.save()
    }
}
