//! # Host Capability Module
//!
//! Interfacce che isolano il coordinator dal sistema operativo ospite.
//!
//! ## Responsabilità:
//! - `PermissionProvider`: stato e richiesta del permesso fotocamera
//! - `UiSurfaceProvider`: lancio delle UI di sistema e ritorno al thread UI
//! - `LaunchRequest` / `ActivityOutcome`: il protocollo tra coordinator e host
//!
//! ## Flusso:
//! 1. Il coordinator chiama `launch()` con un `RequestCode`
//! 2. L'host mostra la UI di sistema
//! 3. L'host consegna il risultato con `Coordinator::on_activity_result(code, outcome)`

use crate::content::ContentLocator;
use crate::request::{CameraDevice, MediaKind, RequestCode};
use std::path::PathBuf;
use std::time::Duration;

/// Camera permission state as reported by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// Blocked by policy (parental controls, MDM)
    Restricted,
    NotDetermined,
}

pub trait PermissionProvider: Send + Sync {
    fn camera_status(&self) -> PermissionStatus;

    /// Show the OS prompt; the answer arrives via `Coordinator::on_permission_result`
    fn request_camera_access(&self);
}

/// Which gallery UI to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryUi {
    PhotoPicker,
    Legacy,
}

/// A system UI the host must present
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchRequest {
    Camera {
        code: RequestCode,
        /// File the capture must be written to
        target: PathBuf,
        device: CameraDevice,
        max_duration: Option<Duration>,
    },
    Gallery {
        code: RequestCode,
        ui: GalleryUi,
        kind: MediaKind,
        multiple: bool,
        limit: Option<u32>,
    },
}

impl LaunchRequest {
    pub fn code(&self) -> RequestCode {
        match self {
            LaunchRequest::Camera { code, .. } | LaunchRequest::Gallery { code, .. } => *code,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("no activity can handle the launch")]
    NoHandler,

    #[error("launch failed: {0}")]
    Failed(String),
}

/// What the OS handed back for a launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Selected items; empty for a camera capture written to its target
    Selected(Vec<ContentLocator>),
    Cancelled,
}

pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// The foreground UI surface the coordinator is bound to
pub trait UiSurfaceProvider: Send + Sync {
    fn has_camera(&self) -> bool {
        true
    }

    fn photo_picker_available(&self) -> bool;

    /// OS ceiling on multi-select, `None` when unbounded
    fn max_selection_limit(&self) -> Option<u32> {
        None
    }

    fn launch(&self, request: LaunchRequest) -> Result<(), LaunchError>;

    /// Run `task` on the UI thread
    fn post_to_ui(&self, task: UiTask) {
        task()
    }
}

/// Caller limit intersected with the OS ceiling
pub fn effective_limit(requested: Option<u32>, os_max: Option<u32>) -> Option<u32> {
    match (requested, os_max) {
        (Some(r), Some(m)) => Some(r.min(m)),
        (r, m) => r.or(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(Some(5), Some(100)), Some(5));
        assert_eq!(effective_limit(Some(500), Some(100)), Some(100));
        assert_eq!(effective_limit(None, Some(100)), Some(100));
        assert_eq!(effective_limit(Some(3), None), Some(3));
        assert_eq!(effective_limit(None, None), None);
    }
}
