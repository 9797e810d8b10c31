//! # Headless Host Module
//!
//! Implementazioni dei provider senza UI reale, usate dal binario e dai test.
//!
//! ## Componenti:
//! - `StaticPermissions`: stato permesso fisso, registra le richieste
//! - `HeadlessSurface`: registra i lanci e simula le capacità del dispositivo

use crate::providers::{
    LaunchError, LaunchRequest, PermissionProvider, PermissionStatus, UiSurfaceProvider, UiTask,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Permission provider with a fixed answer
#[derive(Debug)]
pub struct StaticPermissions {
    status: PermissionStatus,
    requests: AtomicUsize,
}

impl StaticPermissions {
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            status,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted)
    }

    /// How many times the OS prompt was requested
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for StaticPermissions {
    fn camera_status(&self) -> PermissionStatus {
        self.status
    }

    fn request_camera_access(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// UI surface that records launches instead of showing anything
#[derive(Debug)]
pub struct HeadlessSurface {
    has_camera: bool,
    photo_picker: bool,
    max_selection: Option<u32>,
    launch_error: Option<LaunchError>,
    launches: Mutex<Vec<LaunchRequest>>,
    ui_posts: AtomicUsize,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self {
            has_camera: true,
            photo_picker: true,
            max_selection: None,
            launch_error: None,
            launches: Mutex::new(Vec::new()),
            ui_posts: AtomicUsize::new(0),
        }
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_camera(mut self) -> Self {
        self.has_camera = false;
        self
    }

    pub fn with_photo_picker(mut self, available: bool) -> Self {
        self.photo_picker = available;
        self
    }

    pub fn with_max_selection(mut self, max: u32) -> Self {
        self.max_selection = Some(max);
        self
    }

    pub fn failing_with(mut self, error: LaunchError) -> Self {
        self.launch_error = Some(error);
        self
    }

    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.launches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_launch(&self) -> Option<LaunchRequest> {
        self.launches().pop()
    }

    /// Tasks run through `post_to_ui`
    pub fn ui_post_count(&self) -> usize {
        self.ui_posts.load(Ordering::SeqCst)
    }
}

impl UiSurfaceProvider for HeadlessSurface {
    fn has_camera(&self) -> bool {
        self.has_camera
    }

    fn photo_picker_available(&self) -> bool {
        self.photo_picker
    }

    fn max_selection_limit(&self) -> Option<u32> {
        self.max_selection
    }

    /// Records every attempt, including the ones configured to fail
    fn launch(&self, request: LaunchRequest) -> Result<(), LaunchError> {
        self.launches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        match self.launch_error {
            Some(ref error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn post_to_ui(&self, task: UiTask) {
        self.ui_posts.fetch_add(1, Ordering::SeqCst);
        task();
    }
}
