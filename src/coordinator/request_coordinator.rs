//! # Request Coordinator
//!
//! Orchestratore di una richiesta di selezione: permessi, lancio della UI di
//! sistema, elaborazione in background e consegna del risultato.
//!
//! ## Regole:
//! - Una sola richiesta attiva; una seconda fallisce con `already_active`
//! - La completion viene invocata esattamente una volta, sempre tramite `post_to_ui`
//! - Un risultato senza richiesta attiva finisce nella recovery cache

use crate::config::Config;
use crate::content::{ContentLocator, ContentResolver};
use crate::coordinator::batch_saver::BatchSaver;
use crate::coordinator::item_task::{ItemJob, ItemProcessor};
use crate::coordinator::pending::{Origin, PendingCall, PendingSlot, Stage};
use crate::error::{PickFailure, PickerError};
use crate::file_manager::FileManager;
use crate::normalizer::ResultNormalizer;
use crate::providers::{
    effective_limit, ActivityOutcome, GalleryUi, LaunchError, LaunchRequest, PermissionProvider,
    PermissionStatus, UiSurfaceProvider,
};
use crate::request::{ImageSource, MediaKind, MediaResult, PickRequest, PickResult, RequestCode};
use crate::resize::ImageResizer;
use crate::state::RecoveryCache;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// A result recovered from a previous process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LostResult {
    pub kind: MediaKind,
    pub items: Vec<MediaResult>,
    pub error: Option<PickFailure>,
}

struct Inner<P, U> {
    config: Config,
    permissions: P,
    surface: RwLock<Arc<U>>,
    items: Arc<ItemProcessor>,
    batch: BatchSaver,
    cache: Mutex<RecoveryCache>,
    pending: PendingSlot,
    camera_target: Mutex<Option<PathBuf>>,
    runtime: Handle,
}

/// Coordinates one pick at a time between the caller, the host UI and the workers
pub struct Coordinator<P, U> {
    inner: Arc<Inner<P, U>>,
}

impl<P, U> Clone for Coordinator<P, U> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P, U> Coordinator<P, U>
where
    P: PermissionProvider + 'static,
    U: UiSurfaceProvider + 'static,
{
    /// Build a coordinator; a capture target left by a previous process is restored
    pub fn new(
        config: Config,
        permissions: P,
        surface: U,
        resolver: Arc<dyn ContentResolver>,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;

        let cache = RecoveryCache::open(&config.state_dir, &config.host_id)?;
        let camera_target = cache.pending_camera_target();
        if let Some(target) = &camera_target {
            info!("Restored pending camera target {}", target.display());
        }

        let items = ItemProcessor::new(
            ResultNormalizer::new(resolver, config.scratch_dir.clone()),
            ImageResizer::new(&config),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                batch: BatchSaver::new(config.workers),
                config,
                permissions,
                surface: RwLock::new(Arc::new(surface)),
                items: Arc::new(items),
                cache: Mutex::new(cache),
                pending: PendingSlot::default(),
                camera_target: Mutex::new(camera_target),
                runtime,
            }),
        })
    }

    pub fn surface(&self) -> Arc<U> {
        self.inner
            .surface
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn permissions(&self) -> &P {
        &self.inner.permissions
    }

    pub fn is_active(&self) -> bool {
        self.inner.pending.is_active()
    }

    /// Whether a result is waiting for `retrieve_lost_result`
    pub fn has_lost_result(&self) -> bool {
        self.cache().record().has_result()
    }

    /// Start a pick; `completion` runs exactly once
    pub fn pick<F>(&self, request: PickRequest, completion: F)
    where
        F: FnOnce(PickResult) + Send + 'static,
    {
        if let Err(e) = request.validate() {
            warn!("Rejected pick request: {}", e);
            let failure = e.into_failure();
            self.surface().post_to_ui(Box::new(move || completion(Err(failure))));
            return;
        }

        let call = PendingCall::new(request.clone(), Box::new(completion));
        if let Err(rejected) = self.inner.pending.try_install(call) {
            warn!("Pick rejected, another request is already active");
            let completion = rejected.completion;
            self.surface()
                .post_to_ui(Box::new(move || completion(Err(PickerError::AlreadyActive.into_failure()))));
            return;
        }

        info!(
            "📷 Starting pick: {} from {:?} (multiple: {})",
            request.kind, request.source, request.multiple
        );
        match request.source {
            ImageSource::Camera => self.start_camera(&request),
            ImageSource::Gallery => self.launch_gallery(&request),
        }
    }

    /// `pick` with the completion delivered through a oneshot channel
    pub fn pick_channel(&self, request: PickRequest) -> oneshot::Receiver<PickResult> {
        let (tx, rx) = oneshot::channel();
        self.pick(request, move |result| {
            let _ = tx.send(result);
        });
        rx
    }

    fn start_camera(&self, request: &PickRequest) {
        if !self.surface().has_camera() {
            self.finish_active(request.kind, Err(PickerError::NoAvailableCamera.into_failure()));
            return;
        }

        match self.inner.permissions.camera_status() {
            PermissionStatus::Granted => self.launch_camera(request),
            PermissionStatus::Denied => {
                self.finish_active(request.kind, Err(PickerError::CameraAccessDenied.into_failure()))
            }
            PermissionStatus::Restricted => {
                self.finish_active(request.kind, Err(PickerError::CameraAccessRestricted.into_failure()))
            }
            PermissionStatus::NotDetermined => {
                debug!("Camera permission not determined, asking the host");
                self.inner.pending.set_stage(Stage::AwaitingPermission);
                self.inner.permissions.request_camera_access();
            }
        }
    }

    /// Host callback for the camera permission prompt
    pub fn on_permission_result(&self, granted: bool) {
        if !self
            .inner
            .pending
            .transition(Stage::AwaitingPermission, Stage::Processing)
        {
            debug!("Ignoring permission result with no request waiting for it");
            return;
        }
        let Some(request) = self.inner.pending.request() else {
            return;
        };

        if granted {
            self.launch_camera(&request);
        } else {
            self.finish_active(request.kind, Err(PickerError::CameraAccessDenied.into_failure()));
        }
    }

    fn launch_camera(&self, request: &PickRequest) {
        let target = match FileManager::create_capture_target(&self.inner.config.scratch_dir, request.kind) {
            Ok(target) => target,
            Err(e) => {
                error!("Could not create the capture file: {}", e);
                self.finish_active(request.kind, Err(PickerError::CreateError(e.to_string()).into_failure()));
                return;
            }
        };
        *self.camera_target() = Some(target.clone());

        let code = RequestCode::for_request(request);
        self.inner.pending.set_stage(Stage::AwaitingPicker(code));
        let launch = LaunchRequest::Camera {
            code,
            target,
            device: request.camera_device,
            max_duration: request.constraints.max_duration,
        };

        if let Err(e) = self.surface().launch(launch) {
            warn!("Camera launch failed: {}", e);
            self.discard_camera_target();
            let failure = match e {
                LaunchError::NoHandler => PickerError::NoAvailableCamera,
                LaunchError::Failed(detail) => PickerError::CreateError(detail),
            };
            self.finish_active(request.kind, Err(failure.into_failure()));
        }
    }

    fn launch_gallery(&self, request: &PickRequest) {
        let surface = self.surface();
        let ui = if self.inner.config.use_photo_picker && surface.photo_picker_available() {
            GalleryUi::PhotoPicker
        } else {
            GalleryUi::Legacy
        };
        let limit = if request.multiple {
            effective_limit(request.constraints.limit, surface.max_selection_limit())
        } else {
            None
        };

        let code = RequestCode::for_request(request);
        debug!("Launching {:?} gallery ({:?}, limit {:?})", ui, code, limit);
        self.inner.pending.set_stage(Stage::AwaitingPicker(code));

        let launch = LaunchRequest::Gallery {
            code,
            ui,
            kind: request.kind,
            multiple: request.multiple,
            limit,
        };
        if let Err(e) = surface.launch(launch) {
            warn!("Gallery launch failed: {}", e);
            self.finish_active(
                request.kind,
                Err(PickerError::resolution(request.kind, request.multiple, e.to_string()).into_failure()),
            );
        }
    }

    /// Host callback for a finished system UI. Returns false if `code` is not ours.
    pub fn on_activity_result(&self, code: RequestCode, outcome: ActivityOutcome) -> bool {
        let job = match self.inner.pending.stage() {
            Some(Stage::AwaitingPicker(expected)) if expected == code => {
                if !self.inner.pending.transition(Stage::AwaitingPicker(code), Stage::Processing) {
                    return false;
                }
                let Some(request) = self.inner.pending.request() else {
                    return false;
                };
                ItemJob {
                    origin: self.inner.pending.origin(),
                    kind: request.kind,
                    multiple: request.multiple,
                    options: Some(request.image_options()),
                    keep_metadata: request.full_metadata,
                }
            }
            Some(stage) => {
                debug!("Ignoring {:?} result while the active request is {:?}", code, stage);
                return false;
            }
            None => {
                info!("Result for {:?} arrived with no active request, keeping it for retrieval", code);
                ItemJob {
                    origin: Origin::Lost,
                    kind: code.kind(),
                    multiple: code.is_multiple(),
                    options: None,
                    keep_metadata: true,
                }
            }
        };

        let locators = match outcome {
            ActivityOutcome::Cancelled => {
                debug!("Picker dismissed by the user");
                if code.is_camera() {
                    self.discard_camera_target();
                }
                self.finish(job.origin, job.kind, Ok(Vec::new()));
                return true;
            }
            ActivityOutcome::Selected(locators) => locators,
        };

        if code.is_camera() {
            let capture = self
                .camera_target()
                .take()
                .or_else(|| locators.first().and_then(ContentLocator::to_file_path));
            match capture {
                Some(path) => self.spawn_capture(path, job),
                None => self.finish(
                    job.origin,
                    job.kind,
                    Err(PickerError::resolution(job.kind, false, "no capture file").into_failure()),
                ),
            }
        } else if locators.is_empty() {
            self.finish(
                job.origin,
                job.kind,
                Err(PickerError::resolution(job.kind, job.multiple, "empty selection").into_failure()),
            );
        } else {
            self.spawn_selection(locators, job);
        }
        true
    }

    fn spawn_selection(&self, locators: Vec<ContentLocator>, job: ItemJob) {
        info!("Processing {} selected item(s)", locators.len());
        let this = self.clone();
        self.inner.runtime.spawn(async move {
            let items = this.inner.items.clone();
            let result = this
                .inner
                .batch
                .save_all(locators, job.kind, job.multiple, move |_, locator| {
                    items.process_selected(&locator, job)
                })
                .await;
            this.finish(job.origin, job.kind, result);
        });
    }

    fn spawn_capture(&self, capture: PathBuf, job: ItemJob) {
        debug!("Processing capture {}", capture.display());
        let this = self.clone();
        self.inner.runtime.spawn(async move {
            let items = this.inner.items.clone();
            let result = this
                .inner
                .batch
                .save_all(vec![capture], job.kind, false, move |_, path| {
                    items.process_captured(&path, job)
                })
                .await;
            this.finish(job.origin, job.kind, result);
        });
    }

    /// Synchronous failure of the call that is active right now
    fn finish_active(&self, kind: MediaKind, result: PickResult) {
        self.finish(self.inner.pending.origin(), kind, result);
    }

    /// Deliver `result` to the call it belongs to, or persist it as a lost result
    fn finish(&self, origin: Origin, kind: MediaKind, result: PickResult) {
        let call = match origin {
            Origin::Request(id) => self.inner.pending.take_if(id),
            Origin::Lost => None,
        };

        match call {
            Some(call) => {
                self.camera_target().take();
                match &result {
                    Ok(items) => info!("✅ Pick finished with {} item(s)", items.len()),
                    Err(failure) => warn!("Pick failed: {}", failure),
                }
                self.forget_request_state();
                let completion = call.completion;
                self.surface().post_to_ui(Box::new(move || completion(result)));
            }
            None => self.persist_lost(kind, result),
        }
    }

    fn persist_lost(&self, kind: MediaKind, result: PickResult) {
        let saved = match result {
            Ok(items) if items.is_empty() => {
                if !self.inner.pending.is_active() {
                    self.forget_request_state();
                }
                return;
            }
            Ok(items) => self.cache().save_result(kind, Some(items), None),
            Err(failure) => self.cache().save_result(kind, None, Some(failure)),
        };
        if let Err(e) = saved {
            error!("Could not persist lost result: {}", e);
        }
    }

    /// Drop persisted request state unless it carries an unretrieved result
    fn forget_request_state(&self) {
        let mut cache = self.cache();
        if !cache.record().has_result() {
            if let Err(e) = cache.clear() {
                warn!("Could not clear recovery cache: {}", e);
            }
        }
    }

    /// Host callback: the UI surface is going to the background
    pub fn on_surface_stopped(&self) {
        let Some(request) = self.inner.pending.request() else {
            return;
        };
        let target = self.camera_target().clone();
        if let Err(e) = self
            .cache()
            .save_request_state(request.kind, request.image_options(), target.as_deref())
        {
            error!("Could not persist request state: {}", e);
        }
    }

    /// Swap the UI surface; the in-flight request survives
    pub fn rebind_surface(&self, surface: U) {
        debug!("Rebinding UI surface (request active: {})", self.is_active());
        *self.inner.surface.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(surface);
    }

    /// One-shot retrieval of a result delivered while nobody was waiting.
    /// The state of an active request (capture target included) is left alone.
    pub async fn retrieve_lost_result(&self) -> Result<Option<LostResult>, PickFailure> {
        let record = {
            let mut cache = self.cache();
            if self.inner.pending.is_active() {
                cache.take_result()
            } else {
                cache.take()
            }
        }
        .map_err(|e| PickerError::State(e.to_string()).into_failure())?;

        let Some(record) = record else {
            debug!("No lost result to retrieve");
            return Ok(None);
        };
        let kind = record.kind.unwrap_or(MediaKind::Image);
        if let Some(error) = record.error {
            return Ok(Some(LostResult {
                kind,
                items: Vec::new(),
                error: Some(error),
            }));
        }

        let items = record.items.unwrap_or_default();
        info!("Recovered {} lost item(s)", items.len());
        let job = ItemJob {
            origin: Origin::Lost,
            kind,
            multiple: items.len() > 1,
            options: Some(record.options.unwrap_or_default()),
            keep_metadata: true,
        };
        let processor = self.inner.items.clone();
        let rescaled = self
            .inner
            .batch
            .save_all(items, kind, job.multiple, move |_, item| processor.rescale(item, job))
            .await;

        Ok(Some(match rescaled {
            Ok(items) => LostResult {
                kind,
                items,
                error: None,
            },
            Err(failure) => LostResult {
                kind,
                items: Vec::new(),
                error: Some(failure),
            },
        }))
    }

    fn discard_camera_target(&self) {
        if let Some(target) = self.camera_target().take() {
            match std::fs::remove_file(&target) {
                Ok(()) => debug!("Removed unused capture file {}", target.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", target.display(), e),
            }
        }
    }

    fn camera_target(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.inner
            .camera_target
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn cache(&self) -> MutexGuard<'_, RecoveryCache> {
        self.inner.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
