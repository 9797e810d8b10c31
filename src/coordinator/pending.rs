//! # Pending Call Module
//!
//! Lo slot della singola richiesta attiva. Garantisce che la completion del
//! chiamante venga presa (e quindi invocata) una sola volta.

use crate::request::{PickRequest, PickResult, RequestCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Caller's completion handle
pub type Completion = Box<dyn FnOnce(PickResult) + Send + 'static>;

/// Where the active request is in its flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingPermission,
    AwaitingPicker(RequestCode),
    Processing,
}

/// Who a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The pending call installed with this id
    Request(u64),
    /// Nobody was waiting when the result arrived
    Lost,
}

/// The single in-flight pick
pub struct PendingCall {
    /// Assigned on install, never reused
    pub id: u64,
    pub request: PickRequest,
    pub stage: Stage,
    pub completion: Completion,
}

impl PendingCall {
    pub fn new(request: PickRequest, completion: Completion) -> Self {
        Self {
            id: 0,
            request,
            stage: Stage::Processing,
            completion,
        }
    }
}

/// Mutex-guarded `Option<PendingCall>`: `None` is Idle
#[derive(Default)]
pub struct PendingSlot {
    inner: Mutex<Option<PendingCall>>,
    next_id: AtomicU64,
}

impl PendingSlot {
    fn lock(&self) -> MutexGuard<'_, Option<PendingCall>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install `call` if idle, otherwise hand it back
    pub fn try_install(&self, mut call: PendingCall) -> Result<u64, PendingCall> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(call);
        }
        call.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = call.id;
        *slot = Some(call);
        Ok(id)
    }

    /// Origin of a result arriving now
    pub fn origin(&self) -> Origin {
        self.lock()
            .as_ref()
            .map_or(Origin::Lost, |call| Origin::Request(call.id))
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    pub fn request(&self) -> Option<PickRequest> {
        self.lock().as_ref().map(|call| call.request.clone())
    }

    pub fn stage(&self) -> Option<Stage> {
        self.lock().as_ref().map(|call| call.stage)
    }

    pub fn set_stage(&self, stage: Stage) {
        if let Some(call) = self.lock().as_mut() {
            call.stage = stage;
        }
    }

    /// Move from `from` to `to`; false if the active call is elsewhere
    pub fn transition(&self, from: Stage, to: Stage) -> bool {
        match self.lock().as_mut() {
            Some(call) if call.stage == from => {
                call.stage = to;
                true
            }
            _ => false,
        }
    }

    /// Take-and-clear, only if the call is still the one installed as `id`.
    /// The only way to reach the completion.
    pub fn take_if(&self, id: u64) -> Option<PendingCall> {
        let mut slot = self.lock();
        match slot.as_ref() {
            Some(call) if call.id == id => slot.take(),
            _ => None,
        }
    }
}
