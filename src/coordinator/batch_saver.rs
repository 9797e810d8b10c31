//! # Batch Saver Module
//!
//! Salva un batch di elementi selezionati con un pool di worker limitato.
//!
//! ## Regole:
//! - Al massimo `workers` decodifiche contemporanee (semaforo)
//! - L'aggregato attende tutti gli elementi, anche dopo un errore
//! - Il primo errore vince: nessuna lista parziale viene restituita
//! - I path restano nell'ordine di selezione

use crate::error::{PickFailure, PickerError};
use crate::request::{MediaKind, MediaResult};
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{debug, error};

pub struct BatchSaver {
    semaphore: Arc<Semaphore>,
}

impl BatchSaver {
    pub fn new(workers: usize) -> Self {
        debug!("Batch saver configured with {} workers", workers);
        Self {
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Run `job` over every item on the blocking pool
    pub async fn save_all<T, F>(
        &self,
        items: Vec<T>,
        kind: MediaKind,
        multiple: bool,
        job: F,
    ) -> Result<Vec<MediaResult>, PickFailure>
    where
        T: Send + 'static,
        F: Fn(usize, T) -> Result<MediaResult, PickFailure> + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let first_error: Arc<Mutex<Option<PickFailure>>> = Arc::new(Mutex::new(None));
        let mut tasks = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PickerError::resolution(kind, multiple, e.to_string()).into_failure())?;
            let job = job.clone();
            let first_error = first_error.clone();

            tasks.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let result = job(index, item);
                if let Err(ref failure) = result {
                    let mut slot = first_error.lock().unwrap_or_else(|e| e.into_inner());
                    if slot.is_none() {
                        *slot = Some(failure.clone());
                    }
                }
                result
            }));
        }

        let mut saved = Vec::with_capacity(tasks.len());
        let mut worker_failure = None;
        for joined in join_all(tasks).await {
            match joined {
                Ok(Ok(result)) => saved.push(result),
                Ok(Err(_)) => {}
                Err(e) => {
                    error!("Media worker failed: {}", e);
                    worker_failure.get_or_insert_with(|| {
                        PickerError::resolution(kind, multiple, format!("worker failed: {}", e))
                            .into_failure()
                    });
                }
            }
        }

        let first_error = first_error.lock().unwrap_or_else(|e| e.into_inner()).take();
        match first_error.or(worker_failure) {
            Some(failure) => Err(failure),
            None => Ok(saved),
        }
    }
}
