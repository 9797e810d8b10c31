//! # Media Picker Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare del coordinatore di selezione media
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per gli host nativi
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Codici di errore stabili e triple `PickFailure`
//! - `request`: Richieste, vincoli e risultati
//! - `content` / `providers`: Interfacce verso il sistema operativo
//! - `headless`: Provider senza UI per CLI e test
//! - `file_manager`: Scratch directory e nomi dei file
//! - `normalizer`: Da locator della piattaforma a path stabili
//! - `resize` / `gif_processor` / `metadata`: Post-elaborazione delle immagini
//! - `state`: Cache di recovery dopo la morte del processo
//! - `coordinator`: Orchestratore della richiesta attiva
//!
//! ## Utilizzo:
//! ```ignore
//! use media_picker::{Config, Coordinator, PickRequest, ImageSource};
//!
//! let coordinator = Coordinator::new(config, permissions, surface, resolver, handle)?;
//! let rx = coordinator.pick_channel(PickRequest::single_image(ImageSource::Gallery));
//! // ... the host calls coordinator.on_activity_result(code, outcome)
//! let items = rx.await??;
//! ```

pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod file_manager;
pub mod gif_processor;
pub mod headless;
pub mod metadata;
pub mod normalizer;
pub mod providers;
pub mod request;
pub mod resize;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use config::{Config, OutputFormat};
pub use content::{ContentLocator, ContentResolver, FileSystemResolver};
pub use coordinator::{Coordinator, LostResult};
pub use error::{PickFailure, PickerError};
pub use providers::{
    ActivityOutcome, GalleryUi, LaunchError, LaunchRequest, PermissionProvider, PermissionStatus,
    UiSurfaceProvider,
};
pub use request::{
    CameraDevice, ImageOptions, ImageSource, MediaKind, MediaResult, PickRequest, PickResult,
    RequestCode, SelectionConstraints,
};
pub use state::RecoveryCache;
