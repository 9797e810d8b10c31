//! # Coordinator Module
//!
//! Separa le responsabilità del coordinatore in sottomoduli:
//! - `request_coordinator`: Orchestratore della richiesta attiva
//! - `pending`: Slot della richiesta in volo e della sua completion
//! - `batch_saver`: Pool di worker limitato per i salvataggi multipli
//! - `item_task`: Lavoro per il singolo elemento selezionato

pub mod batch_saver;
pub mod item_task;
pub mod pending;
pub mod request_coordinator;

pub use batch_saver::BatchSaver;
pub use item_task::{ItemJob, ItemProcessor};
pub use pending::{Completion, Origin, PendingSlot, Stage};
pub use request_coordinator::{Coordinator, LostResult};
