//! # Media Picker - Main Entry Point
//!
//! Host headless del coordinatore: i file passati sulla command line fanno le
//! veci della selezione dell'utente (o della cattura della fotocamera).
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione JSON
//! - Esecuzione di una selezione o recupero di un risultato perso
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (sottocomando, vincoli, file)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Crea il Coordinator con `HeadlessSurface` e permessi concessi
//! 4. Risponde al lancio della UI come farebbe l'host nativo
//! 5. Stampa il risultato in JSON su stdout
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-picker pick --multiple --max-width 1024 --quality 80 a.jpg b.png
//! media-picker pick --source camera --kind video clip.mp4
//! media-picker retrieve-lost
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use media_picker::headless::{HeadlessSurface, StaticPermissions};
use media_picker::{
    ActivityOutcome, CameraDevice, Config, ContentLocator, Coordinator, FileSystemResolver,
    ImageSource, LaunchRequest, MediaKind, PickRequest, SelectionConstraints,
};

#[derive(Parser)]
#[command(name = "media-picker")]
#[command(about = "Pick images and videos with resizing and crash recovery")]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a pick, using FILES as the user's selection
    Pick(PickArgs),
    /// Print a result left behind by a previous process (or null)
    RetrieveLost,
}

#[derive(clap::Args)]
struct PickArgs {
    /// image, video or mixed
    #[arg(long, default_value = "image")]
    kind: MediaKind,

    /// camera or gallery
    #[arg(long, default_value = "gallery")]
    source: ImageSource,

    /// Allow selecting more than one item
    #[arg(long)]
    multiple: bool,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    /// Re-encode quality (0-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Maximum number of items for multi-select
    #[arg(long)]
    limit: Option<u32>,

    /// Maximum video length in seconds
    #[arg(long)]
    max_duration: Option<u64>,

    /// Use the front camera
    #[arg(long)]
    front: bool,

    /// Keep embedded metadata in rescaled images
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    full_metadata: bool,

    /// Selected files (the first one is the capture for camera picks)
    files: Vec<PathBuf>,
}

impl PickArgs {
    fn to_request(&self) -> PickRequest {
        let mut request = match (self.kind, self.multiple) {
            (MediaKind::Image, false) => PickRequest::single_image(self.source),
            (MediaKind::Image, true) => PickRequest::multi_image(),
            (MediaKind::Video, false) => PickRequest::single_video(self.source),
            (MediaKind::Video, true) => PickRequest::multi_video(),
            (MediaKind::Mixed, multiple) => PickRequest::media(multiple),
        };
        // Camera + multiple/mixed is left for validation to reject
        request.source = self.source;

        request
            .with_constraints(SelectionConstraints {
                max_width: self.max_width,
                max_height: self.max_height,
                quality: self.quality,
                max_duration: self.max_duration.map(Duration::from_secs),
                limit: self.limit,
            })
            .with_camera_device(if self.front {
                CameraDevice::Front
            } else {
                CameraDevice::Rear
            })
            .with_full_metadata(self.full_metadata)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

type HeadlessCoordinator = Coordinator<StaticPermissions, HeadlessSurface>;

fn build_coordinator(config: Config) -> Result<HeadlessCoordinator> {
    Coordinator::new(
        config,
        StaticPermissions::granted(),
        HeadlessSurface::new(),
        Arc::new(FileSystemResolver),
        tokio::runtime::Handle::current(),
    )
}

async fn run_pick(config: Config, args: PickArgs) -> Result<()> {
    let coordinator = build_coordinator(config)?;
    let rx = coordinator.pick_channel(args.to_request());

    match coordinator.surface().last_launch() {
        Some(LaunchRequest::Camera { code, target, .. }) => {
            let outcome = match args.files.first() {
                Some(capture) => {
                    tokio::fs::copy(capture, &target)
                        .await
                        .with_context(|| format!("Failed to write capture {}", target.display()))?;
                    ActivityOutcome::Selected(Vec::new())
                }
                None => ActivityOutcome::Cancelled,
            };
            coordinator.on_activity_result(code, outcome);
        }
        Some(LaunchRequest::Gallery {
            code,
            multiple,
            limit,
            ..
        }) => {
            let keep = match (multiple, limit) {
                (false, _) => 1,
                (true, Some(limit)) => limit as usize,
                (true, None) => args.files.len(),
            };
            let locators = args
                .files
                .iter()
                .take(keep)
                .map(|f| absolute(f).map(|p| ContentLocator::from_path(&p)))
                .collect::<Result<Vec<_>>>()?;
            debug!("Delivering {} selected file(s)", locators.len());

            let outcome = if locators.is_empty() {
                ActivityOutcome::Cancelled
            } else {
                ActivityOutcome::Selected(locators)
            };
            coordinator.on_activity_result(code, outcome);
        }
        None => debug!("Request completed before any UI was launched"),
    }

    match rx.await? {
        Ok(items) => {
            info!("Picked {} item(s)", items.len());
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure)?);
            Err(failure.into())
        }
    }
}

async fn run_retrieve_lost(config: Config) -> Result<()> {
    let coordinator = build_coordinator(config)?;
    let lost = coordinator.retrieve_lost_result().await?;
    println!("{}", serde_json::to_string_pretty(&lost)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging, stdout is reserved for JSON
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    match args.command {
        Command::Pick(pick) => run_pick(config, pick).await,
        Command::RetrieveLost => run_retrieve_lost(config).await,
    }
}
