//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione del picker.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri di elaborazione e storage
//! - Fornisce validazione robusta dei parametri
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `scratch_dir`: Directory privata per copie e output ridimensionati
//! - `state_dir`: Directory della cache di recovery
//! - `host_id`: Namespace della cache di recovery (uno per app ospite)
//! - `workers`: Numero di worker paralleli per i batch (default: 4)
//! - `use_photo_picker`: Preferisce il photo picker di sistema quando disponibile
//! - `output_format`: Formato di ricodifica (default: JPEG)
//! - `default_gif_frame_delay_ms`: Delay di fallback per i frame GIF (default: 100)
//! - `decode_memory_limit`: Limite di allocazione in decodifica (default: 512 MiB)
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     workers: 2,
//!     use_photo_picker: false,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Encoding used for re-encoded images without alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// Configuration for the picker coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Process-private storage for copied and scaled media
    pub scratch_dir: PathBuf,
    /// Where the recovery cache lives
    pub state_dir: PathBuf,
    /// Namespace for the recovery cache
    pub host_id: String,
    /// Number of parallel workers for batch saves
    pub workers: usize,
    /// Prefer the system photo picker over the legacy document picker
    pub use_photo_picker: bool,
    pub output_format: OutputFormat,
    /// Frame delay used when a GIF frame and the first frame carry none
    pub default_gif_frame_delay_ms: u32,
    /// Upper bound on decoder allocations, in bytes
    pub decode_memory_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        let scratch_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("media-picker");
        let state_dir = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("media-picker");

        Self {
            scratch_dir,
            state_dir,
            host_id: "default".to_string(),
            workers: 4,
            use_photo_picker: true,
            output_format: OutputFormat::Jpeg,
            default_gif_frame_delay_ms: 100,
            decode_memory_limit: 512 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Config rooted in a single directory, handy for hosts that own one data dir
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            scratch_dir: root.join("scratch"),
            state_dir: root.join("state"),
            ..Default::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.default_gif_frame_delay_ms == 0 {
            return Err(anyhow::anyhow!("Default GIF frame delay must be greater than 0"));
        }

        if self.decode_memory_limit == 0 {
            return Err(anyhow::anyhow!("Decode memory limit must be greater than 0"));
        }

        if self.host_id.trim().is_empty() {
            return Err(anyhow::anyhow!("Host id must not be empty"));
        }

        if self.scratch_dir.exists() && !self.scratch_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "Scratch path is not a directory: {}",
                self.scratch_dir.display()
            ));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.workers = 0;
        assert!(config.validate().is_err());

        config.workers = 4;
        config.default_gif_frame_delay_ms = 0;
        assert!(config.validate().is_err());

        config.default_gif_frame_delay_ms = 100;
        config.host_id = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.workers, 4);
        assert!(config.use_photo_picker);
        assert_eq!(config.output_format, OutputFormat::Jpeg);
        assert_eq!(config.default_gif_frame_delay_ms, 100);
        assert!(config.scratch_dir.ends_with("media-picker"));
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            workers: 2,
            use_photo_picker: false,
            output_format: OutputFormat::Png,
            host_id: "gallery-app".to_string(),
            ..Config::rooted_at(temp_dir.path())
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.workers, 2);
        assert!(!loaded_config.use_photo_picker);
        assert_eq!(loaded_config.output_format, OutputFormat::Png);
        assert_eq!(loaded_config.host_id, "gallery-app");
        assert_eq!(loaded_config.scratch_dir, temp_dir.path().join("scratch"));
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            tokio_test::assert_ok!(tokio_test::block_on(Config::from_file(&temp_dir.path().join("absent.json"))));
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn test_invalid_config_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "workers": 0 }"#).unwrap();

        tokio_test::assert_err!(tokio_test::block_on(Config::from_file(&config_path)));
    }

    #[tokio::test]
    async fn test_partial_config_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{ "workers": 8 }"#).await.unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.host_id, "default");
    }
}
