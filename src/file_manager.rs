//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file della scratch directory.
//!
//! ## Responsabilità:
//! - Copia in streaming di un contenuto in una sottodirectory fresca e univoca
//! - Sanitizzazione dei nomi file (niente `..` o separatori sopravvivono)
//! - Mappatura MIME ⇄ estensione, con default `.jpg`
//! - Determinazione tipo file (immagine vs video)
//! - Creazione dei file di destinazione per la fotocamera
//!
//! ## Formati riconosciuti:
//! - **Immagini**: JPG, JPEG, PNG, GIF, WebP, HEIC, HEIF, BMP
//! - **Video**: MP4, MOV, 3GP, WebM, MKV, AVI
//!
//! ## Strategia scratch:
//! - Ogni copia vive in una sottodirectory propria (`pick_XXXXXX/`) per evitare collisioni di nome
//! - I file non vengono mai modificati in place
//!
//! ## Esempio:
//! ```ignore
//! let name = FileManager::file_name_for(Some("a/../b.png"), Some("image/png"));
//! let path = FileManager::copy_to_scratch(&mut reader, &scratch_dir, &name)?;
//! ```

use crate::request::MediaKind;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const MIME_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("bmp", "image/bmp"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("3gp", "video/3gpp"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
];

/// Manages scratch storage and file naming
pub struct FileManager;

impl FileManager {
    /// Strip path-traversal sequences from a display name
    ///
    /// Everything up to and including the last `..` is dropped, then any
    /// remaining separator becomes `_`.
    pub fn sanitize_filename(display_name: &str) -> String {
        let tail = match display_name.rfind("..") {
            Some(idx) => &display_name[idx + 2..],
            None => display_name,
        };
        tail.replace(['/', '\\'], "_")
    }

    /// Extension (with leading dot) for a MIME type, `.jpg` when unknown
    pub fn extension_for_mime(mime: Option<&str>) -> &'static str {
        Self::known_extension_for_mime(mime).unwrap_or(".jpg")
    }

    fn known_extension_for_mime(mime: Option<&str>) -> Option<&'static str> {
        let mime = mime?.to_ascii_lowercase();
        let ext = match mime.as_str() {
            "image/jpeg" | "image/jpg" => ".jpg",
            "image/png" => ".png",
            "image/gif" => ".gif",
            "image/webp" => ".webp",
            "image/heic" => ".heic",
            "image/heif" => ".heif",
            "image/bmp" => ".bmp",
            "video/mp4" => ".mp4",
            "video/quicktime" => ".mov",
            "video/3gpp" => ".3gp",
            "video/webm" => ".webm",
            "video/x-matroska" => ".mkv",
            "video/x-msvideo" => ".avi",
            _ => return None,
        };
        Some(ext)
    }

    /// MIME type guessed from a file extension
    pub fn mime_for_path(path: &Path) -> Option<&'static str> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        MIME_TABLE
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, mime)| *mime)
    }

    /// Final stored file name for a copied item
    pub fn file_name_for(display_name: Option<&str>, mime: Option<&str>) -> String {
        let extension = Self::known_extension_for_mime(mime);
        let sanitized = display_name
            .map(Self::sanitize_filename)
            .filter(|n| !n.is_empty() && n != ".");
        match sanitized {
            None => format!("image_picker{}", extension.unwrap_or(".jpg")),
            Some(name) => match extension {
                Some(ext) => {
                    let stem = Path::new(&name)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or(name.clone());
                    format!("{}{}", stem, ext)
                }
                None => name,
            },
        }
    }

    pub fn is_image_mime(mime: &str) -> bool {
        mime.to_ascii_lowercase().starts_with("image/")
    }

    pub fn is_video_mime(mime: &str) -> bool {
        mime.to_ascii_lowercase().starts_with("video/")
    }

    /// Check if a file is a video
    pub fn is_video(path: &Path) -> bool {
        Self::mime_for_path(path).is_some_and(Self::is_video_mime)
    }

    /// Create a fresh, uniquely named directory under the scratch root
    pub fn fresh_dir(scratch_root: &Path, prefix: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(scratch_root)?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .rand_bytes(8)
            .tempdir_in(scratch_root)?;
        Ok(dir.keep())
    }

    /// Stream `reader` into `scratch_root/<fresh dir>/<file_name>`
    pub fn copy_to_scratch(
        reader: &mut dyn Read,
        scratch_root: &Path,
        file_name: &str,
    ) -> io::Result<PathBuf> {
        let dir = Self::fresh_dir(scratch_root, "pick_")?;
        let target = dir.join(file_name);

        let result = File::create(&target).and_then(|file| {
            let mut writer = BufWriter::new(file);
            let copied = io::copy(reader, &mut writer)?;
            writer.flush()?;
            Ok(copied)
        });

        match result {
            Ok(copied) => {
                debug!("Copied {} into {}", Self::format_size(copied), target.display());
                Ok(target)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&dir);
                Err(e)
            }
        }
    }

    /// Empty file the camera writes its capture into
    pub fn create_capture_target(scratch_root: &Path, kind: MediaKind) -> io::Result<PathBuf> {
        fs::create_dir_all(scratch_root)?;
        let suffix = match kind {
            MediaKind::Video => ".mp4",
            _ => ".jpg",
        };
        let file = tempfile::Builder::new()
            .prefix("image_picker_")
            .suffix(suffix)
            .tempfile_in(scratch_root)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(FileManager::sanitize_filename("a/../b.png"), "_b.png");
        assert_eq!(FileManager::sanitize_filename("../../etc/passwd"), "_etc_passwd");
        assert_eq!(FileManager::sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(FileManager::sanitize_filename("dir/photo.jpg"), "dir_photo.jpg");
    }

    #[test]
    fn test_file_name_for() {
        assert_eq!(FileManager::file_name_for(None, None), "image_picker.jpg");
        assert_eq!(FileManager::file_name_for(None, Some("video/mp4")), "image_picker.mp4");
        assert_eq!(FileManager::file_name_for(Some("shot.HEIC"), Some("image/jpeg")), "shot.jpg");
        assert_eq!(FileManager::file_name_for(Some("a/../b.png"), None), "_b.png");
        assert_eq!(FileManager::file_name_for(Some(""), Some("image/png")), "image_picker.png");
    }

    #[test]
    fn test_dot_display_name_is_synthesized() {
        assert_eq!(FileManager::file_name_for(Some("."), Some("image/png")), "image_picker.png");
        assert_eq!(FileManager::file_name_for(Some("."), None), "image_picker.jpg");
        assert_eq!(FileManager::file_name_for(Some("x/.."), None), "image_picker.jpg");

        let scratch = TempDir::new().unwrap();
        let name = FileManager::file_name_for(Some("."), Some("image/jpeg"));
        let copied = FileManager::copy_to_scratch(&mut &b"jpeg"[..], scratch.path(), &name).unwrap();
        assert!(copied.is_file());
    }

    #[test]
    fn test_mime_tables() {
        assert_eq!(FileManager::extension_for_mime(Some("image/png")), ".png");
        assert_eq!(FileManager::extension_for_mime(Some("application/x-unknown")), ".jpg");
        assert_eq!(FileManager::extension_for_mime(None), ".jpg");
        assert_eq!(FileManager::mime_for_path(Path::new("clip.MOV")), Some("video/quicktime"));
        assert!(FileManager::is_image_mime("IMAGE/gif"));
        assert!(FileManager::is_video(Path::new("a.mp4")));
        assert!(!FileManager::is_video(Path::new("a.txt")));
    }

    #[test]
    fn test_copy_to_scratch_uses_fresh_dirs() {
        let scratch = TempDir::new().unwrap();
        let first = FileManager::copy_to_scratch(&mut &b"one"[..], scratch.path(), "same.jpg").unwrap();
        let second = FileManager::copy_to_scratch(&mut &b"two"[..], scratch.path(), "same.jpg").unwrap();

        assert_ne!(first, second);
        assert_eq!(first.file_name(), second.file_name());
        assert!(first.starts_with(scratch.path()));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_capture_target() {
        let scratch = TempDir::new().unwrap();
        let image = FileManager::create_capture_target(scratch.path(), MediaKind::Image).unwrap();
        let video = FileManager::create_capture_target(scratch.path(), MediaKind::Video).unwrap();
        assert!(image.exists());
        assert_eq!(image.extension().unwrap(), "jpg");
        assert_eq!(video.extension().unwrap(), "mp4");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
    }
}
