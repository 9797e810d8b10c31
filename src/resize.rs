//! # Image Resize Module
//!
//! Questo modulo gestisce il post-processing delle immagini selezionate.
//!
//! ## Caratteristiche
//! - **Fast path**: nessuna copia se non ci sono dimensioni massime e la qualità è 100 (o assente)
//! - **Fit within box**: aspect ratio preservato, solo downscaling, vince il vincolo più stretto
//! - **Decodifica ridotta**: i JPEG vengono decodificati già scalati (1/2, 1/4, 1/8)
//!   nel dominio DCT, così il buffer a piena risoluzione non viene mai allocato.
//!   Gli altri formati sono decodificati per intero entro `decode_memory_limit`
//! - **Ricodifica**: PNG con alpha resta PNG, il resto usa il formato configurato
//! - **EXIF**: copiato dalla sorgente quando richiesto, errori solo loggati
//! - **GIF animate**: delegate a `gif_processor`
//!
//! ## Politica errori
//! - Decodifica fallita → `invalid_image`, terminale
//! - Resize/encode/scrittura fallita → warning e path originale
//!
//! ## Struttura Output
//! ```text
//! <scratch_dir>/
//! └── scaled_XXXXXXXX/
//!     └── scaled_foto.jpg
//! ```

use crate::config::{Config, OutputFormat};
use crate::error::PickerError;
use crate::file_manager::FileManager;
use crate::gif_processor;
use crate::metadata;
use crate::request::ImageOptions;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Limits, RgbImage};
use jpeg_decoder::PixelFormat;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, warn};

static PNG_QUALITY_WARNING: Once = Once::new();

/// Whether the options ask for any work at all
pub fn should_scale(options: &ImageOptions) -> bool {
    options.max_width.is_some()
        || options.max_height.is_some()
        || options.quality.is_some_and(|q| q < 100)
}

/// Output size for `original` under `options`: fit within the box, never upscale
pub fn target_size(original: (u32, u32), options: &ImageOptions) -> (u32, u32) {
    let (ow, oh) = (original.0 as f64, original.1 as f64);
    if ow == 0.0 || oh == 0.0 {
        return original;
    }

    let mut width = options.max_width.map_or(ow, |m| (m as f64).min(ow));
    let mut height = options.max_height.map_or(oh, |m| (m as f64).min(oh));

    let downscale_width = options.max_width.is_some_and(|m| (m as f64) < ow);
    let downscale_height = options.max_height.is_some_and(|m| (m as f64) < oh);

    if downscale_width || downscale_height {
        let aspect = ow / oh;
        let width_for_max_height = height * aspect;
        let height_for_max_width = width / aspect;
        if height_for_max_width > height {
            width = width_for_max_height.round();
        } else {
            height = height_for_max_width.round();
        }
    }

    ((width.round() as u32).max(1), (height.round() as u32).max(1))
}

/// Largest power-of-two downsample that still covers `target`
pub fn sample_size(original: (u32, u32), target: (u32, u32)) -> u32 {
    let (width, height) = original;
    let (req_width, req_height) = (target.0.max(1), target.1.max(1));
    let mut sample = 1;

    if height > req_height || width > req_width {
        let half_height = height / 2;
        let half_width = width / 2;
        while half_height / sample >= req_height && half_width / sample >= req_width {
            sample *= 2;
        }
    }

    sample
}

/// Re-encodes picked images per the caller's constraints
#[derive(Debug, Clone)]
pub struct ImageResizer {
    scratch_dir: PathBuf,
    output_format: OutputFormat,
    decode_memory_limit: u64,
    default_gif_frame_delay_ms: u32,
}

impl ImageResizer {
    pub fn new(config: &Config) -> Self {
        Self {
            scratch_dir: config.scratch_dir.clone(),
            output_format: config.output_format,
            decode_memory_limit: config.decode_memory_limit,
            default_gif_frame_delay_ms: config.default_gif_frame_delay_ms,
        }
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.decode_memory_limit);
        limits
    }

    /// Resize/recompress `path` if `options` ask for it.
    ///
    /// Returns the original path on the fast path and when anything after
    /// decoding fails. A file that cannot be decoded is an error.
    pub fn resize_if_needed(
        &self,
        path: &Path,
        options: &ImageOptions,
        keep_metadata: bool,
    ) -> Result<PathBuf, PickerError> {
        if !should_scale(options) {
            return Ok(path.to_path_buf());
        }

        let format = self.probe_format(path)?;
        if format == ImageFormat::Gif {
            return self.resize_gif(path, options);
        }

        let (image, original) = match format {
            ImageFormat::Jpeg => match self.decode_jpeg_scaled(path, options)? {
                Some(decoded) => decoded,
                None => self.decode_full(path)?,
            },
            _ => self.decode_full(path)?,
        };
        match self.write_scaled(path, image, original, format, options, keep_metadata) {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!(
                    "Could not re-encode {}, returning the original: {}",
                    path.display(),
                    e
                );
                Ok(path.to_path_buf())
            }
        }
    }

    fn probe_format(&self, path: &Path) -> Result<ImageFormat, PickerError> {
        let reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| PickerError::InvalidImage(format!("{}: {}", path.display(), e)))?;
        reader.format().ok_or_else(|| {
            PickerError::InvalidImage(format!("unrecognized image format: {}", path.display()))
        })
    }

    /// Decoded image and the size it is stored at
    fn decode_full(&self, path: &Path) -> Result<(DynamicImage, (u32, u32)), PickerError> {
        let mut reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| PickerError::InvalidImage(format!("{}: {}", path.display(), e)))?;
        reader.limits(self.limits());
        let image = reader.decode()?;
        let original = (image.width(), image.height());
        Ok((image, original))
    }

    /// JPEG decoded at the smallest DCT scale that still covers the target.
    /// `None` for pixel formats left to the full decoder (CMYK, 16-bit gray).
    fn decode_jpeg_scaled(
        &self,
        path: &Path,
        options: &ImageOptions,
    ) -> Result<Option<(DynamicImage, (u32, u32))>, PickerError> {
        let invalid = |e: jpeg_decoder::Error| PickerError::InvalidImage(format!("{}: {}", path.display(), e));
        let file = File::open(path).map_err(|e| PickerError::InvalidImage(format!("{}: {}", path.display(), e)))?;

        let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
        decoder.set_max_decoding_buffer_size(usize::try_from(self.decode_memory_limit).unwrap_or(usize::MAX));
        decoder.read_info().map_err(invalid)?;
        let Some(info) = decoder.info() else {
            return Ok(None);
        };
        if !matches!(info.pixel_format, PixelFormat::L8 | PixelFormat::RGB24) {
            return Ok(None);
        }

        let original = (u32::from(info.width), u32::from(info.height));
        let target = target_size(original, options);
        let sample = sample_size(original, target).min(8);
        let (width, height) = if sample > 1 {
            let (w, h) = decoder
                .scale(
                    (original.0 / sample).max(target.0) as u16,
                    (original.1 / sample).max(target.1) as u16,
                )
                .map_err(invalid)?;
            debug!("Decoding {} at 1/{} ({}x{})", path.display(), sample, w, h);
            (u32::from(w), u32::from(h))
        } else {
            original
        };

        let pixels = decoder.decode().map_err(invalid)?;
        let image = match info.pixel_format {
            PixelFormat::L8 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
            _ => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        };
        image
            .map(|image| Some((image, original)))
            .ok_or_else(|| PickerError::InvalidImage(format!("truncated pixel data: {}", path.display())))
    }

    fn output_path(&self, source: &Path, extension: &str) -> Result<PathBuf, PickerError> {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image_picker".to_string());
        let dir = FileManager::fresh_dir(&self.scratch_dir, "scaled_")?;
        Ok(dir.join(format!("scaled_{}.{}", stem, extension)))
    }

    fn write_scaled(
        &self,
        source: &Path,
        image: DynamicImage,
        original: (u32, u32),
        format: ImageFormat,
        options: &ImageOptions,
        keep_metadata: bool,
    ) -> Result<PathBuf, PickerError> {
        let target = target_size(original, options);

        let mut image = image;
        if (image.width(), image.height()) != target {
            image = image.resize_exact(target.0, target.1, FilterType::Lanczos3);
        }

        let keep_png = format == ImageFormat::Png && image.color().has_alpha();
        let output_format = if keep_png {
            if options.quality.is_some_and(|q| q < 100) {
                PNG_QUALITY_WARNING.call_once(|| {
                    warn!("Compression quality is not supported for PNG with alpha, keeping original quality");
                });
            }
            OutputFormat::Png
        } else {
            self.output_format
        };

        let output = self.output_path(source, output_format.extension())?;
        let writer = BufWriter::new(File::create(&output)?);
        match output_format {
            OutputFormat::Jpeg => {
                let quality = options.quality.unwrap_or(100).max(1);
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, quality))?;
            }
            OutputFormat::Png => {
                image.write_with_encoder(PngEncoder::new(writer))?;
            }
        }

        if keep_metadata && format == ImageFormat::Jpeg && output_format == OutputFormat::Jpeg {
            match metadata::copy_exif(source, &output) {
                Ok(true) => debug!("Copied EXIF from {}", source.display()),
                Ok(false) => {}
                Err(e) => warn!("Could not copy EXIF from {}: {}", source.display(), e),
            }
        }

        debug!(
            "Scaled {} from {}x{} to {}x{} -> {}",
            source.display(),
            original.0,
            original.1,
            target.0,
            target.1,
            output.display()
        );
        Ok(output)
    }

    fn resize_gif(&self, path: &Path, options: &ImageOptions) -> Result<PathBuf, PickerError> {
        let animation = gif_processor::decode_frames(path, self.limits())?;
        let target = target_size(animation.dimensions, options);
        if target == animation.dimensions {
            return Ok(path.to_path_buf());
        }

        let written = self.output_path(path, "gif").and_then(|output| {
            gif_processor::encode_scaled(animation, target, self.default_gif_frame_delay_ms, &output)?;
            Ok(output)
        });

        match written {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!("Could not rescale GIF {}, returning the original: {}", path.display(), e);
                Ok(path.to_path_buf())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        jpeg_with_exif, write_animation, write_jpeg, write_png_opaque, write_png_with_alpha,
    };
    use tempfile::TempDir;

    fn options(max_width: Option<u32>, max_height: Option<u32>, quality: Option<u8>) -> ImageOptions {
        ImageOptions {
            max_width,
            max_height,
            quality,
        }
    }

    fn resizer(dir: &TempDir) -> ImageResizer {
        ImageResizer::new(&Config::rooted_at(dir.path()))
    }

    fn dimensions(path: &Path) -> (u32, u32) {
        image::image_dimensions(path).unwrap()
    }

    #[test]
    fn test_should_scale() {
        assert!(!should_scale(&options(None, None, None)));
        assert!(!should_scale(&options(None, None, Some(100))));
        assert!(should_scale(&options(None, None, Some(99))));
        assert!(should_scale(&options(Some(10), None, None)));
        assert!(should_scale(&options(None, Some(10), Some(100))));
    }

    #[test]
    fn test_target_size_width_only() {
        assert_eq!(target_size((4000, 2000), &options(Some(1000), None, None)), (1000, 500));
    }

    #[test]
    fn test_target_size_box_picks_tighter_constraint() {
        assert_eq!(target_size((4000, 2000), &options(Some(100), Some(100), None)), (100, 50));
        assert_eq!(target_size((2000, 4000), &options(Some(100), Some(100), None)), (50, 100));
        assert_eq!(target_size((4000, 2000), &options(None, Some(1000), None)), (2000, 1000));
        assert_eq!(target_size((4000, 2000), &options(Some(5000), Some(1000), None)), (2000, 1000));
    }

    #[test]
    fn test_target_size_never_upscales() {
        assert_eq!(target_size((640, 480), &options(Some(2000), Some(2000), None)), (640, 480));
        assert_eq!(target_size((640, 480), &options(None, None, Some(50))), (640, 480));
    }

    #[test]
    fn test_sample_size() {
        assert_eq!(sample_size((4000, 2000), (1000, 500)), 4);
        assert_eq!(sample_size((4000, 2000), (100, 50)), 32);
        assert_eq!(sample_size((640, 480), (640, 480)), 1);
        assert_eq!(sample_size((1000, 1000), (600, 600)), 1);
    }

    #[test]
    fn test_fast_path_returns_original() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.jpg");
        write_jpeg(&source, 64, 32);

        let out = resizer(&dir).resize_if_needed(&source, &options(None, None, Some(100)), true).unwrap();
        assert_eq!(out, source);
        let out = resizer(&dir).resize_if_needed(&source, &options(None, None, None), true).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn test_resize_writes_fresh_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.jpg");
        write_jpeg(&source, 400, 200);
        let before = std::fs::read(&source).unwrap();

        let out = resizer(&dir)
            .resize_if_needed(&source, &options(Some(100), Some(100), Some(80)), false)
            .unwrap();

        assert_ne!(out, source);
        assert!(out.starts_with(dir.path().join("scratch")));
        assert_eq!(out.file_name().unwrap(), "scaled_photo.jpg");
        assert_eq!(dimensions(&out), (100, 50));
        assert_eq!(std::fs::read(&source).unwrap(), before);
    }

    #[test]
    fn test_png_with_alpha_stays_png() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("icon.png");
        write_png_with_alpha(&source, 80, 80);

        let out = resizer(&dir)
            .resize_if_needed(&source, &options(Some(40), None, Some(10)), false)
            .unwrap();
        assert_eq!(out.extension().unwrap(), "png");
        let decoded = image::open(&out).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!((decoded.width(), decoded.height()), (40, 40));
    }

    #[test]
    fn test_opaque_png_uses_configured_format() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("flat.png");
        write_png_opaque(&source, 80, 40);

        let out = resizer(&dir)
            .resize_if_needed(&source, &options(None, Some(20), None), false)
            .unwrap();
        assert_eq!(out.extension().unwrap(), "jpg");
        assert_eq!(dimensions(&out), (40, 20));
    }

    #[test]
    fn test_exif_follows_metadata_flag() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("camera.jpg");
        let segment = jpeg_with_exif(&source, 200, 100);

        let kept = resizer(&dir)
            .resize_if_needed(&source, &options(Some(50), None, None), true)
            .unwrap();
        let kept_bytes = std::fs::read(&kept).unwrap();
        assert_eq!(metadata::find_exif_segment(&kept_bytes), Some(segment.as_slice()));

        let stripped = resizer(&dir)
            .resize_if_needed(&source, &options(Some(50), None, None), false)
            .unwrap();
        let stripped_bytes = std::fs::read(&stripped).unwrap();
        assert_eq!(metadata::find_exif_segment(&stripped_bytes), None);
    }

    #[test]
    fn test_large_jpeg_is_decoded_reduced() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("large.jpg");
        write_jpeg(&source, 800, 400);
        let bounded = options(Some(100), Some(100), None);

        let (image, original) = resizer(&dir).decode_jpeg_scaled(&source, &bounded).unwrap().unwrap();
        assert_eq!(original, (800, 400));
        assert!(image.width() < 800 && image.width() >= 100);
        assert!(image.height() < 400 && image.height() >= 50);

        let out = resizer(&dir).resize_if_needed(&source, &bounded, false).unwrap();
        assert_eq!(dimensions(&out), (100, 50));
    }

    #[test]
    fn test_undecodable_image_is_terminal() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not an image").unwrap();

        let err = resizer(&dir)
            .resize_if_needed(&source, &options(Some(10), None, None), true)
            .unwrap_err();
        assert_eq!(err.code(), "invalid_image");
    }

    #[test]
    fn test_encode_failure_falls_back_to_original() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.jpg");
        write_jpeg(&source, 100, 100);
        // A file where the scratch directory should be makes every write fail
        let mut config = Config::rooted_at(dir.path());
        config.scratch_dir = dir.path().join("occupied");
        std::fs::write(&config.scratch_dir, b"").unwrap();

        let out = ImageResizer::new(&config)
            .resize_if_needed(&source, &options(Some(10), None, None), true)
            .unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn test_animated_gif_is_scaled_frame_by_frame() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("anim.gif");
        write_animation(&source, (60, 30), &[100, 0, 40]);

        let out = resizer(&dir)
            .resize_if_needed(&source, &options(Some(30), None, None), true)
            .unwrap();
        assert_eq!(out.extension().unwrap(), "gif");

        let animation = gif_processor::decode_frames(&out, Limits::default()).unwrap();
        assert_eq!(animation.dimensions, (30, 15));
        assert_eq!(animation.frames.len(), 3);
        let delays: Vec<u32> = animation
            .frames
            .iter()
            .map(|f| {
                let (n, d) = f.delay().numer_denom_ms();
                n / d
            })
            .collect();
        assert_eq!(delays, vec![100, 100, 40]);
    }

    #[test]
    fn test_gif_within_bounds_is_untouched() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("small.gif");
        write_animation(&source, (20, 20), &[50, 50]);

        let out = resizer(&dir)
            .resize_if_needed(&source, &options(Some(100), None, Some(50)), true)
            .unwrap();
        assert_eq!(out, source);
    }
}
