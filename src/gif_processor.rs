//! # Animated GIF Module
//!
//! Ridimensiona GIF animate mantenendo l'animazione.
//!
//! ## Caratteristiche
//! - Decodifica di tutti i frame (già composti a tela intera)
//! - Stesso scaling per ogni frame
//! - Output in loop infinito
//! - Delay per frame preservato, con fallback al delay del primo frame e poi al default

use crate::error::PickerError;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, Delay, Frame, ImageDecoder, Limits};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decoded animation
pub struct GifFrames {
    pub dimensions: (u32, u32),
    pub frames: Vec<Frame>,
}

/// Frame delay in whole milliseconds
fn delay_ms(delay: Delay) -> u32 {
    let (numer, denom) = delay.numer_denom_ms();
    if denom == 0 {
        return 0;
    }
    (numer as f64 / denom as f64).round() as u32
}

/// Fill in missing (zero) delays: own delay, else first frame's, else `default_ms`.
pub fn resolve_delays(delays: &[u32], default_ms: u32) -> Vec<u32> {
    let first = delays.first().copied().filter(|&d| d > 0);
    delays
        .iter()
        .map(|&d| if d > 0 { d } else { first.unwrap_or(default_ms) })
        .collect()
}

pub fn decode_frames(source: &Path, limits: Limits) -> Result<GifFrames, PickerError> {
    let file = File::open(source).map_err(|e| PickerError::InvalidImage(e.to_string()))?;
    let mut decoder = GifDecoder::new(BufReader::new(file))?;
    decoder.set_limits(limits)?;
    let dimensions = decoder.dimensions();
    let frames = decoder.into_frames().collect_frames()?;

    if frames.is_empty() {
        return Err(PickerError::InvalidImage(format!(
            "GIF without frames: {}",
            source.display()
        )));
    }

    Ok(GifFrames { dimensions, frames })
}

/// Scale every frame to `target` and write a looping GIF to `dest`
pub fn encode_scaled(
    animation: GifFrames,
    target: (u32, u32),
    default_delay_ms: u32,
    dest: &Path,
) -> Result<(), PickerError> {
    let delays: Vec<u32> = animation.frames.iter().map(|f| delay_ms(f.delay())).collect();
    let delays = resolve_delays(&delays, default_delay_ms);

    let file = File::create(dest)?;
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite)?;

    for (frame, ms) in animation.frames.into_iter().zip(delays) {
        let buffer = frame.into_buffer();
        let scaled = if buffer.dimensions() == target {
            buffer
        } else {
            imageops::resize(&buffer, target.0, target.1, FilterType::Lanczos3)
        };
        encoder.encode_frame(Frame::from_parts(scaled, 0, 0, Delay::from_numer_denom_ms(ms, 1)))?;
    }

    Ok(())
}
