//! Test-only fixtures shared across unit test modules.

use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::{Delay, Frame, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs::File;
use std::path::Path;

/// Write a gradient JPEG of the given size.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let file = File::create(path).unwrap();
    let encoder = JpegEncoder::new_with_quality(file, 90);
    img.write_with_encoder(encoder).unwrap();
}

/// Write a PNG with a translucent alpha channel.
pub fn write_png_with_alpha(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, _| Rgba([200, 10, 10, (x % 256) as u8]));
    img.save(path).unwrap();
}

/// Write an opaque PNG.
pub fn write_png_opaque(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_pixel(width, height, Rgb([10, 200, 10]));
    img.save(path).unwrap();
}

/// Write a looping animated GIF with one frame per delay.
pub fn write_animation(path: &Path, size: (u32, u32), delays_ms: &[u32]) {
    let file = File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite).unwrap();
    for (i, &ms) in delays_ms.iter().enumerate() {
        let shade = (i * 60 % 256) as u8;
        let buffer = RgbaImage::from_pixel(size.0, size.1, Rgba([shade, 0, 255 - shade, 255]));
        encoder
            .encode_frame(Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(ms, 1)))
            .unwrap();
    }
}

/// JPEG bytes with an APP1 Exif segment inserted after SOI.
pub fn jpeg_with_exif(path: &Path, width: u32, height: u32) -> Vec<u8> {
    write_jpeg(path, width, height);
    let data = std::fs::read(path).unwrap();

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(b"MM\0\x2a\0\0\0\x08\0\x01\x01\x12\0\x03\0\0\0\x01\0\x06\0\0\0\0\0\0");
    let len = (payload.len() + 2) as u16;
    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&len.to_be_bytes());
    segment.extend_from_slice(&payload);

    let mut out = data[..2].to_vec();
    out.extend_from_slice(&segment);
    out.extend_from_slice(&data[2..]);
    std::fs::write(path, &out).unwrap();
    segment
}
