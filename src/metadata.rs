//! Minimal EXIF carry-over for JPEG output.
//!
//! The decoder drops metadata, so after a resize the original APP1 `Exif`
//! segment (orientation, capture date, GPS) is spliced into the re-encoded
//! file right after SOI / APP0.

use crate::error::PickerError;
use std::path::Path;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Copy the EXIF segment of `source` into `dest`.
///
/// Returns `Ok(false)` when there is nothing to copy or either file is not a JPEG.
pub fn copy_exif(source: &Path, dest: &Path) -> Result<bool, PickerError> {
    let source_bytes = std::fs::read(source)?;
    let Some(segment) = find_exif_segment(&source_bytes) else {
        return Ok(false);
    };

    let dest_bytes = std::fs::read(dest)?;
    let Some(merged) = insert_exif_segment(&dest_bytes, segment) else {
        return Ok(false);
    };

    std::fs::write(dest, merged)?;
    Ok(true)
}

/// Walk the JPEG marker segments up to SOS, yielding `(marker, start, end)`
/// where `start..end` covers the whole segment including `FF xx` and length.
fn segments(data: &[u8]) -> Vec<(u8, usize, usize)> {
    let mut found = Vec::new();
    if !data.starts_with(&SOI) {
        return found;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == SOS {
            break;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if len < 2 || pos + 2 + len > data.len() {
            break;
        }
        found.push((marker, pos, pos + 2 + len));
        pos += 2 + len;
    }
    found
}

fn is_exif(data: &[u8], start: usize, end: usize) -> bool {
    data[start + 4..end].starts_with(EXIF_HEADER)
}

/// The complete APP1 `Exif` segment of a JPEG, if present.
pub fn find_exif_segment(data: &[u8]) -> Option<&[u8]> {
    segments(data)
        .into_iter()
        .find(|&(marker, start, end)| marker == APP1 && is_exif(data, start, end))
        .map(|(_, start, end)| &data[start..end])
}

/// `dest` with any existing EXIF replaced by `segment`.
pub fn insert_exif_segment(dest: &[u8], segment: &[u8]) -> Option<Vec<u8>> {
    let segs = segments(dest);
    if !dest.starts_with(&SOI) {
        return None;
    }

    let insert_at = segs
        .iter()
        .find(|(marker, _, _)| *marker == APP0)
        .map(|&(_, _, end)| end)
        .unwrap_or(2);

    let mut out = Vec::with_capacity(dest.len() + segment.len());
    out.extend_from_slice(&dest[..insert_at]);
    out.extend_from_slice(segment);

    let mut pos = insert_at;
    for &(marker, start, end) in segs.iter().filter(|(_, start, _)| *start >= insert_at) {
        if marker == APP1 && is_exif(dest, start, end) {
            out.extend_from_slice(&dest[pos..start]);
            pos = end;
        }
    }
    out.extend_from_slice(&dest[pos..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() + 2) as u16;
        let mut seg = vec![0xFF, marker];
        seg.extend_from_slice(&len.to_be_bytes());
        seg.extend_from_slice(payload);
        seg
    }

    fn jpeg(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut data = SOI.to_vec();
        for part in parts {
            data.extend_from_slice(part);
        }
        data.extend_from_slice(&[0xFF, SOS, 0x00, 0x02, 0x11, 0x22, 0xFF, 0xD9]);
        data
    }

    fn exif_payload(tag: u8) -> Vec<u8> {
        let mut payload = EXIF_HEADER.to_vec();
        payload.extend_from_slice(&[b'M', b'M', 0, 42, tag]);
        payload
    }

    #[test]
    fn test_find_exif_segment() {
        let exif = segment(APP1, &exif_payload(1));
        let data = jpeg(&[segment(APP0, b"JFIF\0"), exif.clone()]);
        assert_eq!(find_exif_segment(&data), Some(exif.as_slice()));

        let xmp_only = jpeg(&[segment(APP1, b"http://ns.adobe.com/xap/1.0/\0")]);
        assert_eq!(find_exif_segment(&xmp_only), None);
        assert_eq!(find_exif_segment(b"\x89PNG"), None);
    }

    #[test]
    fn test_insert_after_app0() {
        let app0 = segment(APP0, b"JFIF\0");
        let dest = jpeg(&[app0.clone(), segment(0xDB, &[0u8; 4])]);
        let exif = segment(APP1, &exif_payload(6));

        let merged = insert_exif_segment(&dest, &exif).unwrap();
        assert_eq!(&merged[2..2 + app0.len()], app0.as_slice());
        assert_eq!(find_exif_segment(&merged), Some(exif.as_slice()));
        assert_eq!(merged.len(), dest.len() + exif.len());
    }

    #[test]
    fn test_insert_replaces_existing_exif() {
        let old = segment(APP1, &exif_payload(1));
        let new = segment(APP1, &exif_payload(8));
        let dest = jpeg(&[old]);

        let merged = insert_exif_segment(&dest, &new).unwrap();
        assert_eq!(find_exif_segment(&merged), Some(new.as_slice()));
        assert_eq!(merged.len(), dest.len());
        assert!(merged.ends_with(&[0xFF, 0xD9]));
    }

    #[test]
    fn test_insert_rejects_non_jpeg() {
        assert!(insert_exif_segment(b"GIF89a", &[0xFF, APP1, 0, 2]).is_none());
    }
}
