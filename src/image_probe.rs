use exif::{In, Reader, Tag, Value};
use log::debug;
use std::io::Cursor;

use crate::layout_types::{Dimension, ResolveError, ResolveResult};

/// Response headers some origins attach with the stored pixel dimensions,
/// letting a HEAD request answer without any payload bytes.
pub const WIDTH_HEADER: &str = "x-image-width";
pub const HEIGHT_HEADER: &str = "x-image-height";

/// Decodes width/height from the leading bytes of an image payload without
/// a full decode. Every format the `image` crate supports here keeps its
/// dimensions in the header region, so a bounded prefix is enough.
pub fn dimensions_from_prefix(bytes: &[u8]) -> ResolveResult<Dimension> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| ResolveError::Undecodable(bytes.len()))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|_| ResolveError::Undecodable(bytes.len()))?;

    let raw = Dimension::new(width, height).ok_or(ResolveError::Undecodable(bytes.len()))?;
    Ok(apply_orientation(raw, orientation_from_prefix(bytes)))
}

/// Reads the EXIF orientation tag from the prefix bytes. Absent or
/// unreadable EXIF is not an error; the decoded dimensions stand as-is.
pub fn orientation_from_prefix(bytes: &[u8]) -> Option<u16> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;

    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    match field.value {
        Value::Short(ref v) if !v.is_empty() => Some(v[0]),
        _ => None,
    }
}

/// Decoders report pre-rotation pixel dimensions. Orientations 5 through 8
/// rotate the image a quarter turn when displayed, so width and height
/// swap; 1 through 4 (normal, mirrored, 180°) leave them unchanged.
pub fn apply_orientation(dimension: Dimension, orientation: Option<u16>) -> Dimension {
    match orientation {
        Some(o @ 5..=8) => {
            debug!("EXIF orientation {} transposes dimensions", o);
            dimension.transposed()
        }
        _ => dimension,
    }
}

/// Parses the optional dimension headers from a HEAD response.
pub fn dimensions_from_headers(
    width_header: Option<&str>,
    height_header: Option<&str>,
) -> Option<Dimension> {
    let width = width_header?.trim().parse::<u32>().ok()?;
    let height = height_header?.trim().parse::<u32>().ok()?;
    Dimension::new(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    // APP1 Exif segment (marker included) holding a single-IFD TIFF with
    // just the orientation tag.
    fn exif_app1_segment(orientation: u16) -> Vec<u8> {
        let mut tiff: Vec<u8> = Vec::new();
        tiff.extend_from_slice(b"II*\0"); // little-endian TIFF magic
        tiff.extend_from_slice(&8u32.to_le_bytes()); // IFD0 offset
        tiff.extend_from_slice(&1u16.to_le_bytes()); // one entry
        tiff.extend_from_slice(&0x0112u16.to_le_bytes()); // Orientation
        tiff.extend_from_slice(&3u16.to_le_bytes()); // SHORT
        tiff.extend_from_slice(&1u32.to_le_bytes()); // count
        tiff.extend_from_slice(&orientation.to_le_bytes());
        tiff.extend_from_slice(&0u16.to_le_bytes()); // value padding
        tiff.extend_from_slice(&0u32.to_le_bytes()); // no next IFD

        let mut payload: Vec<u8> = Vec::new();
        payload.extend_from_slice(b"Exif\0\0");
        payload.extend_from_slice(&tiff);

        let mut segment: Vec<u8> = vec![0xFF, 0xE1];
        segment.extend_from_slice(&((payload.len() as u16 + 2).to_be_bytes()));
        segment.extend_from_slice(&payload);
        segment
    }

    // Smallest container kamadak-exif will read: SOI, APP1, EOI.
    fn jpeg_with_orientation(orientation: u16) -> Vec<u8> {
        let mut jpeg: Vec<u8> = vec![0xFF, 0xD8]; // SOI
        jpeg.extend_from_slice(&exif_app1_segment(orientation));
        jpeg.extend_from_slice(&[0xFF, 0xD9]); // EOI
        jpeg
    }

    // Real encoded JPEG with the EXIF segment spliced in after SOI, the
    // way cameras write it.
    fn encoded_jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 80]));
        let mut encoded = Vec::new();
        img.write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Jpeg)
            .unwrap();

        let mut jpeg = encoded[..2].to_vec(); // SOI
        jpeg.extend_from_slice(&exif_app1_segment(orientation));
        jpeg.extend_from_slice(&encoded[2..]);
        jpeg
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        bytes
    }

    #[test]
    fn test_dimensions_from_png_prefix() {
        let bytes = png_bytes(32, 20);
        let dim = dimensions_from_prefix(&bytes).unwrap();
        assert_eq!(dim.width, 32);
        assert_eq!(dim.height, 20);
    }

    #[test]
    fn test_garbage_prefix_is_undecodable() {
        let err = dimensions_from_prefix(&[0u8; 128]).unwrap_err();
        assert!(matches!(err, ResolveError::Undecodable(128)));
    }

    #[test]
    fn test_rotated_jpeg_resolves_transposed() {
        let bytes = encoded_jpeg_with_orientation(40, 30, 6);
        let dim = dimensions_from_prefix(&bytes).unwrap();
        assert_eq!((dim.width, dim.height), (30, 40));
    }

    #[test]
    fn test_normal_jpeg_keeps_decoded_dimensions() {
        let bytes = encoded_jpeg_with_orientation(40, 30, 1);
        let dim = dimensions_from_prefix(&bytes).unwrap();
        assert_eq!((dim.width, dim.height), (40, 30));
    }

    #[test]
    fn test_orientation_read_from_exif_container() {
        let bytes = jpeg_with_orientation(6);
        assert_eq!(orientation_from_prefix(&bytes), Some(6));
    }

    #[test]
    fn test_orientation_absent_from_plain_png() {
        let bytes = png_bytes(4, 4);
        assert_eq!(orientation_from_prefix(&bytes), None);
    }

    #[test]
    fn test_orientation_six_transposes() {
        let raw = Dimension::new(4000, 3000).unwrap();
        let corrected = apply_orientation(raw, Some(6));
        assert_eq!((corrected.width, corrected.height), (3000, 4000));
    }

    #[test]
    fn test_orientation_one_and_missing_leave_unchanged() {
        let raw = Dimension::new(4000, 3000).unwrap();
        assert_eq!(apply_orientation(raw, Some(1)), raw);
        assert_eq!(apply_orientation(raw, Some(3)), raw); // 180° keeps axes
        assert_eq!(apply_orientation(raw, None), raw);
    }

    #[test]
    fn test_dimensions_from_headers() {
        let dim = dimensions_from_headers(Some("1920"), Some("1080")).unwrap();
        assert_eq!((dim.width, dim.height), (1920, 1080));

        assert!(dimensions_from_headers(Some("1920"), None).is_none());
        assert!(dimensions_from_headers(Some("not-a-number"), Some("2")).is_none());
        assert!(dimensions_from_headers(Some("0"), Some("100")).is_none());
    }
}
