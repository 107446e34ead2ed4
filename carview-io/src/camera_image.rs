//! Camera image decoding

use carview_core::{CameraImage, Error, Result};

/// Decode a PNG/JPEG (or any format `image` recognizes) into RGBA8
pub fn decode_image(bytes: &[u8]) -> Result<CameraImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::InvalidData(format!("Failed to decode image: {}", e)))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(CameraImage {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 128]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_png_to_rgba() {
        let image = decode_image(&encoded_png(4, 2)).unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(image.rgba.len(), 4 * 2 * 4);
        // pixel (3, 1): r = 3, g = 1, b = 128, a = 255
        let offset = ((1 * 4 + 3) * 4) as usize;
        assert_eq!(&image.rgba[offset..offset + 4], &[3, 1, 128, 255]);
        assert_eq!(image.aspect_ratio(), 2.0);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(decode_image(b"definitely not an image").is_err());
    }
}
