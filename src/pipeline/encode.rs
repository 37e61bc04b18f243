//! Image encoding: rendered page → compressed bytes → base64 data URI.
//!
//! Vision APIs accept images inline as `data:<mime>;base64,<payload>` URLs
//! inside the JSON request body. Encoding happens in memory; persisting the
//! page to disk is [`crate::pipeline::persist`]'s job.

use crate::config::PageImageFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as a data URI in the given format.
pub fn encode_page(img: &RgbImage, format: PageImageFormat) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format.as_image_format())?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(format!("data:{};base64,{}", format.mime_type(), b64))
}

/// Split a base64 data URI into `(mime_type, payload)`.
///
/// Returns None for anything that is not a `data:…;base64,…` URI.
pub fn split_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    if mime.is_empty() {
        return None;
    }
    Some((mime, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn red_square() -> RgbImage {
        RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]))
    }

    #[test]
    fn jpeg_data_uri() {
        let uri = encode_page(&red_square(), PageImageFormat::Jpeg).expect("encode should succeed");
        let (mime, payload) = split_data_uri(&uri).expect("data uri");
        assert_eq!(mime, "image/jpeg");
        let bytes = STANDARD.decode(payload).expect("valid base64");
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn png_data_uri_decodes_to_same_pixels() {
        let img = red_square();
        let uri = encode_page(&img, PageImageFormat::Png).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        let (_, payload) = split_data_uri(&uri).unwrap();
        let decoded = image::load_from_memory(&STANDARD.decode(payload).unwrap())
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.as_raw(), img.as_raw());
    }

    #[test]
    fn split_rejects_non_data_uris() {
        assert_eq!(split_data_uri("https://example.com/a.png"), None);
        assert_eq!(split_data_uri("data:image/png,rawbytes"), None);
        assert_eq!(split_data_uri("data:;base64,AAAA"), None);
        assert_eq!(split_data_uri("data:image/gif;base64,R0lG"), Some(("image/gif", "R0lG")));
    }
}
