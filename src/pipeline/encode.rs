//! Image encoding: `DynamicImage` → bytes in the upload's own media type.
//!
//! Each encoder accepts a different set of pixel layouts, so the surface is
//! normalised first: JPEG has no alpha channel, while GIF, BMP and WebP only
//! take 8-bit RGB/RGBA here. PNG keeps whatever the decoder produced,
//! including 16-bit depth.

use crate::media::MediaType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// JPEG quality used for re-encoding, matching the browser `toBlob` default (0.92).
pub const JPEG_QUALITY: u8 = 92;

/// Encode a surface in the given media type.
pub fn encode_image(img: &DynamicImage, media_type: MediaType) -> Result<Vec<u8>, image::ImageError> {
    let surface = normalise_for(img, media_type);
    let mut buf = Vec::new();

    match media_type {
        MediaType::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            surface.write_with_encoder(encoder)?;
        }
        other => {
            surface.write_to(&mut Cursor::new(&mut buf), other.image_format())?;
        }
    }

    debug!(
        "Encoded {}x{} surface → {} bytes {}",
        img.width(),
        img.height(),
        buf.len(),
        media_type
    );
    Ok(buf)
}

/// Convert the pixel layout to one the target encoder accepts.
fn normalise_for(img: &DynamicImage, media_type: MediaType) -> Cow<'_, DynamicImage> {
    match media_type {
        MediaType::Jpeg => match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => Cow::Borrowed(img),
            _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
        },
        MediaType::Png => match img {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                Cow::Owned(DynamicImage::ImageRgba16(img.to_rgba16()))
            }
            _ => Cow::Borrowed(img),
        },
        MediaType::Gif | MediaType::Bmp | MediaType::WebP => match img {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(img),
            _ => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
        },
    }
}

/// A `data:` URI for displaying the prepared image.
pub fn preview_data_uri(bytes: &[u8], media_type: MediaType) -> String {
    format!("data:{};base64,{}", media_type.as_mime(), STANDARD.encode(bytes))
}
