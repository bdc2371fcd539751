//! The image preparer: bound an upload to a maximum box and re-encode it.
//!
//! Preparation is two composed steps with explicit results:
//!
//! 1. [`decode`] — bytes → raster surface. Malformed input is a
//!    [`VqaError::DecodeFailed`], never a silent hang.
//! 2. [`render_and_encode`] — a single resample to the target size (no crop,
//!    no letterbox) followed by an encode in the upload's own media type.
//!
//! The image is re-encoded even when the size is already within bounds, so
//! the output is visually equivalent to the input but not byte-identical.
//!
//! ## Why spawn_blocking?
//!
//! Decoding a 12-megapixel JPEG and resampling it takes tens of milliseconds
//! of pure CPU. [`prepare`] moves that work onto tokio's blocking pool so the
//! async workers keep serving the network request and the UI.

use crate::config::PrepareOptions;
use crate::error::VqaError;
use crate::media::MediaType;
use crate::pipeline::encode::{encode_image, preview_data_uri};
use crate::pipeline::input::UploadedImage;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info};

/// An image ready for upload: bounded dimensions, same media type and file
/// name as the source.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PreparedImage {
    /// Encoded bytes at the bounded size.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    /// Intrinsic size of the decoded source.
    pub original_width: u32,
    pub original_height: u32,
}

impl std::fmt::Debug for PreparedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedImage")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("media_type", &self.media_type)
            .field("file_name", &self.file_name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("original_width", &self.original_width)
            .field("original_height", &self.original_height)
            .finish()
    }
}

impl PreparedImage {
    /// `(width, height)` of the prepared image.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the downscale actually changed the size.
    pub fn was_resized(&self) -> bool {
        (self.width, self.height) != (self.original_width, self.original_height)
    }

    /// A display-only `data:` URI of the prepared bytes.
    pub fn preview_uri(&self) -> String {
        preview_data_uri(&self.bytes, self.media_type)
    }
}

/// Compute the output size for a `width × height` source.
///
/// A wider-than-tall source is bounded by `max_width`; a taller or square one
/// by `max_height`. Only the governing side is checked, and the scale is
/// never above 1. Scaled sides round to the nearest pixel, minimum 1.
pub fn compute_target_dimensions(width: u32, height: u32, opts: &PrepareOptions) -> (u32, u32) {
    if width > height {
        if width > opts.max_width {
            return (
                opts.max_width,
                scale_side(height, opts.max_width, width),
            );
        }
    } else if height > opts.max_height {
        return (
            scale_side(width, opts.max_height, height),
            opts.max_height,
        );
    }
    (width, height)
}

/// `round(side × bound / reference)`, at least 1.
fn scale_side(side: u32, bound: u32, reference: u32) -> u32 {
    let scaled = (side as f64 * bound as f64 / reference as f64).round();
    (scaled as u32).max(1)
}

/// Decode an upload into a raster surface.
///
/// The format is sniffed from the content, not the declared type: a PNG
/// renamed to `.jpg` still decodes, and is then re-encoded as JPEG.
pub fn decode(upload: &UploadedImage) -> Result<DynamicImage, VqaError> {
    image::load_from_memory(&upload.bytes).map_err(|e| VqaError::DecodeFailed {
        file_name: upload.file_name.clone(),
        detail: e.to_string(),
    })
}

/// Draw `img` at `target` size and encode it as `media_type`.
///
/// When `target` already equals the source size the resample is skipped,
/// but the encode still happens.
pub fn render_and_encode(
    img: &DynamicImage,
    target: (u32, u32),
    media_type: MediaType,
    filter: FilterType,
) -> Result<Vec<u8>, image::ImageError> {
    let (tw, th) = target;
    if (img.width(), img.height()) == (tw, th) {
        encode_image(img, media_type)
    } else {
        let surface = img.resize_exact(tw, th, filter);
        encode_image(&surface, media_type)
    }
}

/// Synchronous core of [`prepare`].
pub fn prepare_blocking(
    upload: &UploadedImage,
    opts: &PrepareOptions,
) -> Result<PreparedImage, VqaError> {
    let img = decode(upload)?;
    let (w, h) = (img.width(), img.height());
    let target = compute_target_dimensions(w, h, opts);
    debug!(
        "Preparing {}: {}x{} → {}x{} (bounds {}x{})",
        upload.file_name, w, h, target.0, target.1, opts.max_width, opts.max_height
    );

    let bytes = render_and_encode(&img, target, upload.media_type, opts.filter.into()).map_err(
        |e| VqaError::EncodeFailed {
            file_name: upload.file_name.clone(),
            media_type: upload.media_type.to_string(),
            detail: e.to_string(),
        },
    )?;

    Ok(PreparedImage {
        bytes,
        media_type: upload.media_type,
        file_name: upload.file_name.clone(),
        width: target.0,
        height: target.1,
        original_width: w,
        original_height: h,
    })
}

/// Prepare an upload for transmission.
///
/// Consumes the upload: once preparation succeeds the raw bytes are gone.
pub async fn prepare(
    upload: UploadedImage,
    opts: &PrepareOptions,
) -> Result<PreparedImage, VqaError> {
    let opts = *opts;
    let source_len = upload.bytes.len();

    let prepared = tokio::task::spawn_blocking(move || prepare_blocking(&upload, &opts))
        .await
        .map_err(|e| VqaError::Internal(format!("Prepare task panicked: {}", e)))??;

    info!(
        "Prepared {} → {}x{} {} ({} → {} bytes)",
        prepared.file_name,
        prepared.width,
        prepared.height,
        prepared.media_type,
        source_len,
        prepared.bytes.len()
    );
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResizeFilter;
    use image::{GenericImageView, Rgb, RgbImage};

    fn opts() -> PrepareOptions {
        PrepareOptions::default()
    }

    fn upload(width: u32, height: u32, media_type: MediaType) -> UploadedImage {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 120, 200])));
        let bytes = encode_image(&img, media_type).unwrap();
        UploadedImage {
            bytes,
            media_type,
            file_name: format!("source-{width}x{height}"),
        }
    }

    // ── Dimension math ──────────────────────────────────────────────────

    #[test]
    fn landscape_scenario() {
        assert_eq!(compute_target_dimensions(1600, 1200, &opts()), (800, 600));
    }

    #[test]
    fn portrait_scenario() {
        assert_eq!(compute_target_dimensions(1200, 1600, &opts()), (600, 800));
    }

    #[test]
    fn within_bounds_is_unchanged() {
        assert_eq!(compute_target_dimensions(500, 500, &opts()), (500, 500));
        assert_eq!(compute_target_dimensions(800, 800, &opts()), (800, 800));
        assert_eq!(compute_target_dimensions(1, 800, &opts()), (1, 800));
    }

    #[test]
    fn never_upscales() {
        for (w, h) in [(1, 1), (10, 700), (799, 3), (640, 480)] {
            assert_eq!(compute_target_dimensions(w, h, &opts()), (w, h));
        }
    }

    #[test]
    fn wide_sources_bound_width_and_round_height() {
        for (w, h) in [(801, 800), (1000, 333), (4032, 3024), (3000, 1), (1920, 1080)] {
            let expected_h = ((h as f64 * 800.0 / w as f64).round() as u32).max(1);
            assert_eq!(
                compute_target_dimensions(w, h, &opts()),
                (800, expected_h),
                "{w}x{h}"
            );
        }
    }

    #[test]
    fn tall_and_square_sources_bound_height() {
        for (w, h) in [(800, 801), (333, 1000), (3024, 4032), (1200, 1200)] {
            let expected_w = (w as f64 * 800.0 / h as f64).round() as u32;
            assert_eq!(
                compute_target_dimensions(w, h, &opts()),
                (expected_w, 800),
                "{w}x{h}"
            );
        }
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        assert_eq!(compute_target_dimensions(100_000, 10, &opts()), (800, 1));
        assert_eq!(compute_target_dimensions(10, 100_000, &opts()), (1, 800));
    }

    #[test]
    fn custom_bounds() {
        let small = PrepareOptions {
            max_width: 100,
            max_height: 50,
            filter: ResizeFilter::Nearest,
        };
        assert_eq!(compute_target_dimensions(400, 200, &small), (100, 50));
        assert_eq!(compute_target_dimensions(200, 400, &small), (25, 50));
        assert_eq!(compute_target_dimensions(90, 40, &small), (90, 40));
    }

    #[test]
    fn bounded_dimensions_are_a_fixed_point() {
        for (w, h) in [(1600, 1200), (1200, 1600), (5000, 17), (999, 998)] {
            let once = compute_target_dimensions(w, h, &opts());
            let twice = compute_target_dimensions(once.0, once.1, &opts());
            assert_eq!(once, twice, "{w}x{h}");
        }
    }

    // ── Full pipeline ───────────────────────────────────────────────────

    #[test]
    fn prepare_resizes_landscape_png() {
        let prepared = prepare_blocking(&upload(1600, 1200, MediaType::Png), &opts()).unwrap();
        assert_eq!(prepared.dimensions(), (800, 600));
        assert_eq!(prepared.media_type, MediaType::Png);
        assert!(prepared.was_resized());

        let back = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!(back.dimensions(), (800, 600));
    }

    #[test]
    fn prepare_resizes_portrait_jpeg() {
        let prepared = prepare_blocking(&upload(1200, 1600, MediaType::Jpeg), &opts()).unwrap();
        assert_eq!(prepared.dimensions(), (600, 800));
        assert_eq!(prepared.media_type, MediaType::Jpeg);
        assert_eq!(MediaType::sniff(&prepared.bytes), Some(MediaType::Jpeg));
    }

    #[test]
    fn prepare_transcodes_even_when_within_bounds() {
        let source = upload(500, 500, MediaType::Png);
        let prepared = prepare_blocking(&source, &opts()).unwrap();
        assert_eq!(prepared.dimensions(), (500, 500));
        assert!(!prepared.was_resized());
        assert_eq!(prepared.file_name, source.file_name);

        let back = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!(back.dimensions(), (500, 500));
    }

    #[test]
    fn prepare_keeps_declared_type_over_content() {
        let mut source = upload(40, 20, MediaType::Png);
        source.media_type = MediaType::Jpeg;
        let prepared = prepare_blocking(&source, &opts()).unwrap();
        assert_eq!(prepared.media_type, MediaType::Jpeg);
        assert_eq!(MediaType::sniff(&prepared.bytes), Some(MediaType::Jpeg));
    }

    #[test]
    fn prepare_is_idempotent_on_dimensions() {
        let first = prepare_blocking(&upload(1000, 700, MediaType::WebP), &opts()).unwrap();
        let again = UploadedImage {
            bytes: first.bytes.clone(),
            media_type: first.media_type,
            file_name: first.file_name.clone(),
        };
        let second = prepare_blocking(&again, &opts()).unwrap();
        assert_eq!(first.dimensions(), (800, 560));
        assert_eq!(second.dimensions(), first.dimensions());
        assert_eq!(second.media_type, MediaType::WebP);
    }

    #[test]
    fn malformed_bytes_fail_to_decode() {
        let source = UploadedImage {
            bytes: b"\x89PNG\r\n\x1a\nthis is not really a png".to_vec(),
            media_type: MediaType::Png,
            file_name: "broken.png".into(),
        };
        let err = prepare_blocking(&source, &opts()).unwrap_err();
        assert!(matches!(err, VqaError::DecodeFailed { ref file_name, .. } if file_name == "broken.png"));
    }

    #[test]
    fn async_prepare_matches_blocking() {
        let prepared =
            tokio_test::block_on(prepare(upload(900, 300, MediaType::Bmp), &opts())).unwrap();
        assert_eq!(prepared.dimensions(), (800, 267));
        assert_eq!(prepared.media_type, MediaType::Bmp);
    }
}
