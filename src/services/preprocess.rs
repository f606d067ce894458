//! Image preprocessing: normalize an arbitrary upload into canonical JPEG
//! bytes suitable for the vision model.
//!
//! The transform is pure and CPU-bound: decode, bound the longest dimension
//! (never upscale), flatten alpha, re-encode JPEG at a fixed quality. A
//! redundant re-encode of an already-conforming image is accepted; the
//! guarantee is that output is always valid JPEG within bounds.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("file of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("image bytes could not be decoded")]
    CorruptImage(#[source] image::ImageError),

    #[error("failed to encode JPEG output")]
    Encode(#[source] image::ImageError),
}

#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    allowed_mime_types: Vec<String>,
    max_bytes: usize,
    max_dimension: u32,
    jpeg_quality: u8,
}

impl ImagePreprocessor {
    pub fn new(
        allowed_mime_types: Vec<String>,
        max_bytes: usize,
        max_dimension: u32,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            allowed_mime_types,
            max_bytes,
            max_dimension,
            jpeg_quality,
        }
    }

    pub fn preprocess(&self, bytes: &[u8], mime_type: &str) -> Result<Vec<u8>, PreprocessError> {
        let mime = mime_type.to_ascii_lowercase();
        if !self.allowed_mime_types.iter().any(|m| *m == mime) {
            return Err(PreprocessError::UnsupportedMediaType(mime_type.to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(PreprocessError::PayloadTooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let img = image::load_from_memory(bytes).map_err(PreprocessError::CorruptImage)?;
        let (width, height) = (img.width(), img.height());

        let img = if width.max(height) > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            img
        };

        // JPEG has no alpha channel; flatten before encoding.
        let rgb = img.to_rgb8();
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(PreprocessError::Encode)?;

        debug!(
            input_bytes = bytes.len(),
            output_bytes = out.len(),
            input_dims = ?(width, height),
            output_dims = ?(rgb.width(), rgb.height()),
            "Image preprocessed"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn preprocessor(max_bytes: usize, max_dimension: u32) -> ImagePreprocessor {
        ImagePreprocessor::new(
            vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            max_bytes,
            max_dimension,
            90,
        )
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120, 130, 140]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn oversized_image_is_bounded_preserving_aspect() {
        let bytes = png_bytes(128, 64);
        let out = preprocessor(1 << 20, 32).preprocess(&bytes, "image/png").unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    #[test]
    fn small_image_is_never_upscaled() {
        let bytes = png_bytes(20, 10);
        let out = preprocessor(1 << 20, 64).preprocess(&bytes, "image/png").unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert!(decoded.width() <= 20 && decoded.height() <= 10);
    }

    #[test]
    fn output_is_always_canonical_jpeg() {
        for (w, h) in [(10, 10), (100, 40)] {
            let out = preprocessor(1 << 20, 64)
                .preprocess(&png_bytes(w, h), "image/png")
                .unwrap();
            assert_eq!(
                image::guess_format(&out).unwrap(),
                image::ImageFormat::Jpeg
            );
        }
    }

    #[test]
    fn alpha_channel_is_flattened() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            16,
            16,
            Rgba([200, 10, 10, 128]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let out = preprocessor(1 << 20, 64).preprocess(&buf, "image/png").unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn unsupported_mime_is_rejected_before_decoding() {
        let err = preprocessor(1 << 20, 64)
            .preprocess(b"plain text pretending", "text/plain")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::UnsupportedMediaType(_)));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let bytes = png_bytes(64, 64);
        let err = preprocessor(16, 64).preprocess(&bytes, "image/png").unwrap_err();
        assert!(matches!(err, PreprocessError::PayloadTooLarge { .. }));
    }

    #[test]
    fn undecodable_bytes_are_a_corrupt_image() {
        let err = preprocessor(1 << 20, 64)
            .preprocess(b"\xff\xd8not really a jpeg", "image/jpeg")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::CorruptImage(_)));
    }
}
