use image::{DynamicImage, ImageFormat};

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("image error: {0}")]
    Image(#[from] image::error::ImageError),

    #[error("unsupported content: {0}")]
    Unsupported(String),
}

/// Turns fetched bytes into a displayable still image.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, DecodeError>;
}

/// Decoder backed by the `image` crate's format sniffing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRsDecoder;

impl ImageDecoder for ImageRsDecoder {
    #[profiling::function]
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
        Ok(image::load_from_memory(bytes)?)
    }
}

/// GIF data is delivered raw so the consumer can animate it.
pub fn is_gif(bytes: &[u8]) -> bool {
    matches!(image::guess_format(bytes), Ok(ImageFormat::Gif))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{gif_bytes, png_bytes};

    #[test]
    fn sniffs_gif_magic() {
        assert!(is_gif(&gif_bytes()));
        assert!(!is_gif(&png_bytes(2, 2)));
        assert!(!is_gif(b"not an image"));
    }

    #[test]
    fn decodes_png() {
        let img = ImageRsDecoder.decode(&png_bytes(3, 5)).unwrap();
        assert_eq!((img.width(), img.height()), (3, 5));
    }

    #[test]
    fn rejects_garbage() {
        assert!(ImageRsDecoder.decode(b"<html>nope</html>").is_err());
    }
}
