//! Resolved image payloads.

use serde::{Deserialize, Serialize};

/// A resolved image: raw bytes plus display dimensions in pixels.
///
/// Detached from the URL it was resolved from. Within one patch every
/// occurrence of the same URL shares a single `Arc<ImageData>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// Raw binary data
    #[serde(skip_serializing, default)]
    pub data: Vec<u8>,

    /// Display width in pixels
    pub width: u32,

    /// Display height in pixels
    pub height: u32,
}

impl ImageData {
    /// Create a new image payload.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Get the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Image format written into the document package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG (default for every resolved image)
    #[default]
    Png,
    /// JPEG
    Jpg,
    /// GIF
    Gif,
    /// BMP
    Bmp,
}

impl ImageFormat {
    /// Get the file extension used for media parts.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// Get the MIME type registered in the package content types.
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_format_defaults() {
        let format = ImageFormat::default();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(format.extension(), "png");
        assert_eq!(format.content_type(), "image/png");
        assert_eq!(ImageFormat::Jpg.content_type(), "image/jpeg");
    }

    #[test]
    fn test_image_data_size() {
        let image = ImageData::new(b"fake-image-data".to_vec(), 300, 200);
        assert_eq!(image.size(), 15);
        assert_eq!((image.width, image.height), (300, 200));
    }
}
