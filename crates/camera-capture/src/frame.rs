//! Video frame types and preprocessing

use image::{imageops, GrayImage, RgbImage};

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Black frame of the given size
    pub fn blank(width: u32, height: u32, sequence: u32) -> Self {
        Self::new(
            vec![0; (width as usize) * (height as usize) * 3],
            width,
            height,
            0,
            sequence,
        )
    }

    /// Wrap a decoded image
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// View the frame as an `image` buffer; `None` if the data length does not match the size
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> GrayImage {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray.resize((self.width * self.height) as usize, 0);
        GrayImage::from_raw(self.width, self.height, gray)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    /// Resize to `target_width`, preserving aspect ratio
    ///
    /// Frames that are already the target width, empty, or malformed are
    /// returned unchanged.
    pub fn resize_to_width(&self, target_width: u32) -> VideoFrame {
        if target_width == 0 || self.width == 0 || self.width == target_width {
            return self.clone();
        }
        let Some(img) = self.to_rgb_image() else {
            return self.clone();
        };

        let ratio = target_width as f64 / self.width as f64;
        let target_height = ((self.height as f64 * ratio).round() as u32).max(1);
        let resized = imageops::resize(&img, target_width, target_height, imageops::FilterType::Triangle);

        VideoFrame::from_rgb_image(resized, self.timestamp_ns, self.sequence)
    }
}
