use chrono::{DateTime, Utc};
use image::RgbaImage;

/// One captured screen image.
///
/// Frames are immutable once created; the session assigns the sequence index
/// in arrival order, counting rejected frames too.
#[derive(Debug, Clone)]
pub struct Frame {
    sequence_index: usize,
    bitmap: RgbaImage,
    capture_time: DateTime<Utc>,
}

impl Frame {
    pub fn new(sequence_index: usize, bitmap: RgbaImage, capture_time: DateTime<Utc>) -> Self {
        Self {
            sequence_index,
            bitmap,
            capture_time,
        }
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    pub fn capture_time(&self) -> DateTime<Utc> {
        self.capture_time
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.bitmap.dimensions()
    }
}
