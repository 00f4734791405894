use crate::data::Frame;
use crate::pipeline::ScrollAxis;
use crate::utils::image_conversion::scroll_luma;
use image::GrayImage;

/// An accepted frame together with its scroll-normalised luma view, so the
/// next comparison does not convert it again.
#[derive(Debug, Clone)]
pub struct BufferedFrame {
    pub frame: Frame,
    pub luma: GrayImage,
}

/// Ordered store of accepted frames.
///
/// Only the session appends, and only after the frame made it onto the
/// canvas; `pop` exists for undo.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    entries: Vec<BufferedFrame>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame, axis: ScrollAxis) {
        let luma = scroll_luma(frame.bitmap(), axis);
        self.push_with_luma(frame, luma);
    }

    /// Append a frame whose luma view was already computed
    pub fn push_with_luma(&mut self, frame: Frame, luma: GrayImage) {
        self.entries.push(BufferedFrame { frame, luma });
    }

    pub fn pop(&mut self) -> Option<BufferedFrame> {
        self.entries.pop()
    }

    pub fn last(&self) -> Option<&BufferedFrame> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.entries.iter().map(|entry| &entry.frame)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::{Rgba, RgbaImage};

    fn frame(index: usize, width: u32, height: u32) -> Frame {
        Frame::new(index, RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255])), Utc::now())
    }

    #[test]
    fn test_push_caches_normalised_luma() {
        let mut buffer = FrameBuffer::new();
        buffer.push(frame(0, 30, 10), ScrollAxis::Horizontal);

        let last = buffer.last().unwrap();
        assert_eq!(last.luma.dimensions(), (10, 30));
        assert_eq!(last.frame.sequence_index(), 0);
    }

    #[test]
    fn test_order_and_pop() {
        let mut buffer = FrameBuffer::new();
        buffer.push(frame(0, 4, 4), ScrollAxis::Vertical);
        buffer.push(frame(3, 4, 4), ScrollAxis::Vertical);

        let indices: Vec<usize> = buffer.frames().map(|f| f.sequence_index()).collect();
        assert_eq!(indices, vec![0, 3]);

        assert_eq!(buffer.pop().unwrap().frame.sequence_index(), 3);
        assert_eq!(buffer.len(), 1);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
