use crate::config::CanvasConfig;
use crate::error::Rejection;
use crate::pipeline::{AcceptedOverlap, PipelineStage};
use image::RgbaImage;

const CHANNELS: usize = 4;

/// Growing RGBA pixel grid in scroll-normalised orientation.
///
/// Rows are stored contiguously so appending new content only extends the
/// buffer; a wider frame forces one re-pad of the existing rows.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0
    }

    /// Raw RGBA bytes, row-major
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * CHANNELS
    }

    fn widen(&mut self, width: u32, background: [u8; 4]) {
        if width <= self.width {
            return;
        }

        let old_row = self.row_bytes();
        let new_row = width as usize * CHANNELS;
        let mut pixels = Vec::with_capacity(new_row * self.height as usize);
        for row in self.pixels.chunks_exact(old_row.max(1)).take(self.height as usize) {
            pixels.extend_from_slice(row);
            pad_row(&mut pixels, new_row - old_row, background);
        }

        self.pixels = pixels;
        self.width = width;
    }

    fn truncate(&mut self, height: u32) {
        if height < self.height {
            self.height = height;
            self.pixels.truncate(self.row_bytes() * height as usize);
        }
    }
}

fn pad_row(pixels: &mut Vec<u8>, bytes: usize, background: [u8; 4]) {
    for _ in 0..bytes / CHANNELS {
        pixels.extend_from_slice(&background);
    }
}

/// Appends the new part of every accepted frame to the canvas.
#[derive(Debug, Clone)]
pub struct CanvasAssembler {
    config: CanvasConfig,
    canvas: Canvas,
    /// Rows each append contributed, for undo
    contributions: Vec<u32>,
    warned: bool,
}

impl CanvasAssembler {
    pub fn new(config: CanvasConfig) -> Self {
        Self {
            config,
            canvas: Canvas::default(),
            contributions: Vec::new(),
            warned: false,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn frames_appended(&self) -> usize {
        self.contributions.len()
    }

    /// Fraction of `max_pixels` in use
    pub fn usage(&self) -> f64 {
        self.canvas.pixel_count() as f64 / self.config.max_pixels.max(1) as f64
    }

    /// Append `frame` (already in scroll-normalised orientation).
    ///
    /// The first frame goes in whole; later frames contribute rows
    /// `[overlap_height, height)`. Fails without touching the canvas when the
    /// result would exceed `max_pixels`.
    pub fn append(&mut self, frame: &RgbaImage, overlap: Option<&AcceptedOverlap>) -> Result<(), Rejection> {
        let (frame_width, frame_height) = frame.dimensions();
        let start_row = match overlap {
            Some(overlap) if !self.canvas.is_empty() => overlap.overlap_height.min(frame_height),
            _ => 0,
        };
        let new_rows = frame_height - start_row;
        let width = self.canvas.width.max(frame_width);

        let requested = width as u64 * (self.canvas.height as u64 + new_rows as u64);
        if requested > self.config.max_pixels {
            return Err(Rejection::CanvasSizeExceeded {
                requested,
                limit: self.config.max_pixels,
            });
        }

        let warn_at = (self.config.max_pixels as f64 * self.config.warn_ratio as f64) as u64;
        if !self.warned && requested >= warn_at {
            self.warned = true;
            tracing::warn!(
                pixels = requested,
                limit = self.config.max_pixels,
                "Canvas approaching its size limit"
            );
        }

        let background = self.config.background;
        self.canvas.widen(width, background);

        if start_row > 0 && self.config.seam_blend_rows > 0 {
            self.blend_seam(frame, start_row);
        }

        let frame_row = frame_width as usize * CHANNELS;
        let padding = (width - frame_width) as usize * CHANNELS;
        let raw = frame.as_raw();
        self.canvas
            .pixels
            .reserve(self.canvas.row_bytes() * new_rows as usize);
        for y in start_row..frame_height {
            let offset = y as usize * frame_row;
            self.canvas.pixels.extend_from_slice(&raw[offset..offset + frame_row]);
            pad_row(&mut self.canvas.pixels, padding, background);
        }
        self.canvas.height += new_rows;
        self.contributions.push(new_rows);

        tracing::debug!(
            rows_added = new_rows,
            canvas_width = self.canvas.width,
            canvas_height = self.canvas.height,
            "Canvas extended"
        );
        Ok(())
    }

    /// Cross-fade the last canvas rows towards the frame rows just above
    /// `start_row`, so the seam does not show as a hard line.
    fn blend_seam(&mut self, frame: &RgbaImage, start_row: u32) {
        let blend = self
            .config
            .seam_blend_rows
            .min(start_row)
            .min(self.canvas.height);
        if blend == 0 {
            return;
        }

        let row_bytes = self.canvas.row_bytes();
        let frame_row = frame.width() as usize * CHANNELS;
        let raw = frame.as_raw();

        for i in 0..blend {
            let weight = (i + 1) as f32 / (blend + 1) as f32;
            let canvas_y = (self.canvas.height - blend + i) as usize;
            let frame_y = (start_row - blend + i) as usize;

            let target = &mut self.canvas.pixels[canvas_y * row_bytes..canvas_y * row_bytes + frame_row];
            let source = &raw[frame_y * frame_row..(frame_y + 1) * frame_row];
            for (dst, &src) in target.iter_mut().zip(source) {
                let mixed = *dst as f32 * (1.0 - weight) + src as f32 * weight;
                *dst = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    /// Shrink the canvas to `height` rows. The width is kept.
    fn truncate(&mut self, height: u32) {
        self.canvas.truncate(height);
    }

    /// Remove the rows of the most recent append. Returns how many rows went.
    pub fn undo_last(&mut self) -> Option<u32> {
        let rows = self.contributions.pop()?;
        let height = self.canvas.height.saturating_sub(rows);
        self.truncate(height);
        if self.contributions.is_empty() {
            self.canvas = Canvas::default();
            self.warned = false;
        }
        Some(rows)
    }

    pub fn clear(&mut self) {
        self.canvas = Canvas::default();
        self.contributions.clear();
        self.warned = false;
    }
}

impl PipelineStage for CanvasAssembler {
    fn stage_name(&self) -> &'static str {
        "assemble"
    }
}
