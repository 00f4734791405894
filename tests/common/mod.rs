#![allow(dead_code)]

use image::{imageops, GrayImage, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A document-like page: white background covered with coloured blocks of
/// random size, so every row and column has a distinct profile.
pub fn create_page(width: u32, height: u32, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut page = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    let blocks = (width as u64 * height as u64 / 150).max(1);
    for _ in 0..blocks {
        let w = rng.gen_range(3..40).min(width);
        let h = rng.gen_range(2..14).min(height);
        let x0 = rng.gen_range(0..=width - w);
        let y0 = rng.gen_range(0..=height - h);
        let color = Rgba([rng.gen(), rng.gen(), rng.gen(), 255]);

        for y in y0..y0 + h {
            for x in x0..x0 + w {
                page.put_pixel(x, y, color);
            }
        }
    }

    page
}

/// Paint the half-open row ranges white across the full width.
pub fn blank_rows(page: &mut RgbaImage, ranges: &[(u32, u32)]) {
    for &(start, end) in ranges {
        for y in start..end.min(page.height()) {
            for x in 0..page.width() {
                page.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
    }
}

/// Vertical frames cut from `page` at the given top offsets.
pub fn cut_frames(page: &RgbaImage, frame_height: u32, tops: &[u32]) -> Vec<RgbaImage> {
    tops.iter()
        .map(|&top| imageops::crop_imm(page, 0, top, page.width(), frame_height).to_image())
        .collect()
}

/// Horizontal frames cut from `page` at the given left offsets.
pub fn cut_columns(page: &RgbaImage, frame_width: u32, lefts: &[u32]) -> Vec<RgbaImage> {
    lefts
        .iter()
        .map(|&left| imageops::crop_imm(page, left, 0, frame_width, page.height()).to_image())
        .collect()
}

pub fn to_luma(image: &RgbaImage) -> GrayImage {
    imageops::grayscale(image)
}
