use crate::pipeline::ScrollAxis;
use image::{imageops, GrayImage, ImageBuffer, Luma, Pixel, RgbaImage};
use std::borrow::Cow;

/// Swap rows and columns.
pub fn transpose<P: Pixel + 'static>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let mut rotated = imageops::rotate90(image);
    imageops::flip_horizontal_in_place(&mut rotated);
    rotated
}

/// RGBA bitmap in scroll-normalised orientation (scroll axis = rows).
pub fn scroll_rgba(bitmap: &RgbaImage, axis: ScrollAxis) -> Cow<'_, RgbaImage> {
    match axis {
        ScrollAxis::Vertical => Cow::Borrowed(bitmap),
        ScrollAxis::Horizontal => Cow::Owned(transpose(bitmap)),
    }
}

/// Luma view in scroll-normalised orientation.
pub fn scroll_luma(bitmap: &RgbaImage, axis: ScrollAxis) -> GrayImage {
    let gray = imageops::grayscale(bitmap);
    match axis {
        ScrollAxis::Vertical => gray,
        ScrollAxis::Horizontal => transpose(&gray),
    }
}

/// Undo the scroll normalisation on an assembled image.
pub fn restore_orientation(image: RgbaImage, axis: ScrollAxis) -> RgbaImage {
    match axis {
        ScrollAxis::Vertical => image,
        ScrollAxis::Horizontal => transpose(&image),
    }
}

/// Extent of a bitmap along the scroll axis
pub fn scroll_length(bitmap: &RgbaImage, axis: ScrollAxis) -> u32 {
    match axis {
        ScrollAxis::Vertical => bitmap.height(),
        ScrollAxis::Horizontal => bitmap.width(),
    }
}

/// Columns used for analysis once the trailing margin (scrollbar) is removed.
/// The margin is ignored entirely when it would swallow the whole row.
pub fn analysis_width(width: u32, ignore_trailing: u32) -> u32 {
    if ignore_trailing > 0 && width > ignore_trailing {
        width - ignore_trailing
    } else {
        width
    }
}

/// Texture richness in [0, 1] from the variance of a 4-neighbour Laplacian.
pub fn texture_score(image: &GrayImage) -> f32 {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = image.get_pixel(x, y)[0] as f64;
            let lap = image.get_pixel(x - 1, y)[0] as f64
                + image.get_pixel(x + 1, y)[0] as f64
                + image.get_pixel(x, y - 1)[0] as f64
                + image.get_pixel(x, y + 1)[0] as f64
                - 4.0 * center;
            sum += lap;
            sum_sq += lap * lap;
            count += 1;
        }
    }

    let mean = sum / count as f64;
    let variance = sum_sq / count as f64 - mean * mean;
    (variance / 1000.0).clamp(0.0, 1.0) as f32
}

/// Global histogram equalisation.
pub fn equalize_histogram(image: &GrayImage) -> GrayImage {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (i, count) in histogram.iter().enumerate() {
        running += count;
        cdf[i] = running;
    }

    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    let denominator = total.saturating_sub(cdf_min);
    if denominator == 0 {
        return image.clone();
    }

    let mut lut = [0u8; 256];
    for (i, value) in lut.iter_mut().enumerate() {
        let scaled = (cdf[i].saturating_sub(cdf_min)) as f64 * 255.0 / denominator as f64;
        *value = scaled.round().clamp(0.0, 255.0) as u8;
    }

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([lut[image.get_pixel(x, y)[0] as usize]])
    })
}

/// Scale factor that brings `length` to `length * rate`, clamped into
/// `[min_size, max_size]`, never upsampling.
pub fn sample_scale(length: u32, rate: f32, min_size: u32, max_size: u32) -> f32 {
    if length == 0 {
        return 1.0;
    }
    let target = (length as f32 * rate).clamp(min_size as f32, max_size as f32);
    (target / length as f32).min(1.0)
}

/// Downsample a luma image by `scale` (no-op at 1.0).
pub fn downsample(image: &GrayImage, scale: f32) -> GrayImage {
    if scale >= 1.0 {
        return image.clone();
    }
    let width = ((image.width() as f32 * scale).round() as u32).max(1);
    let height = ((image.height() as f32 * scale).round() as u32).max(1);
    imageops::resize(image, width, height, imageops::FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_transpose_swaps_coordinates() {
        let image = RgbaImage::from_fn(5, 3, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let transposed = transpose(&image);

        assert_eq!(transposed.dimensions(), (3, 5));
        for y in 0..3 {
            for x in 0..5 {
                assert_eq!(transposed.get_pixel(y, x), image.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn test_horizontal_views_are_transposed() {
        let image = RgbaImage::from_fn(8, 4, |x, _| Rgba([x as u8 * 10, 0, 0, 255]));
        let luma = scroll_luma(&image, ScrollAxis::Horizontal);
        assert_eq!(luma.dimensions(), (4, 8));
        assert_eq!(scroll_length(&image, ScrollAxis::Horizontal), 8);

        let restored = restore_orientation(scroll_rgba(&image, ScrollAxis::Horizontal).into_owned(), ScrollAxis::Horizontal);
        assert_eq!(restored, image);
    }

    #[test]
    fn test_analysis_width_keeps_narrow_rows() {
        assert_eq!(analysis_width(100, 20), 80);
        assert_eq!(analysis_width(15, 20), 15);
        assert_eq!(analysis_width(100, 0), 100);
    }

    #[test]
    fn test_texture_score_flat_vs_checker() {
        let flat = GrayImage::from_pixel(32, 32, Luma([128]));
        let checker = GrayImage::from_fn(32, 32, |x, y| {
            Luma([if (x + y) % 2 == 0 { 0 } else { 255 }])
        });
        assert_eq!(texture_score(&flat), 0.0);
        assert!(texture_score(&checker) > 0.9);
    }

    #[test]
    fn test_equalize_stretches_narrow_range() {
        let image = GrayImage::from_fn(16, 16, |x, _| Luma([100 + (x % 4) as u8]));
        let equalized = equalize_histogram(&image);
        let min = equalized.pixels().map(|p| p[0]).min().unwrap();
        let max = equalized.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_sample_scale_bounds() {
        assert_eq!(sample_scale(400, 0.5, 300, 800), 0.75);
        assert_eq!(sample_scale(1000, 0.5, 300, 800), 0.5);
        assert_eq!(sample_scale(4000, 0.5, 300, 800), 0.2);
        assert_eq!(sample_scale(200, 0.5, 300, 800), 1.0);
    }
}
