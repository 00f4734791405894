use anyhow::Context;
use image::{open, RgbaImage};
use std::path::Path;

pub fn load_bitmap<P: AsRef<Path>>(path: P) -> crate::Result<RgbaImage> {
    let path = path.as_ref();
    let img = open(path).with_context(|| format!("Failed to load image {}", path.display()))?;
    Ok(img.to_rgba8())
}

pub fn validate_image_size(img: &RgbaImage, min_size: u32) -> crate::Result<()> {
    if img.width() < min_size || img.height() < min_size {
        return Err(anyhow::anyhow!(
            "Image too small: {}x{}, minimum: {}x{}",
            img.width(),
            img.height(),
            min_size,
            min_size
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn test_load_round_trips_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        let image = RgbaImage::from_fn(12, 7, |x, y| Rgba([x as u8, y as u8, 3, 255]));
        image.save(&path).unwrap();

        let loaded = load_bitmap(&path).unwrap();
        assert_eq!(loaded, image);
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = load_bitmap("/no/such/frame.png").unwrap_err();
        assert!(err.to_string().contains("/no/such/frame.png"));
    }

    #[test]
    fn test_validate_image_size() {
        let image = RgbaImage::new(10, 40);
        assert!(validate_image_size(&image, 8).is_ok());
        assert!(validate_image_size(&image, 16).is_err());
    }
}
