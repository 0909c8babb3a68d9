//! Black/white raster rendering.
//!
//! Every cell with any intensity becomes a black pixel, everything else
//! white. The result is a density silhouette rather than a gradient.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::intensity::IntensityMatrix;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Threshold `intensity` into a black/white image of the same size.
///
/// Pixel `(x, y)` is cell `(x, y)`; the grid is already north-up.
pub fn bw_image(intensity: &IntensityMatrix) -> Result<RgbaImage> {
    let (width, height) = image_size(intensity.width(), intensity.height())?;

    Ok(RgbaImage::from_fn(width, height, |x, y| {
        if intensity.get(x as usize, y as usize) > 0.0 {
            BLACK
        } else {
            WHITE
        }
    }))
}

/// Encode an image as PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Threshold and encode in one step.
pub fn render_bw_png(intensity: &IntensityMatrix) -> Result<Vec<u8>> {
    encode_png(&bw_image(intensity)?)
}

fn image_size(width: usize, height: usize) -> Result<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(Error::Encoding(format!(
            "cannot encode a {}x{} image",
            width, height
        )));
    }
    let w = u32::try_from(width).map_err(|_| Error::Encoding(format!("image width {} too large", width)))?;
    let h = u32::try_from(height).map_err(|_| Error::Encoding(format!("image height {} too large", height)))?;
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::intensity::normalize;

    #[test]
    fn test_threshold_any_heat_is_black() {
        let mut grid = Grid::new(3, 1);
        grid.set(0, 0, 1000);
        grid.set(1, 0, 1);

        let img = bw_image(&normalize(&grid)).unwrap();

        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(*img.get_pixel(0, 0), BLACK);
        assert_eq!(*img.get_pixel(1, 0), BLACK);
        assert_eq!(*img.get_pixel(2, 0), WHITE);
    }

    #[test]
    fn test_png_round_trips_through_decoder() {
        let mut grid = Grid::new(4, 2);
        grid.set(3, 1, 2);

        let png = render_bw_png(&normalize(&grid)).unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_rgba8();

        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(*decoded.get_pixel(3, 1), BLACK);
        assert_eq!(*decoded.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn test_zero_sized_image_fails() {
        let result = render_bw_png(&normalize(&Grid::new(0, 5)));
        assert!(matches!(result, Err(Error::Encoding(_))));
    }
}
