//! SVG dot-density rendering.
//!
//! Each non-empty cell becomes a black circle on a regular lattice. The radius
//! follows a logistic curve in the raw count, so sparse cells get small dots
//! and dense cells approach `max_radius` without a hard cap.

use std::fmt::Write;

use crate::config::SvgStyle;
use crate::error::{Error, Result};
use crate::grid::Grid;

/// Dot radius for a cell holding `count` points.
pub fn dot_radius(count: u32, style: &SvgStyle) -> f64 {
    style.max_radius / (1.0 + (-(count as f64) / style.tau).exp())
}

/// Render `grid` as an SVG document of `width·spacing × height·spacing` units.
pub fn render_svg(grid: &Grid, style: &SvgStyle) -> Result<Vec<u8>> {
    if grid.width() == 0 || grid.height() == 0 {
        return Err(Error::Encoding(format!(
            "cannot encode a {}x{} image",
            grid.width(),
            grid.height()
        )));
    }

    let k = style.spacing as usize;
    let mut doc = String::new();

    write_svg(&mut doc, grid, style, k).map_err(|e| Error::Encoding(e.to_string()))?;

    Ok(doc.into_bytes())
}

fn write_svg(doc: &mut String, grid: &Grid, style: &SvgStyle, k: usize) -> std::fmt::Result {
    write!(
        doc,
        r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{}" height="{}">"#,
        grid.width() * k,
        grid.height() * k
    )?;
    for (x, y, count) in grid.occupied() {
        write!(
            doc,
            r#"<circle cx="{}" cy="{}" r="{:.1}" style="fill:rgb(0,0,0);"/>"#,
            x * k,
            y * k,
            dot_radius(count, style)
        )?;
    }
    doc.push_str("</svg>");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_radius_is_logistic() {
        let style = SvgStyle::default();

        // Half the maximum at zero, approaching the maximum for dense cells
        assert_eq!(dot_radius(0, &style), 2.5);
        assert!(dot_radius(1, &style) > 2.5);
        assert!(dot_radius(10, &style) < dot_radius(20, &style));
        assert!(dot_radius(1000, &style) <= 5.0);
        assert!(dot_radius(1000, &style) > 4.99);
    }

    #[test]
    fn test_svg_has_one_circle_per_occupied_cell() {
        let mut grid = Grid::new(3, 2);
        grid.set(0, 0, 1);
        grid.set(2, 1, 40);

        let svg = String::from_utf8(render_svg(&grid, &SvgStyle::default()).unwrap()).unwrap();

        assert!(svg.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="30" height="20">"#));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains(r#"<circle cx="0" cy="0" r="2.6" style="fill:rgb(0,0,0);"/>"#));
        assert!(svg.contains(r#"<circle cx="20" cy="10" r="4.9" style="fill:rgb(0,0,0);"/>"#));
    }

    #[test]
    fn test_custom_spacing_scales_document() {
        let mut grid = Grid::new(2, 2);
        grid.set(1, 1, 3);
        let style = SvgStyle {
            spacing: 4,
            ..SvgStyle::default()
        };

        let svg = String::from_utf8(render_svg(&grid, &style).unwrap()).unwrap();

        assert!(svg.contains(r#"width="8" height="8""#));
        assert!(svg.contains(r#"cx="4" cy="4""#));
    }

    #[test]
    fn test_zero_sized_grid_fails() {
        let result = render_svg(&Grid::new(4, 0), &SvgStyle::default());
        assert!(matches!(result, Err(Error::Encoding(_))));
    }
}
