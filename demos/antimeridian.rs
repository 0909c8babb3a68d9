//! Aggregating a history across the antimeridian.
//!
//! Run with: cargo run --example antimeridian

use latvis::{aggregate_history, normalize, BoundingBox, Coordinate, History, RenderConfig, Style};

fn main() {
    // Fiji to Samoa, crossing 180°
    let mut history = History::new();
    history.push(Coordinate::new(-18.14, 178.44)); // Suva
    history.push(Coordinate::new(-17.75, 177.45)); // Nadi
    history.push(Coordinate::new(-13.83, -171.76)); // Apia
    history.push(Coordinate::new(-14.27, -170.70)); // Pago Pago
    history.push(Coordinate::new(51.50, -0.12)); // London, outside

    let bounds = BoundingBox::new(Coordinate::new(-20.0, 175.0), Coordinate::new(-10.0, -168.0)).unwrap();

    println!("Antimeridian Aggregation\n");
    println!("Reversed box: {}", bounds.is_reversed());
    println!("Width: {:.1}°, height: {:.1}°\n", bounds.width(), bounds.height());

    let aggregation = aggregate_history(&history, &bounds, 17, 10);
    let grid = &aggregation.grid;
    println!("Kept {} points, dropped {}", grid.total(), aggregation.dropped);

    let intensity = normalize(grid);
    for (x, y, count) in grid.occupied() {
        println!("   cell ({:2}, {:2}) -> {} (intensity {:.3})", x, y, count, intensity.get(x, y));
    }
    println!();

    let config = RenderConfig::default();
    for style in [Style::BlackWhite, Style::Dots] {
        let visualizer = style.visualizer(&config);
        match visualizer.visualize(&history, &bounds, 170, 100) {
            Ok(bytes) => println!("{}: {} bytes of {}", style, bytes.len(), visualizer.content_type()),
            Err(e) => println!("{}: failed: {}", style, e),
        }
    }
}
