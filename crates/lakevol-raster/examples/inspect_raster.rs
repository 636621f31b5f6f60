//! Example: Print band layout and georeferencing of a GeoTIFF.
//!
//! Usage: cargo run --example inspect_raster -- <image.tif> [dem.tif]

use lakevol_raster::{read_elevation, read_image};
use std::env;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <image.tif> [dem.tif]", args[0]);
        eprintln!("Example: {} ./scenes/2024-03-01.tif ./dem/basin.tif", args[0]);
        std::process::exit(1);
    }

    let start = Instant::now();
    let image = match read_image(&args[1], &args[1]) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    println!("Loaded {} in {:.3}s", args[1], start.elapsed().as_secs_f64());

    let (rows, cols) = image.shape();
    println!("Grid: {} rows x {} cols, {} bands", rows, cols, image.band_count());
    println!("CRS: {}", image.crs().unwrap_or("unknown"));
    println!("Pixel area: {:.2}", image.transform().pixel_area());
    let bounds = image.bounds();
    println!(
        "Bounds: x {:.2} to {:.2}, y {:.2} to {:.2}",
        bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y
    );
    for (i, label) in image.band_labels().iter().enumerate() {
        println!("  band {}: {}", i, label.as_deref().unwrap_or("-"));
    }

    if let Some(dem_path) = args.get(2) {
        match read_elevation(dem_path) {
            Ok(dem) => {
                let (min, max) = dem
                    .valid_samples()
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
                println!("\nDEM {}: {:?} pixels, area {:.2} per pixel", dem_path, dem.shape(), dem.pixel_area());
                println!("Elevation range: {:.2} to {:.2}", min, max);
                println!("No-data: {:?}", dem.no_data_value());
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
