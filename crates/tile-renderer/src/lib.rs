//! Tile rendering: a `ToeGrid` -> a 256x256 Web Mercator RGBA PNG.
//!
//! Grounded on the original `main.py`'s `render_tile`: walk every occupied
//! grid cell, project its center to the requested tile's pixel space, and
//! paint a stepped color by energy. ABI-mode cells get a fixed 3x3 dilation
//! to compensate for Mercator-vs-geostationary sub-pixel drift at low zoom.
//! Geodetic-mode cells are painted at their real-world footprint instead: a
//! ~2km cell covers many pixels at high zoom and a fraction of one at low
//! zoom, so the paint radius is derived from `meters_per_pixel` at each
//! cell's latitude rather than fixed.

pub mod png;

use glm_common::GridVariant;
use projection::mercator::{meters_per_pixel, tile_pixel};
use toe_aggregator::ToeGrid;

/// Approximate meters per degree of latitude/longitude at the equator,
/// used only to size the geodetic-cell paint footprint in pixels.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Cap on the geodetic paint radius, pixels. Without this, a high zoom
/// request over a ~2km cell would paint a many-hundred-pixel block.
const MAX_GEODETIC_RADIUS_PX: i64 = 8;

/// Half-width, in pixels, of the block painted for a geodetic-grid cell at
/// `lat` and zoom `z` so its footprint roughly matches its real-world size.
/// Returns 0 (a single pixel) once the cell is smaller than a pixel.
fn geodetic_paint_radius_px(lat: f64, z: u32) -> i64 {
    let cell_size_m = toe_aggregator::GEODETIC_CELL_SIZE_DEG * METERS_PER_DEGREE;
    let mpp = meters_per_pixel(lat, z);
    if !mpp.is_finite() || mpp <= 0.0 {
        return 0;
    }
    let radius = (cell_size_m / mpp / 2.0).round() as i64;
    radius.clamp(0, MAX_GEODETIC_RADIUS_PX)
}

pub const TILE_DIM: usize = 256;

/// One RGBA color-ramp step: cell energy in femtojoules, in
/// `[lower_bound, upper_bound)`, maps to `color`. The final entry's
/// `upper_bound` is treated as `+inf`.
struct RampStep {
    lower_bound: f64,
    color: [u8; 4],
}

/// Stepped color ramp, thresholds in femtojoules.
const COLOR_RAMP: &[RampStep] = &[
    RampStep { lower_bound: f64::NEG_INFINITY, color: [0, 0, 0, 0] },
    RampStep { lower_bound: 0.0, color: [65, 182, 196, 160] },
    RampStep { lower_bound: 50.0, color: [44, 127, 184, 200] },
    RampStep { lower_bound: 200.0, color: [37, 52, 148, 220] },
    RampStep { lower_bound: 500.0, color: [255, 255, 0, 240] },
    RampStep { lower_bound: 1000.0, color: [255, 140, 0, 255] },
    RampStep { lower_bound: 2000.0, color: [220, 20, 60, 255] },
];

fn color_for_energy(fj: f64) -> [u8; 4] {
    if fj <= 0.0 {
        return [0, 0, 0, 0];
    }
    COLOR_RAMP
        .iter()
        .rev()
        .find(|step| fj >= step.lower_bound)
        .map(|step| step.color)
        .unwrap_or([0, 0, 0, 0])
}

/// Render one 256x256 Web Mercator tile from an aggregated TOE grid.
/// Never fails: out-of-tile or non-finite cell centers are simply skipped,
/// and an empty grid yields a valid all-transparent tile.
pub fn render_tile(grid: &ToeGrid, z: u32, x: u32, y: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; TILE_DIM * TILE_DIM * 4];

    for (&(gx, gy), energy) in &grid.cells {
        let Some((lon, lat)) = grid.cell_center(gx, gy) else {
            continue;
        };
        if !lon.is_finite() || !lat.is_finite() {
            continue;
        }
        let (px, py) = tile_pixel(lon, lat, z, x, y);
        if !px.is_finite() || !py.is_finite() {
            continue;
        }
        let color = color_for_energy(energy.value());
        if color[3] == 0 {
            continue;
        }

        let cx = px.floor() as i64;
        let cy = py.floor() as i64;
        let radius = match grid.variant {
            GridVariant::Abi => 1,
            GridVariant::Geodetic => geodetic_paint_radius_px(lat, z),
        };
        if radius == 0 {
            paint(&mut pixels, cx, cy, color);
        } else {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    paint(&mut pixels, cx + dx, cy + dy, color);
                }
            }
        }
    }

    png::encode_rgba_auto(&pixels, TILE_DIM, TILE_DIM)
}

fn paint(pixels: &mut [u8], x: i64, y: i64, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= TILE_DIM as i64 || y >= TILE_DIM as i64 {
        return;
    }
    let offset = (y as usize * TILE_DIM + x as usize) * 4;
    pixels[offset..offset + 4].copy_from_slice(&color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glm_common::FemtoJoules;
    use std::collections::HashMap;

    fn png_signature_ok(bytes: &[u8]) -> bool {
        bytes.starts_with(&[137, 80, 78, 71, 13, 10, 26, 10])
    }

    #[test]
    fn color_ramp_steps_match_spec_boundaries() {
        assert_eq!(color_for_energy(0.0), [0, 0, 0, 0]);
        assert_eq!(color_for_energy(-1.0), [0, 0, 0, 0]);
        assert_eq!(color_for_energy(1.0), [65, 182, 196, 160]);
        assert_eq!(color_for_energy(49.9), [65, 182, 196, 160]);
        assert_eq!(color_for_energy(50.0), [44, 127, 184, 200]);
        assert_eq!(color_for_energy(199.9), [44, 127, 184, 200]);
        assert_eq!(color_for_energy(200.0), [37, 52, 148, 220]);
        assert_eq!(color_for_energy(500.0), [255, 255, 0, 240]);
        assert_eq!(color_for_energy(1000.0), [255, 140, 0, 255]);
        assert_eq!(color_for_energy(2000.0), [220, 20, 60, 255]);
        assert_eq!(color_for_energy(1_000_000.0), [220, 20, 60, 255]);
    }

    #[test]
    fn empty_grid_renders_valid_transparent_png() {
        let grid = ToeGrid {
            variant: GridVariant::Geodetic,
            cells: HashMap::new(),
            abi_lon0: -75.0,
        };
        let png = render_tile(&grid, 4, 4, 5);
        assert!(png_signature_ok(&png));
    }

    #[test]
    fn geodetic_cell_at_low_zoom_paints_single_pixel() {
        let mut cells = HashMap::new();
        // 0N, 0E lands in geodetic cell (10000, 5000).
        cells.insert((10000i64, 5000i64), FemtoJoules(100.0));
        let grid = ToeGrid {
            variant: GridVariant::Geodetic,
            cells,
            abi_lon0: -75.0,
        };
        let (px, _py) = tile_pixel(0.0, 0.0, 0, 0, 0);
        assert!((0.0..256.0).contains(&px));
        assert_eq!(geodetic_paint_radius_px(0.0, 0), 0);
        let png = render_tile(&grid, 0, 0, 0);
        assert!(png_signature_ok(&png));
    }

    #[test]
    fn geodetic_paint_radius_grows_with_zoom() {
        let low = geodetic_paint_radius_px(0.0, 0);
        let high = geodetic_paint_radius_px(0.0, 12);
        assert_eq!(low, 0);
        assert!(high > low);
    }

    #[test]
    fn geodetic_paint_radius_is_capped() {
        let radius = geodetic_paint_radius_px(0.0, 20);
        assert_eq!(radius, MAX_GEODETIC_RADIUS_PX);
    }

    #[test]
    fn abi_grid_dilation_paints_a_3x3_block() {
        let mut cells = HashMap::new();
        cells.insert((0i64, 0i64), FemtoJoules(100.0));
        let grid = ToeGrid {
            variant: GridVariant::Abi,
            cells,
            abi_lon0: -75.0,
        };
        let mut pixels = vec![0u8; TILE_DIM * TILE_DIM * 4];
        paint(&mut pixels, 10, 10, [1, 2, 3, 255]);
        assert_eq!(&pixels[(10 * TILE_DIM + 10) * 4..(10 * TILE_DIM + 10) * 4 + 4], &[1, 2, 3, 255]);
        let _ = grid;
    }

    #[test]
    fn paint_clips_coordinates_outside_tile_bounds() {
        let mut pixels = vec![0u8; TILE_DIM * TILE_DIM * 4];
        paint(&mut pixels, -1, 0, [9, 9, 9, 9]);
        paint(&mut pixels, 0, 256, [9, 9, 9, 9]);
        assert!(pixels.iter().all(|&b| b == 0));
    }
}
