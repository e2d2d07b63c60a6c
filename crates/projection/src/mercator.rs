//! Web Mercator (EPSG:3857) forward transform for slippy-map tile rendering.
//!
//! This is the standard "world pixel" formula used by every XYZ tile
//! scheme: zoom `z` divides the world into `256 * 2^z` pixels per axis.
//! Pole clamping keeps the inverse-tangent/log terms finite at the poles,
//! since this module takes raw lat/lon input rather than a precomputed
//! tile matrix.

const TILE_SIZE: f64 = 256.0;
const POLE_EPSILON: f64 = 1e-12;

/// A pixel coordinate in the full world raster at a given zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPixel {
    pub x: f64,
    pub y: f64,
}

/// Project WGS84 (lon, lat) degrees to a world pixel at zoom `z`.
///
/// Latitude is clamped to the Mercator-representable range before the log
/// term is evaluated, so poles (and anything beyond ~85.05 degrees) never
/// produce NaN or infinity.
pub fn world_pixel(lon: f64, lat: f64, z: u32) -> WorldPixel {
    let scale = TILE_SIZE * 2f64.powi(z as i32);
    let world_x = ((lon + 180.0) / 360.0) * scale;

    let mut sin_lat = (lat.to_radians()).sin();
    if sin_lat >= 1.0 - POLE_EPSILON {
        sin_lat = 1.0 - POLE_EPSILON;
    } else if sin_lat <= -1.0 + POLE_EPSILON {
        sin_lat = -1.0 + POLE_EPSILON;
    }

    let world_y =
        (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * std::f64::consts::PI)) * scale;

    WorldPixel {
        x: world_x,
        y: world_y,
    }
}

/// Project WGS84 (lon, lat) to a pixel offset within tile `(z, x, y)`.
///
/// The returned pixel is not clamped to `[0, 256)`; callers check that
/// themselves (a point may land outside the requested tile entirely).
pub fn tile_pixel(lon: f64, lat: f64, z: u32, tile_x: u32, tile_y: u32) -> (f64, f64) {
    let wp = world_pixel(lon, lat, z);
    (
        wp.x - tile_x as f64 * TILE_SIZE,
        wp.y - tile_y as f64 * TILE_SIZE,
    )
}

/// Approximate meters-per-pixel at a given latitude and zoom, used to size
/// the neighborhood dilation painted around each geodetic-grid event.
pub fn meters_per_pixel(lat: f64, z: u32) -> f64 {
    const MPP_EQUATOR: f64 = 156543.03392804097;
    (MPP_EQUATOR * lat.to_radians().cos()) / 2f64.powi(z as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_pixel_finite_at_poles() {
        for lat in [-90.0, -89.9, 0.0, 89.9, 90.0] {
            let wp = world_pixel(0.0, lat, 4);
            assert!(wp.x.is_finite());
            assert!(wp.y.is_finite());
        }
    }

    #[test]
    fn world_pixel_zoom_zero_centered() {
        // At zoom 0, (0,0) should map to the center of the single 256x256 tile.
        let wp = world_pixel(0.0, 0.0, 0);
        assert!((wp.x - 128.0).abs() < 1e-6);
        assert!((wp.y - 128.0).abs() < 1e-6);
    }

    #[test]
    fn tile_pixel_subtracts_tile_origin() {
        let wp = world_pixel(10.0, 10.0, 6);
        let (px, py) = tile_pixel(10.0, 10.0, 6, 0, 0);
        assert_eq!((px, py), (wp.x, wp.y));

        let (px2, py2) = tile_pixel(10.0, 10.0, 6, 1, 1);
        assert_eq!(px2, wp.x - 256.0);
        assert_eq!(py2, wp.y - 256.0);
    }

    #[test]
    fn meters_per_pixel_shrinks_with_zoom() {
        let mpp0 = meters_per_pixel(0.0, 0);
        let mpp1 = meters_per_pixel(0.0, 1);
        assert!((mpp0 / mpp1 - 2.0).abs() < 1e-6);
    }

    #[test]
    fn meters_per_pixel_shrinks_toward_poles() {
        let equator = meters_per_pixel(0.0, 5);
        let mid = meters_per_pixel(60.0, 5);
        assert!(mid < equator);
    }
}
