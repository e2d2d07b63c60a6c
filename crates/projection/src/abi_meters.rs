//! ABI fixed grid, expressed in projected meters rather than scan-angle
//! radians.
//!
//! `Geostationary` (see [`crate::geostationary`]) is built around the GOES-R
//! ABI NetCDF fixed-grid convention, where `x`/`y` are scan angles in
//! radians referenced to a particular sector's grid origin and spacing.
//! GLM events are scattered points, not a raster sector, so TOE binning
//! needs the sector-independent PROJ `+proj=geos` convention instead: `x`
//! and `y` in meters, with no `x_origin`/`y_origin`/`nx`/`ny` at all.
//!
//! The two are the same angle scaled by a constant: PROJ's `geos`
//! projection reports `x = perspective_point_height * atan2(Vy, H - Vx)`,
//! which is exactly the scan-angle `x_rad` that `Geostationary::geo_to_scan`
//! already computes (its `H` is also `perspective_point_height +
//! semi_major_axis`, matching PROJ's `radius_g`). So the meters form is
//! just the scan-angle form multiplied (or divided, for the inverse) by
//! `perspective_point_height`.

use crate::geostationary::Geostationary;

/// GOES-R ABI fixed grid in projected meters, parameterized only by
/// sub-satellite longitude (no sector grid needed for point binning).
#[derive(Debug, Clone)]
pub struct AbiMetersGrid {
    scan: Geostationary,
    perspective_point_height: f64,
}

impl AbiMetersGrid {
    /// GRS80 ellipsoid, GOES-R perspective height.
    const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
    const SEMI_MINOR_AXIS: f64 = 6_356_752.31414;
    const PERSPECTIVE_HEIGHT: f64 = 35_786_023.0;

    /// Build the grid for a given sub-satellite longitude (degrees).
    /// `lon0 = -75.0` is GOES-East's nominal position.
    pub fn new(lon0_deg: f64) -> Self {
        let scan = Geostationary::from_goes(
            Self::PERSPECTIVE_HEIGHT,
            Self::SEMI_MAJOR_AXIS,
            Self::SEMI_MINOR_AXIS,
            lon0_deg,
            0.0,
            0.0,
            1.0,
            1.0,
            0,
            0,
        );
        Self {
            scan,
            perspective_point_height: Self::PERSPECTIVE_HEIGHT,
        }
    }

    /// WGS84 (lon, lat) degrees -> ABI fixed grid (x, y) meters.
    ///
    /// Returns `None` if the point is not visible from the satellite (over
    /// the Earth's limb) or the projected coordinates are non-finite.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let (x_rad, y_rad) = self.scan.geo_to_scan(lon_deg, lat_deg)?;
        let x = x_rad * self.perspective_point_height;
        let y = y_rad * self.perspective_point_height;
        if x.is_finite() && y.is_finite() {
            Some((x, y))
        } else {
            None
        }
    }

    /// ABI fixed grid (x, y) meters -> WGS84 (lon, lat) degrees.
    pub fn inverse(&self, x_m: f64, y_m: f64) -> Option<(f64, f64)> {
        let x_rad = x_m / self.perspective_point_height;
        let y_rad = y_m / self.perspective_point_height;
        self.scan.scan_to_geo(x_rad, y_rad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nadir_roundtrip_is_exact() {
        let grid = AbiMetersGrid::new(-75.0);
        let (lon, lat) = (-75.0, 0.0);
        let (x, y) = grid.forward(lon, lat).expect("nadir must project");
        assert!(x.abs() < 1e-3);
        assert!(y.abs() < 1e-3);

        let (lon2, lat2) = grid.inverse(x, y).expect("nadir must invert");
        assert!((lon - lon2).abs() < 1e-6, "lon {lon} vs {lon2}");
        assert!((lat - lat2).abs() < 1e-6, "lat {lat} vs {lat2}");
    }

    #[test]
    fn off_limb_returns_none() {
        let grid = AbiMetersGrid::new(-75.0);
        assert!(grid.forward(180.0, 0.0).is_none());
    }

    #[test]
    fn two_km_step_is_one_cell_near_equator() {
        let grid = AbiMetersGrid::new(-75.0);
        for lat in [0.0, 15.0, 30.0, 45.0] {
            let lon0 = -75.0;
            let dlon = 2000.0 / (111_320.0 * lat.to_radians().cos());
            let (x0, _) = grid.forward(lon0, lat).unwrap();
            let (x1, _) = grid.forward(lon0 + dlon, lat).unwrap();
            let dx = (x1 - x0).abs();
            assert!(
                (1300.0..=3000.0).contains(&dx),
                "lat {lat}: dx = {dx}"
            );
        }
    }

    #[test]
    fn grid_cell_accumulation_matches_2km_spacing() {
        let grid = AbiMetersGrid::new(-75.0);
        let (x, y) = grid.forward(-75.0, 0.0).unwrap();
        let gx = (x / 2000.0).floor() as i64;
        let gy = (y / 2000.0).floor() as i64;
        assert_eq!(gx, 0);
        assert_eq!(gy, 0);
    }
}
