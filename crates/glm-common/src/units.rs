//! Energy unit handling.
//!
//! Event energy arrives from NetCDF in Joules, but the color-ramp
//! thresholds and the `/ingest` JSON contract are written against
//! femtojoules (1 fJ = 1e-15 J). This crate picks femtojoules as the
//! single internal unit (integer-friendly thresholds) and converts at
//! every boundary.

/// Energy expressed in femtojoules (1 fJ = 1e-15 J).
///
/// All events carried inside the event store, aggregator and renderer use
/// this unit. Conversion from Joules happens once, at ingest.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FemtoJoules(pub f64);

impl FemtoJoules {
    pub const ZERO: FemtoJoules = FemtoJoules(0.0);

    /// Convert a Joule quantity (as read from NetCDF `event_energy`) to fJ.
    pub fn from_joules(joules: f64) -> Self {
        FemtoJoules(joules * 1e15)
    }

    pub fn joules(self) -> f64 {
        self.0 / 1e15
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl std::ops::Add for FemtoJoules {
    type Output = FemtoJoules;
    fn add(self, rhs: FemtoJoules) -> FemtoJoules {
        FemtoJoules(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for FemtoJoules {
    fn add_assign(&mut self, rhs: FemtoJoules) {
        self.0 += rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joules_roundtrip() {
        let fj = FemtoJoules::from_joules(1e-12);
        assert!((fj.value() - 1000.0).abs() < 1e-9);
        assert!((fj.joules() - 1e-12).abs() < 1e-20);
    }
}
