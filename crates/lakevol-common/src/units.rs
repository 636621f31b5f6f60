//! Unit conversion helpers.

/// Square metres per hectare.
pub const SQUARE_METRES_PER_HECTARE: f64 = 10_000.0;

/// Cubic metres in one TMC (thousand million cubic feet).
pub const CUBIC_METRES_PER_TMC: f64 = 28_316_846.592;

/// Convert an area in square metres to hectares.
#[inline]
pub fn m2_to_ha(area_m2: f64) -> f64 {
    area_m2 / SQUARE_METRES_PER_HECTARE
}

/// Convert an area in hectares to square metres.
#[inline]
pub fn ha_to_m2(area_ha: f64) -> f64 {
    area_ha * SQUARE_METRES_PER_HECTARE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hectare_conversions() {
        assert_eq!(m2_to_ha(10_000.0), 1.0);
        assert_eq!(ha_to_m2(100.0), 1_000_000.0);
        assert_eq!(m2_to_ha(ha_to_m2(2.5)), 2.5);
    }
}
