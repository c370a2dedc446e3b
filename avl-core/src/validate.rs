//! Coordinate and record validation rules shared by both decoders.

/// True if the lat/lon pair is a plausible WGS84 fix.
///
/// Exactly-zero longitude or latitude is rejected: trackers without a
/// fix report zeroed coordinates, and a real fix on the meridian or
/// equator to seven decimal places does not occur in practice.
pub fn valid_coordinates(lat: f64, lon: f64) -> bool {
    if lon == 0.0 || !(-180.0..=180.0).contains(&lon) {
        return false;
    }
    if lat == 0.0 || !(-90.0..=90.0).contains(&lat) {
        return false;
    }
    true
}

/// A record is considered valid when the fix used more than 3 satellites.
pub fn record_valid(satellites: u8) -> bool {
    satellites > 3
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        assert!(valid_coordinates(45.0, -93.0));
        assert!(valid_coordinates(-45.0, 93.0));
        assert!(valid_coordinates(90.0, 180.0));
        assert!(valid_coordinates(-90.0, -180.0));
    }

    #[test]
    fn test_zero_coordinates_rejected() {
        assert!(!valid_coordinates(0.0, 0.0));
        assert!(!valid_coordinates(0.0, 20.0));
        assert!(!valid_coordinates(45.0, 0.0));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        assert!(!valid_coordinates(91.0, 0.1));
        assert!(!valid_coordinates(-91.0, 0.1));
        assert!(!valid_coordinates(45.0, 181.0));
        assert!(!valid_coordinates(45.0, -181.0));
    }

    #[test]
    fn test_record_valid() {
        assert!(!record_valid(0));
        assert!(!record_valid(3));
        assert!(record_valid(4));
        assert!(record_valid(12));
    }
}
