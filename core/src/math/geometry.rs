//! Polar/Cartesian helpers shared by the scan controller and the feature mapper.

/// Metres per range bin for a round-trip echo.
pub fn range_resolution(speed_of_sound_m_s: f64, sample_period_s: f64) -> f64 {
    speed_of_sound_m_s * sample_period_s / 2.0
}

/// Makes a sweep's bearing list monotonic when it crosses 0°/360°.
///
/// A sweep crosses the boundary when its last angle is smaller than its first; every angle
/// below the first one is then lifted by a full turn.
pub fn unwrap_bearings(angles_deg: &[f64]) -> Vec<f64> {
    match (angles_deg.first(), angles_deg.last()) {
        (Some(&first), Some(&last)) if last < first => angles_deg
            .iter()
            .map(|&angle| if angle < first { angle + 360.0 } else { angle })
            .collect(),
        _ => angles_deg.to_vec(),
    }
}

/// Angular footprint of an unwrapped bearing list, degrees.
pub fn bearing_span(unwrapped_deg: &[f64]) -> f64 {
    match (unwrapped_deg.first(), unwrapped_deg.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    }
}

/// Polar detection to Cartesian, with 0° along +y and bearings growing towards +x.
pub fn polar_to_cartesian(range_m: f64, bearing_deg: f64) -> (f64, f64) {
    let bearing = bearing_deg.rem_euclid(360.0).to_radians();
    (range_m * bearing.sin(), range_m * bearing.cos())
}

/// Evenly spaced values in `[start, stop)`.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return Vec::new();
    }
    // Absorbs representation error such as 32 * 0.1 / 0.1 > 32.
    let count = ((stop - start) / step - 1e-9).ceil().max(0.0) as usize;
    (0..count).map(|idx| start + idx as f64 * step).collect()
}
