//! Closed-form kinematic conversions, kept free of any state machine so
//! they can be verified in isolation.

pub const G: f32 = 9.81;

/// Jump height in centimeters from flight time in milliseconds, via the
/// projectile time-of-flight relation h = g * t^2 / 8.
#[inline]
pub fn flight_time_to_height(flight_ms: f32) -> f32 {
    let t = flight_ms / 1000.0;

    G * t * t / 8.0 * 100.0
}

/// Reactive strength index: flight time over ground-contact time. None when
/// there is no valid contact time to divide by.
#[inline]
pub fn reactive_strength_index(flight_ms: f32, contact_ms: f32) -> Option<f32> {
    if contact_ms <= 0.0 {
        return None;
    }

    Some(flight_ms / contact_ms)
}

/// Instantaneous velocity from a position delta, with the configurable
/// display scale applied (no physical distance calibration is performed).
#[inline]
pub fn instantaneous_velocity(dy: f32, dt: f32, scale: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }

    dy.abs() / dt * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_matches_projectile_formula() {
        // 400 ms of flight is a ~19.6 cm jump.
        assert!((flight_time_to_height(400.0) - 19.62).abs() < 0.01);
        assert_eq!(flight_time_to_height(0.0), 0.0);
    }

    #[test]
    fn height_is_monotonic_in_flight_time() {
        let mut prev = flight_time_to_height(80.0);
        let mut t = 100.0;
        while t <= 1500.0 {
            let h = flight_time_to_height(t);
            assert!(h > prev);
            prev = h;
            t += 20.0;
        }
    }

    #[test]
    fn rsi_undefined_without_contact_time() {
        assert_eq!(reactive_strength_index(400.0, 0.0), None);
        assert_eq!(reactive_strength_index(400.0, -1.0), None);
        assert!((reactive_strength_index(400.0, 200.0).unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn velocity_scales_the_delta() {
        assert!((instantaneous_velocity(0.04, 0.1, 2.5) - 1.0).abs() < 1e-6);
        assert_eq!(instantaneous_velocity(0.04, 0.0, 2.5), 0.0);
        // Direction of travel does not matter.
        assert!((instantaneous_velocity(-0.04, 0.1, 2.5) - 1.0).abs() < 1e-6);
    }
}
