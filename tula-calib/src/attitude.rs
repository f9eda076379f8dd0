//! Attitude estimation from raw accelerometer counts
//!
//! Converts an (x, y, z) count triplet to gravity units and derives the two
//! bench angles:
//!
//! ```text
//! theta = atan2(ax, sqrt(ay² + az² + ε))   clamped to [-90, 90]
//! psi   = atan2(ay, az)                    normalized to (-180, 180]
//! ```
//!
//! Also hosts the angle arithmetic shared by the controller and the
//! simulator.

/// Default accelerometer sensitivity (counts per g)
pub const DEFAULT_SENSITIVITY: f64 = 256_000.0;

/// Keeps the theta denominator away from zero when the sensor points along X
const EPSILON: f64 = 1e-12;

/// Pure converter from counts to (theta, psi)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeEstimator {
    sensitivity: f64,
}

impl AttitudeEstimator {
    /// Create an estimator for the given counts-per-g sensitivity
    pub fn new(sensitivity: f64) -> Self {
        Self { sensitivity }
    }

    /// Counts to g
    #[inline]
    pub fn to_g(&self, counts: [f64; 3]) -> [f64; 3] {
        [
            counts[0] / self.sensitivity,
            counts[1] / self.sensitivity,
            counts[2] / self.sensitivity,
        ]
    }

    /// (theta, psi) in degrees for a raw triplet
    pub fn estimate(&self, raw: [i32; 3]) -> (f64, f64) {
        let [ax, ay, az] = self.to_g(raw.map(f64::from));
        angles_from_g(ax, ay, az)
    }

    /// Magnitude of a count triplet in g
    pub fn norm(&self, counts: [f64; 3]) -> f64 {
        let [ax, ay, az] = self.to_g(counts);
        (ax * ax + ay * ay + az * az).sqrt()
    }

    /// Counts a 1 g reading produces at the given angles
    ///
    /// Exact inverse of [`estimate`](Self::estimate) for theta in [-90, 90].
    pub fn counts_for(&self, theta_deg: f64, psi_deg: f64) -> [f64; 3] {
        let (st, ct) = theta_deg.to_radians().sin_cos();
        let (sp, cp) = psi_deg.to_radians().sin_cos();
        [
            st * self.sensitivity,
            ct * sp * self.sensitivity,
            ct * cp * self.sensitivity,
        ]
    }
}

impl Default for AttitudeEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVITY)
    }
}

/// (theta, psi) in degrees from an acceleration vector in g
pub fn angles_from_g(ax: f64, ay: f64, az: f64) -> (f64, f64) {
    let theta = ax.atan2((ay * ay + az * az + EPSILON).sqrt()).to_degrees();
    let psi = ay.atan2(az).to_degrees();
    (clamp(theta, -90.0, 90.0), normalize_angle(psi))
}

/// Wrap an angle into (-180, 180]
///
/// Values already in range are returned unchanged, which makes the function
/// exactly idempotent.
pub fn normalize_angle(angle: f64) -> f64 {
    if angle > -180.0 && angle <= 180.0 {
        return angle;
    }
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `current` to `target`, in [-180, 180)
#[inline]
pub fn shortest_angle_error(target: f64, current: f64) -> f64 {
    (target - current + 180.0).rem_euclid(360.0) - 180.0
}

/// Limit `value` to `[min, max]`
///
/// Unlike `f64::clamp` this never panics on inverted bounds; `min` wins.
#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_sensor() {
        let est = AttitudeEstimator::default();
        let (theta, psi) = est.estimate([0, 0, 256_000]);
        assert_relative_eq!(theta, 0.0, epsilon = 1e-9);
        assert_relative_eq!(psi, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_theta_along_x() {
        let est = AttitudeEstimator::default();
        // The regularizing epsilon keeps theta just short of the pole
        let (theta, _) = est.estimate([256_000, 0, 0]);
        assert_relative_eq!(theta, 90.0, epsilon = 1e-4);
        assert!(theta < 90.0);

        let (theta, _) = est.estimate([-256_000, 0, 0]);
        assert_relative_eq!(theta, -90.0, epsilon = 1e-4);
    }

    #[test]
    fn test_psi_quadrants() {
        let est = AttitudeEstimator::default();
        assert_relative_eq!(est.estimate([0, 256_000, 0]).1, 90.0, epsilon = 1e-9);
        assert_relative_eq!(est.estimate([0, -256_000, 0]).1, -90.0, epsilon = 1e-9);
        assert_relative_eq!(est.estimate([0, 0, -256_000]).1, 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_counts_for_inverts_estimate() {
        let est = AttitudeEstimator::default();
        for &(theta, psi) in &[(0.0, 0.0), (10.0, 90.0), (-45.0, -135.0), (80.0, 170.0)] {
            let counts = est.counts_for(theta, psi);
            let raw = counts.map(|c| c.round() as i32);
            let (t, p) = est.estimate(raw);
            assert_relative_eq!(t, theta, epsilon = 1e-3);
            assert_relative_eq!(p, psi, epsilon = 1e-3);
            assert_relative_eq!(est.norm(counts), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_relative_eq!(normalize_angle(190.0), -170.0, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-190.0), 170.0, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(720.5), 0.5, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(540.0), 180.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_idempotent() {
        let mut a = -2000.0;
        while a <= 2000.0 {
            let once = normalize_angle(a);
            assert!(once > -180.0 && once <= 180.0, "{a} -> {once}");
            assert_eq!(normalize_angle(once), once);
            a += 7.3;
        }
    }

    #[test]
    fn test_shortest_error_wraps() {
        assert_relative_eq!(shortest_angle_error(10.0, 350.0), 20.0, epsilon = 1e-12);
        assert_relative_eq!(shortest_angle_error(350.0, 10.0), -20.0, epsilon = 1e-12);
        assert_relative_eq!(shortest_angle_error(179.0, -179.0), -2.0, epsilon = 1e-12);
        assert_relative_eq!(shortest_angle_error(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_shortest_error_antisymmetric() {
        let angles = [-179.5, -120.0, -33.3, 0.0, 12.0, 89.9, 150.0, 179.0];
        for &t in &angles {
            for &c in &angles {
                let forward = shortest_angle_error(t, c);
                let backward = shortest_angle_error(c, t);
                // Equal modulo the ±180 wrap point
                assert_relative_eq!(
                    normalize_angle(forward),
                    normalize_angle(-backward),
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5, -1.0, 1.0), 0.5);
    }
}
