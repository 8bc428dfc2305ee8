use std::f64::consts::PI;

/// Convert degrees to radians
pub fn deg_to_rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

/// Convert radians to degrees
pub fn rad_to_deg(rad: f64) -> f64 {
    rad * 180.0 / PI
}

/// Normalize an angle to the range [-π, π]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut result = angle;
    while result > PI {
        result -= 2.0 * PI;
    }
    while result <= -PI {
        result += 2.0 * PI;
    }
    result
}

/// Calculate the angular difference between two angles in radians
pub fn angle_diff(a: f64, b: f64) -> f64 {
    normalize_angle(a - b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_angle() {
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(-3.0 * PI), PI, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(0.5), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_angle_diff_wraps() {
        assert_relative_eq!(angle_diff(PI - 0.1, -PI + 0.1), -0.2, epsilon = 1e-9);
    }
}
