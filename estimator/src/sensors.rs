use nalgebra as na;

/// Raw motion reading from the vehicle's onboard odometry.
///
/// Units follow the AR.Drone navdata convention: velocities in mm/s,
/// attitude in degrees, altitude in millimeters. The estimator converts to
/// SI units internally.
#[derive(Debug, Clone)]
pub struct MotionSample {
    /// Timestamp in seconds
    pub timestamp: f64,

    /// Linear velocities in body frame (x, y, z) in mm/s
    pub velocity: na::Vector3<f64>,

    /// Absolute attitude (roll, pitch, yaw) in degrees
    pub attitude: na::Vector3<f64>,

    /// Absolute altitude in millimeters
    pub altitude: f64,
}

impl MotionSample {
    /// Check that the sample contains only finite values
    pub fn is_valid(&self) -> bool {
        self.timestamp.is_finite()
            && self.altitude.is_finite()
            && self.velocity.iter().all(|v| v.is_finite())
            && self.attitude.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_validity() {
        let mut sample = MotionSample {
            timestamp: 1.0,
            velocity: na::Vector3::new(100.0, 0.0, 0.0),
            attitude: na::Vector3::zeros(),
            altitude: 500.0,
        };
        assert!(sample.is_valid());

        sample.velocity.y = f64::NAN;
        assert!(!sample.is_valid(), "NaN velocity must be rejected");
    }
}
