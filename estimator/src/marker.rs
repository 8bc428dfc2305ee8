use nalgebra as na;
use std::f64::consts::FRAC_PI_2;

use crate::ekf::Measurement;
use crate::transform::RigidTransform;

/// A single visual marker detection in the camera frame.
#[derive(Debug, Clone)]
pub struct MarkerDetection {
    /// Marker id
    pub id: u32,

    /// Detection confidence in [0, 1]
    pub confidence: f64,

    /// Relative translation (x, y, z) in meters
    pub translation: na::Vector3<f64>,

    /// Relative rotation (x_rot, y_rot, z_rot) in radians, camera convention
    pub rotation: na::Vector3<f64>,
}

/// Assembles accepted marker detections into filter measurements.
///
/// The detector reports rotations about the camera's axes, which do not
/// coincide with the body axes, and the camera itself is mounted rotated
/// -90° about its local Y axis. Both fixed offsets are folded in here so the
/// filter only ever sees a consistent 6-vector.
pub struct FrameComposer {
    target_marker: u32,
    confidence_threshold: f64,
    mount_correction: RigidTransform,
}

impl FrameComposer {
    pub fn new(target_marker: u32, confidence_threshold: f64) -> Self {
        Self {
            target_marker,
            confidence_threshold,
            mount_correction: RigidTransform::from_parts(
                na::Vector3::zeros(),
                0.0,
                -FRAC_PI_2,
                0.0,
            ),
        }
    }

    /// Whether a detection is eligible for correction: the id matches the
    /// target marker and the confidence reaches the threshold (inclusive).
    /// Detections below the threshold are discarded, not down-weighted.
    pub fn accepts(&self, detection: &MarkerDetection) -> bool {
        detection.id == self.target_marker && detection.confidence >= self.confidence_threshold
    }

    /// Build the measurement vector (x, y, z, roll, pitch, yaw) for an
    /// accepted detection.
    pub fn compose(&self, detection: &MarkerDetection) -> Measurement {
        // Axis remap from the detector's camera convention to body axes
        let rot_z = -detection.rotation.y;
        let rot_y = -detection.rotation.x;
        let rot_x = detection.rotation.z;

        let marker_pose = RigidTransform::new(
            detection.translation,
            RigidTransform::rotation_zyx(rot_z, rot_y, rot_x),
        );
        let corrected = marker_pose * self.mount_correction;

        let (yaw, pitch, roll) = corrected.euler_ypr();
        Measurement::new(
            corrected.translation.x,
            corrected.translation.y,
            corrected.translation.z,
            roll,
            pitch,
            yaw,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn composer() -> FrameComposer {
        FrameComposer::new(3, 0.5)
    }

    fn detection(id: u32, confidence: f64) -> MarkerDetection {
        MarkerDetection {
            id,
            confidence,
            translation: na::Vector3::new(1.0, 0.0, 0.0),
            rotation: na::Vector3::zeros(),
        }
    }

    #[test]
    fn test_confidence_boundary() {
        let composer = composer();
        assert!(
            composer.accepts(&detection(3, 0.5)),
            "confidence exactly at the threshold must be accepted"
        );
        assert!(
            !composer.accepts(&detection(3, 0.499)),
            "confidence just below the threshold must be rejected"
        );
    }

    #[test]
    fn test_id_mismatch_rejected_regardless_of_confidence() {
        let composer = composer();
        assert!(!composer.accepts(&detection(5, 1.0)));
    }

    #[test]
    fn test_compose_preserves_translation_under_mount_rotation() {
        // The mount correction is a pure rotation, so the composed transform
        // keeps the detection's translation
        let composer = composer();
        let measurement = composer.compose(&detection(3, 0.9));
        assert_relative_eq!(measurement[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(measurement[1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(measurement[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_axis_remap() {
        // A rotation reported about the camera's Z axis lands on the body's
        // X axis after the remap
        let composer = FrameComposer::new(3, 0.5);
        let det = MarkerDetection {
            id: 3,
            confidence: 0.9,
            translation: na::Vector3::zeros(),
            rotation: na::Vector3::new(0.0, 0.0, 0.3),
        };

        let rot_z = -det.rotation.y;
        let rot_y = -det.rotation.x;
        let rot_x = det.rotation.z;
        let expected = RigidTransform::rotation_zyx(rot_z, rot_y, rot_x);
        assert_relative_eq!(
            expected.angle_to(&RigidTransform::rotation_zyx(0.0, 0.0, 0.3)),
            0.0,
            epsilon = 1e-9
        );

        // And the composed measurement carries the mount correction on top
        let measurement = composer.compose(&det);
        let reconstructed = RigidTransform::from_parts(
            na::Vector3::zeros(),
            measurement[5],
            measurement[4],
            measurement[3],
        );
        let direct = RigidTransform::new(na::Vector3::zeros(), expected).compose(
            &RigidTransform::from_parts(
                na::Vector3::zeros(),
                0.0,
                -std::f64::consts::FRAC_PI_2,
                0.0,
            ),
        );
        assert_relative_eq!(
            reconstructed.rotation.angle_to(&direct.rotation),
            0.0,
            epsilon = 1e-6
        );
    }
}
