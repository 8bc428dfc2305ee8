use nalgebra as na;

/// A rigid 3D transform: rotation followed by translation.
///
/// Marker poses are defined relative to the camera using the ZYX Euler
/// convention, so construction and decomposition here fix the axis order
/// explicitly: [`rotation_zyx`](Self::rotation_zyx) applies Z, then Y, then X,
/// and [`euler_ypr`](Self::euler_ypr) reverses it.
///
/// Transforms are values. Composition and inversion return new transforms;
/// nothing mutates in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Translation in meters
    pub translation: na::Vector3<f64>,

    /// Rotation as a unit quaternion
    pub rotation: na::UnitQuaternion<f64>,
}

impl RigidTransform {
    /// The identity transform
    pub fn identity() -> Self {
        Self {
            translation: na::Vector3::zeros(),
            rotation: na::UnitQuaternion::identity(),
        }
    }

    /// Create a transform from a translation and a rotation
    pub fn new(translation: na::Vector3<f64>, rotation: na::UnitQuaternion<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Create a transform from a translation and ZYX Euler angles in radians
    pub fn from_parts(translation: na::Vector3<f64>, yaw: f64, pitch: f64, roll: f64) -> Self {
        Self {
            translation,
            rotation: Self::rotation_zyx(yaw, pitch, roll),
        }
    }

    /// Build a rotation by applying yaw about Z, then pitch about Y, then
    /// roll about X.
    pub fn rotation_zyx(yaw: f64, pitch: f64, roll: f64) -> na::UnitQuaternion<f64> {
        // nalgebra's from_euler_angles composes Rz(yaw) * Ry(pitch) * Rx(roll)
        na::UnitQuaternion::from_euler_angles(roll, pitch, yaw)
    }

    /// Compose this transform with another: the result maps a point through
    /// `other` first, then through `self`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        RigidTransform {
            translation: self.translation + self.rotation * other.translation,
            rotation: self.rotation * other.rotation,
        }
    }

    /// The inverse transform, such that `t.compose(&t.inverse())` is the
    /// identity within numerical tolerance.
    pub fn inverse(&self) -> RigidTransform {
        let inv_rotation = self.rotation.inverse();
        RigidTransform {
            translation: -(inv_rotation * self.translation),
            rotation: inv_rotation,
        }
    }

    /// Decompose the rotation into (yaw, pitch, roll) ZYX Euler angles in
    /// radians.
    pub fn euler_ypr(&self) -> (f64, f64, f64) {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        (yaw, pitch, roll)
    }
}

impl std::ops::Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn assert_identity(t: &RigidTransform) {
        assert_relative_eq!(t.translation.norm(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(t.rotation.angle(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_euler_inverse_round_trip() {
        let t = RigidTransform::from_parts(na::Vector3::new(1.0, -2.0, 0.5), 0.7, -0.3, 1.1);
        assert_identity(&t.compose(&t.inverse()));
        assert_identity(&t.inverse().compose(&t));
    }

    #[test]
    fn test_euler_decomposition_matches_construction() {
        let (yaw, pitch, roll) = (0.4, -0.2, 0.9);
        let t = RigidTransform::from_parts(na::Vector3::zeros(), yaw, pitch, roll);
        let (y, p, r) = t.euler_ypr();
        assert_relative_eq!(y, yaw, epsilon = 1e-9);
        assert_relative_eq!(p, pitch, epsilon = 1e-9);
        assert_relative_eq!(r, roll, epsilon = 1e-9);
    }

    #[test]
    fn test_zyx_axis_order() {
        // Pure yaw about Z rotates the X axis onto the Y axis
        let t = RigidTransform::from_parts(na::Vector3::zeros(), FRAC_PI_2, 0.0, 0.0);
        let rotated = t.rotation * na::Vector3::x();
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-9);

        // With yaw and pitch set, the rotation is exactly Rz * Ry
        let q = RigidTransform::rotation_zyx(0.9, 0.4, 0.0);
        let expected = na::UnitQuaternion::from_axis_angle(&na::Vector3::z_axis(), 0.9)
            * na::UnitQuaternion::from_axis_angle(&na::Vector3::y_axis(), 0.4);
        assert_relative_eq!(q.angle_to(&expected), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mount_rotation_round_trip() {
        // Composing with the camera-mount correction and undoing it returns
        // the original transform
        let mount = RigidTransform::from_parts(na::Vector3::zeros(), 0.0, -FRAC_PI_2, 0.0);
        let t = RigidTransform::from_parts(na::Vector3::new(0.3, 0.1, 2.0), 1.2, 0.1, -0.4);
        let round_trip = t
            .compose(&t.inverse())
            .compose(&t)
            .compose(&mount)
            .compose(&mount.inverse());
        assert_relative_eq!(round_trip.translation, t.translation, epsilon = 1e-9);
        assert_relative_eq!(
            round_trip.rotation.angle_to(&t.rotation),
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_compose_applies_rotation_to_translation() {
        let a = RigidTransform::from_parts(na::Vector3::zeros(), FRAC_PI_2, 0.0, 0.0);
        let b = RigidTransform::new(na::Vector3::new(1.0, 0.0, 0.0), na::UnitQuaternion::identity());
        let c = a.compose(&b);
        assert_relative_eq!(c.translation.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c.translation.y, 1.0, epsilon = 1e-9);
    }
}
