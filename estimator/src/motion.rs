use nalgebra as na;

/// Full-dimensional incremental odometry:
/// (dx, dy, altitude, droll, dpitch, dyaw)
pub type Odometry = na::Vector6<f64>;

/// Reduced control vector driving the filter's state transition
pub type ControlVector = na::Vector3<f64>;

/// Trait for motion models used by the estimation filter.
///
/// The model decides which components of the raw odometry drive the filter,
/// so the filter's dimensionality can change without touching the estimator.
pub trait MotionModel {
    /// Dimension of the filter state this model feeds
    fn state_dim(&self) -> usize;

    /// Project the full odometry onto the filter's control space
    fn down_project_control(&self, odometry: &Odometry) -> ControlVector;

    /// Get the name of the model
    fn name(&self) -> &'static str;
}

/// Planar motion model for a filter estimating (x, y, yaw).
///
/// Altitude and tilt are tracked outside the filter from raw readings, so
/// only the planar displacement and heading increments survive the
/// projection.
pub struct PlanarMotionModel;

impl MotionModel for PlanarMotionModel {
    fn state_dim(&self) -> usize {
        3
    }

    fn down_project_control(&self, odometry: &Odometry) -> ControlVector {
        ControlVector::new(odometry[0], odometry[1], odometry[5])
    }

    fn name(&self) -> &'static str {
        "planar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_down_projection_selects_planar_components() {
        let model = PlanarMotionModel;
        let odometry = Odometry::new(0.1, -0.2, 1.5, 0.01, 0.02, 0.03);
        let control = model.down_project_control(&odometry);
        assert_eq!(control, ControlVector::new(0.1, -0.2, 0.03));
        assert_eq!(model.state_dim(), 3);
    }

    #[test]
    fn test_down_projection_is_deterministic() {
        let model = PlanarMotionModel;
        let odometry = Odometry::new(0.5, 0.4, 0.3, 0.2, 0.1, 0.0);
        assert_eq!(
            model.down_project_control(&odometry),
            model.down_project_control(&odometry),
            "equal odometry inputs must yield equal control vectors"
        );
    }
}
