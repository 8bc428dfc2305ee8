use log::warn;
use nalgebra as na;

use crate::transform::RigidTransform;
use crate::utils::normalize_angle;
use crate::{ControlVector, EstimatorConfig, EstimatorError, EstimatorResult};

/// Measurement vector (x, y, z, roll, pitch, yaw) in the camera frame
pub type Measurement = na::Vector6<f64>;

/// Finite-difference step for the measurement Jacobian
const JACOBIAN_EPS: f64 = 1e-6;

/// Extended Kalman Filter over the planar state (x, y, yaw).
///
/// The filter owns its mean and covariance exclusively: after `init` they are
/// only ever advanced by `prediction_step` and `correction_step`.
pub struct ExtendedKalmanFilter {
    /// State mean (x, y, yaw)
    mean: na::Vector3<f64>,

    /// State covariance matrix
    covariance: na::Matrix3<f64>,

    /// Process noise covariance added at every prediction
    process_noise: na::Matrix3<f64>,

    /// Measurement noise covariance, fixed configuration
    measurement_noise: na::Matrix6<f64>,

    /// Covariance restored on (re-)initialization
    initial_covariance: na::Matrix3<f64>,

    /// Whether `init` has been called
    initialized: bool,
}

impl ExtendedKalmanFilter {
    pub fn new(config: &EstimatorConfig) -> Self {
        let mut process_noise = na::Matrix3::zeros();
        process_noise[(0, 0)] = config.process_noise.xy * config.process_noise.xy;
        process_noise[(1, 1)] = config.process_noise.xy * config.process_noise.xy;
        process_noise[(2, 2)] = config.process_noise.yaw * config.process_noise.yaw;

        let mut measurement_noise = na::Matrix6::zeros();
        for i in 0..3 {
            measurement_noise[(i, i)] =
                config.measurement_noise.translation * config.measurement_noise.translation;
            measurement_noise[(i + 3, i + 3)] =
                config.measurement_noise.rotation * config.measurement_noise.rotation;
        }

        Self {
            mean: na::Vector3::zeros(),
            covariance: na::Matrix3::zeros(),
            process_noise,
            measurement_noise,
            initial_covariance: na::Matrix3::identity() * config.initial_covariance,
            initialized: false,
        }
    }

    /// Seed the filter with an initial state mean.
    ///
    /// Must be called once before any correction. Calling it again is an
    /// explicit re-seed and overwrites the estimate.
    pub fn init(&mut self, mean: na::Vector3<f64>) {
        self.mean = mean;
        self.covariance = self.initial_covariance;
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current state mean (x, y, yaw)
    pub fn mean(&self) -> &na::Vector3<f64> {
        &self.mean
    }

    /// Current state covariance
    pub fn covariance(&self) -> &na::Matrix3<f64> {
        &self.covariance
    }

    /// Advance the state with an incremental body-frame control.
    ///
    /// The planar displacement is rotated into the world frame by the current
    /// heading; the covariance propagates through the transition Jacobian
    /// plus process noise.
    pub fn prediction_step(&mut self, control: &ControlVector) -> EstimatorResult<()> {
        debug_assert!(self.initialized, "prediction_step called before init");
        if !self.initialized {
            return Err(EstimatorError::FilterNotInitialized);
        }

        let (sin_yaw, cos_yaw) = self.mean.z.sin_cos();

        self.mean.x += cos_yaw * control.x - sin_yaw * control.y;
        self.mean.y += sin_yaw * control.x + cos_yaw * control.y;
        self.mean.z = normalize_angle(self.mean.z + control.z);

        let mut f = na::Matrix3::identity();
        f[(0, 2)] = -sin_yaw * control.x - cos_yaw * control.y;
        f[(1, 2)] = cos_yaw * control.x - sin_yaw * control.y;

        self.covariance = f * self.covariance * f.transpose() + self.process_noise;

        Ok(())
    }

    /// Correct the state with a composed marker measurement.
    ///
    /// `cam_from_world` and `drone_from_marker` are the inverted static
    /// extrinsics; they project the planar state into the camera frame so the
    /// innovation is formed where the observation lives. A singular
    /// innovation covariance is a recoverable degradation: the update is
    /// skipped and the prior state kept.
    pub fn correction_step(
        &mut self,
        measurement: &Measurement,
        cam_from_world: &RigidTransform,
        drone_from_marker: &RigidTransform,
    ) -> EstimatorResult<()> {
        debug_assert!(self.initialized, "correction_step called before init");
        if !self.initialized {
            return Err(EstimatorError::FilterNotInitialized);
        }

        let predicted = Self::expected_measurement(&self.mean, cam_from_world, drone_from_marker);
        let mut innovation = measurement - predicted;
        for i in 3..6 {
            innovation[i] = normalize_angle(innovation[i]);
        }

        let h = Self::measurement_jacobian(&self.mean, cam_from_world, drone_from_marker);
        let pht = self.covariance * h.transpose();
        let s = h * pht + self.measurement_noise;

        let s_inv = match s.try_inverse() {
            Some(inv) => inv,
            None => {
                warn!("singular innovation covariance, skipping correction");
                return Ok(());
            }
        };

        let k = pht * s_inv;
        self.mean += k * innovation;
        self.mean.z = normalize_angle(self.mean.z);
        self.covariance = (na::Matrix3::identity() - k * h) * self.covariance;

        Ok(())
    }

    /// Expected measurement h(state): the marker pose in the camera frame
    /// implied by the planar state.
    fn expected_measurement(
        mean: &na::Vector3<f64>,
        cam_from_world: &RigidTransform,
        drone_from_marker: &RigidTransform,
    ) -> Measurement {
        let drone_in_world = RigidTransform::from_parts(
            na::Vector3::new(mean.x, mean.y, 0.0),
            mean.z,
            0.0,
            0.0,
        );
        let marker_in_cam = cam_from_world
            .compose(&drone_in_world)
            .compose(drone_from_marker);

        let (yaw, pitch, roll) = marker_in_cam.euler_ypr();
        Measurement::new(
            marker_in_cam.translation.x,
            marker_in_cam.translation.y,
            marker_in_cam.translation.z,
            roll,
            pitch,
            yaw,
        )
    }

    /// Linearize h around the current mean by central differences.
    fn measurement_jacobian(
        mean: &na::Vector3<f64>,
        cam_from_world: &RigidTransform,
        drone_from_marker: &RigidTransform,
    ) -> na::SMatrix<f64, 6, 3> {
        let mut h = na::SMatrix::<f64, 6, 3>::zeros();
        for j in 0..3 {
            let mut plus = *mean;
            let mut minus = *mean;
            plus[j] += JACOBIAN_EPS;
            minus[j] -= JACOBIAN_EPS;

            let z_plus = Self::expected_measurement(&plus, cam_from_world, drone_from_marker);
            let z_minus = Self::expected_measurement(&minus, cam_from_world, drone_from_marker);

            for i in 0..6 {
                // Rotation rows wrap at ±π
                let diff = if i < 3 {
                    z_plus[i] - z_minus[i]
                } else {
                    normalize_angle(z_plus[i] - z_minus[i])
                };
                h[(i, j)] = diff / (2.0 * JACOBIAN_EPS);
            }
        }
        h
    }
}
