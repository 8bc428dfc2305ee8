//! # Marker-based pose estimation for a single drone
//!
//! Fuses the vehicle's raw motion readings (velocity, attitude, altitude)
//! with intermittent visual marker observations into a consistent planar
//! pose estimate (x, y, heading) using an Extended Kalman Filter. Height and
//! tilt are tracked directly from raw sensor readings and bypass the filter.
//!
//! The crate is strictly a sequential estimation core: transport of the
//! observations, marker detection itself, and any downstream consumer of the
//! fused pose live outside it.

use log::{debug, warn};
use nalgebra as na;
use thiserror::Error;

pub mod ekf;
pub mod marker;
pub mod motion;
pub mod sensors;
pub mod transform;
pub mod utils;

pub use ekf::{ExtendedKalmanFilter, Measurement};
pub use marker::{FrameComposer, MarkerDetection};
pub use motion::{ControlVector, MotionModel, Odometry, PlanarMotionModel};
pub use sensors::MotionSample;
pub use transform::RigidTransform;

use utils::deg_to_rad;

/// Errors that can occur during estimation
#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("filter not initialized")]
    FilterNotInitialized,

    #[error("sensor error: {0}")]
    SensorError(String),

    #[error("timing error: invalid time step {0}")]
    TimingError(f64),
}

/// Result type for estimator operations
pub type EstimatorResult<T> = Result<T, EstimatorError>;

/// Process noise configuration (standard deviations per prediction)
#[derive(Debug, Clone)]
pub struct ProcessNoise {
    pub xy: f64,
    pub yaw: f64,
}

/// Measurement noise configuration (standard deviations)
#[derive(Debug, Clone)]
pub struct MeasurementNoise {
    pub translation: f64,
    pub rotation: f64,
}

/// Configuration for the estimator
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Id of the marker used for corrections
    pub target_marker: u32,

    /// Minimum detection confidence, inclusive
    pub confidence_threshold: f64,

    /// Time step assumed for the first motion sample, in seconds
    pub default_time_step: f64,

    /// Static extrinsic: camera pose in the world frame
    pub cam_to_world: RigidTransform,

    /// Static extrinsic: vehicle pose in the marker frame
    pub drone_in_marker: RigidTransform,

    /// Process noise parameters
    pub process_noise: ProcessNoise,

    /// Measurement noise parameters
    pub measurement_noise: MeasurementNoise,

    /// Diagonal of the covariance restored at filter initialization
    pub initial_covariance: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            target_marker: 0,
            confidence_threshold: 0.5,
            default_time_step: 1.0 / 14.0,
            cam_to_world: RigidTransform::identity(),
            drone_in_marker: RigidTransform::new(
                na::Vector3::new(0.0, 0.0, -0.15),
                na::UnitQuaternion::identity(),
            ),
            process_noise: ProcessNoise { xy: 0.01, yaw: 0.01 },
            measurement_noise: MeasurementNoise {
                translation: 0.05,
                rotation: 0.02,
            },
            initial_covariance: 0.0,
        }
    }
}

/// Full 6-DOF pose combining the filter's planar estimate with the
/// raw-tracked tilt and altitude.
#[derive(Debug, Clone, Copy)]
pub struct EstimatedPose {
    /// Position in the world frame (x, y from the filter, z from the raw
    /// altitude reading) in meters
    pub position: na::Vector3<f64>,

    /// Attitude built from the filter's yaw and the raw pitch/roll readings
    pub attitude: na::UnitQuaternion<f64>,
}

impl EstimatedPose {
    fn identity() -> Self {
        Self {
            position: na::Vector3::zeros(),
            attitude: na::UnitQuaternion::identity(),
        }
    }

    /// Euler angles (yaw, pitch, roll) of the attitude in radians
    pub fn euler_ypr(&self) -> (f64, f64, f64) {
        let (roll, pitch, yaw) = self.attitude.euler_angles();
        (yaw, pitch, roll)
    }
}

/// Number of motion-sample intervals kept for rate estimation
const RATE_WINDOW_SIZE: usize = 10;

/// The estimator orchestrator.
///
/// Receives motion samples and marker detection batches, manages the filter's
/// initialization ordering, and reconstructs the full pose after every
/// predict or correct step. All per-run state (timestamps, previous angles,
/// readiness) lives here; there are no process-wide globals.
///
/// Events are processed to completion one at a time; the `&mut self` methods
/// make the single-writer requirement a compile-time property.
pub struct Estimator {
    config: EstimatorConfig,
    filter: ExtendedKalmanFilter,
    motion_model: PlanarMotionModel,
    composer: FrameComposer,

    /// Externally controlled readiness flag; until set, inputs only advance
    /// bookkeeping and never touch the filter
    ready: bool,

    /// Externally maintained absolute pose, read once to seed the filter
    seed_pose: Option<RigidTransform>,

    /// Timestamp of the previous motion sample
    prev_time: Option<f64>,

    /// Attitude (roll, pitch, yaw) of the previous sample, in radians
    last_attitude: na::Vector3<f64>,

    /// Raw absolute attitude of the latest sample, in radians
    roll: f64,
    pitch: f64,
    yaw: f64,

    /// Raw absolute altitude of the latest sample, in meters
    altitude: f64,

    /// Last recomputed pose
    pose: EstimatedPose,

    /// Recent motion-sample intervals for rate estimation, in seconds
    motion_intervals: Vec<f64>,
}

impl Estimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let filter = ExtendedKalmanFilter::new(&config);
        let composer = FrameComposer::new(config.target_marker, config.confidence_threshold);
        let motion_model = PlanarMotionModel;
        debug!(
            "estimator tracking marker {} with the {} motion model",
            config.target_marker,
            motion_model.name()
        );

        Self {
            config,
            filter,
            motion_model,
            composer,
            ready: false,
            seed_pose: None,
            prev_time: None,
            last_attitude: na::Vector3::zeros(),
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            altitude: 0.0,
            pose: EstimatedPose::identity(),
            motion_intervals: Vec::with_capacity(RATE_WINDOW_SIZE),
        }
    }

    /// Mark the system ready. Set by a collaborator once startup
    /// preconditions (a valid seed pose in particular) are satisfied.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Supply the absolute pose used to seed the filter's mean.
    pub fn set_seed_pose(&mut self, pose: RigidTransform) {
        self.seed_pose = Some(pose);
    }

    /// The last recomputed pose estimate
    pub fn pose(&self) -> &EstimatedPose {
        &self.pose
    }

    /// Read access to the filter for diagnostics
    pub fn filter(&self) -> &ExtendedKalmanFilter {
        &self.filter
    }

    /// Average motion-sample rate in Hz over the recent window, if at least
    /// two samples have arrived
    pub fn motion_update_rate(&self) -> Option<f64> {
        if self.motion_intervals.is_empty() {
            return None;
        }
        let avg = self.motion_intervals.iter().sum::<f64>() / self.motion_intervals.len() as f64;
        if avg > 0.0 {
            Some(1.0 / avg)
        } else {
            None
        }
    }

    /// Process a raw motion sample: advance bookkeeping, and when the system
    /// is ready, seed the filter once and run a prediction step.
    pub fn handle_motion(&mut self, sample: &MotionSample) -> EstimatorResult<EstimatedPose> {
        if !sample.is_valid() {
            return Err(EstimatorError::SensorError(
                "motion sample contains non-finite values".into(),
            ));
        }

        let dt = match self.prev_time {
            Some(prev) => {
                let dt = sample.timestamp - prev;
                if dt <= 0.0 || !dt.is_finite() {
                    return Err(EstimatorError::TimingError(dt));
                }
                self.motion_intervals.push(dt);
                if self.motion_intervals.len() > RATE_WINDOW_SIZE {
                    self.motion_intervals.remove(0);
                }
                dt
            }
            None => {
                // No previous timestamp: assume the nominal sample period and
                // prime the incremental-angle trackers so the first deltas
                // come out zero
                self.last_attitude = sample.attitude.map(deg_to_rad);
                self.config.default_time_step
            }
        };
        self.prev_time = Some(sample.timestamp);

        // Incremental displacement from velocity (mm/s) over dt
        let dist_x = sample.velocity.x * dt / 1000.0;
        let dist_y = sample.velocity.y * dt / 1000.0;

        // Absolute attitude and altitude come straight from the raw reading
        self.roll = deg_to_rad(sample.attitude.x);
        self.pitch = deg_to_rad(sample.attitude.y);
        self.yaw = deg_to_rad(sample.attitude.z);
        self.altitude = sample.altitude / 1000.0;

        let odometry = Odometry::new(
            dist_x,
            dist_y,
            self.altitude,
            self.roll - self.last_attitude.x,
            self.pitch - self.last_attitude.y,
            self.yaw - self.last_attitude.z,
        );
        self.last_attitude = na::Vector3::new(self.roll, self.pitch, self.yaw);

        if self.ready {
            if !self.filter.is_initialized() {
                self.seed_filter();
            }
            if self.filter.is_initialized() {
                let control = self.motion_model.down_project_control(&odometry);
                self.filter.prediction_step(&control)?;
                self.recompute_pose();
            }
        }

        Ok(self.pose)
    }

    /// Process a batch of marker detections. Only the detection matching the
    /// configured target marker with sufficient confidence is composed into a
    /// measurement; the filter is corrected with it when the system is ready.
    ///
    /// Returns the recomputed pose, or `None` when no eligible detection
    /// advanced the filter.
    pub fn handle_marker_batch(
        &mut self,
        detections: &[MarkerDetection],
    ) -> EstimatorResult<Option<EstimatedPose>> {
        for detection in detections {
            if !self.composer.accepts(detection) {
                continue;
            }
            debug!(
                "marker {} sighted (cf {:.3})",
                detection.id, detection.confidence
            );

            let measurement = self.composer.compose(detection);

            if !self.ready || !self.filter.is_initialized() {
                return Ok(None);
            }

            self.filter.correction_step(
                &measurement,
                &self.config.cam_to_world.inverse(),
                &self.config.drone_in_marker.inverse(),
            )?;
            self.recompute_pose();
            return Ok(Some(self.pose));
        }

        Ok(None)
    }

    /// Seed the filter's mean from the externally supplied absolute pose.
    fn seed_filter(&mut self) {
        match self.seed_pose {
            Some(seed) => {
                let (seed_yaw, _, _) = seed.euler_ypr();
                self.filter.init(na::Vector3::new(
                    seed.translation.x,
                    seed.translation.y,
                    seed_yaw,
                ));
            }
            None => warn!("system marked ready without a seed pose; filter stays uninitialized"),
        }
    }

    /// Rebuild the full pose from the filter's planar state and the raw
    /// tilt/altitude readings. Height and tilt never come from the filter.
    fn recompute_pose(&mut self) {
        let mean = self.filter.mean();
        self.pose = EstimatedPose {
            position: na::Vector3::new(mean.x, mean.y, self.altitude),
            attitude: RigidTransform::rotation_zyx(mean.z, self.pitch, self.roll),
        };
    }
}
