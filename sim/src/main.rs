//! Synthetic-flight harness for the estimator.
//!
//! Flies a circle at 14 Hz, feeds the generated motion samples into the
//! estimator, and every second synthesizes a marker detection from the
//! ground-truth pose so the correction path is exercised end to end.

use estimator::{
    Estimator, EstimatorConfig, MarkerDetection, MotionSample, RigidTransform,
};
use nalgebra as na;

const SAMPLE_RATE_HZ: f64 = 14.0;
const FLIGHT_SECONDS: f64 = 30.0;
const CIRCLE_RADIUS_M: f64 = 2.0;
const ANGULAR_RATE: f64 = 0.4; // rad/s
const ALTITUDE_MM: f64 = 1200.0;
const TARGET_MARKER: u32 = 3;

/// Ground-truth planar pose on the circular path at time t
fn truth_at(t: f64) -> (f64, f64, f64) {
    let phase = ANGULAR_RATE * t;
    let x = CIRCLE_RADIUS_M * phase.cos();
    let y = CIRCLE_RADIUS_M * phase.sin();
    // Heading tangent to the circle
    let yaw = estimator::utils::normalize_angle(phase + std::f64::consts::FRAC_PI_2);
    (x, y, yaw)
}

/// Motion sample the onboard odometry would report at time t: body-frame
/// forward velocity in mm/s, attitude in degrees, altitude in millimeters
fn motion_sample_at(t: f64) -> MotionSample {
    let (_, _, yaw) = truth_at(t);
    let speed_mm_s = CIRCLE_RADIUS_M * ANGULAR_RATE * 1000.0;
    MotionSample {
        timestamp: t,
        velocity: na::Vector3::new(speed_mm_s, 0.0, 0.0),
        attitude: na::Vector3::new(0.0, 0.0, estimator::utils::rad_to_deg(yaw)),
        altitude: ALTITUDE_MM,
    }
}

/// Synthesize the detection the tag tracker would emit for the ground-truth
/// pose, by running the frame composition backwards: strip the camera-mount
/// correction off the true marker-in-camera transform and undo the
/// camera-to-body axis remap.
fn detection_at(t: f64, config: &EstimatorConfig) -> MarkerDetection {
    let (x, y, yaw) = truth_at(t);
    let drone_in_world = RigidTransform::from_parts(na::Vector3::new(x, y, 0.0), yaw, 0.0, 0.0);

    let marker_in_cam = config
        .cam_to_world
        .inverse()
        .compose(&drone_in_world)
        .compose(&config.drone_in_marker.inverse());

    let mount = RigidTransform::from_parts(
        na::Vector3::zeros(),
        0.0,
        -std::f64::consts::FRAC_PI_2,
        0.0,
    );
    let marker_pose = marker_in_cam.compose(&mount.inverse());

    let (rot_z, rot_y, rot_x) = marker_pose.euler_ypr();
    MarkerDetection {
        id: TARGET_MARKER,
        confidence: 0.9,
        translation: marker_pose.translation,
        rotation: na::Vector3::new(-rot_y, -rot_z, rot_x),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = EstimatorConfig {
        target_marker: TARGET_MARKER,
        cam_to_world: RigidTransform::from_parts(
            na::Vector3::new(0.0, 0.0, 2.5),
            0.0,
            0.0,
            0.0,
        ),
        ..EstimatorConfig::default()
    };
    let detection_config = config.clone();

    let mut estimator = Estimator::new(config);
    let (x0, y0, yaw0) = truth_at(0.0);
    estimator.set_seed_pose(RigidTransform::from_parts(
        na::Vector3::new(x0, y0, 0.0),
        yaw0,
        0.0,
        0.0,
    ));
    estimator.set_ready(true);

    let dt = 1.0 / SAMPLE_RATE_HZ;
    let steps = (FLIGHT_SECONDS * SAMPLE_RATE_HZ) as usize;
    let mut worst_error: f64 = 0.0;

    for step in 0..steps {
        let t = step as f64 * dt;
        let pose = estimator.handle_motion(&motion_sample_at(t))?;

        // A marker sighting roughly once per second
        if step % SAMPLE_RATE_HZ as usize == 0 {
            let batch = [detection_at(t, &detection_config)];
            estimator.handle_marker_batch(&batch)?;
        }

        let (tx, ty, _) = truth_at(t);
        let error = ((pose.position.x - tx).powi(2) + (pose.position.y - ty).powi(2)).sqrt();
        worst_error = worst_error.max(error);

        if step % (SAMPLE_RATE_HZ as usize * 5) == 0 {
            let (yaw, _, _) = pose.euler_ypr();
            log::info!(
                "t={:5.2}s est=({:6.3}, {:6.3}) yaw={:6.3} truth=({:6.3}, {:6.3}) err={:.3}m",
                t,
                pose.position.x,
                pose.position.y,
                yaw,
                tx,
                ty,
                error
            );
        }
    }

    if let Some(rate) = estimator.motion_update_rate() {
        log::info!("motion sample rate: {:.1} Hz", rate);
    }
    log::info!("worst planar error over the flight: {:.3} m", worst_error);

    Ok(())
}
