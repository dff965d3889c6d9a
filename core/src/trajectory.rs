//! Trajectory reconstruction.
//!
//! A 3D path is produced from a sample sequence by fusing two independent position estimates:
//!
//! 1. **GPS projection** ([`gps_positions`]): every fix is placed in a local tangent-plane frame
//!    centred on the first fix. East and north offsets come from an equirectangular
//!    approximation and are multiplied by a visualization scale; the vertical axis is the
//!    barometric altitude against the series reference pressure.
//! 2. **Inertial integration** ([`integrate_inertial`]): a damped velocity/position integrator
//!    driven by the accelerometer (times a gain) with a small magnetometer steering term. On top
//!    of that integrator sit periodic perturbations (lateral/vertical oscillation, thermal lift
//!    and descent impulses, occasional loops) that give the path a soaring-flight look. These are
//!    cosmetic and are collected in [`StylizationParams`] so they can be switched off.
//!
//! The two estimates are blended per index ([`blend_positions`]), smoothed with a 3-point
//! weighted average ([`smooth_path`]) and finally given an orientation per point
//! ([`orientations`]) from the path tangent and a magnetometer-informed up vector.
//!
//! ## Frame
//! `x` is east, `y` is up (relative altitude, meters), `z` is north. The path is a
//! visualization aid: the inertial part is not a navigation-grade dead-reckoning solution.
use log::debug;
use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::altitude::ReferencePressure;
use crate::geo::equirectangular_offset;
use crate::records::Sample;

/// Horizontal scale applied to projected GPS offsets.
pub const DEFAULT_HORIZONTAL_SCALE: f64 = 0.001;
/// Weight of the GPS estimate when blending with the inertial estimate.
pub const DEFAULT_BLEND_FACTOR: f64 = 0.8;
/// Smoothing factor of the 3-point path filter.
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.6;
/// Weight of the magnetometer up vector against world up.
pub const DEFAULT_MAGNETOMETER_UP_WEIGHT: f64 = 0.3;
/// Minimum tangent length for a point to get a non-identity orientation.
const MIN_TANGENT_LENGTH: f64 = 0.001;

/// Constants of the inertial integrator and its flight-pattern perturbations.
///
/// Only `dt`, `accel_gain`, `magnetometer_influence`, `damping`, `floor` and `bounce` belong to the
/// integrator itself; the remaining fields shape the cosmetic perturbations. A period of zero
/// disables the corresponding impulse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylizationParams {
    /// Integration time step (s)
    pub dt: f64,
    pub accel_gain: f64,
    pub magnetometer_influence: f64,
    /// Multiplicative velocity damping applied every step
    pub damping: f64,
    /// Lowest allowed vertical position
    pub floor: f64,
    /// Fraction of vertical speed kept (upwards) when hitting the floor
    pub bounce: f64,
    pub lateral_frequency: f64,
    pub lateral_amplitude: f64,
    pub vertical_frequency: f64,
    pub vertical_amplitude: f64,
    pub thermal_period: usize,
    pub thermal_lift: f64,
    pub descent_period: usize,
    pub descent_impulse: f64,
    pub loop_period: usize,
    pub loop_radius: f64,
    pub loop_radius_jitter: f64,
    pub loop_scale: f64,
    /// Seed for the loop radius jitter
    pub seed: u64,
}

impl Default for StylizationParams {
    fn default() -> Self {
        StylizationParams {
            dt: 0.1,
            accel_gain: 2.0,
            magnetometer_influence: 0.2,
            damping: 0.98,
            floor: -5.0,
            bounce: 0.5,
            lateral_frequency: 0.05,
            lateral_amplitude: 0.5,
            vertical_frequency: 0.02,
            vertical_amplitude: 1.0,
            thermal_period: 50,
            thermal_lift: 0.5,
            descent_period: 30,
            descent_impulse: 0.3,
            loop_period: 100,
            loop_radius: 5.0,
            loop_radius_jitter: 3.0,
            loop_scale: 0.1,
            seed: 42,
        }
    }
}

impl StylizationParams {
    /// Plain damped integration with every perturbation switched off.
    pub fn none() -> Self {
        StylizationParams {
            lateral_amplitude: 0.0,
            vertical_amplitude: 0.0,
            thermal_period: 0,
            descent_period: 0,
            loop_period: 0,
            ..StylizationParams::default()
        }
    }
}

/// Positions and matching orientations, one per input sample.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub positions: Vec<Vector3<f64>>,
    pub orientations: Vec<UnitQuaternion<f64>>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.positions.len()
    }
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Settings and entry point of the trajectory reconstruction.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryEstimator {
    pub blend_factor: f64,
    pub smoothing_factor: f64,
    pub magnetometer_up_weight: f64,
    pub horizontal_scale: f64,
    pub stylization: StylizationParams,
}

impl Default for TrajectoryEstimator {
    fn default() -> Self {
        TrajectoryEstimator {
            blend_factor: DEFAULT_BLEND_FACTOR,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            magnetometer_up_weight: DEFAULT_MAGNETOMETER_UP_WEIGHT,
            horizontal_scale: DEFAULT_HORIZONTAL_SCALE,
            stylization: StylizationParams::default(),
        }
    }
}

impl TrajectoryEstimator {
    /// Reconstruct the path of `samples`.
    ///
    /// `reference` is the reference pressure of the *full* series so that the vertical axis agrees
    /// with the altitudes shown elsewhere.
    pub fn estimate(&self, samples: &[Sample], reference: ReferencePressure) -> Trajectory {
        if samples.is_empty() {
            return Trajectory::default();
        }
        let gps = gps_positions(samples, reference, self.horizontal_scale);
        let inertial = integrate_inertial(samples, &self.stylization);
        let blended = blend_positions(&gps, &inertial, self.blend_factor);
        let positions = smooth_path(&blended, self.smoothing_factor);
        let orientations = orientations(&positions, samples, self.magnetometer_up_weight);
        debug!("reconstructed trajectory with {} points", positions.len());
        Trajectory {
            positions,
            orientations,
        }
    }
}

/// Project every fix into the local frame centred on the first fix.
pub fn gps_positions(
    samples: &[Sample],
    reference: ReferencePressure,
    horizontal_scale: f64,
) -> Vec<Vector3<f64>> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let (lon0, lat0) = (first.lon, first.lat);
    let base_altitude = reference
        .value()
        .map(|p| reference.altitude_of(p))
        .unwrap_or(0.0);
    samples
        .iter()
        .map(|s| {
            let (east, north) = equirectangular_offset(s.lon, s.lat, lon0, lat0);
            let up = reference.altitude_of(s.pressure) - base_altitude;
            Vector3::new(east * horizontal_scale, up, north * horizontal_scale)
        })
        .collect()
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Damped integration of accelerometer and magnetometer samples with flight-pattern perturbations.
///
/// Non-finite sensor values contribute nothing to the integrator so a single bad cell cannot
/// poison the remainder of the path.
pub fn integrate_inertial(samples: &[Sample], params: &StylizationParams) -> Vec<Vector3<f64>> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut position = Vector3::zeros();
    let mut velocity = Vector3::<f64>::zeros();
    let len = samples.len() as f64;
    let dt = params.dt;

    let mut out = Vec::with_capacity(samples.len());
    for (i, s) in samples.iter().enumerate() {
        let t = i as f64;
        let lateral = (t * params.lateral_frequency).sin() * params.lateral_amplitude;
        let vertical = (t * params.vertical_frequency).sin() * params.vertical_amplitude;

        let accel = Vector3::new(
            finite_or_zero(s.ax),
            finite_or_zero(s.ay),
            finite_or_zero(s.az),
        ) * params.accel_gain;
        // magnetometer z drives the vertical axis, y the north axis
        let steering = Vector3::new(
            finite_or_zero(s.mx),
            finite_or_zero(s.mz),
            finite_or_zero(s.my),
        ) * params.magnetometer_influence;

        velocity += (accel + steering + Vector3::new(0.0, vertical, 0.0)) * dt;
        velocity *= params.damping;
        position += velocity * dt;
        position.x += lateral;

        if params.thermal_period > 0 && i % params.thermal_period == 0 {
            velocity.y += params.thermal_lift;
        } else if params.descent_period > 0 && i % params.descent_period == 0 {
            velocity.y -= params.descent_impulse;
        }

        if position.y < params.floor {
            position.y = params.floor;
            velocity.y = velocity.y.abs() * params.bounce;
        }

        if params.loop_period > 0 && i % params.loop_period == 0 {
            let angle = t / len * std::f64::consts::TAU;
            let radius = params.loop_radius + rng.random::<f64>() * params.loop_radius_jitter;
            position.x += angle.cos() * radius * params.loop_scale;
            position.z += angle.sin() * radius * params.loop_scale;
        }

        out.push(position);
    }
    out
}

/// Per-index linear interpolation from the inertial estimate towards the GPS estimate.
///
/// `factor` is the GPS weight. When either input is empty the other is returned unchanged; when
/// lengths differ the result has the shorter length.
pub fn blend_positions(
    gps: &[Vector3<f64>],
    inertial: &[Vector3<f64>],
    factor: f64,
) -> Vec<Vector3<f64>> {
    if gps.is_empty() {
        return inertial.to_vec();
    }
    if inertial.is_empty() {
        return gps.to_vec();
    }
    gps.iter()
        .zip(inertial)
        .map(|(g, a)| a.lerp(g, factor))
        .collect()
}

/// 3-point weighted moving average; the end points are kept as they are.
pub fn smooth_path(positions: &[Vector3<f64>], factor: f64) -> Vec<Vector3<f64>> {
    if positions.len() < 3 {
        return positions.to_vec();
    }
    let last = positions.len() - 1;
    let mut out = Vec::with_capacity(positions.len());
    out.push(positions[0]);
    for w in positions.windows(3) {
        out.push(w[0] * (factor * 0.5) + w[1] * (1.0 - factor) + w[2] * (factor * 0.5));
    }
    out.push(positions[last]);
    out
}

/// Orientation of every path point.
///
/// The forward axis points to the next position (the last point looks back at the first). The up
/// axis blends world up with the normalized magnetometer vector of the matching sample and is
/// re-orthogonalized against forward. Points without a usable tangent get the identity.
pub fn orientations(
    positions: &[Vector3<f64>],
    samples: &[Sample],
    magnetometer_weight: f64,
) -> Vec<UnitQuaternion<f64>> {
    let n = positions.len();
    (0..n)
        .map(|i| {
            let direction = positions[(i + 1) % n] - positions[i];
            let magnetic = samples.get(i).map(|s| Vector3::new(s.mx, s.mz, s.my));
            orientation_along(&direction, magnetic, magnetometer_weight)
        })
        .collect()
}

fn orientation_along(
    direction: &Vector3<f64>,
    magnetic: Option<Vector3<f64>>,
    magnetometer_weight: f64,
) -> UnitQuaternion<f64> {
    let length = direction.norm();
    if !length.is_finite() || length <= MIN_TANGENT_LENGTH {
        return UnitQuaternion::identity();
    }
    let forward = direction / length;
    let world_up = Vector3::y();
    let magnetic_up = magnetic
        .filter(|m| m.iter().all(|c| c.is_finite()))
        .and_then(|m| m.try_normalize(f64::EPSILON))
        .unwrap_or(world_up);
    let up = world_up
        .lerp(&magnetic_up, magnetometer_weight)
        .try_normalize(f64::EPSILON)
        .unwrap_or(world_up);

    let Some(right) = up.cross(&forward).try_normalize(1e-9) else {
        return UnitQuaternion::identity();
    };
    let up = forward.cross(&right);
    let rotation = Rotation3::from_basis_unchecked(&[right, up, forward]);
    UnitQuaternion::from_rotation_matrix(&rotation)
}
