//! Sweep camera and lighthouse correction models.
//!
//! A lighthouse base station is modelled as a pinhole camera observing the
//! tracker photosensors: the azimuth/elevation sweep angles of a sensor map
//! to a point on a synthetic image plane of width 1 m spanning the full
//! 120° field of view. Factory calibration of the rotors is captured by
//! per-axis correction parameters applied to the raw angles before
//! projection.

use serde::{Deserialize, Serialize};

use crate::math::{Pt2, Pt3, Real};

/// Lighthouse field of view in radians (120°).
pub const SWEEP_FOV: Real = 2.0944;

/// Synthetic image plane width in meters.
pub const SWEEP_PLANE_WIDTH: Real = 1.0;

/// Synthetic pinhole camera over the two sweep angles.
///
/// The principal point is the optical axis and both axes share the same
/// principal distance, so plane coordinates divided by [`focal`](Self::focal)
/// are already normalized ray coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepCamera {
    focal: Real,
}

impl Default for SweepCamera {
    fn default() -> Self {
        Self::new(SWEEP_FOV, SWEEP_PLANE_WIDTH)
    }
}

impl SweepCamera {
    /// Camera with principal distance `w / (2 tan(fov / 2))`.
    pub fn new(fov: Real, plane_width: Real) -> Self {
        Self {
            focal: plane_width / (2.0 * (fov / 2.0).tan()),
        }
    }

    /// Principal distance of the synthetic plane.
    pub fn focal(&self) -> Real {
        self.focal
    }

    /// Map a pair of sweep angles onto the image plane.
    pub fn project_angles(&self, azimuth: Real, elevation: Real) -> Pt2 {
        Pt2::new(self.focal * azimuth.tan(), self.focal * elevation.tan())
    }

    /// Project a camera-frame 3-D point onto the image plane.
    ///
    /// Returns `None` for points at or behind the optical centre.
    pub fn project_point(&self, p: &Pt3) -> Option<Pt2> {
        if p.z <= 0.0 {
            return None;
        }
        Some(Pt2::new(self.focal * p.x / p.z, self.focal * p.y / p.z))
    }

    /// Sweep angles that a camera-frame point would produce.
    ///
    /// Inverse of [`project_angles`](Self::project_angles) for points in
    /// front of the camera; used to synthesise measurements.
    pub fn sweep_angles(&self, p: &Pt3) -> (Real, Real) {
        (p.x.atan2(p.z), p.y.atan2(p.z))
    }
}

/// Factory correction parameters for one sweep rotor.
///
/// The zero value leaves angles untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisParams {
    /// Constant angular offset of the sweep plane.
    pub phase: Real,
    /// Tilt of the sweep plane out of its nominal axis.
    pub tilt: Real,
    /// Second-order curvature of the beam.
    pub curve: Real,
    /// Phase of the sinusoidal gib error.
    pub gib_phase: Real,
    /// Magnitude of the sinusoidal gib error.
    pub gib_mag: Real,
}

/// Per-lighthouse intrinsic model: one parameter set per sweep axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LighthouseModel {
    /// Parameters for axis 0 (azimuth) and axis 1 (elevation).
    pub axes: [AxisParams; 2],
}

impl LighthouseModel {
    /// Apply the first-order rotor correction to an `[azimuth, elevation]`
    /// angle pair. When `enabled` is false the raw angles pass through.
    ///
    /// Each axis is corrected against the other axis' raw angle: the tilt
    /// term couples the planes, the curve term bends the beam and the gib
    /// term models the sinusoidal wobble of the rotor bearing.
    pub fn correct(&self, angles: [Real; 2], enabled: bool) -> [Real; 2] {
        if !enabled {
            return angles;
        }
        let [az, el] = angles;
        let a0 = &self.axes[0];
        let a1 = &self.axes[1];
        [
            az - (a0.phase + a0.tilt.tan() * el + a0.curve * el * el
                + a0.gib_mag * (az + a0.gib_phase).sin()),
            el - (a1.phase + a1.tilt.tan() * az + a1.curve * az * az
                + a1.gib_mag * (el + a1.gib_phase).sin()),
        ]
    }
}
