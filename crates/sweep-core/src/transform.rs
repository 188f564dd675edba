//! 6-DOF rigid transform stored as translation + axis-angle rotation.
//!
//! This is the storage and wire representation used by descriptors,
//! configuration and the calibration report. The all-zero value is the
//! identity, which makes zero-initialised records well defined. Internal
//! math converts to [`Iso3`] and back at the boundary.

use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

use crate::math::{Iso3, Real, Vec3};

/// Rigid transform as 3 translation + 3 axis-angle rotation scalars.
///
/// The rotation vector points along the rotation axis with magnitude equal
/// to the rotation angle in radians. Composition and inversion go through
/// [`Iso3`], so the type forms SE(3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    /// Translation component in meters.
    pub translation: Vec3,
    /// Axis-angle rotation vector in radians.
    pub rotation: Vec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// The identity transform (all six scalars zero).
    pub fn identity() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Vec3::zeros(),
        }
    }

    /// Build from explicit translation and rotation vectors.
    pub fn new(translation: Vec3, rotation: Vec3) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Whether this transform is the identity within `eps` on all scalars.
    pub fn is_identity(&self, eps: Real) -> bool {
        self.translation.norm() <= eps && self.rotation.norm() <= eps
    }

    /// Convert into an [`Iso3`] for computation.
    pub fn to_isometry(&self) -> Iso3 {
        let rot = UnitQuaternion::from_scaled_axis(self.rotation);
        Iso3::from_parts(self.translation.into(), rot)
    }

    /// Convert an [`Iso3`] into the axis-angle representation.
    ///
    /// Rotations of exactly π have two equivalent axis-angle encodings; the
    /// one chosen by `nalgebra`'s `scaled_axis` is kept.
    pub fn from_isometry(iso: &Iso3) -> Self {
        Self {
            translation: iso.translation.vector,
            rotation: iso.rotation.scaled_axis(),
        }
    }

    /// Compose with another transform: the result maps a point through
    /// `other` first and then through `self`, matching isometry
    /// multiplication order.
    pub fn compose(&self, other: &Self) -> Self {
        Self::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Self {
        Self::from_isometry(&self.to_isometry().inverse())
    }
}
