//! Core math and geometry primitives for `sweep-calib`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Pt3`, ...),
//! - a 6-DOF axis-angle rigid-transform value type ([`RigidTransform`]),
//! - the synthetic sweep camera and lighthouse correction models,
//! - a generic seeded consensus engine ([`consensus_fit`], [`Consensus`]).
//!
//! A lighthouse sweeps two orthogonal beam planes across the scene; a
//! photosensor reports one angle per plane. The sweep camera maps those two
//! angles onto a synthetic pinhole image plane so that standard perspective
//! pose machinery applies.

/// Generic consensus (RANSAC) engine and traits.
pub mod consensus;
/// Linear algebra type aliases.
pub mod math;
/// Sweep camera and lighthouse correction models.
pub mod models;
/// Axis-angle rigid-transform value type.
pub mod transform;

pub use consensus::*;
pub use math::*;
pub use models::*;
pub use transform::*;
