//! Closed-form solvers for `sweep-calib`.
//!
//! Includes:
//! - Kabsch least-squares alignment of matched 3-D point sets.
//! - DLT pose estimation over sweep-plane coordinates, plain and wrapped in
//!   the consensus engine for outlier rejection.
//!
//! Both are batch one-shot solves; degraded inputs produce degraded (or
//! explicitly not-found) outputs rather than errors, so a calibration run
//! can continue past individual failures.

/// Rigid point-set alignment.
pub mod kabsch;
/// Perspective pose estimation from sweep observations.
pub mod pnp;

pub use kabsch::{align_point_sets, PointAlignment};
pub use pnp::{sweep_pnp, sweep_pnp_ransac};
