//! Kabsch least-squares rigid alignment of two matched point sets.
//!
//! Finds the rotation and translation minimising the sum of squared
//! distances between corresponding points. Used to chain slave lighthouses
//! to the master and to register the reference frame to the world.

use anyhow::Result;
use nalgebra::{Rotation3, Translation3, UnitQuaternion};
use sweep_core::{Iso3, Mat3, Pt3, Real, Vec3};

/// Outcome of a point-set alignment.
///
/// An empty correspondence set is not an error: the transform is the
/// identity and `found` is false, so callers can log and carry on with a
/// degraded calibration.
#[derive(Debug, Clone)]
pub struct PointAlignment {
    /// Transform mapping source points onto target points.
    pub transform: Iso3,
    /// False when no correspondences were available.
    pub found: bool,
    /// Post-fit RMS residual over the correspondences.
    pub rms: Real,
}

impl PointAlignment {
    fn not_found() -> Self {
        Self {
            transform: Iso3::identity(),
            found: false,
            rms: 0.0,
        }
    }
}

/// Least-squares rigid fit `T` minimising `Σ ‖T(source_i) − target_i‖²`.
///
/// Mismatched input lengths are a caller bug and return an error. An empty
/// input returns the identity with `found == false`. Small sets (fewer than
/// 3 non-collinear points) still produce a fit; its rotation is simply not
/// uniquely determined.
pub fn align_point_sets(source: &[Pt3], target: &[Pt3]) -> Result<PointAlignment> {
    if source.len() != target.len() {
        anyhow::bail!(
            "correspondence length mismatch: {} source vs {} target",
            source.len(),
            target.len()
        );
    }
    if source.is_empty() {
        return Ok(PointAlignment::not_found());
    }

    let n = source.len() as Real;
    let centroid = |pts: &[Pt3]| {
        pts.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / n
    };
    let cs = centroid(source);
    let ct = centroid(target);

    // Cross-covariance of the centred sets.
    let mut h = Mat3::zeros();
    for (p, q) in source.iter().zip(target.iter()) {
        h += (p.coords - cs) * (q.coords - ct).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| anyhow::anyhow!("svd failed in point alignment"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| anyhow::anyhow!("svd failed in point alignment"))?;

    // R = V diag(1, 1, sign) U^T with the sign chosen against reflections.
    let v = v_t.transpose();
    let sign = (v * u.transpose()).determinant().signum();
    let d = Mat3::from_diagonal(&Vec3::new(1.0, 1.0, sign));
    let r = v * d * u.transpose();

    let t = ct - r * cs;
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
    let transform = Iso3::from_parts(Translation3::from(t), rot);

    let mut ss = 0.0;
    for (p, q) in source.iter().zip(target.iter()) {
        ss += (transform.transform_point(p) - q).norm_squared();
    }

    Ok(PointAlignment {
        transform,
        found: true,
        rms: (ss / n).sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;
    use sweep_core::pose_delta;

    fn make_iso(angles: (Real, Real, Real), t: (Real, Real, Real)) -> Iso3 {
        let rot = Rotation3::from_euler_angles(angles.0, angles.1, angles.2);
        let tr = Translation3::new(t.0, t.1, t.2);
        Iso3::from_parts(tr, rot.into())
    }

    #[test]
    fn recovers_exact_transform() {
        let gt = make_iso((0.3, -0.2, 0.1), (0.5, -1.0, 2.0));
        let source = vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(1.0, 0.0, 0.0),
            Pt3::new(0.0, 1.0, 0.0),
            Pt3::new(0.0, 0.0, 1.0),
            Pt3::new(0.7, 0.3, -0.4),
        ];
        let target: Vec<Pt3> = source.iter().map(|p| gt.transform_point(p)).collect();

        let fit = align_point_sets(&source, &target).unwrap();
        assert!(fit.found);
        let (dt, ang) = pose_delta(&fit.transform, &gt);
        assert!(dt < 1e-10, "translation error {}", dt);
        assert!(ang < 1e-10, "rotation error {}", ang);
        assert!(fit.rms < 1e-10);
    }

    #[test]
    fn empty_input_is_identity_not_found() {
        let fit = align_point_sets(&[], &[]).unwrap();
        assert!(!fit.found);
        let (dt, ang) = pose_delta(&fit.transform, &Iso3::identity());
        assert!(dt == 0.0 && ang == 0.0);
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        let a = [Pt3::origin()];
        assert!(align_point_sets(&a, &[]).is_err());
    }

    #[test]
    fn reflection_is_never_returned() {
        // A near-planar set that tempts the SVD into a reflection.
        let source = vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(1.0, 0.0, 0.0),
            Pt3::new(0.0, 1.0, 0.0),
            Pt3::new(1.0, 1.0, 1e-9),
        ];
        let gt = make_iso((0.0, 0.0, 1.2), (0.1, 0.2, 0.3));
        let target: Vec<Pt3> = source.iter().map(|p| gt.transform_point(p)).collect();

        let fit = align_point_sets(&source, &target).unwrap();
        let det = fit
            .transform
            .rotation
            .to_rotation_matrix()
            .matrix()
            .determinant();
        assert!((det - 1.0).abs() < 1e-9, "determinant {}", det);
    }

    #[test]
    fn single_point_aligns_by_translation() {
        let source = [Pt3::new(1.0, 2.0, 3.0)];
        let target = [Pt3::new(0.0, 0.0, 1.0)];
        let fit = align_point_sets(&source, &target).unwrap();
        assert!(fit.found);
        let moved = fit.transform.transform_point(&source[0]);
        assert!((moved - target[0]).norm() < 1e-10);
    }
}
