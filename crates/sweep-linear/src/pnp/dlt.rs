//! Direct Linear Transform pose solve over sweep-plane coordinates.
//!
//! The sweep camera has unit aspect ratio and a zero principal point, so
//! dividing plane coordinates by the principal distance yields normalized
//! ray coordinates directly; no intrinsics matrix inversion is needed. The
//! 3-D sensor positions are Hartley-normalized for conditioning and the
//! recovered rotation is projected onto SO(3).

use anyhow::Result;
use nalgebra::{DMatrix, Rotation3, Translation3, UnitQuaternion};
use sweep_core::{Iso3, Mat4, Pt2, Pt3, Real, SweepCamera};

/// Minimum correspondences for the linear solve.
pub(crate) const MIN_DLT_POINTS: usize = 6;

/// Linear pose estimate from sensor positions and their sweep-plane points.
///
/// `sensors` are 3-D positions in the tracker frame, `plane` their projected
/// coordinates on the synthetic image plane. Returns `T_L_T` (tracker to
/// lighthouse). Needs at least 6 correspondences in a non-degenerate
/// (non-coplanar) configuration.
pub fn sweep_pnp(sensors: &[Pt3], plane: &[Pt2], camera: &SweepCamera) -> Result<Iso3> {
    let n = sensors.len();
    if n < MIN_DLT_POINTS || plane.len() != n {
        anyhow::bail!("need at least {} correspondences, got {}", MIN_DLT_POINTS, n);
    }

    // Centre and scale the 3-D points so the DLT system is well conditioned.
    let n_real = n as Real;
    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut cz = 0.0;
    for p in sensors {
        cx += p.x;
        cy += p.y;
        cz += p.z;
    }
    cx /= n_real;
    cy /= n_real;
    cz /= n_real;

    let mut mean_dist = 0.0;
    for p in sensors {
        mean_dist += ((p.x - cx).powi(2) + (p.y - cy).powi(2) + (p.z - cz).powi(2)).sqrt();
    }
    mean_dist /= n_real;
    if mean_dist <= Real::EPSILON {
        anyhow::bail!("degenerate sensor configuration");
    }
    let scale = (3.0_f64).sqrt() / mean_dist;

    #[rustfmt::skip]
    let t_world = Mat4::new(
        scale, 0.0, 0.0, -scale * cx,
        0.0, scale, 0.0, -scale * cy,
        0.0, 0.0, scale, -scale * cz,
        0.0, 0.0, 0.0, 1.0,
    );

    // 2n x 12 homogeneous system for P = [R | t] in normalized coordinates.
    let focal = camera.focal();
    let mut a = DMatrix::<Real>::zeros(2 * n, 12);
    for (i, (pw, pi)) in sensors.iter().zip(plane.iter()).enumerate() {
        let x = (pw.x - cx) * scale;
        let y = (pw.y - cy) * scale;
        let z = (pw.z - cz) * scale;
        let u = pi.x / focal;
        let v = pi.y / focal;

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -u * x;
        a[(r0, 9)] = -u * y;
        a[(r0, 10)] = -u * z;
        a[(r0, 11)] = -u;

        a[(r1, 4)] = x;
        a[(r1, 5)] = y;
        a[(r1, 6)] = z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -v * x;
        a[(r1, 9)] = -v * y;
        a[(r1, 10)] = -v * z;
        a[(r1, 11)] = -v;
    }

    // Smallest-singular-value right singular vector, reshaped to 3x4.
    let svd = a.svd(true, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| anyhow::anyhow!("svd failed in sweep pnp"))?;
    let row = v_t.row(v_t.nrows() - 1);
    let mut p_mtx = nalgebra::Matrix3x4::<Real>::zeros();
    for r in 0..3 {
        for c in 0..4 {
            p_mtx[(r, c)] = row[4 * r + c];
        }
    }

    // Undo the 3-D normalization: P = P_norm * T_world.
    let p_mtx = p_mtx * t_world;

    let m = p_mtx.fixed_view::<3, 3>(0, 0).into_owned();
    let mut s = (m.row(0).norm() + m.row(1).norm() + m.row(2).norm()) / 3.0;
    if m.determinant() < 0.0 {
        s = -s;
    }
    if s == 0.0 {
        anyhow::bail!("rank-deficient projection in sweep pnp");
    }
    let r_approx = m / s;

    // Project onto SO(3).
    let svd = r_approx.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| anyhow::anyhow!("svd failed in sweep pnp"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| anyhow::anyhow!("svd failed in sweep pnp"))?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let t = p_mtx.column(3).into_owned() / s;

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Ok(Iso3::from_parts(Translation3::from(t), rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;
    use sweep_core::pose_delta;

    fn shell_sensors() -> Vec<Pt3> {
        // Non-coplanar layout loosely shaped like a tracker's sensor shell.
        vec![
            Pt3::new(0.05, 0.00, 0.010),
            Pt3::new(-0.05, 0.00, 0.012),
            Pt3::new(0.00, 0.05, 0.008),
            Pt3::new(0.00, -0.05, 0.015),
            Pt3::new(0.035, 0.035, -0.010),
            Pt3::new(-0.035, 0.035, -0.012),
            Pt3::new(0.035, -0.035, -0.008),
            Pt3::new(-0.035, -0.035, -0.014),
            Pt3::new(0.02, 0.01, 0.030),
            Pt3::new(-0.02, -0.01, -0.030),
        ]
    }

    #[test]
    fn recovers_pose_from_exact_projections() {
        let camera = SweepCamera::default();
        let rot = Rotation3::from_euler_angles(0.15, -0.1, 0.3);
        let gt = Iso3::from_parts(Translation3::new(0.2, -0.1, 2.0), rot.into());

        let sensors = shell_sensors();
        let plane: Vec<Pt2> = sensors
            .iter()
            .map(|s| camera.project_point(&gt.transform_point(s)).unwrap())
            .collect();

        let est = sweep_pnp(&sensors, &plane, &camera).unwrap();
        let (dt, ang) = pose_delta(&est, &gt);
        assert!(dt < 1e-6, "translation error {}", dt);
        assert!(ang < 1e-6, "rotation error {}", ang);
    }

    #[test]
    fn rejects_too_few_points() {
        let camera = SweepCamera::default();
        let sensors = shell_sensors()[..5].to_vec();
        let plane = vec![Pt2::origin(); 5];
        assert!(sweep_pnp(&sensors, &plane, &camera).is_err());
    }
}
