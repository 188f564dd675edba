//! Robust sweep PnP: DLT inside the consensus engine.
//!
//! The residual is the distance between a sensor's observed plane point and
//! the reprojection of its 3-D position under the candidate pose, in plane
//! units.

use anyhow::Result;
use sweep_core::{consensus_fit, Consensus, ConsensusOptions, Iso3, Pt2, Pt3, SweepCamera};

use super::dlt::{sweep_pnp, MIN_DLT_POINTS};

#[derive(Clone)]
struct SweepDatum {
    sensor: Pt3,
    plane: Pt2,
    camera: SweepCamera,
}

struct SweepPose;

impl Consensus for SweepPose {
    type Datum = SweepDatum;
    type Model = Iso3;

    const MIN_SAMPLES: usize = MIN_DLT_POINTS;

    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
        let mut sensors = Vec::with_capacity(sample.len());
        let mut plane = Vec::with_capacity(sample.len());
        for &i in sample {
            sensors.push(data[i].sensor);
            plane.push(data[i].plane);
        }
        sweep_pnp(&sensors, &plane, &data[0].camera).ok()
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        let in_lighthouse = model.transform_point(&datum.sensor);
        match datum.camera.project_point(&in_lighthouse) {
            Some(proj) => (proj - datum.plane).norm(),
            None => f64::INFINITY,
        }
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        Self::fit(data, inliers)
    }
}

/// Robust pose estimate for one (tracker, lighthouse, instant).
///
/// Returns the pose `T_L_T` and the inlier indices, or an error when no
/// consensus was reached; callers treat that as a skipped instant rather
/// than a fatal condition.
pub fn sweep_pnp_ransac(
    sensors: &[Pt3],
    plane: &[Pt2],
    camera: &SweepCamera,
    opts: &ConsensusOptions,
) -> Result<(Iso3, Vec<usize>)> {
    let n = sensors.len();
    if n < MIN_DLT_POINTS || plane.len() != n {
        anyhow::bail!("need at least {} correspondences, got {}", MIN_DLT_POINTS, n);
    }

    let data: Vec<SweepDatum> = sensors
        .iter()
        .zip(plane.iter())
        .map(|(&sensor, &plane)| SweepDatum {
            sensor,
            plane,
            camera: *camera,
        })
        .collect();

    let fit = consensus_fit::<SweepPose>(&data, opts);
    if !fit.success {
        anyhow::bail!("no consensus pose for {} correspondences", n);
    }
    let model = fit.model.expect("success guarantees a model");
    Ok((model, fit.inliers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Translation3};
    use sweep_core::pose_delta;

    fn shell_sensors() -> Vec<Pt3> {
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

    fn opts() -> ConsensusOptions {
        ConsensusOptions {
            max_iters: 200,
            thresh: 1e-4,
            min_inliers: MIN_DLT_POINTS,
            confidence: 0.99,
            seed: 42,
        }
    }

    #[test]
    fn survives_outlier_correspondences() {
        let camera = SweepCamera::default();
        let rot = Rotation3::from_euler_angles(0.1, -0.05, 0.2);
        let gt = Iso3::from_parts(Translation3::new(-0.3, 0.2, 1.8), rot.into());

        let mut sensors = shell_sensors();
        let mut plane: Vec<Pt2> = sensors
            .iter()
            .map(|s| camera.project_point(&gt.transform_point(s)).unwrap())
            .collect();

        // Two mismatched correspondences.
        sensors.push(Pt3::new(0.1, 0.1, 0.0));
        plane.push(Pt2::new(0.4, -0.4));
        sensors.push(Pt3::new(-0.1, 0.05, 0.02));
        plane.push(Pt2::new(-0.3, 0.35));

        let (est, inliers) = sweep_pnp_ransac(&sensors, &plane, &camera, &opts()).unwrap();
        assert_eq!(inliers.len(), 10);

        let (dt, ang) = pose_delta(&est, &gt);
        assert!(dt < 1e-6, "translation error {}", dt);
        assert!(ang < 1e-6, "rotation error {}", ang);
    }

    #[test]
    fn below_minimum_is_an_error() {
        let camera = SweepCamera::default();
        let sensors = shell_sensors()[..4].to_vec();
        let plane = vec![Pt2::origin(); 4];
        assert!(sweep_pnp_ransac(&sensors, &plane, &camera, &opts()).is_err());
    }
}
