//! Batch calibration solve.
//!
//! Stages run in a fixed order, each consuming only the previous stage's
//! output: bundle → per-instant poses → lighthouse registration → world
//! registration → report. There are no retries; a stage that cannot produce
//! a result leaves an identity/omitted entry behind and the pipeline
//! carries on with a degraded calibration.

use log::{debug, info, warn};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::bundle::{self, bucket_time, Bundles};
use crate::report::{CalibrationReport, TrajectoryPoint};
use crate::session::CalibrationSession;
use crate::types::Serial;
use sweep_core::{Iso3, Pt2, Pt3, RigidTransform, SweepCamera, Vec3};
use sweep_linear::{align_point_sets, sweep_pnp_ransac};

/// Failure reported to the solve's caller. Everything below this level is
/// log-only degradation.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("insufficient measurements received, so cannot solve problem")]
    NoMeasurements,
}

/// tracker → bucket → lighthouse → pose of the tracker in that lighthouse's
/// optical frame.
pub(crate) type PoseTable = BTreeMap<Serial, BTreeMap<i64, BTreeMap<Serial, Iso3>>>;

/// Run the full batch solve over the session's accumulated state.
///
/// Mutates the session's lighthouse poses and world registration in place
/// and returns the emitted report. The caller owns clearing the measurement
/// store afterwards.
pub fn solve(session: &mut CalibrationSession) -> Result<CalibrationReport, SolveError> {
    if session.measurements.is_empty() {
        warn!("insufficient measurements received, so cannot solve problem");
        return Err(SolveError::NoMeasurements);
    }

    let span = |ts: &mut dyn Iterator<Item = f64>| -> (f64, f64) {
        ts.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t), hi.max(t))
        })
    };
    let (first, last) = span(&mut session.measurements.iter().map(|m| m.timestamp));
    info!(
        "processing {} measurements running for {:.3} seconds",
        session.measurements.len(),
        last - first
    );
    if session.corrections.is_empty() {
        info!("no corrections in dataset, assuming first body pose at origin");
    } else {
        let (first, last) = span(&mut session.corrections.iter().map(|c| c.timestamp));
        info!(
            "processing {} corrections running for {:.3} seconds",
            session.corrections.len(),
            last - first
        );
    }

    let bundles = bundle::bundle(
        &session.measurements,
        &session.corrections,
        session.config.resolution,
    );

    let poses = solve_instant_poses(session, &bundles);
    register_lighthouses(session, &poses);
    register_world(session, &poses, &bundles);

    Ok(build_report(session, &poses, &bundles))
}

/// Recover one pose per (lighthouse, tracker, bucket) with enough valid
/// sensor correspondences. A sensor contributes only when it has a mean for
/// both sweep axes; buckets below the configured minimum, or without RANSAC
/// consensus, are skipped.
pub(crate) fn solve_instant_poses(session: &CalibrationSession, bundles: &Bundles) -> PoseTable {
    let camera = SweepCamera::default();
    let opts = session.config.ransac.to_options();
    let min_corr = session.config.min_pnp_correspondences;

    let mut poses = PoseTable::new();
    let mut count = 0usize;

    for (lh_serial, lighthouse) in &session.lighthouses {
        for (tk_serial, tracker) in &session.trackers {
            let Some(buckets) = bundles
                .light
                .get(tk_serial)
                .and_then(|per_lh| per_lh.get(lh_serial))
            else {
                continue;
            };
            debug!("estimating poses of {tk_serial} in {lh_serial}");

            for (&bucket, sensors) in buckets {
                let mut obj: Vec<Pt3> = Vec::new();
                let mut img: Vec<Pt2> = Vec::new();
                for (&sensor_id, samples) in sensors {
                    let Some(info) = tracker.sensors.get(sensor_id as usize) else {
                        continue;
                    };
                    let (Some(az), Some(el)) =
                        (bundle::mean(&samples[0]), bundle::mean(&samples[1]))
                    else {
                        continue;
                    };
                    let [az, el] = lighthouse.model.correct([az, el], session.config.correct);
                    obj.push(Pt3::from(info.position));
                    img.push(camera.project_angles(az, el));
                }

                if obj.len() < min_corr {
                    continue;
                }

                match sweep_pnp_ransac(&obj, &img, &camera, &opts) {
                    Ok((pose, _inliers)) => {
                        poses
                            .entry(tk_serial.clone())
                            .or_default()
                            .entry(bucket)
                            .or_default()
                            .insert(lh_serial.clone(), pose);
                        count += 1;
                    }
                    Err(err) => {
                        debug!("bucket {bucket} of {tk_serial} in {lh_serial} skipped: {err}")
                    }
                }
            }
        }
    }

    info!("using {count} instant pose solutions");
    poses
}

/// Solve every slave lighthouse's pose in the master's frame by aligning
/// the per-instant tracker translations both lighthouses observed.
pub(crate) fn register_lighthouses(session: &mut CalibrationSession, poses: &PoseTable) {
    let Some(master) = session.master.clone() else {
        return;
    };
    info!("estimating slave lighthouse poses relative to master {master}");

    let serials: Vec<Serial> = session.lighthouses.keys().cloned().collect();
    for serial in serials {
        if serial == master {
            if let Some(lh) = session.lighthouses.get_mut(&serial) {
                lh.ref_from_lh = RigidTransform::identity();
            }
            continue;
        }

        let mut source: Vec<Pt3> = Vec::new();
        let mut target: Vec<Pt3> = Vec::new();
        for buckets in poses.values() {
            for per_lh in buckets.values() {
                if let (Some(slave_pose), Some(master_pose)) =
                    (per_lh.get(&serial), per_lh.get(&master))
                {
                    source.push(Pt3::from(slave_pose.translation.vector));
                    target.push(Pt3::from(master_pose.translation.vector));
                }
            }
        }
        info!("- using {} correspondences for {serial}", source.len());

        let pose = match align_point_sets(&source, &target) {
            Ok(fit) if fit.found => {
                info!("- solution {:.3}", fit.transform.translation.vector.norm());
                RigidTransform::from_isometry(&fit.transform)
            }
            Ok(_) => {
                warn!("- solution not found for lighthouse {serial}");
                RigidTransform::identity()
            }
            Err(err) => {
                warn!("- alignment failed for lighthouse {serial}: {err}");
                RigidTransform::identity()
            }
        };
        if let Some(lh) = session.lighthouses.get_mut(&serial) {
            lh.ref_from_lh = pose;
        }
    }
}

/// Register the reference frame against the world using the corrections.
///
/// A correction bucket contributes only when every configured tracker has a
/// pose against the master lighthouse at that bucket; the mean tracker
/// position then corresponds to the corrected body position plus the fixed
/// centroid offset.
pub(crate) fn register_world(
    session: &mut CalibrationSession,
    poses: &PoseTable,
    bundles: &Bundles,
) {
    let Some(master) = session.master.clone() else {
        return;
    };
    info!("using corrections to register reference frame to world");

    let mut source: Vec<Pt3> = Vec::new();
    let mut target: Vec<Pt3> = Vec::new();

    if !session.trackers.is_empty() {
        for (&bucket, world_from_body) in &bundles.corrections {
            let mut sum = Vec3::zeros();
            let mut n = 0usize;
            for tk_serial in session.trackers.keys() {
                if let Some(pose) = poses
                    .get(tk_serial)
                    .and_then(|buckets| buckets.get(&bucket))
                    .and_then(|per_lh| per_lh.get(&master))
                {
                    sum += pose.translation.vector;
                    n += 1;
                }
            }
            // Only when every tracker saw this bucket.
            if n == session.trackers.len() {
                source.push(Pt3::from(sum / n as f64));
                target.push(Pt3::from(
                    world_from_body.translation + session.config.offset,
                ));
            }
        }
    }
    info!("- using {} correspondences", source.len());

    session.world_from_ref = match align_point_sets(&source, &target) {
        Ok(fit) if fit.found => {
            info!("- solution {:.3}", fit.transform.translation.vector.norm());
            RigidTransform::from_isometry(&fit.transform)
        }
        Ok(_) => {
            warn!("- no correspondences, reference to world registration is identity");
            RigidTransform::identity()
        }
        Err(err) => {
            warn!("- world registration failed: {err}");
            RigidTransform::identity()
        }
    };
}

/// Assemble the report from the solved session state and pose table.
fn build_report(
    session: &CalibrationSession,
    poses: &PoseTable,
    bundles: &Bundles,
) -> CalibrationReport {
    let resolution = session.config.resolution;

    let mut paths: BTreeMap<Serial, BTreeMap<Serial, Vec<TrajectoryPoint>>> = BTreeMap::new();
    for lh_serial in session.lighthouses.keys() {
        let per_tracker = paths.entry(lh_serial.clone()).or_default();
        for tk_serial in session.trackers.keys() {
            let mut path = Vec::new();
            if let Some(buckets) = poses.get(tk_serial) {
                for (&bucket, per_lh) in buckets {
                    if let Some(pose) = per_lh.get(lh_serial) {
                        path.push(TrajectoryPoint {
                            time: bucket_time(bucket, resolution),
                            position: pose.translation.vector,
                            orientation: pose.rotation,
                        });
                    }
                }
            }
            per_tracker.insert(tk_serial.clone(), path);
        }
    }

    let truth = bundles
        .corrections
        .iter()
        .map(|(&bucket, world_from_body)| {
            let iso = world_from_body.to_isometry();
            TrajectoryPoint {
                time: bucket_time(bucket, resolution),
                position: iso.translation.vector,
                orientation: iso.rotation,
            }
        })
        .collect();

    CalibrationReport {
        frames: session.config.frames.clone(),
        world_from_ref: session.world_from_ref,
        lighthouses: session
            .lighthouses
            .iter()
            .map(|(serial, lh)| (serial.clone(), lh.ref_from_lh))
            .collect(),
        trackers: session
            .trackers
            .iter()
            .map(|(serial, tk)| (serial.clone(), tk.body_from_head))
            .collect(),
        paths,
        truth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;
    use crate::types::{LighthouseDescriptor, SensorInfo, TrackerDescriptor};
    use nalgebra::{Rotation3, Translation3};
    use sweep_core::{pose_delta, Vec3};

    fn make_iso(angles: (f64, f64, f64), t: (f64, f64, f64)) -> Iso3 {
        let rot = Rotation3::from_euler_angles(angles.0, angles.1, angles.2);
        Iso3::from_parts(Translation3::new(t.0, t.1, t.2), rot.into())
    }

    fn two_lighthouse_session() -> CalibrationSession {
        let mut session = CalibrationSession::new(CalibrationConfig::default());
        for serial in ["LHB-A", "LHB-B"] {
            session.handle_lighthouse_descriptor(LighthouseDescriptor {
                serial: serial.into(),
                model: Default::default(),
            });
        }
        session.handle_tracker_descriptor(TrackerDescriptor {
            serial: "LHR-1".into(),
            sensors: vec![
                SensorInfo {
                    position: Vec3::zeros(),
                    normal: Vec3::z(),
                };
                8
            ],
            body_from_head: RigidTransform::identity(),
        });
        session
    }

    #[test]
    fn slave_registration_recovers_planted_offset() {
        let mut session = two_lighthouse_session();
        let master_from_slave = make_iso((0.1, -0.2, 0.3), (1.0, -0.5, 0.25));

        // Noiseless per-instant poses: the slave sees every tracker position
        // that the master sees, displaced by the planted transform.
        let mut poses = PoseTable::new();
        for k in 0..20i64 {
            let theta = k as f64 * 0.3;
            let in_master = make_iso(
                (0.0, theta * 0.1, 0.0),
                (theta.cos(), theta.sin(), 1.5 + 0.1 * (2.0 * theta).sin()),
            );
            let in_slave = master_from_slave.inverse() * in_master;
            let per_lh = poses.entry("LHR-1".into()).or_default().entry(k).or_default();
            per_lh.insert("LHB-A".into(), in_master);
            per_lh.insert("LHB-B".into(), in_slave);
        }

        register_lighthouses(&mut session, &poses);

        let master = &session.lighthouses()["LHB-A"];
        assert!(master.ref_from_lh.is_identity(1e-12));

        let slave = &session.lighthouses()["LHB-B"];
        let (dt, ang) = pose_delta(&slave.ref_from_lh.to_isometry(), &master_from_slave);
        assert!(dt < 1e-9, "translation error {dt}");
        assert!(ang < 1e-9, "rotation error {ang}");
    }

    #[test]
    fn no_shared_buckets_leaves_slave_at_identity() {
        let mut session = two_lighthouse_session();

        // Master and slave never observe the same bucket.
        let mut poses = PoseTable::new();
        for k in 0..10i64 {
            let serial = if k % 2 == 0 { "LHB-A" } else { "LHB-B" };
            poses
                .entry("LHR-1".into())
                .or_default()
                .entry(k)
                .or_default()
                .insert(serial.into(), make_iso((0.0, 0.0, 0.0), (0.0, 0.0, 1.0)));
        }

        register_lighthouses(&mut session, &poses);
        assert!(session.lighthouses()["LHB-B"].ref_from_lh.is_identity(1e-12));
    }

    #[test]
    fn partial_tracker_coverage_contributes_no_world_correspondence() {
        let mut session = two_lighthouse_session();
        session.handle_tracker_descriptor(TrackerDescriptor {
            serial: "LHR-2".into(),
            sensors: Vec::new(),
            body_from_head: RigidTransform::identity(),
        });

        // Only LHR-1 has master poses, so the strict all-trackers rule
        // yields zero correspondences and an identity registration.
        let mut poses = PoseTable::new();
        let mut bundles = Bundles::default();
        for k in 0..5i64 {
            poses
                .entry("LHR-1".into())
                .or_default()
                .entry(k)
                .or_default()
                .insert("LHB-A".into(), make_iso((0.0, 0.0, 0.0), (0.0, 0.0, 1.0)));
            bundles.corrections.insert(
                k,
                RigidTransform::new(Vec3::new(0.1 * k as f64, 0.0, 0.8), Vec3::zeros()),
            );
        }

        register_world(&mut session, &poses, &bundles);
        assert!(session.world_from_ref().is_identity(1e-12));
    }

    #[test]
    fn too_few_correspondences_yield_no_instant_pose() {
        let session = {
            let mut s = two_lighthouse_session();
            // Tracker with only 6 sensors: below the default minimum of 7.
            s.handle_tracker_descriptor(TrackerDescriptor {
                serial: "LHR-1".into(),
                sensors: vec![
                    SensorInfo {
                        position: Vec3::new(0.01, 0.02, 0.03),
                        normal: Vec3::z(),
                    };
                    6
                ],
                body_from_head: RigidTransform::identity(),
            });
            s
        };

        let camera = SweepCamera::default();
        let gt = make_iso((0.1, 0.0, 0.0), (0.0, 0.0, 1.5));
        let mut bundles = Bundles::default();
        let sensors = bundles
            .light
            .entry("LHR-1".into())
            .or_default()
            .entry("LHB-A".into())
            .or_default()
            .entry(0)
            .or_default();
        for s in 0..6u32 {
            let p = gt.transform_point(&Pt3::new(0.01, 0.02, 0.03));
            let (az, el) = camera.sweep_angles(&p);
            sensors.insert(s, [vec![az], vec![el]]);
        }

        let poses = solve_instant_poses(&session, &bundles);
        assert!(poses.is_empty());
    }

    #[test]
    fn solve_without_measurements_is_a_precondition_failure() {
        let mut session = two_lighthouse_session();
        assert!(matches!(solve(&mut session), Err(SolveError::NoMeasurements)));
    }
}
