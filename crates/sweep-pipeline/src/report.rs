//! Calibration report: the persisted result of a solve.
//!
//! Replaces the rig's live transform broadcasts and path topics with a
//! single serialisable record: lighthouse poses in the reference frame, the
//! world registration, tracker extrinsics, and the recovered trajectories.

use anyhow::{Context, Result};
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::FrameNames;
use crate::types::Serial;
use sweep_core::{Real, RigidTransform, Vec3};

/// One sample of a recovered trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Bucket time in seconds.
    pub time: Real,
    pub position: Vec3,
    pub orientation: UnitQuaternion<Real>,
}

/// Result record of one calibration solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Frame names the transforms are keyed by.
    pub frames: FrameNames,
    /// World → reference registration.
    pub world_from_ref: RigidTransform,
    /// Reference-frame pose of every lighthouse, keyed by serial.
    pub lighthouses: BTreeMap<Serial, RigidTransform>,
    /// Body extrinsics of every tracker, keyed by serial.
    pub trackers: BTreeMap<Serial, RigidTransform>,
    /// Per-lighthouse, per-tracker pose sequences in the lighthouse frame.
    pub paths: BTreeMap<Serial, BTreeMap<Serial, Vec<TrajectoryPoint>>>,
    /// Bucketed ground-truth trajectory in the world frame.
    pub truth: Vec<TrajectoryPoint>,
}

impl CalibrationReport {
    /// Pretty JSON rendering of the record.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialising calibration report")
    }

    /// Persist the record to disk as JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        fs::write(path, json)
            .with_context(|| format!("writing calibration report to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_json_round_trip() {
        let mut lighthouses = BTreeMap::new();
        lighthouses.insert("LHB-A".to_string(), RigidTransform::identity());
        lighthouses.insert(
            "LHB-B".to_string(),
            RigidTransform::new(Vec3::new(1.0, 0.0, 0.5), Vec3::new(0.0, 0.1, 0.0)),
        );
        let report = CalibrationReport {
            frames: FrameNames::default(),
            world_from_ref: RigidTransform::identity(),
            lighthouses,
            trackers: BTreeMap::new(),
            paths: BTreeMap::new(),
            truth: vec![TrajectoryPoint {
                time: 0.1,
                position: Vec3::new(0.0, 1.0, 0.8),
                orientation: UnitQuaternion::identity(),
            }],
        };

        let json = report.to_json_pretty().unwrap();
        let de: CalibrationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(de.lighthouses.len(), 2);
        assert_eq!(de.truth.len(), 1);
        let b = &de.lighthouses["LHB-B"];
        assert!((b.translation - Vec3::new(1.0, 0.0, 0.5)).norm() < 1e-12);
    }
}
