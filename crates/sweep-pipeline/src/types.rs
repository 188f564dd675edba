//! Rig and measurement records.
//!
//! Trackers and lighthouses are long-lived: created from static
//! configuration or on first descriptor receipt, then immutable apart from
//! readiness and solved poses. Measurements and corrections accumulate only
//! while a recording window is open.

use serde::{Deserialize, Serialize};
use sweep_core::{LighthouseModel, Real, RigidTransform, Vec3};

/// Device serial number.
pub type Serial = String;

/// One of a lighthouse's two sweep planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepAxis {
    /// Horizontal sweep (axis 0).
    Azimuth,
    /// Vertical sweep (axis 1).
    Elevation,
}

impl SweepAxis {
    /// Index into per-axis storage.
    pub fn index(self) -> usize {
        match self {
            SweepAxis::Azimuth => 0,
            SweepAxis::Elevation => 1,
        }
    }
}

/// One photosensor in tracker-local coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Position on the tracker shell.
    pub position: Vec3,
    /// Outward sensor normal.
    pub normal: Vec3,
}

/// A rigid body instrumented with photosensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    pub serial: Serial,
    /// Sensor descriptors ordered by sensor id.
    pub sensors: Vec<SensorInfo>,
    /// Transform from the tracked body's reference point to the tracker
    /// head frame.
    pub body_from_head: RigidTransform,
    /// Set once a descriptor has been received.
    pub ready: bool,
}

/// A sweep beacon base station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lighthouse {
    pub serial: Serial,
    /// Factory rotor correction parameters.
    pub model: LighthouseModel,
    /// Pose in the shared reference frame; identity for the master, solved
    /// for slaves.
    pub ref_from_lh: RigidTransform,
    /// Set once a descriptor has been received.
    pub ready: bool,
}

/// One detected sweep event at one sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pulse {
    /// Sensor id on the tracker.
    pub sensor: u32,
    /// Sweep angle in radians.
    pub angle: Real,
    /// Pulse duration in seconds.
    pub duration: Real,
}

/// One light message: all pulses of one sweep of one lighthouse axis seen by
/// one tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightMeasurement {
    /// Receipt time in seconds.
    pub timestamp: Real,
    pub tracker: Serial,
    pub lighthouse: Serial,
    pub axis: SweepAxis,
    pub pulses: Vec<Pulse>,
}

/// Incoming ground-truth transform with its frame identifiers.
///
/// Only updates whose frames match the configured world/body names are
/// stored; everything else on the transform stream is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionUpdate {
    pub timestamp: Real,
    /// Parent frame name of the transform.
    pub parent_frame: Serial,
    /// Child frame name of the transform.
    pub child_frame: Serial,
    pub world_from_body: RigidTransform,
}

/// Stored ground-truth pose of the tracked body in the world frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub timestamp: Real,
    pub world_from_body: RigidTransform,
}

/// Tracker descriptor as delivered by the ingestion side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerDescriptor {
    pub serial: Serial,
    pub sensors: Vec<SensorInfo>,
    pub body_from_head: RigidTransform,
}

/// Lighthouse descriptor as delivered by the ingestion side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LighthouseDescriptor {
    pub serial: Serial,
    pub model: LighthouseModel,
}
