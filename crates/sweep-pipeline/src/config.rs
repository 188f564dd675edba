//! Startup configuration.
//!
//! Read once when the session is created and never re-read. Malformed
//! configuration surfaces as a deserialization error from the loader and is
//! fatal to the caller.

use serde::{Deserialize, Serialize};
use sweep_core::{ConsensusOptions, Real, RigidTransform, Vec3};

use crate::types::Serial;

/// Frame names used to match corrections and label the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameNames {
    /// External world frame.
    pub world: String,
    /// Shared reference frame anchored at the master lighthouse.
    pub reference: String,
    /// Tracked body frame of the external solution.
    pub body: String,
    /// Frame label of the recovered ground-truth trajectory.
    pub truth: String,
}

impl Default for FrameNames {
    fn default() -> Self {
        Self {
            world: "world".into(),
            reference: "reference".into(),
            body: "body".into(),
            truth: "truth".into(),
        }
    }
}

/// Pulse rejection thresholds applied before a measurement is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseThresholds {
    /// Minimum surviving pulses for a measurement to be kept at all.
    pub min_pulses: usize,
    /// Maximum accepted sweep angle, degrees.
    pub max_angle_deg: Real,
    /// Minimum accepted pulse duration, microseconds.
    pub min_duration_us: Real,
}

impl Default for PulseThresholds {
    fn default() -> Self {
        Self {
            min_pulses: 4,
            max_angle_deg: 60.0,
            min_duration_us: 1.0,
        }
    }
}

/// Consensus settings for the per-instant pose solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_iters: usize,
    /// Inlier threshold in image-plane units.
    pub thresh: Real,
    pub min_inliers: usize,
    pub confidence: Real,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iters: 100,
            thresh: 8.0,
            min_inliers: 6,
            confidence: 0.99,
            seed: 0,
        }
    }
}

impl RansacConfig {
    pub fn to_options(&self) -> ConsensusOptions {
        ConsensusOptions {
            max_iters: self.max_iters,
            thresh: self.thresh,
            min_inliers: self.min_inliers,
            confidence: self.confidence,
            seed: self.seed,
        }
    }
}

/// Statically configured lighthouse with its initial pose guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticLighthouse {
    pub serial: Serial,
    #[serde(default)]
    pub ref_from_lh: RigidTransform,
}

/// Statically configured tracker with its body extrinsics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticTracker {
    pub serial: Serial,
    #[serde(default)]
    pub body_from_head: RigidTransform,
}

/// Full calibration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub frames: FrameNames,
    pub thresholds: PulseThresholds,
    /// Time-bucket width in seconds.
    pub resolution: Real,
    /// Whether to apply the lighthouse rotor corrections.
    pub correct: bool,
    /// Fixed offset from the tracker centroid to the body reference point,
    /// added to correction translations during world registration.
    pub offset: Vec3,
    /// Minimum valid sensor correspondences to attempt a per-instant pose.
    pub min_pnp_correspondences: usize,
    pub ransac: RansacConfig,
    /// Seconds without an accepted light measurement before the solve is
    /// triggered automatically.
    pub idle_timeout: Real,
    /// Start with recording enabled (offline replay of a recorded set).
    pub offline: bool,
    /// Statically known lighthouses; the first one is the master.
    pub lighthouses: Vec<StaticLighthouse>,
    /// Statically known trackers.
    pub trackers: Vec<StaticTracker>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            frames: FrameNames::default(),
            thresholds: PulseThresholds::default(),
            resolution: 0.1,
            correct: false,
            offset: Vec3::zeros(),
            min_pnp_correspondences: 7,
            ransac: RansacConfig::default(),
            idle_timeout: 1.0,
            offline: false,
            lighthouses: Vec::new(),
            trackers: Vec::new(),
        }
    }
}
