//! Calibration pipeline for a multi-beacon optical tracking rig.
//!
//! A [`CalibrationSession`] owns the rig registries (trackers, lighthouses),
//! the measurement and correction stores, and the recording state. Message
//! handlers on the session ingest descriptor, light and correction events;
//! a trigger stops recording and runs the batch solve:
//!
//! bundle → per-instant poses → lighthouse registration → world registration
//!
//! The result is a [`CalibrationReport`] carrying every lighthouse's pose in
//! the reference frame, the world registration, and the recovered
//! trajectories. [`dispatch::replay`] drains an ordered event stream through
//! the handlers, firing the trigger automatically after an idle window, which
//! is how recorded data sets are processed offline.

/// Time-bucket bundling of measurements and corrections.
pub mod bundle;
/// Startup configuration.
pub mod config;
/// Event stream replay with idle auto-trigger.
pub mod dispatch;
/// Calibration report and trajectories.
pub mod report;
/// Session object and ingestion handlers.
pub mod session;
/// Batch solve orchestration.
pub mod solve;
/// Rig and measurement records.
pub mod types;

pub use config::CalibrationConfig;
pub use dispatch::{replay, Event};
pub use report::{CalibrationReport, TrajectoryPoint};
pub use session::{CalibrationSession, TriggerResponse};
pub use solve::{solve, SolveError};
pub use types::{
    Correction, CorrectionUpdate, Lighthouse, LighthouseDescriptor, LightMeasurement, Pulse,
    SensorInfo, Serial, SweepAxis, Tracker, TrackerDescriptor,
};
