//! Calibration session: rig registries, raw data stores and handlers.
//!
//! The session is the single owner of all mutable calibration state. The
//! enclosing dispatch loop invokes one handler at a time, which is the only
//! serialization the design relies on; the session itself takes no locks.

use log::{info, warn};

use crate::config::CalibrationConfig;
use crate::report::CalibrationReport;
use crate::solve;
use crate::types::{
    Correction, CorrectionUpdate, Lighthouse, LighthouseDescriptor, LightMeasurement, Serial,
    Tracker, TrackerDescriptor,
};
use std::collections::BTreeMap;
use sweep_core::RigidTransform;

/// Result of a start/stop trigger, surfaced to the external caller.
///
/// Per-stage detail stays in the logs; only this flag and message leave the
/// pipeline.
#[derive(Debug, Clone)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
}

/// Owner of all calibration state; see the crate docs for the data flow.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    pub(crate) config: CalibrationConfig,
    pub(crate) trackers: BTreeMap<Serial, Tracker>,
    pub(crate) lighthouses: BTreeMap<Serial, Lighthouse>,
    /// Serial of the first lighthouse registered; pinned at identity.
    pub(crate) master: Option<Serial>,
    pub(crate) measurements: Vec<LightMeasurement>,
    pub(crate) corrections: Vec<Correction>,
    pub(crate) recording: bool,
    /// World → reference registration, recomputed each solve.
    pub(crate) world_from_ref: RigidTransform,
    pub(crate) last_report: Option<CalibrationReport>,
}

impl CalibrationSession {
    /// Create a session, seeding the registries from the static rig lists.
    pub fn new(config: CalibrationConfig) -> Self {
        let mut session = Self {
            recording: config.offline,
            config,
            trackers: BTreeMap::new(),
            lighthouses: BTreeMap::new(),
            master: None,
            measurements: Vec::new(),
            corrections: Vec::new(),
            world_from_ref: RigidTransform::identity(),
            last_report: None,
        };
        for lh in session.config.lighthouses.clone() {
            session.register_lighthouse(&lh.serial, lh.ref_from_lh);
        }
        for tk in session.config.trackers.clone() {
            session
                .trackers
                .entry(tk.serial.clone())
                .or_insert_with(|| Tracker {
                    serial: tk.serial.clone(),
                    sensors: Vec::new(),
                    body_from_head: tk.body_from_head,
                    ready: false,
                });
        }
        session
    }

    fn register_lighthouse(&mut self, serial: &Serial, pose: RigidTransform) {
        if self.master.is_none() {
            self.master = Some(serial.clone());
        }
        self.lighthouses
            .entry(serial.clone())
            .or_insert_with(|| Lighthouse {
                serial: serial.clone(),
                model: Default::default(),
                ref_from_lh: pose,
                ready: false,
            });
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn trackers(&self) -> &BTreeMap<Serial, Tracker> {
        &self.trackers
    }

    pub fn lighthouses(&self) -> &BTreeMap<Serial, Lighthouse> {
        &self.lighthouses
    }

    /// Serial of the master lighthouse, once one is registered.
    pub fn master_serial(&self) -> Option<&Serial> {
        self.master.as_ref()
    }

    pub fn measurements(&self) -> &[LightMeasurement] {
        &self.measurements
    }

    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn world_from_ref(&self) -> &RigidTransform {
        &self.world_from_ref
    }

    /// Report of the most recent successful solve.
    pub fn last_report(&self) -> Option<&CalibrationReport> {
        self.last_report.as_ref()
    }

    /// Handle a tracker descriptor: create or complete the registry entry.
    pub fn handle_tracker_descriptor(&mut self, desc: TrackerDescriptor) {
        let entry = self.trackers.entry(desc.serial.clone()).or_insert_with(|| {
            info!("found tracker {}", desc.serial);
            Tracker {
                serial: desc.serial.clone(),
                sensors: Vec::new(),
                body_from_head: desc.body_from_head,
                ready: false,
            }
        });
        entry.sensors = desc.sensors;
        entry.body_from_head = desc.body_from_head;
        entry.ready = true;
    }

    /// Handle a lighthouse descriptor: create or complete the registry
    /// entry. The first lighthouse ever registered becomes the master.
    pub fn handle_lighthouse_descriptor(&mut self, desc: LighthouseDescriptor) {
        if !self.lighthouses.contains_key(&desc.serial) {
            info!("found lighthouse {}", desc.serial);
        }
        self.register_lighthouse(&desc.serial, RigidTransform::identity());
        if let Some(entry) = self.lighthouses.get_mut(&desc.serial) {
            entry.model = desc.model;
            entry.ready = true;
        }
    }

    /// Handle a light measurement.
    ///
    /// Dropped outright unless recording is active and both devices are
    /// registered and ready. Pulses over the angle threshold or under the
    /// duration threshold are filtered; if fewer than the configured minimum
    /// survive, the whole measurement is rejected. Returns whether the
    /// measurement was stored, which is what resets the idle timer.
    pub fn handle_light(&mut self, mut msg: LightMeasurement) -> bool {
        if !self.recording {
            return false;
        }
        let tracker_ready = self.trackers.get(&msg.tracker).map(|t| t.ready);
        let lighthouse_ready = self.lighthouses.get(&msg.lighthouse).map(|l| l.ready);
        if tracker_ready != Some(true) || lighthouse_ready != Some(true) {
            return false;
        }

        let max_angle = self.config.thresholds.max_angle_deg.to_radians();
        let min_duration = self.config.thresholds.min_duration_us * 1e-6;
        msg.pulses
            .retain(|p| p.angle <= max_angle && p.duration >= min_duration);
        if msg.pulses.len() < self.config.thresholds.min_pulses {
            return false;
        }

        self.measurements.push(msg);
        true
    }

    /// Handle a ground-truth transform update.
    ///
    /// Stored only while recording and only when the frame pair matches the
    /// configured world/body names.
    pub fn handle_correction(&mut self, update: CorrectionUpdate) {
        if !self.recording {
            return;
        }
        if update.parent_frame != self.config.frames.world
            || update.child_frame != self.config.frames.body
        {
            return;
        }
        self.corrections.push(Correction {
            timestamp: update.timestamp,
            world_from_body: update.world_from_body,
        });
    }

    /// Handle a start/stop trigger.
    ///
    /// Starting only toggles recording. Stopping runs the solve, then clears
    /// the measurement store unconditionally to bound memory. Corrections
    /// are intentionally left in place across solves (matching the rig's
    /// historical behaviour); call [`clear_corrections`](Self::clear_corrections)
    /// to reset them between sessions.
    pub fn handle_trigger(&mut self) -> TriggerResponse {
        if !self.recording {
            self.recording = true;
            return TriggerResponse {
                success: true,
                message: "Recording started.".into(),
            };
        }

        let result = solve::solve(self);
        self.measurements.clear();
        self.recording = false;

        match result {
            Ok(report) => {
                self.last_report = Some(report);
                TriggerResponse {
                    success: true,
                    message: "Recording stopped. Solution found.".into(),
                }
            }
            Err(err) => {
                warn!("solve failed: {err}");
                TriggerResponse {
                    success: false,
                    message: "Recording stopped. Solution not found.".into(),
                }
            }
        }
    }

    /// Drop all stored corrections.
    pub fn clear_corrections(&mut self) {
        self.corrections.clear();
    }
}
