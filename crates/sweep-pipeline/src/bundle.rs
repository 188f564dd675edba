//! Time-bucket bundling of raw measurements and corrections.
//!
//! Asynchronous observations are quantised into buckets of width
//! `resolution` so that angles from the same instant can be averaged. The
//! bucket key is the rounded integer index `round(t / resolution)`, which is
//! exact under map lookup; the bucket's nominal time is `index * resolution`.

use log::info;
use std::collections::BTreeMap;

use crate::types::{Correction, LightMeasurement, Serial};
use sweep_core::{Real, RigidTransform};

/// Per-sensor raw angle samples, one list per sweep axis.
pub type AxisSamples = [Vec<Real>; 2];

/// bucket → sensor → per-axis samples.
pub type LightBuckets = BTreeMap<i64, BTreeMap<u32, AxisSamples>>;

/// Everything the solve stages consume, rebuilt from scratch each solve.
#[derive(Debug, Default)]
pub struct Bundles {
    /// tracker → lighthouse → bucketed angle samples.
    pub light: BTreeMap<Serial, BTreeMap<Serial, LightBuckets>>,
    /// Bucketed ground-truth poses; the last correction in a bucket wins.
    pub corrections: BTreeMap<i64, RigidTransform>,
    /// Running mean body height over all raw corrections, meters.
    pub mean_height: Real,
}

/// Bucket index for a timestamp.
pub fn bucket_index(t: Real, resolution: Real) -> i64 {
    (t / resolution).round() as i64
}

/// Nominal time of a bucket.
pub fn bucket_time(index: i64, resolution: Real) -> Real {
    index as Real * resolution
}

/// Mean of a sample list; `None` when the list is empty, which downstream
/// stages treat as "no observation for this key".
pub fn mean(samples: &[Real]) -> Option<Real> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<Real>() / samples.len() as Real)
}

/// Discretise the raw stores into time buckets.
pub fn bundle(
    measurements: &[LightMeasurement],
    corrections: &[Correction],
    resolution: Real,
) -> Bundles {
    let mut out = Bundles::default();

    info!("bundling {} measurements into time buckets", measurements.len());
    for m in measurements {
        let bucket = bucket_index(m.timestamp, resolution);
        let axis = m.axis.index();
        let buckets = out
            .light
            .entry(m.tracker.clone())
            .or_default()
            .entry(m.lighthouse.clone())
            .or_default();
        let sensors = buckets.entry(bucket).or_default();
        for p in &m.pulses {
            sensors.entry(p.sensor).or_insert_with(|| [Vec::new(), Vec::new()])[axis]
                .push(p.angle);
        }
    }

    info!("bundling {} corrections into time buckets", corrections.len());
    let mut height = 0.0;
    for c in corrections {
        let bucket = bucket_index(c.timestamp, resolution);
        out.corrections.insert(bucket, c.world_from_body);
        height += c.world_from_body.translation.z;
    }
    if !corrections.is_empty() {
        out.mean_height = height / corrections.len() as Real;
        info!("average body height is {:.3} meters", out.mean_height);
    }

    out
}
