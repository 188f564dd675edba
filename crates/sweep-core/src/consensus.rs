//! Generic seeded consensus (RANSAC) engine.
//!
//! Implement [`Consensus`] for a model and call [`consensus_fit`] with the
//! data and some [`ConsensusOptions`]. The engine never panics: with too few
//! data points or no consensus within the iteration budget it returns a
//! [`ConsensusFit`] with `success == false` and `model == None`.

use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};

/// Model estimator usable inside the consensus loop.
pub trait Consensus {
    type Datum;
    type Model;

    /// Minimal number of samples needed to fit a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from the data at `sample` indices.
    ///
    /// Return `None` when the subset is degenerate or the fit fails.
    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of one datum against a model, in the same
    /// units as [`ConsensusOptions::thresh`].
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Refit on the full inlier set. Default: keep the sampled model.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

/// Tuning knobs for [`consensus_fit`].
#[derive(Debug, Clone)]
pub struct ConsensusOptions {
    /// Upper bound on sampling iterations.
    pub max_iters: usize,
    /// Inlier residual threshold.
    pub thresh: f64,
    /// Minimum consensus size for a model to be accepted.
    pub min_inliers: usize,
    /// Confidence level in `[0, 1]` used to shrink the iteration bound.
    pub confidence: f64,
    /// RNG seed; identical inputs and seed give identical output.
    pub seed: u64,
}

impl Default for ConsensusOptions {
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

/// Result of a consensus run.
///
/// When `success` is false, `model` is `None` and the remaining fields are
/// unspecified.
#[derive(Debug, Clone)]
pub struct ConsensusFit<M> {
    /// Whether a consensus set satisfying the options was found.
    pub success: bool,
    /// Best accepted model, if any.
    pub model: Option<M>,
    /// Indices of the inliers of the best model.
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over those inliers.
    pub rms: f64,
    /// Sampling iterations actually performed.
    pub iters: usize,
}

impl<M> Default for ConsensusFit<M> {
    fn default() -> Self {
        Self {
            success: false,
            model: None,
            inliers: Vec::new(),
            rms: f64::INFINITY,
            iters: 0,
        }
    }
}

/// Collect inlier indices and their RMS residual for a candidate model.
fn score<C: Consensus>(model: &C::Model, data: &[C::Datum], thresh: f64) -> (Vec<usize>, f64) {
    let mut inliers = Vec::with_capacity(data.len());
    let mut ss = 0.0;
    for (i, datum) in data.iter().enumerate() {
        let r = C::residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            ss += r * r;
        }
    }
    let rms = if inliers.is_empty() {
        f64::INFINITY
    } else {
        (ss / inliers.len() as f64).sqrt()
    };
    (inliers, rms)
}

/// Iterations needed to hit `confidence` given the observed inlier ratio.
fn required_iters(confidence: f64, inlier_ratio: f64, min_samples: usize, cap: usize) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return cap;
    }
    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return cap;
    }
    let n = ((1.0 - confidence).ln() / denom).ceil();
    (n as usize).min(cap)
}

/// Run the consensus loop for one [`Consensus`] implementation.
pub fn consensus_fit<C: Consensus>(
    data: &[C::Datum],
    opts: &ConsensusOptions,
) -> ConsensusFit<C::Model> {
    let mut best = ConsensusFit::default();
    if data.len() < C::MIN_SAMPLES {
        return best;
    }

    let indices: Vec<usize> = (0..data.len()).collect();
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut bound = opts.max_iters;
    let mut iters = 0;

    while iters < bound {
        iters += 1;

        let sample: Vec<usize> = indices
            .as_slice()
            .choose_multiple(&mut rng, C::MIN_SAMPLES)
            .copied()
            .collect();

        let Some(candidate) = C::fit(data, &sample) else {
            continue;
        };

        let (mut inliers, mut rms) = score::<C>(&candidate, data, opts.thresh);
        if inliers.len() < opts.min_inliers {
            continue;
        }

        // A refit over the consensus set usually tightens the model; rescore
        // so the inlier set reflects the model actually returned.
        let mut model = candidate;
        if let Some(refined) = C::refit(data, &inliers) {
            let (ri, rr) = score::<C>(&refined, data, opts.thresh);
            if ri.len() >= opts.min_inliers {
                model = refined;
                inliers = ri;
                rms = rr;
            }
        }

        let better = !best.success
            || inliers.len() > best.inliers.len()
            || (inliers.len() == best.inliers.len() && rms < best.rms);
        if better {
            let ratio = inliers.len() as f64 / data.len() as f64;
            bound = required_iters(opts.confidence, ratio, C::MIN_SAMPLES, opts.max_iters)
                .max(iters);
            best.success = true;
            best.model = Some(model);
            best.inliers = inliers;
            best.rms = rms;
            best.iters = iters;
        }
    }

    best
}
