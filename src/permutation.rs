//! Permutation testing: the null distribution of the maximal component size.
//!
//! Every trial draws a uniformly random relabelling of the pooled subjects into groups of the
//! original sizes, recomputes the edge statistic, thresholds it and records the size of the largest
//! component. Trial `i` owns an RNG seeded from the run seed and `i`, so the null distribution does
//! not depend on how trials are scheduled across worker threads.

use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "parallel")]
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use ndarray::Array1;
use ndarray_stats::interpolate::Higher;
use ndarray_stats::Quantile1dExt;
use noisy_float::types::n64;
use rand::seq::index;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::components::{ComponentExtractor, SizeMetric};
use crate::edge_stat::{EdgeSamples, StatisticScratch};
use crate::error::{NbsError, Result};
use crate::threshold::Tail;
use crate::traits::EdgeStatistic;
use crate::util::trial_seed;

/// Cooperative cancellation flag, checked at every trial boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}


/// Maximal component sizes of the completed permutation trials.
#[derive(Debug, Clone, PartialEq)]
pub struct NullDistribution {
    values: Vec<usize>,
    sorted: Vec<usize>,
    requested: usize,
}

impl NullDistribution {

    /// A null distribution from per-trial maxima in trial order. `requested` is the number of trials the run asked for.
    pub fn new(values: Vec<usize>, requested: usize) -> NullDistribution {
        let mut sorted = values.clone();
        sorted.sort_unstable();
        NullDistribution { values, sorted, requested }
    }

    /// Number of completed trials.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Whether every requested trial completed.
    pub fn is_complete(&self) -> bool {
        self.values.len() == self.requested
    }

    /// Per-trial maxima in trial order.
    pub fn values(&self) -> &[usize] {
        &self.values
    }

    /// Per-trial maxima, ascending.
    pub fn sorted(&self) -> &[usize] {
        &self.sorted
    }

    /// The maxima as floats, in trial order.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.values.iter().map(|&v| v as f64).collect()
    }

    /// Number of trials whose maximal component is at least `size`.
    pub fn count_at_least(&self, size: usize) -> usize {
        self.sorted.len() - self.sorted.partition_point(|&v| v < size)
    }

    /// Permutation p-value of an observed component of the given size: `(count(null >= size) + 1) / (trials + 1)`.
    pub fn p_value(&self, size: usize) -> f64 {
        (self.count_at_least(size) + 1) as f64 / (self.len() + 1) as f64
    }

    pub fn max(&self) -> Option<usize> {
        self.sorted.last().cloned()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<usize>() as f64 / self.values.len() as f64)
    }

    /// The `q` quantile of the null distribution, taking the higher order statistic between ranks.
    pub fn quantile(&self, q: f64) -> Result<usize> {
        if !(0.0..=1.0).contains(&q) {
            return Err(NbsError::invalid_parameter("q", q, "quantile must lie in [0, 1]"));
        }
        let mut arr = Array1::from(self.values.clone());
        arr.quantile_mut(n64(q), &Higher)
            .map_err(|_| NbsError::invalid_parameter("null distribution", "empty", "quantile of an empty null distribution"))
    }

    /// The component size at or above which an observed component is significant at level `alpha`,
    /// i.e., the `1 - alpha` quantile of the null distribution.
    pub fn critical_size(&self, alpha: f64) -> Result<usize> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(NbsError::invalid_parameter("alpha", alpha, "significance level must lie in (0, 1)"));
        }
        self.quantile(1.0 - alpha)
    }
}


/// Runs the permutation trials for one pair of groups.
pub struct PermutationEngine<'a, S: EdgeStatistic + Sync + ?Sized> {
    samples: &'a EdgeSamples,
    statistic: &'a S,
    threshold: f64,
    tail: Tail,
    metric: SizeMetric,
    cancel: Option<CancelToken>,
    progress_interval: usize,
}

/// Per-worker buffers reused across trials.
#[derive(Clone)]
struct TrialScratch {
    stat_scratch: StatisticScratch,
    stats: Vec<f64>,
    edges: Vec<(usize, usize)>,
    extractor: ComponentExtractor,
}

impl<'a, S: EdgeStatistic + Sync + ?Sized> PermutationEngine<'a, S> {
    pub fn new(samples: &'a EdgeSamples, statistic: &'a S, threshold: f64, tail: Tail, metric: SizeMetric) -> Self {
        PermutationEngine {
            samples,
            statistic,
            threshold,
            tail,
            metric,
            cancel: None,
            progress_interval: 0,
        }
    }

    /// Check `token` before every trial. Trials not yet started when it fires are skipped.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Log progress every `interval` completed trials. 0 disables progress logging.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    fn scratch(&self) -> TrialScratch {
        let num_edges = self.samples.edges().len();
        TrialScratch {
            stat_scratch: StatisticScratch::new(num_edges),
            stats: Vec::with_capacity(num_edges),
            edges: Vec::with_capacity(num_edges),
            extractor: ComponentExtractor::new(self.samples.num_nodes(), self.metric),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
    }


    /// Run a single trial: relabel, recompute, return the largest component size.
    fn trial(&self, trial_index: usize, seed: u64, scratch: &mut TrialScratch) -> usize {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(trial_seed(seed, trial_index as u64));
        let members = index::sample(&mut rng, self.samples.num_subjects(), self.samples.num_x()).into_vec();

        self.samples.statistic_into(&members, self.statistic, &mut scratch.stat_scratch, &mut scratch.stats);

        scratch.edges.clear();
        for (e, &s) in self.samples.edges().iter().zip(scratch.stats.iter()) {
            if self.tail.survives(s, self.threshold) {
                scratch.edges.push(*e);
            }
        }
        scratch.extractor.max_size(&scratch.edges)
    }


    /// Run `k` trials on the calling thread.
    pub fn run_serial(&self, k: usize, seed: u64) -> NullDistribution {
        let mut scratch = self.scratch();
        let mut values = Vec::with_capacity(k);
        for i in 0..k {
            if self.is_cancelled() {
                tracing::warn!("Permutation run cancelled after {} of {} trials.", i, k);
                break;
            }
            values.push(self.trial(i, seed, &mut scratch));
            if self.progress_interval > 0 && (i + 1) % self.progress_interval == 0 {
                tracing::debug!("Permutation {} of {}: max component size {}.", i + 1, k, values[i]);
            }
        }
        NullDistribution::new(values, k)
    }


    /// Run `k` trials on the rayon thread pool. Each worker fills a local list that is merged once at the end.
    #[cfg(feature = "parallel")]
    pub fn run_parallel(&self, k: usize, seed: u64) -> NullDistribution {
        let completed = AtomicUsize::new(0);
        let mut trials: Vec<(usize, usize)> = (0..k)
            .into_par_iter()
            .fold_with(
                (None, Vec::new()),
                |(scratch, mut local): (Option<TrialScratch>, Vec<(usize, usize)>), i| {
                    if self.is_cancelled() {
                        return (scratch, local);
                    }
                    let mut scratch = scratch.unwrap_or_else(|| self.scratch());
                    local.push((i, self.trial(i, seed, &mut scratch)));
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if self.progress_interval > 0 && done % self.progress_interval == 0 {
                        tracing::debug!("Permutation {} of {} completed.", done, k);
                    }
                    (Some(scratch), local)
                },
            )
            .map(|(_, local)| local)
            .reduce(Vec::new, |mut a, mut b| {
                a.append(&mut b);
                a
            });
        trials.sort_unstable_by_key(|&(i, _)| i);

        if trials.len() < k {
            tracing::warn!("Permutation run cancelled after {} of {} trials.", trials.len(), k);
        }
        NullDistribution::new(trials.into_iter().map(|(_, size)| size).collect(), k)
    }


    /// Run `k` trials, in parallel when the `parallel` feature is enabled.
    pub fn run(&self, k: usize, seed: u64) -> NullDistribution {
        #[cfg(feature = "parallel")]
        let null = self.run_parallel(k, seed);
        #[cfg(not(feature = "parallel"))]
        let null = self.run_serial(k, seed);
        null
    }
}
