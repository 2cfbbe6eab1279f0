//! Configuration of an NBS run.

use crate::components::SizeMetric;
use crate::edge_stat::TestStatistic;
use crate::error::{NbsError, Result};
use crate::permutation::{CancelToken, NullDistribution};
use crate::threshold::Tail;

/// Default primary threshold applied to the edge statistic.
pub const DEFAULT_THRESHOLD: f64 = 3.0;

/// Default number of permutations.
pub const DEFAULT_PERMUTATIONS: usize = 5000;

/// What to do when a run is cancelled before all permutations completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialPolicy {
    /// Compute p-values over the completed trials.
    Accept,
    /// Fail with [`NbsError::Cancelled`].
    Discard,
}

impl Default for PartialPolicy {
    fn default() -> PartialPolicy {
        PartialPolicy::Discard
    }
}

impl PartialPolicy {

    /// Pass a complete null distribution through; decide on an incomplete one.
    pub fn apply(self, null: NullDistribution) -> Result<NullDistribution> {
        if null.is_complete() {
            return Ok(null);
        }
        match self {
            PartialPolicy::Accept if !null.is_empty() => {
                tracing::warn!("Computing p-values over {} of {} permutations.", null.len(), null.requested());
                Ok(null)
            }
            _ => Err(NbsError::Cancelled { completed: null.len(), requested: null.requested() }),
        }
    }
}


/// Options for one NBS run.
#[derive(Debug, Clone)]
pub struct NbsConfig {
    /// Primary threshold applied to the edge statistic. Must be finite and non-negative; the
    /// direction is chosen by `tail`. Default: 3.0.
    pub threshold: f64,

    /// Number of permutations K. Must be positive. Default: 5000.
    pub permutations: usize,

    /// Direction of the test. Default: both.
    pub tail: Tail,

    /// Edge statistic. Default: the Welch-form two-sample t.
    pub statistic: TestStatistic,

    /// Component size measure. Default: edge count.
    pub size_metric: SizeMetric,

    /// RNG seed. When `None`, a random seed is drawn at the start of the run and reported in the result.
    pub seed: Option<u64>,

    /// Handling of cancelled runs. Default: discard.
    pub partial_policy: PartialPolicy,

    /// Optional cancellation token, checked at every trial boundary.
    pub cancel: Option<CancelToken>,

    /// Log progress every this many completed permutations, on the serial and the parallel path.
    /// 0 disables it. Default: 1000.
    pub progress_interval: usize,
}

impl Default for NbsConfig {
    fn default() -> NbsConfig {
        NbsConfig {
            threshold: DEFAULT_THRESHOLD,
            permutations: DEFAULT_PERMUTATIONS,
            tail: Tail::default(),
            statistic: TestStatistic::default(),
            size_metric: SizeMetric::default(),
            seed: None,
            partial_policy: PartialPolicy::default(),
            cancel: None,
            progress_interval: 1000,
        }
    }
}

impl NbsConfig {

    /// Configuration with the three parameters every run needs; everything else at its default.
    pub fn new(threshold: f64, permutations: usize, tail: Tail) -> NbsConfig {
        NbsConfig {
            threshold,
            permutations,
            tail,
            ..NbsConfig::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_permutations(mut self, permutations: usize) -> Self {
        self.permutations = permutations;
        self
    }

    pub fn with_tail(mut self, tail: Tail) -> Self {
        self.tail = tail;
        self
    }

    pub fn with_statistic(mut self, statistic: TestStatistic) -> Self {
        self.statistic = statistic;
        self
    }

    pub fn with_size_metric(mut self, size_metric: SizeMetric) -> Self {
        self.size_metric = size_metric;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_partial_policy(mut self, policy: PartialPolicy) -> Self {
        self.partial_policy = policy;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }


    /// Check the run parameters. Group shapes are checked separately, against the data.
    pub fn validate(&self) -> Result<()> {
        if self.permutations == 0 {
            return Err(NbsError::invalid_parameter("permutations", self.permutations, "at least one permutation is required"));
        }
        if !self.threshold.is_finite() {
            return Err(NbsError::invalid_parameter("threshold", self.threshold, "threshold must be finite"));
        }
        if self.threshold < 0.0 {
            return Err(NbsError::invalid_parameter("threshold", self.threshold, "threshold must be non-negative, use the tail to select the direction"));
        }
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn the_default_config_is_valid() {
        let cfg = NbsConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(Tail::Both, cfg.tail);
        assert_eq!(SizeMetric::Edges, cfg.size_metric);
        assert_eq!(TestStatistic::WelchT, cfg.statistic);
    }

    #[test]
    fn builder_methods_set_fields() {
        let cfg = NbsConfig::new(2.0, 100, Tail::Left)
            .with_seed(7)
            .with_size_metric(SizeMetric::Nodes)
            .with_partial_policy(PartialPolicy::Accept);
        assert_eq!(2.0, cfg.threshold);
        assert_eq!(100, cfg.permutations);
        assert_eq!(Some(7), cfg.seed);
        assert_eq!(SizeMetric::Nodes, cfg.size_metric);
        assert_eq!(PartialPolicy::Accept, cfg.partial_policy);
    }

    #[test]
    fn partial_policies_decide_on_incomplete_nulls() {
        let complete = NullDistribution::new(vec![1, 0, 2], 3);
        assert_eq!(complete, PartialPolicy::Discard.apply(complete.clone()).unwrap());

        let partial = NullDistribution::new(vec![1, 0], 5);
        assert_eq!(partial, PartialPolicy::Accept.apply(partial.clone()).unwrap());
        assert!(matches!(
            PartialPolicy::Discard.apply(partial),
            Err(NbsError::Cancelled { completed: 2, requested: 5 })
        ));

        let empty = NullDistribution::new(vec![], 5);
        assert!(matches!(
            PartialPolicy::Accept.apply(empty),
            Err(NbsError::Cancelled { completed: 0, requested: 5 })
        ));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let zero_k = NbsConfig::new(2.0, 0, Tail::Both);
        assert!(matches!(zero_k.validate(), Err(NbsError::InvalidParameter { name: "permutations", .. })));

        for &t in &[f64::NAN, f64::INFINITY, -1.0] {
            let cfg = NbsConfig::new(t, 10, Tail::Both);
            assert!(matches!(cfg.validate(), Err(NbsError::InvalidParameter { name: "threshold", .. })));
        }
    }
}
