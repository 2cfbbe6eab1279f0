//! The NBS driver: observed pass, permutation loop and component p-values.
//!
//! A run moves through the states `Init -> ObservedComputed -> Permuting -> Done`. All input
//! validation happens in `Init`, when the driver is created, so invalid input never reaches the
//! expensive permutation loop.

use std::mem;

use ndarray::Array2;

use crate::components::{Component, ComponentExtractor};
use crate::config::NbsConfig;
use crate::edge_stat::EdgeSamples;
use crate::error::Result;
use crate::group::Group;
use crate::permutation::{NullDistribution, PermutationEngine};
use crate::threshold::{surviving_edges, AdjacencyMask, Tail};
use crate::util::mirror_edges;

/// Stage of an NBS run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Inputs validated, nothing computed yet.
    Init,
    /// Observed statistic, mask and components are available.
    ObservedComputed,
    /// The permutation trials ran; p-values are pending.
    Permuting,
    /// P-values computed, result available.
    Done,
}


/// An observed component with its permutation p-value.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentPValue {
    pub component: Component,
    pub pvalue: f64,
}


/// Outcome of a complete NBS run.
#[derive(Debug, Clone)]
pub struct NbsResult {
    /// Observed components with their p-values, largest component first.
    pub components: Vec<ComponentPValue>,
    /// Edges of the observed statistic that survived the threshold.
    pub adjacency: AdjacencyMask,
    /// Edges of component `c` (1-based, in `components` order) are labelled `c`, all others 0.
    pub component_labels: Array2<usize>,
    /// The observed N x N edge statistic.
    pub statistic: Array2<f64>,
    /// Maximal component size of every completed permutation.
    pub null: NullDistribution,
    /// The seed the permutations were drawn from.
    pub seed: u64,
}

impl NbsResult {

    /// P-values of the observed components, largest component first.
    pub fn pvalues(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.pvalue).collect()
    }

    /// Components with a p-value at or below `alpha`.
    pub fn significant(&self, alpha: f64) -> Vec<&ComponentPValue> {
        self.components.iter().filter(|c| c.pvalue <= alpha).collect()
    }

    /// The `(p-values, adjacency mask, null distribution)` triple.
    pub fn into_parts(self) -> (Vec<f64>, Array2<bool>, Vec<f64>) {
        let pvalues = self.pvalues();
        let null = self.null.to_f64_vec();
        (pvalues, self.adjacency.into_array(), null)
    }
}


struct ObservedPass {
    statistic: Vec<f64>,
    mask: AdjacencyMask,
    components: Vec<Component>,
}


/// What the driver holds in each state.
enum Stage {
    Init,
    Observed(ObservedPass),
    Permuted(ObservedPass, NullDistribution),
    Done(NbsResult),
}


/// Runs the NBS for one pair of groups.
///
/// # Examples
///
/// ```no_run
/// use nbs::{Group, NbsConfig, NbsDriver, Tail};
/// # fn groups() -> (Group, Group) { unimplemented!() }
/// let (x, y) = groups();
/// let config = NbsConfig::new(3.0, 5000, Tail::Right).with_seed(42);
/// let result = NbsDriver::new(&x, &y, config).unwrap().run().unwrap();
/// for c in result.significant(0.05) {
///     println!("{} edges, p = {}", c.component.size, c.pvalue);
/// }
/// ```
pub struct NbsDriver {
    config: NbsConfig,
    seed: u64,
    samples: EdgeSamples,
    stage: Stage,
}

impl NbsDriver {

    /// Validate the groups and the configuration. Any error here aborts before computation starts.
    pub fn new(x: &Group, y: &Group, config: NbsConfig) -> Result<NbsDriver> {
        config.validate()?;
        let samples = EdgeSamples::new(x, y)?;
        let seed = config.seed.unwrap_or_else(rand::random);

        tracing::info!(
            "NBS on {} nodes, {} vs {} subjects: threshold {}, tail {}, statistic {}, {} permutations, seed {}.",
            samples.num_nodes(), samples.num_x(), samples.num_y(), config.threshold, config.tail,
            config.statistic, config.permutations, seed
        );

        Ok(NbsDriver {
            config,
            seed,
            samples,
            stage: Stage::Init,
        })
    }

    pub fn state(&self) -> DriverState {
        match self.stage {
            Stage::Init => DriverState::Init,
            Stage::Observed(_) => DriverState::ObservedComputed,
            Stage::Permuted(..) => DriverState::Permuting,
            Stage::Done(_) => DriverState::Done,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &NbsConfig {
        &self.config
    }

    /// Observed components, from the observed pass until the p-values are computed.
    pub fn observed_components(&self) -> Option<&[Component]> {
        match &self.stage {
            Stage::Observed(o) | Stage::Permuted(o, _) => Some(o.components.as_slice()),
            _ => None,
        }
    }

    /// The null distribution, once the permutations ran.
    pub fn null_distribution(&self) -> Option<&NullDistribution> {
        match &self.stage {
            Stage::Permuted(_, null) => Some(null),
            Stage::Done(result) => Some(&result.null),
            _ => None,
        }
    }


    /// Advance the run by one state and return the new state. Does nothing once `Done`.
    ///
    /// A failed step leaves the driver in the state it was in, so a cancelled permutation
    /// step keeps the observed pass and fails again when retried with the same token.
    pub fn step(&mut self) -> Result<DriverState> {
        let next = match mem::replace(&mut self.stage, Stage::Init) {
            Stage::Init => Stage::Observed(self.compute_observed()),
            Stage::Observed(observed) => match self.permute() {
                Ok(null) => Stage::Permuted(observed, null),
                Err(e) => {
                    self.stage = Stage::Observed(observed);
                    return Err(e);
                }
            },
            Stage::Permuted(observed, null) => Stage::Done(self.conclude(observed, null)),
            done @ Stage::Done(_) => done,
        };
        self.stage = next;
        Ok(self.state())
    }


    /// Run all remaining states and return the result.
    pub fn run(mut self) -> Result<NbsResult> {
        loop {
            match self.stage {
                Stage::Done(result) => return Ok(result),
                _ => {
                    self.step()?;
                }
            }
        }
    }


    fn compute_observed(&self) -> ObservedPass {
        let statistic = self.samples.observed_statistic(&self.config.statistic);
        let edges = surviving_edges(self.samples.edges(), &statistic, self.config.threshold, self.config.tail);
        let mut extractor = ComponentExtractor::new(self.samples.num_nodes(), self.config.size_metric);
        let components = extractor.extract(&edges);

        tracing::debug!(
            "Observed {} surviving edges in {} components, largest has size {}.",
            edges.len(), components.len(), components.first().map(|c| c.size).unwrap_or(0)
        );

        ObservedPass {
            statistic,
            mask: AdjacencyMask::from_edges(self.samples.num_nodes(), &edges),
            components,
        }
    }


    fn permute(&self) -> Result<NullDistribution> {
        let mut engine = PermutationEngine::new(
            &self.samples,
            &self.config.statistic,
            self.config.threshold,
            self.config.tail,
            self.config.size_metric,
        ).with_progress_interval(self.config.progress_interval);
        if let Some(token) = &self.config.cancel {
            engine = engine.with_cancel_token(token.clone());
        }
        let null = engine.run(self.config.permutations, self.seed);
        self.config.partial_policy.apply(null)
    }


    fn conclude(&self, observed: ObservedPass, null: NullDistribution) -> NbsResult {
        let n = self.samples.num_nodes();
        let mut component_labels = Array2::<usize>::zeros((n, n));
        let mut components = Vec::with_capacity(observed.components.len());
        for (idx, component) in observed.components.into_iter().enumerate() {
            for &(i, j) in &component.edges {
                component_labels[[i, j]] = idx + 1;
                component_labels[[j, i]] = idx + 1;
            }
            let pvalue = null.p_value(component.size);
            components.push(ComponentPValue { component, pvalue });
        }

        tracing::info!(
            "NBS done: {} observed components, largest size {}, null max {}.",
            components.len(),
            components.first().map(|c| c.component.size).unwrap_or(0),
            null.max().unwrap_or(0)
        );

        NbsResult {
            components,
            adjacency: observed.mask,
            component_labels,
            statistic: mirror_edges(n, self.samples.edges(), &observed.statistic, 0.0),
            null,
            seed: self.seed,
        }
    }
}


/// Run the NBS with default settings and a random seed, returning `(p-values, adjacency mask, null distribution)`.
///
/// `tail` is one of `"left"`, `"right"` or `"both"`. With `"left"` the alternative hypothesis is that
/// the mean of population X is below the mean of population Y.
pub fn compute_nbs(x: &Group, y: &Group, threshold: f64, k: usize, tail: &str) -> Result<(Vec<f64>, Array2<bool>, Vec<f64>)> {
    let tail: Tail = tail.parse()?;
    let config = NbsConfig::new(threshold, k, tail);
    let result = NbsDriver::new(x, y, config)?.run()?;
    Ok(result.into_parts())
}
