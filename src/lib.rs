//! Rust implementation of the Network-Based Statistic (NBS).
//!
//! The NBS tests for group differences in brain connectivity. An edge-wise statistic between two
//! groups of connectivity matrices is thresholded, the surviving edges are grouped into connected
//! components, and every component is assigned a p-value from a permutation null distribution of
//! the maximal component size.

pub mod components;
pub mod config;
pub mod edge_stat;
pub mod error;
pub mod group;
pub mod nbs;
pub mod permutation;
pub mod threshold;
pub mod traits;
pub mod util;

pub use components::{extract_components, Component, ComponentExtractor, SizeMetric, UnionFind};
pub use config::{NbsConfig, PartialPolicy};
pub use edge_stat::{edge_statistic, EdgeSamples, SampleMoments, TestStatistic};
pub use error::{NbsError, Result};
pub use group::Group;
pub use nbs::{compute_nbs, ComponentPValue, DriverState, NbsDriver, NbsResult};
pub use permutation::{CancelToken, NullDistribution, PermutationEngine};
pub use threshold::{threshold_mask, AdjacencyMask, Tail};
pub use traits::EdgeStatistic;
