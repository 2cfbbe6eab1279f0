use crate::edge_stat::SampleMoments;

/// A per-edge two-group test statistic, computed from the sample moments of both groups at one edge.
///
/// Implementors must be antisymmetric in their arguments (swapping the groups flips the sign) for
/// the `left` and `right` tails to mean what they say. A NaN result marks the edge as non-surviving.
pub trait EdgeStatistic {
    fn edge_statistic(&self, x: &SampleMoments, y: &SampleMoments) -> f64;
}
