//! Thresholding of edge statistics into a binary adjacency mask.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};

use crate::error::{NbsError, Result};

/// Direction of the hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// Population X < population Y: an edge survives if its statistic is below `-threshold`.
    Left,
    /// Population X > population Y: an edge survives if its statistic is above `threshold`.
    Right,
    /// Two-sided: an edge survives if the absolute statistic is above `threshold`.
    Both,
}

impl Tail {

    /// Whether an edge with the given statistic survives `threshold`. NaN never survives.
    #[inline]
    pub fn survives(self, statistic: f64, threshold: f64) -> bool {
        match self {
            Tail::Right => statistic > threshold,
            Tail::Left => statistic < -threshold,
            Tail::Both => statistic.abs() > threshold,
        }
    }

    /// The tail testing the same hypothesis after swapping the groups.
    pub fn flipped(self) -> Tail {
        match self {
            Tail::Left => Tail::Right,
            Tail::Right => Tail::Left,
            Tail::Both => Tail::Both,
        }
    }
}

impl Default for Tail {
    fn default() -> Tail {
        Tail::Both
    }
}

impl fmt::Display for Tail {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Tail::Left => "left",
            Tail::Right => "right",
            Tail::Both => "both",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Tail {
    type Err = NbsError;

    fn from_str(s: &str) -> Result<Tail> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Tail::Left),
            "right" => Ok(Tail::Right),
            "both" => Ok(Tail::Both),
            _ => Err(NbsError::InvalidTail(s.to_string())),
        }
    }
}


/// Symmetric binary adjacency matrix of the edges that survive the threshold. The diagonal is always `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyMask {
    mask: Array2<bool>,
}

impl AdjacencyMask {

    /// A mask with the given undirected edges set.
    ///
    /// # Panics
    ///
    /// If an edge refers to a node `>= num_nodes`.
    pub fn from_edges(num_nodes: usize, edges: &[(usize, usize)]) -> AdjacencyMask {
        let mut mask = Array2::from_elem((num_nodes, num_nodes), false);
        for &(i, j) in edges {
            if i != j {
                mask[[i, j]] = true;
                mask[[j, i]] = true;
            }
        }
        AdjacencyMask { mask }
    }

    pub fn num_nodes(&self) -> usize {
        self.mask.nrows()
    }

    /// Whether the undirected edge `(i, j)` survived.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.mask[[i, j]]
    }

    /// The surviving edges as `(i, j)` pairs with `i < j`, in row-major order.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let n = self.num_nodes();
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.mask[[i, j]] {
                    edges.push((i, j));
                }
            }
        }
        edges
    }

    pub fn num_edges(&self) -> usize {
        self.edges().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|&v| !v)
    }

    pub fn view(&self) -> ArrayView2<bool> {
        self.mask.view()
    }

    pub fn into_array(self) -> Array2<bool> {
        self.mask
    }
}


/// Select the edges whose statistics survive. `statistics[e]` belongs to `edges[e]`.
pub fn surviving_edges(edges: &[(usize, usize)], statistics: &[f64], threshold: f64, tail: Tail) -> Vec<(usize, usize)> {
    edges.iter()
        .zip(statistics.iter())
        .filter(|(_, s)| tail.survives(**s, threshold))
        .map(|(&e, _)| e)
        .collect()
}


/// Threshold a square statistic matrix. Only the upper triangle is read; the diagonal is excluded.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use nbs::{threshold_mask, Tail};
///
/// let stat = array![[0.0, 3.0, -4.0], [3.0, 0.0, 1.0], [-4.0, 1.0, 0.0]];
/// let mask = threshold_mask(stat.view(), 2.0, Tail::Right).unwrap();
/// assert_eq!(mask.edges(), vec![(0, 1)]);
/// ```
pub fn threshold_mask(statistic: ArrayView2<f64>, threshold: f64, tail: Tail) -> Result<AdjacencyMask> {
    let (rows, cols) = statistic.dim();
    if rows != cols {
        return Err(NbsError::ShapeMismatch {
            context: String::from("statistic matrix"),
            expected: (rows, rows),
            actual: (rows, cols),
        });
    }
    let mut edges = Vec::new();
    for i in 0..rows {
        for j in (i + 1)..cols {
            if tail.survives(statistic[[i, j]], threshold) {
                edges.push((i, j));
            }
        }
    }
    Ok(AdjacencyMask::from_edges(rows, &edges))
}


#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    fn demo_statistic() -> Array2<f64> {
        array![
            [9.0, 3.0, -4.0, f64::NAN],
            [3.0, 9.0, 1.0, 2.5],
            [-4.0, 1.0, 9.0, -2.5],
            [f64::NAN, 2.5, -2.5, 9.0]
        ]
    }

    #[test]
    fn right_tail_keeps_large_positive_statistics() {
        let mask = threshold_mask(demo_statistic().view(), 2.0, Tail::Right).unwrap();
        assert_eq!(mask.edges(), vec![(0, 1), (1, 3)]);
        assert!(mask.contains(3, 1));
    }

    #[test]
    fn left_tail_keeps_large_negative_statistics() {
        let mask = threshold_mask(demo_statistic().view(), 2.0, Tail::Left).unwrap();
        assert_eq!(mask.edges(), vec![(0, 2), (2, 3)]);
    }

    #[test]
    fn both_tails_keep_large_absolute_statistics() {
        let mask = threshold_mask(demo_statistic().view(), 2.0, Tail::Both).unwrap();
        assert_eq!(mask.num_edges(), 4);
    }

    #[test]
    fn diagonal_and_nan_never_survive() {
        let mask = threshold_mask(demo_statistic().view(), 0.0, Tail::Both).unwrap();
        for i in 0..4 {
            assert!(!mask.contains(i, i));
        }
        assert!(!mask.contains(0, 3));
        assert_eq!(mask.num_edges(), 5);
    }

    #[test]
    fn a_threshold_above_all_statistics_gives_an_empty_mask() {
        let mask = threshold_mask(demo_statistic().view(), 100.0, Tail::Both).unwrap();
        assert!(mask.is_empty());
    }

    #[test]
    fn tails_parse_and_reject_unknown_values() {
        assert_eq!(Tail::Left, " LEFT ".parse::<Tail>().unwrap());
        assert_eq!(Tail::Both, "both".parse::<Tail>().unwrap());
        assert!(matches!("up".parse::<Tail>(), Err(NbsError::InvalidTail(ref t)) if t == "up"));
    }

    #[test]
    fn flipping_the_tail_matches_a_negated_statistic() {
        let stat = demo_statistic();
        let neg = stat.mapv(|v| -v);
        for &tail in &[Tail::Left, Tail::Right, Tail::Both] {
            let a = threshold_mask(stat.view(), 2.0, tail).unwrap();
            let b = threshold_mask(neg.view(), 2.0, tail.flipped()).unwrap();
            assert_eq!(a, b);
        }
    }
}
