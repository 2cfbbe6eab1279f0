//! Edge-wise two-group test statistics.
//!
//! The statistic is computed independently for every edge of the upper triangle, across the subjects
//! of both groups. Permutation trials reuse the same pooled edge samples, so the data is
//! rearranged once into an [`EdgeSamples`] table of shape `(num_subjects, num_edges)`.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};

use crate::error::{NbsError, Result};
use crate::group::{check_group_pair, Group};
use crate::traits::EdgeStatistic;
use crate::util::{mirror_edges, upper_triangle_edges};

/// Sample size, mean and unbiased (ddof = 1) variance of one group at one edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleMoments {
    pub n: usize,
    pub mean: f64,
    pub var: f64,
}

impl SampleMoments {

    /// Moments from the sum and the sum of squares of `n` values.
    pub fn from_sums(n: usize, sum: f64, sum_sq: f64) -> SampleMoments {
        let nf = n as f64;
        let mean = sum / nf;
        // Rounding can push a zero variance slightly below 0.
        let var = ((sum_sq - nf * mean * mean) / (nf - 1.0)).max(0.0);
        SampleMoments { n, mean, var }
    }
}


/// The built-in edge statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatistic {
    /// Two-sample t without assuming equal variances: `(mean_x - mean_y) / sqrt(var_x/n_x + var_y/n_y)`.
    WelchT,
    /// Student's two-sample t with pooled variance.
    PooledT,
    /// Plain difference of the group means.
    MeanDifference,
}

impl Default for TestStatistic {
    fn default() -> TestStatistic {
        TestStatistic::WelchT
    }
}

impl EdgeStatistic for TestStatistic {
    fn edge_statistic(&self, x: &SampleMoments, y: &SampleMoments) -> f64 {
        let diff = x.mean - y.mean;
        match self {
            TestStatistic::WelchT => diff / (x.var / x.n as f64 + y.var / y.n as f64).sqrt(),
            TestStatistic::PooledT => {
                let (nx, ny) = (x.n as f64, y.n as f64);
                let pooled = ((nx - 1.0) * x.var + (ny - 1.0) * y.var) / (nx + ny - 2.0);
                diff / (pooled * (1.0 / nx + 1.0 / ny)).sqrt()
            }
            TestStatistic::MeanDifference => diff,
        }
    }
}

impl fmt::Display for TestStatistic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TestStatistic::WelchT => "welch-t",
            TestStatistic::PooledT => "pooled-t",
            TestStatistic::MeanDifference => "mean-difference",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TestStatistic {
    type Err = NbsError;

    fn from_str(s: &str) -> Result<TestStatistic> {
        match s.trim().to_ascii_lowercase().as_str() {
            "welch-t" | "welch" | "t" => Ok(TestStatistic::WelchT),
            "pooled-t" | "pooled" | "student" => Ok(TestStatistic::PooledT),
            "mean-difference" | "meandiff" => Ok(TestStatistic::MeanDifference),
            _ => Err(NbsError::invalid_parameter("statistic", s, "unknown test statistic")),
        }
    }
}


/// Pooled per-edge samples of both groups: group X subjects first, then group Y subjects.
///
/// Values are centered on the pooled mean of their edge, which leaves every mean difference and
/// variance unchanged but keeps the sums of squares well conditioned.
#[derive(Debug, Clone)]
pub struct EdgeSamples {
    num_nodes: usize,
    num_x: usize,
    edges: Vec<(usize, usize)>,
    values: Array2<f64>,
    squares: Array2<f64>,
    total_sum: Array1<f64>,
    total_sum_sq: Array1<f64>,
    constant: Vec<bool>,
}

impl EdgeSamples {

    /// Pool the upper triangles of both groups. Fails if the groups cannot be compared.
    pub fn new(x: &Group, y: &Group) -> Result<EdgeSamples> {
        check_group_pair(x, y)?;

        let num_nodes = x.num_nodes();
        let edges = upper_triangle_edges(num_nodes);
        let num_subjects = x.num_subjects() + y.num_subjects();

        let mut values = Array2::<f64>::zeros((num_subjects, edges.len()));
        let subjects = (0..x.num_subjects())
            .map(|s| x.subject(s))
            .chain((0..y.num_subjects()).map(|s| y.subject(s)));
        for (mut row, subject) in values.outer_iter_mut().zip(subjects) {
            for (v, &(i, j)) in row.iter_mut().zip(edges.iter()) {
                *v = subject[[i, j]];
            }
        }

        let mut constant = vec![false; edges.len()];
        for (e, mut column) in values.axis_iter_mut(Axis(1)).enumerate() {
            let first = column[0];
            constant[e] = column.iter().all(|&v| v == first);
            let mean = column.sum() / num_subjects as f64;
            column.mapv_inplace(|v| v - mean);
        }

        let squares = values.mapv(|v| v * v);
        let total_sum = values.sum_axis(Axis(0));
        let total_sum_sq = squares.sum_axis(Axis(0));

        Ok(EdgeSamples {
            num_nodes,
            num_x: x.num_subjects(),
            edges,
            values,
            squares,
            total_sum,
            total_sum_sq,
            constant,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_subjects(&self) -> usize {
        self.values.nrows()
    }

    /// Size of group X; the pooled subjects `0..num_x()` are the observed group X.
    pub fn num_x(&self) -> usize {
        self.num_x
    }

    pub fn num_y(&self) -> usize {
        self.num_subjects() - self.num_x
    }

    /// The edges in the order used by all per-edge vectors.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }


    /// Per-edge statistic under the true group labels.
    pub fn observed_statistic<S: EdgeStatistic + ?Sized>(&self, statistic: &S) -> Vec<f64> {
        let members: Vec<usize> = (0..self.num_x).collect();
        let mut out = Vec::with_capacity(self.edges.len());
        let mut scratch = StatisticScratch::new(self.edges.len());
        self.statistic_into(&members, statistic, &mut scratch, &mut out);
        out
    }


    /// Per-edge statistic when the pooled subjects listed in `members_x` form group X and all
    /// others form group Y. The result is written to `out`, in [`EdgeSamples::edges`] order.
    ///
    /// Edges that are constant across all subjects get a NaN statistic.
    pub fn statistic_into<S: EdgeStatistic + ?Sized>(
        &self,
        members_x: &[usize],
        statistic: &S,
        scratch: &mut StatisticScratch,
        out: &mut Vec<f64>,
    ) {
        scratch.sum.fill(0.0);
        scratch.sum_sq.fill(0.0);
        for &s in members_x {
            scratch.sum.scaled_add(1.0, &self.values.row(s));
            scratch.sum_sq.scaled_add(1.0, &self.squares.row(s));
        }

        let nx = members_x.len();
        let ny = self.num_subjects() - nx;
        out.clear();
        for e in 0..self.edges.len() {
            if self.constant[e] {
                out.push(f64::NAN);
                continue;
            }
            let mx = SampleMoments::from_sums(nx, scratch.sum[e], scratch.sum_sq[e]);
            let my = SampleMoments::from_sums(
                ny,
                self.total_sum[e] - scratch.sum[e],
                self.total_sum_sq[e] - scratch.sum_sq[e],
            );
            out.push(statistic.edge_statistic(&mx, &my));
        }
    }
}


/// Reusable per-worker buffers for [`EdgeSamples::statistic_into`].
#[derive(Debug, Clone)]
pub struct StatisticScratch {
    sum: Array1<f64>,
    sum_sq: Array1<f64>,
}

impl StatisticScratch {
    pub fn new(num_edges: usize) -> StatisticScratch {
        StatisticScratch {
            sum: Array1::zeros(num_edges),
            sum_sq: Array1::zeros(num_edges),
        }
    }
}


/// Compute the N x N statistic matrix between two groups. The diagonal is 0.
///
/// # Examples
///
/// ```
/// use ndarray::Array3;
/// use nbs::{edge_statistic, Group, TestStatistic};
///
/// let x = Group::from_stack(Array3::from_shape_fn((3, 2, 2), |(s, _, _)| 1.0 + s as f64)).unwrap();
/// let y = Group::from_stack(Array3::from_shape_fn((3, 2, 2), |(s, _, _)| s as f64)).unwrap();
/// let t = edge_statistic(&x, &y, &TestStatistic::MeanDifference).unwrap();
/// assert!((t[[0, 1]] - 1.0).abs() < 1e-12);
/// ```
pub fn edge_statistic<S: EdgeStatistic + ?Sized>(x: &Group, y: &Group, statistic: &S) -> Result<Array2<f64>> {
    let samples = EdgeSamples::new(x, y)?;
    let values = samples.observed_statistic(statistic);
    Ok(mirror_edges(samples.num_nodes(), samples.edges(), &values, 0.0))
}
