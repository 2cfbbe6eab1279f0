//! Utility functions used in all other nbs modules.

use ndarray::{Array2, ArrayView2};

/// List the edges of the upper triangle of an `n` x `n` matrix, excluding the diagonal, in row-major order.
///
/// # Examples
///
/// ```
/// let edges = nbs::util::upper_triangle_edges(3);
/// assert_eq!(edges, vec![(0, 1), (0, 2), (1, 2)]);
/// ```
pub fn upper_triangle_edges(n: usize) -> Vec<(usize, usize)> {
    let mut edges = Vec::with_capacity(num_edges(n));
    for i in 0..n {
        for j in (i + 1)..n {
            edges.push((i, j));
        }
    }
    edges
}


/// Number of undirected edges between `n` nodes, without self-edges.
pub fn num_edges(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}


/// Check whether a square matrix is symmetric up to the absolute tolerance `tol`. NaN entries never compare equal.
pub fn is_symmetric(matrix: ArrayView2<f64>, tol: f64) -> bool {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return false;
    }
    for i in 0..rows {
        for j in (i + 1)..cols {
            if !((matrix[[i, j]] - matrix[[j, i]]).abs() <= tol) {
                return false;
            }
        }
    }
    true
}


/// Scatter per-edge values back into a symmetric `n` x `n` matrix. The diagonal is filled with `diagonal`.
pub fn mirror_edges<T: Clone>(n: usize, edges: &[(usize, usize)], values: &[T], diagonal: T) -> Array2<T> {
    let mut matrix = Array2::from_elem((n, n), diagonal);
    for (&(i, j), v) in edges.iter().zip(values.iter()) {
        matrix[[i, j]] = v.clone();
        matrix[[j, i]] = v.clone();
    }
    matrix
}


/// Derive the RNG seed of permutation trial `index` from the run seed.
///
/// SplitMix64 finalizer over the run seed and the trial counter, so every trial owns an
/// independent stream no matter which worker executes it.
pub fn trial_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
