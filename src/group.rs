//! Groups of subject connectivity matrices.
//!
//! A [`Group`] holds one symmetric N x N connectivity matrix per subject of one population. All
//! subjects of a group share the same node count, and the two groups compared in an NBS run must
//! share it as well.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{NbsError, Result};
use crate::util::is_symmetric;

/// Tolerance used when checking subject matrices for symmetry.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// An ordered collection of subject connectivity matrices, stored subject axis first: `(num_subjects, N, N)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    data: Array3<f64>,
}

impl Group {

    /// Build a group from a stack of shape `(num_subjects, N, N)`.
    pub fn from_stack(data: Array3<f64>) -> Result<Group> {
        let (_, rows, cols) = data.dim();
        if rows != cols {
            return Err(NbsError::ShapeMismatch {
                context: String::from("subject matrix"),
                expected: (rows, rows),
                actual: (rows, cols),
            });
        }
        let group = Group { data };
        group.warn_if_asymmetric();
        Ok(group)
    }


    /// Build a group from a stack of shape `(N, N, num_subjects)`, the nodes-first layout used by MATLAB and numpy based NBS tools.
    pub fn from_nodes_last(data: Array3<f64>) -> Result<Group> {
        let standard = data.permuted_axes([2, 0, 1]).as_standard_layout().into_owned();
        Group::from_stack(standard)
    }


    /// Build a group from individual subject matrices. All matrices must be square and share the same shape.
    pub fn from_matrices(matrices: Vec<Array2<f64>>) -> Result<Group> {
        let num_subjects = matrices.len();
        let n = matrices.first().map(|m| m.nrows()).unwrap_or(0);

        let mut values: Vec<f64> = Vec::with_capacity(num_subjects * n * n);
        for (idx, m) in matrices.iter().enumerate() {
            if m.dim() != (n, n) {
                return Err(NbsError::ShapeMismatch {
                    context: format!("subject {} of group", idx),
                    expected: (n, n),
                    actual: m.dim(),
                });
            }
            values.extend(m.iter().cloned());
        }

        let data = Array3::from_shape_vec((num_subjects, n, n), values)?;
        Group::from_stack(data)
    }


    /// Number of subjects in this group.
    pub fn num_subjects(&self) -> usize {
        self.data.len_of(Axis(0))
    }


    /// Number of nodes (brain regions), i.e., the side length N of every subject matrix.
    pub fn num_nodes(&self) -> usize {
        self.data.len_of(Axis(1))
    }


    /// The connectivity matrix of subject `idx`.
    ///
    /// # Panics
    ///
    /// If `idx` is not a valid subject index.
    pub fn subject(&self, idx: usize) -> ArrayView2<f64> {
        self.data.index_axis(Axis(0), idx)
    }


    /// The full stack, subject axis first.
    pub fn data(&self) -> ArrayView3<f64> {
        self.data.view()
    }


    fn warn_if_asymmetric(&self) {
        for (idx, m) in self.data.outer_iter().enumerate() {
            if !is_symmetric(m, SYMMETRY_TOLERANCE) {
                tracing::warn!("Connectivity matrix of subject {} is not symmetric, only its upper triangle is used.", idx);
            }
        }
    }
}


/// Check that two groups can be compared edge-wise: same node count and at least two subjects each.
pub fn check_group_pair(x: &Group, y: &Group) -> Result<()> {
    let n = x.num_nodes();
    if y.num_nodes() != n {
        return Err(NbsError::ShapeMismatch {
            context: String::from("group Y compared to group X"),
            expected: (n, n),
            actual: (y.num_nodes(), y.num_nodes()),
        });
    }
    if x.num_subjects() < 2 {
        return Err(NbsError::InsufficientSamples { group: "X", found: x.num_subjects() });
    }
    if y.num_subjects() < 2 {
        return Err(NbsError::InsufficientSamples { group: "Y", found: y.num_subjects() });
    }
    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;
    use ndarray::Array;

    #[test]
    fn a_group_can_be_built_from_matrices() {
        let g = Group::from_matrices(vec![Array2::eye(4), Array2::eye(4), Array2::zeros((4, 4))]).unwrap();
        assert_eq!(3, g.num_subjects());
        assert_eq!(4, g.num_nodes());
        assert_eq!(1.0, g.subject(1)[[2, 2]]);
        assert_eq!(0.0, g.subject(2)[[2, 2]]);
    }

    #[test]
    fn matrices_of_different_shapes_are_rejected() {
        let res = Group::from_matrices(vec![Array2::eye(4), Array2::eye(5)]);
        assert!(matches!(res, Err(NbsError::ShapeMismatch { .. })));
    }

    #[test]
    fn non_square_stacks_are_rejected() {
        let res = Group::from_stack(Array3::zeros((2, 3, 4)));
        assert!(matches!(res, Err(NbsError::ShapeMismatch { .. })));
    }

    #[test]
    fn nodes_last_layout_is_transposed_to_subjects_first() {
        let data = Array::from_shape_fn((3, 3, 2), |(i, j, s)| (s * 100 + i * 10 + j) as f64);
        let g = Group::from_nodes_last(data).unwrap();
        assert_eq!(2, g.num_subjects());
        assert_eq!(3, g.num_nodes());
        assert_eq!(112.0, g.subject(1)[[1, 2]]);
    }

    #[test]
    fn group_pairs_are_validated() {
        let x = Group::from_stack(Array3::zeros((3, 5, 5))).unwrap();
        let y = Group::from_stack(Array3::zeros((3, 6, 6))).unwrap();
        let single = Group::from_stack(Array3::zeros((1, 5, 5))).unwrap();

        assert!(check_group_pair(&x, &x).is_ok());
        assert!(matches!(check_group_pair(&x, &y), Err(NbsError::ShapeMismatch { .. })));
        assert!(matches!(check_group_pair(&single, &x), Err(NbsError::InsufficientSamples { group: "X", found: 1 })));
        assert!(matches!(check_group_pair(&x, &single), Err(NbsError::InsufficientSamples { group: "Y", found: 1 })));
    }
}
