use quick_error::quick_error;
use ndarray::ShapeError;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum NbsError {
        /// A connectivity matrix is not square, or the node count differs within or between groups.
        ShapeMismatch { context: String, expected: (usize, usize), actual: (usize, usize) } {
            display("Shape mismatch in {}: expected {}x{} matrix, found {}x{}", context, expected.0, expected.1, actual.0, actual.1)
        }

        /// A group has too few subjects to estimate a variance.
        InsufficientSamples { group: &'static str, found: usize } {
            display("Group {} has {} subject(s), at least 2 are required", group, found)
        }

        InvalidTail(tail: String) {
            display("Invalid tail '{}', expected one of 'left', 'right' or 'both'", tail)
        }

        /// A run parameter is out of its valid range.
        InvalidParameter { name: &'static str, value: String, reason: &'static str } {
            display("Invalid parameter {} = {}: {}", name, value, reason)
        }

        /// The permutation loop was cancelled and partial results were not accepted.
        Cancelled { completed: usize, requested: usize } {
            display("Permutation run cancelled after {} of {} trials", completed, requested)
        }

        /// Array construction failed.
        Shape(err: ShapeError) {
            from()
            source(err)
            display("Array shape error: {}", err)
        }
    }
}

impl NbsError {
    pub(crate) fn invalid_parameter<V: ToString>(name: &'static str, value: V, reason: &'static str) -> NbsError {
        NbsError::InvalidParameter { name, value: value.to_string(), reason }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, NbsError>;
