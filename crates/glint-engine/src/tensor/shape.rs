use std::fmt;

/// Dimensions of a dense tensor, outermost first.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct TensorShape {
    dims: Vec<usize>,
}

impl TensorShape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// The rank-0 shape. Holds exactly one element.
    pub fn scalar() -> Self {
        Self::default()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Size of dimension `axis`, counted from the front.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    /// Size of the dimension `back` places from the end (`back = 1` is the last).
    pub fn dim_from_back(&self, back: usize) -> Option<usize> {
        if back == 0 || back > self.dims.len() {
            return None;
        }
        Some(self.dims[self.dims.len() - back])
    }

    /// Product of all dimensions; 1 for the scalar shape.
    ///
    /// Saturates at `usize::MAX`; use [`Self::checked_num_elements`] where the
    /// count sizes an allocation.
    pub fn num_elements(&self) -> usize {
        self.checked_num_elements().unwrap_or(usize::MAX)
    }

    /// Product of all dimensions, or `None` if it does not fit in `usize`.
    ///
    /// A zero dimension makes the shape empty whatever the other sizes are.
    pub fn checked_num_elements(&self) -> Option<usize> {
        if self.dims.contains(&0) {
            return Some(0);
        }
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Returns the shape with its last `n` dimensions removed, or `None` if the
    /// rank is smaller than `n`.
    pub fn remove_last_dims(&self, n: usize) -> Option<TensorShape> {
        let keep = self.dims.len().checked_sub(n)?;
        Some(TensorShape::new(self.dims[..keep].to_vec()))
    }

    /// Returns `self ++ other`.
    pub fn concat(&self, other: &[usize]) -> TensorShape {
        let mut dims = Vec::with_capacity(self.dims.len() + other.len());
        dims.extend_from_slice(&self.dims);
        dims.extend_from_slice(other);
        TensorShape::new(dims)
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for TensorShape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str("]")
    }
}
