use std::fmt;
use std::str::FromStr;

use crate::error::RasterError;

/// Declared binding strategy of a variable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VariableKind {
    /// A per-sample matrix bound to a uniform; the last two dims are (rows, cols).
    Matrix,
    /// A per-sample float buffer bound to a storage block; the last dim is its length.
    Buffer,
}

impl VariableKind {
    /// Attribute spelling of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            VariableKind::Matrix => "mat",
            VariableKind::Buffer => "buffer",
        }
    }

    /// Number of trailing tensor dims that make up one batch element.
    pub fn element_rank(self) -> usize {
        match self {
            VariableKind::Matrix => 2,
            VariableKind::Buffer => 1,
        }
    }
}

impl FromStr for VariableKind {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mat" => Ok(VariableKind::Matrix),
            "buffer" => Ok(VariableKind::Buffer),
            other => Err(RasterError::Config(format!(
                "unknown variable kind '{other}', expected 'mat' or 'buffer'"
            ))),
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A variable declared at operator construction: its shader name and kind.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub kind: VariableKind,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Zips the parallel name/kind attribute lists.
    pub fn from_lists<N, K>(names: &[N], kinds: &[K]) -> Result<Vec<Self>, RasterError>
    where
        N: AsRef<str>,
        K: AsRef<str>,
    {
        if names.len() != kinds.len() {
            return Err(RasterError::Config(format!(
                "the variable names and kinds must have the same size ({} names, {} kinds)",
                names.len(),
                kinds.len()
            )));
        }
        names
            .iter()
            .zip(kinds)
            .map(|(name, kind)| -> Result<Self, RasterError> {
                Ok(Self::new(name.as_ref(), kind.as_ref().parse()?))
            })
            .collect()
    }
}
