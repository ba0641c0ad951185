//! Flat Parameter Views
//!
//! Natural-gradient solvers work on a single contiguous vector, while models
//! hold an ordered list of named tensors. This module converts between the two.
//!
//! ## Layout
//!
//! The flat vector is the concatenation of each tensor's row-major flattening,
//! in parameter-set order:
//!
//! ```text
//! w1: [2, 2]              b1: [3]
//! ┌─────────────────────┬──────────┐
//! │ w00  w01  w10  w11  │ b0 b1 b2 │   len = 4 + 3
//! └─────────────────────┴──────────┘
//! offset 0                offset 4
//! ```
//!
//! [`ParamLayout`] records names, shapes and offsets once so repeated
//! flatten/restore calls during an optimization run do not recompute them.

use ndarray::{ArrayD, IxDyn};
use tracing::trace;

use crate::error::{Result, TrpoError};

/// A named tensor with a declared shape
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    shape: Vec<usize>,
    value: ArrayD<f64>,
}

impl Parameter {
    /// Create a parameter whose declared shape is the array's own shape
    pub fn new(name: impl Into<String>, value: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            shape: value.shape().to_vec(),
            value,
        }
    }

    /// Create a parameter from row-major values and a shape
    pub fn from_vec(name: impl Into<String>, shape: &[usize], values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        let actual = values.len();
        let value = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| TrpoError::shape(name.clone(), shape, actual))?;
        Ok(Self {
            name,
            shape: shape.to_vec(),
            value,
        })
    }

    /// Create a parameter whose storage is not checked against `shape`.
    ///
    /// Mismatches surface as [`TrpoError::Shape`] on the first flatten.
    pub fn with_declared_shape(
        name: impl Into<String>,
        shape: &[usize],
        value: ArrayD<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            value,
        }
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element count implied by the declared shape
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// True for a zero-element tensor
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current values
    pub fn value(&self) -> &ArrayD<f64> {
        &self.value
    }

    /// Mutable access for the owning model
    pub fn value_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.value
    }

    fn check_shape(&self) -> Result<()> {
        if self.value.len() != self.len() {
            return Err(TrpoError::shape(
                self.name.clone(),
                &self.shape,
                self.value.len(),
            ));
        }
        Ok(())
    }
}

/// Ordered sequence of named parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter; order of insertion is the flattening order
    pub fn push(&mut self, param: Parameter) {
        self.params.push(param);
    }

    /// Builder form of [`ParameterSet::push`]
    pub fn with(mut self, param: Parameter) -> Self {
        self.push(param);
        self
    }

    /// Number of tensors
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when no tensors are held
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Sum of declared element counts
    pub fn num_elements(&self) -> usize {
        self.params.iter().map(Parameter::len).sum()
    }

    /// Iterate in flattening order
    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Mutable lookup by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name == name)
    }
}

impl FromIterator<Parameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

/// Position of one tensor inside the flat vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    /// Parameter name
    pub name: String,
    /// Declared shape
    pub shape: Vec<usize>,
    /// Start index in the flat vector
    pub offset: usize,
    /// Element count
    pub len: usize,
}

/// Cached flattening layout of a parameter set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamLayout {
    entries: Vec<LayoutEntry>,
    total: usize,
}

impl ParamLayout {
    /// Record the layout of `params`, checking every tensor against its declared shape
    pub fn of(params: &ParameterSet) -> Result<Self> {
        let mut entries = Vec::with_capacity(params.len());
        let mut offset = 0;
        for param in params.iter() {
            param.check_shape()?;
            let len = param.len();
            entries.push(LayoutEntry {
                name: param.name.clone(),
                shape: param.shape.clone(),
                offset,
                len,
            });
            offset += len;
        }
        Ok(Self {
            entries,
            total: offset,
        })
    }

    /// Total flat length
    pub fn total_len(&self) -> usize {
        self.total
    }

    /// Per-tensor entries in flattening order
    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Slice of `flat` belonging to the named tensor
    pub fn slice<'a>(&self, flat: &'a [f64], name: &str) -> Option<&'a [f64]> {
        let entry = self.entries.iter().find(|e| e.name == name)?;
        flat.get(entry.offset..entry.offset + entry.len)
    }

    /// Verify that `params` still has the structure this layout was built from
    fn check(&self, params: &ParameterSet) -> Result<()> {
        if params.len() != self.entries.len() {
            return Err(TrpoError::invalid_parameter(
                "parameter set",
                format!(
                    "layout has {} tensors, set has {}",
                    self.entries.len(),
                    params.len()
                ),
            ));
        }
        for (entry, param) in self.entries.iter().zip(params.iter()) {
            if entry.name != param.name || entry.shape != param.shape {
                return Err(TrpoError::invalid_parameter(
                    param.name.clone(),
                    format!(
                        "expected '{}' with shape {:?}, found shape {:?}",
                        entry.name, entry.shape, param.shape
                    ),
                ));
            }
            param.check_shape()?;
        }
        Ok(())
    }

    /// Concatenate every tensor's row-major values into one vector
    pub fn flatten(&self, params: &ParameterSet) -> Result<Vec<f64>> {
        self.check(params)?;
        let mut flat = Vec::with_capacity(self.total);
        for param in params.iter() {
            flat.extend(param.value.iter().copied());
        }
        Ok(flat)
    }

    /// Write `flat` back into `params`.
    ///
    /// All tensors are staged before any is replaced, so on error the set is
    /// left exactly as it was.
    pub fn restore(&self, params: &mut ParameterSet, flat: &[f64]) -> Result<()> {
        if flat.len() != self.total {
            return Err(TrpoError::length_mismatch(self.total, flat.len()));
        }
        self.check(params)?;

        let staged = self
            .entries
            .iter()
            .map(|entry| {
                let chunk = flat[entry.offset..entry.offset + entry.len].to_vec();
                ArrayD::from_shape_vec(IxDyn(&entry.shape), chunk)
                    .map_err(|_| TrpoError::shape(entry.name.clone(), &entry.shape, entry.len))
            })
            .collect::<Result<Vec<_>>>()?;

        for (param, value) in params.params.iter_mut().zip(staged) {
            param.value = value;
        }
        trace!(tensors = self.entries.len(), len = self.total, "restored flat parameters");
        Ok(())
    }

    /// Concatenate one gradient tensor per parameter into a flat gradient.
    ///
    /// Each gradient must have the element count of its parameter; its own
    /// shape is otherwise ignored.
    pub fn flatten_gradients(&self, gradients: &[ArrayD<f64>]) -> Result<Vec<f64>> {
        if gradients.len() != self.entries.len() {
            return Err(TrpoError::length_mismatch(
                self.entries.len(),
                gradients.len(),
            ));
        }
        let mut flat = Vec::with_capacity(self.total);
        for (entry, grad) in self.entries.iter().zip(gradients) {
            if grad.len() != entry.len {
                return Err(TrpoError::shape(entry.name.clone(), &entry.shape, grad.len()));
            }
            flat.extend(grad.iter().copied());
        }
        Ok(flat)
    }
}

/// Flatten `params` without keeping the layout
pub fn flatten(params: &ParameterSet) -> Result<Vec<f64>> {
    ParamLayout::of(params)?.flatten(params)
}

/// Restore `flat` into `params` without keeping the layout
pub fn restore(params: &mut ParameterSet, flat: &[f64]) -> Result<()> {
    ParamLayout::of(params)?.restore(params, flat)
}
