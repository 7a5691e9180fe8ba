//! Core tensor types and fundamental operations

use std::{
    fmt::{self, Debug, Display},
    sync::Arc,
};
use serde::{Deserialize, Serialize};

use crate::error::{KgeError, KgeResult};

/// Dynamic row-major shape. Rank 0 is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape {
    pub dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn total_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.dims
    }

    /// Resolve a possibly negative axis against this shape's rank.
    pub fn normalize_axis(&self, axis: isize) -> KgeResult<usize> {
        self.normalize_axis_for_rank(axis, self.rank())
    }

    /// Same as [`Shape::normalize_axis`] but against an arbitrary rank, which is
    /// what inserting a new axis needs (`rank + 1` valid positions).
    pub(crate) fn normalize_axis_for_rank(&self, axis: isize, rank: usize) -> KgeResult<usize> {
        let resolved = if axis < 0 { axis + rank as isize } else { axis };
        if resolved < 0 || resolved as usize >= rank {
            return Err(KgeError::shape_error(
                &format!("axis in [-{}, {})", rank, rank),
                &format!("axis {} for shape {}", axis, self),
                None,
            ));
        }
        Ok(resolved as usize)
    }

    /// Numpy-style broadcast of two shapes: trailing dims are aligned and each
    /// pair must be equal or contain a 1.
    pub fn broadcast_with(&self, other: &Shape) -> KgeResult<Shape> {
        let rank = self.rank().max(other.rank());
        let mut dims = vec![0; rank];
        for i in 0..rank {
            let a = dim_from_end(&self.dims, rank - 1 - i);
            let b = dim_from_end(&other.dims, rank - 1 - i);
            dims[i] = match (a, b) {
                (a, b) if a == b => a,
                (1, b) => b,
                (a, 1) => a,
                _ => {
                    return Err(KgeError::shape_error(
                        &format!("shapes broadcastable with {}", self),
                        &other.to_string(),
                        Some("Dimensions must match or be 1 when aligned from the right"),
                    ))
                }
            };
        }
        Ok(Shape::new(dims))
    }

    /// Row-major strides.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.rank()];
        for i in (0..self.rank().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }
}

/// Dimension `offset` positions from the right, or 1 when the shape is shorter.
fn dim_from_end(dims: &[usize], offset: usize) -> usize {
    if offset < dims.len() {
        dims[dims.len() - 1 - offset]
    } else {
        1
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.dims.iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", "))
    }
}

/// Dense `f32` tensor. Storage is shared, so clones are cheap and tensors are
/// never mutated in place.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    data: Arc<[f32]>,
    shape: Shape,
}

impl Tensor {
    pub fn new(data: Vec<f32>, shape: Shape) -> KgeResult<Self> {
        if data.len() != shape.total_elements() {
            return Err(KgeError::shape_error(
                &format!("{} elements for shape {}", shape.total_elements(), shape),
                &format!("{} elements", data.len()),
                None,
            ));
        }
        Ok(Self {
            data: data.into(),
            shape,
        })
    }

    pub fn from_vec(data: Vec<f32>, dims: &[usize]) -> KgeResult<Self> {
        Self::new(data, Shape::from(dims))
    }

    pub fn scalar(value: f32) -> Self {
        Self {
            data: vec![value].into(),
            shape: Shape::scalar(),
        }
    }

    pub fn full(shape: Shape, value: f32) -> Self {
        Self {
            data: vec![value; shape.total_elements()].into(),
            shape,
        }
    }

    pub fn zeros(shape: Shape) -> Self {
        Self::full(shape, 0.0)
    }

    pub(crate) fn from_parts(data: Vec<f32>, shape: Shape) -> Self {
        debug_assert_eq!(data.len(), shape.total_elements());
        Self {
            data: data.into(),
            shape,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        &self.shape.dims
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data.to_vec()
    }

    /// The single value of a one-element tensor, whatever its rank.
    pub fn item(&self) -> KgeResult<f32> {
        if self.numel() != 1 {
            return Err(KgeError::shape_error(
                "a single-element tensor",
                &self.shape.to_string(),
                None,
            ));
        }
        Ok(self.data[0])
    }

    pub fn reshape(&self, shape: Shape) -> KgeResult<Self> {
        if shape.total_elements() != self.numel() {
            return Err(KgeError::shape_error(
                &format!("a shape with {} elements", self.numel()),
                &shape.to_string(),
                None,
            ));
        }
        Ok(Self {
            data: self.data.clone(),
            shape,
        })
    }

    /// Insert a size-1 axis. `-1` appends a trailing axis.
    pub fn unsqueeze(&self, axis: isize) -> KgeResult<Self> {
        let position = self.shape.normalize_axis_for_rank(axis, self.rank() + 1)?;
        let mut dims = self.shape.dims.clone();
        dims.insert(position, 1);
        self.reshape(Shape::new(dims))
    }
}

impl Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("data", &self.data)
            .finish()
    }
}
