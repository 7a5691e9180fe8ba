//! Elementwise, broadcasting and reduction kernels on [`Tensor`]

use crate::error::{KgeError, KgeResult};
use super::core::{Shape, Tensor};

/// For each flat index of `out`, the flat index of the element of `input` that
/// broadcasts onto it. `input` must be broadcast-compatible with `out`.
fn broadcast_offsets(out: &Shape, input: &Shape) -> Vec<usize> {
    let rank = out.rank();
    let pad = rank - input.rank();
    let in_strides = input.strides();
    let out_strides = out.strides();

    (0..out.total_elements())
        .map(|flat| {
            let mut offset = 0;
            for axis in pad..rank {
                let in_axis = axis - pad;
                if input.dims[in_axis] != 1 {
                    let coord = (flat / out_strides[axis]) % out.dims[axis];
                    offset += coord * in_strides[in_axis];
                }
            }
            offset
        })
        .collect()
}

/// Split a shape around `axis` into (outer, axis length, inner) extents.
fn axis_extents(shape: &Shape, axis: usize) -> (usize, usize, usize) {
    let outer = shape.dims[..axis].iter().product();
    let inner = shape.dims[axis + 1..].iter().product();
    (outer, shape.dims[axis], inner)
}

impl Tensor {
    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f32) -> f32,
    {
        let data = self.as_slice().iter().map(|&x| f(x)).collect();
        Tensor::from_parts(data, self.shape().clone())
    }

    /// Combine two tensors elementwise after broadcasting them to a common shape.
    pub fn zip_with<F>(&self, other: &Tensor, f: F) -> KgeResult<Tensor>
    where
        F: Fn(f32, f32) -> f32,
    {
        if self.shape() == other.shape() {
            let data = self
                .as_slice()
                .iter()
                .zip(other.as_slice())
                .map(|(&a, &b)| f(a, b))
                .collect();
            return Ok(Tensor::from_parts(data, self.shape().clone()));
        }

        let out = self.shape().broadcast_with(other.shape())?;
        let lhs = broadcast_offsets(&out, self.shape());
        let rhs = broadcast_offsets(&out, other.shape());
        let a = self.as_slice();
        let b = other.as_slice();
        let data = lhs.iter().zip(&rhs).map(|(&i, &j)| f(a[i], b[j])).collect();
        Ok(Tensor::from_parts(data, out))
    }

    pub fn add(&self, other: &Tensor) -> KgeResult<Tensor> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Tensor) -> KgeResult<Tensor> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Tensor) -> KgeResult<Tensor> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Tensor) -> KgeResult<Tensor> {
        self.zip_with(other, |a, b| a / b)
    }

    pub fn scale(&self, factor: f32) -> Tensor {
        self.map(|x| x * factor)
    }

    pub fn sum(&self) -> Tensor {
        Tensor::scalar(self.as_slice().iter().sum())
    }

    /// Mean over every element. An empty tensor yields NaN.
    pub fn mean(&self) -> Tensor {
        Tensor::scalar(self.as_slice().iter().sum::<f32>() / self.numel() as f32)
    }

    /// Sum along `axis`, dropping it from the shape.
    pub fn sum_axis(&self, axis: isize) -> KgeResult<Tensor> {
        let axis = self.shape().normalize_axis(axis)?;
        let (outer, len, inner) = axis_extents(self.shape(), axis);
        let src = self.as_slice();

        let mut data = vec![0.0; outer * inner];
        for o in 0..outer {
            for k in 0..len {
                let base = (o * len + k) * inner;
                for i in 0..inner {
                    data[o * inner + i] += src[base + i];
                }
            }
        }

        let mut dims = self.dims().to_vec();
        dims.remove(axis);
        Ok(Tensor::from_parts(data, Shape::new(dims)))
    }

    /// Mean along `axis`, dropping it from the shape.
    pub fn mean_axis(&self, axis: isize) -> KgeResult<Tensor> {
        let resolved = self.shape().normalize_axis(axis)?;
        let len = self.dims()[resolved] as f32;
        Ok(self.sum_axis(axis)?.scale(1.0 / len))
    }

    /// Softmax along `axis`. The per-slice maximum is subtracted first.
    pub fn softmax(&self, axis: isize) -> KgeResult<Tensor> {
        let axis = self.shape().normalize_axis(axis)?;
        let (outer, len, inner) = axis_extents(self.shape(), axis);
        let src = self.as_slice();
        let mut data = vec![0.0; src.len()];

        for o in 0..outer {
            for i in 0..inner {
                let at = |k: usize| (o * len + k) * inner + i;
                let max = (0..len).map(|k| src[at(k)]).fold(f32::NEG_INFINITY, f32::max);
                let mut total = 0.0;
                for k in 0..len {
                    let e = (src[at(k)] - max).exp();
                    data[at(k)] = e;
                    total += e;
                }
                for k in 0..len {
                    data[at(k)] /= total;
                }
            }
        }

        Ok(Tensor::from_parts(data, self.shape().clone()))
    }

    /// Materialize this tensor broadcast to `shape`.
    pub fn broadcast_to(&self, shape: &Shape) -> KgeResult<Tensor> {
        if self.shape() == shape {
            return Ok(self.clone());
        }
        if &self.shape().broadcast_with(shape)? != shape {
            return Err(KgeError::shape_error(
                &format!("a shape that broadcasts to {}", shape),
                &self.shape().to_string(),
                None,
            ));
        }
        let src = self.as_slice();
        let data = broadcast_offsets(shape, self.shape())
            .into_iter()
            .map(|i| src[i])
            .collect();
        Ok(Tensor::from_parts(data, shape.clone()))
    }

    /// Sum this tensor down to `shape`, undoing a broadcast. Used to route
    /// gradients back to operands that were broadcast in the forward pass.
    pub fn sum_to(&self, shape: &Shape) -> KgeResult<Tensor> {
        if self.shape() == shape {
            return Ok(self.clone());
        }
        if shape.rank() > self.rank() || &shape.broadcast_with(self.shape())? != self.shape() {
            return Err(KgeError::shape_error(
                &format!("a shape that {} broadcasts from", self.shape()),
                &shape.to_string(),
                None,
            ));
        }
        let mut data = vec![0.0; shape.total_elements()];
        for (value, target) in self.as_slice().iter().zip(broadcast_offsets(self.shape(), shape)) {
            data[target] += value;
        }
        Ok(Tensor::from_parts(data, shape.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_broadcast_sub_column_against_matrix() {
        let column = Tensor::from_vec(vec![1.0, 2.0], &[2, 1]).unwrap();
        let matrix = Tensor::from_vec(vec![0.5, 1.0, 1.5, 0.0, 1.0, 2.0], &[2, 3]).unwrap();
        let diff = column.sub(&matrix).unwrap();
        assert_eq!(diff.dims(), &[2, 3]);
        assert_close(diff.as_slice(), &[0.5, 0.0, -0.5, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_mismatched_shapes_are_rejected() {
        let a = Tensor::zeros(Shape::new([2, 3]));
        let b = Tensor::zeros(Shape::new([3, 2]));
        assert!(matches!(a.add(&b), Err(KgeError::ShapeError(_))));
    }

    #[test]
    fn test_axis_reductions() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_close(t.sum_axis(-1).unwrap().as_slice(), &[6.0, 15.0]);
        assert_close(t.sum_axis(0).unwrap().as_slice(), &[5.0, 7.0, 9.0]);
        assert_close(t.mean_axis(-1).unwrap().as_slice(), &[2.0, 5.0]);
        assert_eq!(t.mean_axis(-1).unwrap().dims(), &[2]);
        assert_close(t.mean().as_slice(), &[3.5]);
        assert_close(t.sum().as_slice(), &[21.0]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, -50.0, 0.0, 50.0], &[2, 3]).unwrap();
        let s = t.softmax(-1).unwrap();
        let rows = s.sum_axis(-1).unwrap();
        assert_close(rows.as_slice(), &[1.0, 1.0]);
        assert!(s.as_slice()[2] > s.as_slice()[1]);
    }

    #[test]
    fn test_softmax_of_equal_scores_is_uniform() {
        let t = Tensor::full(Shape::new([1, 4]), 7.0);
        assert_close(t.softmax(-1).unwrap().as_slice(), &[0.25; 4]);
    }

    #[test]
    fn test_broadcast_to_and_sum_to_are_adjoint() {
        let bias = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let wide = bias.broadcast_to(&Shape::new([2, 3])).unwrap();
        assert_close(wide.as_slice(), &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        let back = wide.sum_to(&Shape::new([3])).unwrap();
        assert_close(back.as_slice(), &[2.0, 4.0, 6.0]);
        let column = wide.sum_to(&Shape::new([2, 1])).unwrap();
        assert_close(column.as_slice(), &[6.0, 6.0]);
        assert_close(wide.sum_to(&Shape::scalar()).unwrap().as_slice(), &[12.0]);
        assert!(wide.sum_to(&Shape::new([2])).is_err());
    }
}
