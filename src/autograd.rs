//! Backward passes for the differentiable operations.
//!
//! Each `*_with_grad` function runs a forward operation and returns, alongside its output, an
//! object that captures what the backward pass needs. Calling [Backward::backward] on that object
//! with the gradient of the output yields the gradient of the source.

use crate::error::ScatterError;
use crate::operation::{Element, FloatElement};
use crate::scatter::{self, ScatterOptions, NO_ARGMAX};
use crate::softmax;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Zip};

/// Trait for backward passes.
pub trait Backward<T> {
    /// Returns the gradient with respect to the forward operation's source.
    ///
    /// # Arguments
    ///
    /// * `grad_out`: Gradient with respect to the forward operation's output. Must have the shape
    ///   of that output.
    fn backward(&self, grad_out: ArrayViewD<'_, T>) -> Result<ArrayD<T>, ScatterError>;
}

fn check_gradient_shape(expected: &[usize], actual: &[usize]) -> Result<(), ScatterError> {
    if expected != actual {
        return Err(ScatterError::ShapeMismatch {
            what: "gradient",
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

/// Backward pass of [scatter::scatter_add].
///
/// Each source element contributed once to its slot, so its gradient is that slot's gradient.
#[derive(Clone, Debug)]
pub struct ScatterAddBackward {
    index: ArrayD<i64>,
    axis: isize,
    out_shape: Vec<usize>,
}

impl<T: Element> Backward<T> for ScatterAddBackward {
    fn backward(&self, grad_out: ArrayViewD<'_, T>) -> Result<ArrayD<T>, ScatterError> {
        check_gradient_shape(&self.out_shape, grad_out.shape())?;
        scatter::gather(grad_out, self.index.view(), self.axis)
    }
}

/// Backward pass of [scatter::scatter_max].
///
/// Only the source element recorded as a slot's argmax receives that slot's gradient.
#[derive(Clone, Debug)]
pub struct ScatterMaxBackward {
    argmax: ArrayD<i64>,
    axis: usize,
    src_shape: Vec<usize>,
}

impl<T: Element> Backward<T> for ScatterMaxBackward {
    fn backward(&self, grad_out: ArrayViewD<'_, T>) -> Result<ArrayD<T>, ScatterError> {
        check_gradient_shape(self.argmax.shape(), grad_out.shape())?;
        let mut grad_src = ArrayD::from_elem(IxDyn(&self.src_shape), T::zero());
        let axis = Axis(self.axis);
        Zip::from(grad_src.lanes_mut(axis))
            .and(self.argmax.lanes(axis))
            .and(grad_out.lanes(axis))
            .for_each(|mut grad_src_lane, argmax_lane, grad_out_lane| {
                for (position, grad) in argmax_lane.iter().zip(grad_out_lane) {
                    if *position != NO_ARGMAX {
                        let position = *position as usize;
                        grad_src_lane[position] = grad_src_lane[position] + *grad;
                    }
                }
            });
        Ok(grad_src)
    }
}

/// Backward pass of [softmax::segment_softmax].
///
/// With output `y` and output gradient `g`, the source gradient is
/// `y_i * (g_i - sum_{j in group(i)} g_j * y_j)`.
#[derive(Clone, Debug)]
pub struct SegmentSoftmaxBackward<T> {
    output: ArrayD<T>,
    index: ArrayD<i64>,
    axis: isize,
    dim_size: Option<usize>,
}

impl<T: FloatElement> Backward<T> for SegmentSoftmaxBackward<T> {
    fn backward(&self, grad_out: ArrayViewD<'_, T>) -> Result<ArrayD<T>, ScatterError> {
        check_gradient_shape(self.output.shape(), grad_out.shape())?;
        let weighted = Zip::from(&grad_out)
            .and(&self.output)
            .map_collect(|&g, &y| g * y);
        let options = ScatterOptions::new().with_dim_size(self.dim_size);
        let group_sum =
            scatter::scatter_add(weighted.view(), self.index.view(), self.axis, &options)?;
        let group_sum = scatter::gather(group_sum.view(), self.index.view(), self.axis)?;
        Ok(Zip::from(&self.output)
            .and(&grad_out)
            .and(&group_sum)
            .map_collect(|&y, &g, &sum| y * (g - sum)))
    }
}

/// Backward pass of any differentiable operation.
#[derive(Clone, Debug)]
pub enum GradFn<T> {
    ScatterAdd(ScatterAddBackward),
    ScatterMax(ScatterMaxBackward),
    SegmentSoftmax(SegmentSoftmaxBackward<T>),
}

impl<T> From<ScatterAddBackward> for GradFn<T> {
    fn from(backward: ScatterAddBackward) -> Self {
        GradFn::ScatterAdd(backward)
    }
}

impl<T> From<ScatterMaxBackward> for GradFn<T> {
    fn from(backward: ScatterMaxBackward) -> Self {
        GradFn::ScatterMax(backward)
    }
}

impl<T> From<SegmentSoftmaxBackward<T>> for GradFn<T> {
    fn from(backward: SegmentSoftmaxBackward<T>) -> Self {
        GradFn::SegmentSoftmax(backward)
    }
}

impl<T: FloatElement> Backward<T> for GradFn<T> {
    fn backward(&self, grad_out: ArrayViewD<'_, T>) -> Result<ArrayD<T>, ScatterError> {
        match self {
            GradFn::ScatterAdd(backward) => backward.backward(grad_out),
            GradFn::ScatterMax(backward) => backward.backward(grad_out),
            GradFn::SegmentSoftmax(backward) => backward.backward(grad_out),
        }
    }
}

/// Run [scatter::scatter_add] and capture its backward pass.
pub fn scatter_add_with_grad<T: Element>(
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
    options: &ScatterOptions<T>,
) -> Result<(ArrayD<T>, ScatterAddBackward), ScatterError> {
    let out = scatter::scatter_add(src, index.clone(), axis, options)?;
    let backward = ScatterAddBackward {
        index: index.to_owned(),
        axis,
        out_shape: out.shape().to_vec(),
    };
    Ok((out, backward))
}

/// Run [scatter::scatter_max] and capture its backward pass.
///
/// Returns the output, its argmax and the backward pass.
pub fn scatter_max_with_grad<T: Element>(
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
    options: &ScatterOptions<T>,
) -> Result<(ArrayD<T>, ArrayD<i64>, ScatterMaxBackward), ScatterError> {
    let src_shape = src.shape().to_vec();
    let (out, argmax) = scatter::scatter_max(src, index, axis, options)?;
    let backward = ScatterMaxBackward {
        argmax: argmax.clone(),
        axis: scatter::normalize_axis(axis, src_shape.len())?,
        src_shape,
    };
    Ok((out, argmax, backward))
}

/// Run [softmax::segment_softmax] and capture its backward pass.
pub fn segment_softmax_with_grad<T: FloatElement>(
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
    dim_size: Option<usize>,
) -> Result<(ArrayD<T>, SegmentSoftmaxBackward<T>), ScatterError> {
    let out = softmax::segment_softmax(src, index.clone(), axis, dim_size)?;
    let backward = SegmentSoftmaxBackward {
        output: out.clone(),
        index: index.to_owned(),
        axis,
        dim_size,
    };
    Ok((out, backward))
}
