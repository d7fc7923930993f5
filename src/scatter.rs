//! Segment (scatter) reductions along one axis of an n-dimensional array.
//!
//! Every element of the source array is sent to a destination slot chosen by the index array.
//! Along the reduction axis the slot is the index value; along every other axis the element keeps
//! its coordinate. A 1D index is broadcast over the other axes.
//!
//! Lanes along the reduction axis never interact, so they may be processed in parallel.

use std::cmp::Ordering;

use crate::error::ScatterError;
use crate::operation::Element;

use ndarray::{ArrayD, ArrayView1, ArrayViewD, ArrayViewMut1, ArrayViewMutD, Axis, IxDyn, Zip};
use tracing::{event, Level};

/// Argmax of a destination slot that no source element updated.
pub const NO_ARGMAX: i64 = -1;

/// How lanes along the reduction axis are processed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Execution {
    /// Process lanes one after another on the calling thread
    #[default]
    Serial,
    /// Process lanes on the Rayon thread pool
    Rayon,
}

/// Options for operations that allocate their destination array.
#[derive(Clone, Debug, PartialEq)]
pub struct ScatterOptions<T> {
    /// Extent of the destination along the reduction axis. Inferred from the index if unset.
    pub dim_size: Option<usize>,
    /// Initial value of destination slots. Each operation has its own default.
    pub fill_value: Option<T>,
    /// Lane execution strategy
    pub execution: Execution,
}

impl<T> Default for ScatterOptions<T> {
    fn default() -> Self {
        ScatterOptions {
            dim_size: None,
            fill_value: None,
            execution: Execution::Serial,
        }
    }
}

impl<T> ScatterOptions<T> {
    /// Return options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dim_size(mut self, dim_size: Option<usize>) -> Self {
        self.dim_size = dim_size;
        self
    }

    pub fn with_fill_value(mut self, fill_value: Option<T>) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }
}

/// Normalise a possibly negative axis into `[0, rank)`.
pub fn normalize_axis(axis: isize, rank: usize) -> Result<usize, ScatterError> {
    let rank_isize = isize::try_from(rank)?;
    let normalized = if axis < 0 { axis + rank_isize } else { axis };
    if normalized < 0 || normalized >= rank_isize {
        return Err(ScatterError::AxisOutOfRange { axis, rank });
    }
    Ok(usize::try_from(normalized)?)
}

/// Returns a view of `index` with the same rank as `shape`.
///
/// A 1D index gets unit extent on every axis except `axis`. The result can then be broadcast to
/// `shape` through zero strides, without copying.
///
/// # Arguments
///
/// * `index`: 1D index, or an index of the same shape as `shape`
/// * `shape`: Shape the index must address
/// * `axis`: Normalised reduction axis
fn expand_index<'a>(
    index: ArrayViewD<'a, i64>,
    shape: &[usize],
    axis: usize,
) -> Result<ArrayViewD<'a, i64>, ScatterError> {
    let rank = shape.len();
    if index.ndim() == 1 && index.len() == shape[axis] {
        let mut view = index;
        for _ in 0..axis {
            view = view.insert_axis(Axis(0));
        }
        while view.ndim() < rank {
            let last = view.ndim();
            view = view.insert_axis(Axis(last));
        }
        return Ok(view);
    }
    if index.shape() == shape {
        return Ok(index);
    }
    let expected = if index.ndim() == 1 {
        vec![shape[axis]]
    } else {
        shape.to_vec()
    };
    Err(ScatterError::ShapeMismatch {
        what: "index",
        expected,
        actual: index.shape().to_vec(),
    })
}

/// Broadcast an expanded index to `shape`.
fn broadcast_index<'b>(
    expanded: &'b ArrayViewD<'_, i64>,
    shape: &[usize],
) -> Result<ArrayViewD<'b, i64>, ScatterError> {
    expanded
        .broadcast(shape)
        .ok_or_else(|| ScatterError::ShapeMismatch {
            what: "index",
            expected: shape.to_vec(),
            actual: expanded.shape().to_vec(),
        })
}

/// Check that every index addresses a slot in `[0, dim_size)`.
///
/// This runs before any destination element is written, so a failed call leaves the destination
/// untouched.
fn check_indices(
    index: &ArrayViewD<'_, i64>,
    dim_size: usize,
    axis: usize,
) -> Result<(), ScatterError> {
    for &value in index.iter() {
        if value < 0 {
            return Err(ScatterError::NegativeIndex { index: value });
        }
        if usize::try_from(value)? >= dim_size {
            return Err(ScatterError::IndexOutOfBounds {
                index: value,
                axis,
                dim_size,
            });
        }
    }
    Ok(())
}

/// Returns the destination extent along the reduction axis.
///
/// An explicit `dim_size` wins. Otherwise it is one more than the largest index, or zero for an
/// empty index.
pub fn infer_dim_size(
    index: &ArrayViewD<'_, i64>,
    dim_size: Option<usize>,
) -> Result<usize, ScatterError> {
    if let Some(dim_size) = dim_size {
        return Ok(dim_size);
    }
    match index.iter().max() {
        Some(&max) if max < 0 => Err(ScatterError::NegativeIndex { index: max }),
        Some(&max) => Ok(usize::try_from(max)? + 1),
        None => Ok(0),
    }
}

/// Shape of `shape` with the extent along `axis` replaced.
fn with_extent(shape: &[usize], axis: usize, extent: usize) -> Vec<usize> {
    let mut shape = shape.to_vec();
    shape[axis] = extent;
    shape
}

/// Returns the shape of a destination to allocate, checking that it fits in memory.
///
/// The product of the non-zero extents, in bytes of `T`, must not exceed `isize::MAX`, the
/// limit ndarray and the allocator place on an array.
fn destination_shape<T>(
    shape: &[usize],
    axis: usize,
    dim_size: usize,
) -> Result<IxDyn, ScatterError> {
    let shape = with_extent(shape, axis, dim_size);
    let limit = isize::MAX as usize / std::mem::size_of::<T>().max(1);
    let elements = shape
        .iter()
        .filter(|&&extent| extent != 0)
        .try_fold(1_usize, |count, &extent| count.checked_mul(extent));
    match elements {
        Some(elements) if elements <= limit => Ok(IxDyn(&shape)),
        _ => Err(ScatterError::DestinationTooLarge { shape }),
    }
}

/// Check that a destination matches the source on every axis except `axis`.
fn check_destination(
    destination: &[usize],
    source: &[usize],
    axis: usize,
) -> Result<(), ScatterError> {
    let compatible = destination.len() == source.len()
        && destination
            .iter()
            .zip(source)
            .enumerate()
            .all(|(n, (d, s))| n == axis || d == s);
    if !compatible {
        return Err(ScatterError::ShapeMismatch {
            what: "destination",
            expected: with_extent(source, axis, destination.get(axis).copied().unwrap_or(0)),
            actual: destination.to_vec(),
        });
    }
    Ok(())
}

/// Add one source lane into its destination lane.
fn sum_lane<T: Element>(
    mut out_lane: ArrayViewMut1<T>,
    src_lane: ArrayView1<T>,
    index_lane: ArrayView1<i64>,
) {
    for (value, slot) in src_lane.iter().zip(index_lane) {
        // Indices were bounds checked by the caller.
        let slot = *slot as usize;
        out_lane[slot] = out_lane[slot] + *value;
    }
}

/// Add each source lane into its destination lane.
fn sum_lanes<T: Element>(
    mut out: ArrayViewMutD<'_, T>,
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: usize,
    execution: Execution,
) {
    let axis = Axis(axis);
    let zip = Zip::from(out.lanes_mut(axis))
        .and(src.lanes(axis))
        .and(index.lanes(axis));
    match execution {
        Execution::Serial => zip.for_each(sum_lane::<T>),
        Execution::Rayon => zip.par_for_each(sum_lane::<T>),
    }
}

/// Whether `value` takes over a destination slot currently holding `current`.
///
/// Strictly greater values always win. An equal value only claims a slot no element has
/// claimed yet, so the first of several equal maxima is recorded. NaN never wins.
fn claims_slot<T: PartialOrd>(value: &T, current: &T, argmax: i64) -> bool {
    match value.partial_cmp(current) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Equal) => argmax == NO_ARGMAX,
        _ => false,
    }
}

/// Fold one source lane into its destination lane by maximum.
fn max_lane<T: Element>(
    mut out_lane: ArrayViewMut1<T>,
    mut arg_lane: ArrayViewMut1<i64>,
    src_lane: ArrayView1<T>,
    index_lane: ArrayView1<i64>,
) {
    for (position, (value, slot)) in src_lane.iter().zip(index_lane).enumerate() {
        // Indices were bounds checked by the caller.
        let slot = *slot as usize;
        if claims_slot(value, &out_lane[slot], arg_lane[slot]) {
            out_lane[slot] = *value;
            arg_lane[slot] = position as i64;
        }
    }
}

/// Fold each source lane into its destination lane by maximum, recording positions in `argmax`.
fn max_lanes<T: Element>(
    mut out: ArrayViewMutD<'_, T>,
    mut argmax: ArrayViewMutD<'_, i64>,
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: usize,
    execution: Execution,
) {
    let axis = Axis(axis);
    let zip = Zip::from(out.lanes_mut(axis))
        .and(argmax.lanes_mut(axis))
        .and(src.lanes(axis))
        .and(index.lanes(axis));
    match execution {
        Execution::Serial => zip.for_each(max_lane::<T>),
        Execution::Rayon => zip.par_for_each(max_lane::<T>),
    }
}

/// Sum `src` into the existing contents of `out`.
///
/// `out` must match `src` on every axis except `axis`. Slots not named by `index` are left
/// untouched. Integer overflow behaves as in [scatter_add].
///
/// # Arguments
///
/// * `out`: Destination array
/// * `src`: Source array
/// * `index`: 1D index along `axis`, or an index with the same shape as `src`
/// * `axis`: Reduction axis. Negative values count from the last axis.
/// * `execution`: Lane execution strategy
pub fn scatter_add_into<T: Element>(
    out: ArrayViewMutD<'_, T>,
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
    execution: Execution,
) -> Result<(), ScatterError> {
    let axis = normalize_axis(axis, src.ndim())?;
    check_destination(out.shape(), src.shape(), axis)?;
    let expanded = expand_index(index, src.shape(), axis)?;
    check_indices(&expanded, out.len_of(Axis(axis)), axis)?;
    let index = broadcast_index(&expanded, src.shape())?;
    sum_lanes(out, src, index, axis, execution);
    Ok(())
}

/// Sum source elements sharing an index.
///
/// Returns a new destination filled with `options.fill_value` (default zero) plus the
/// contributions of every source element.
///
/// Integer sums use `+`, so a sum that overflows `T` panics in debug builds and wraps in release
/// builds, as with any other integer arithmetic. A destination too large to allocate is rejected
/// with [ScatterError::DestinationTooLarge].
pub fn scatter_add<T: Element>(
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
    options: &ScatterOptions<T>,
) -> Result<ArrayD<T>, ScatterError> {
    let axis = normalize_axis(axis, src.ndim())?;
    let expanded = expand_index(index, src.shape(), axis)?;
    let dim_size = infer_dim_size(&expanded, options.dim_size)?;
    let shape = destination_shape::<T>(src.shape(), axis, dim_size)?;
    check_indices(&expanded, dim_size, axis)?;
    let index = broadcast_index(&expanded, src.shape())?;
    let fill_value = options.fill_value.unwrap_or_else(T::zero);
    let mut out = ArrayD::from_elem(shape, fill_value);
    event!(
        Level::DEBUG,
        "scatter_add of {:?} into {:?} along axis {}",
        src.shape(),
        out.shape(),
        axis
    );
    sum_lanes(out.view_mut(), src, index, axis, options.execution);
    Ok(out)
}

/// Maximise `src` into the existing contents of `out`.
///
/// Existing values take part in the maximum. Returns the argmax array, holding for each slot the
/// position along `axis` of the source element that set it, or [NO_ARGMAX].
///
/// A contribution equal to a slot's existing value claims the slot's argmax if no earlier
/// contribution has, even though the value itself is unchanged. Only slots where every
/// contribution is strictly smaller than the existing value keep [NO_ARGMAX].
pub fn scatter_max_into<T: Element>(
    out: ArrayViewMutD<'_, T>,
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
    execution: Execution,
) -> Result<ArrayD<i64>, ScatterError> {
    let axis = normalize_axis(axis, src.ndim())?;
    check_destination(out.shape(), src.shape(), axis)?;
    let expanded = expand_index(index, src.shape(), axis)?;
    check_indices(&expanded, out.len_of(Axis(axis)), axis)?;
    let index = broadcast_index(&expanded, src.shape())?;
    let mut argmax = ArrayD::from_elem(out.raw_dim(), NO_ARGMAX);
    max_lanes(out, argmax.view_mut(), src, index, axis, execution);
    Ok(argmax)
}

/// Maximise source elements sharing an index.
///
/// Returns the destination and its argmax. Unset `options.fill_value` defaults to the smallest
/// value of `T`, so that any contribution overrides it.
///
/// A source with zero extent along `axis` gives a destination of fill values and an argmax of
/// [NO_ARGMAX], provided `options.dim_size` says how large that destination is.
pub fn scatter_max<T: Element>(
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
    options: &ScatterOptions<T>,
) -> Result<(ArrayD<T>, ArrayD<i64>), ScatterError> {
    let axis = normalize_axis(axis, src.ndim())?;
    if src.len_of(Axis(axis)) == 0 && options.dim_size.is_none() {
        return Err(ScatterError::AmbiguousDimSize { operation: "max" });
    }
    let expanded = expand_index(index, src.shape(), axis)?;
    let dim_size = infer_dim_size(&expanded, options.dim_size)?;
    // The argmax is allocated alongside the destination.
    destination_shape::<i64>(src.shape(), axis, dim_size)?;
    let shape = destination_shape::<T>(src.shape(), axis, dim_size)?;
    check_indices(&expanded, dim_size, axis)?;
    let index = broadcast_index(&expanded, src.shape())?;
    let fill_value = options.fill_value.unwrap_or_else(T::min_value);
    let mut out = ArrayD::from_elem(shape.clone(), fill_value);
    let mut argmax = ArrayD::from_elem(shape, NO_ARGMAX);
    event!(
        Level::DEBUG,
        "scatter_max of {:?} into {:?} along axis {}",
        src.shape(),
        out.shape(),
        axis
    );
    max_lanes(
        out.view_mut(),
        argmax.view_mut(),
        src,
        index,
        axis,
        options.execution,
    );
    Ok((out, argmax))
}

/// Select elements of `src` along `axis`.
///
/// `out[.., j, ..] = src[.., index[j], ..]`. The output has the shape of `src`, except along
/// `axis`, where its extent is that of the index.
pub fn gather<T: Element>(
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
) -> Result<ArrayD<T>, ScatterError> {
    let axis = normalize_axis(axis, src.ndim())?;
    let extent = if index.ndim() == 1 {
        index.len()
    } else {
        index.shape().get(axis).copied().unwrap_or(0)
    };
    let shape = with_extent(src.shape(), axis, extent);
    let expanded = expand_index(index, &shape, axis)?;
    check_indices(&expanded, src.len_of(Axis(axis)), axis)?;
    let index = broadcast_index(&expanded, &shape)?;
    let mut out = ArrayD::from_elem(IxDyn(&shape), T::zero());
    let axis = Axis(axis);
    Zip::from(out.lanes_mut(axis))
        .and(src.lanes(axis))
        .and(index.lanes(axis))
        .for_each(|mut out_lane, src_lane, index_lane| {
            for (value, slot) in out_lane.iter_mut().zip(index_lane) {
                *value = src_lane[*slot as usize];
            }
        });
    Ok(out)
}
