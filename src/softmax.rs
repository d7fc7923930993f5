//! Softmax over the groups of a segment index.

use crate::error::ScatterError;
use crate::operation::FloatElement;
use crate::scatter::{self, ScatterOptions};

use ndarray::{ArrayD, ArrayViewD, Axis, Zip};
use tracing::{event, Level};

/// Normalise `src` so that the elements of each group along `axis` sum to one.
///
/// Each group is shifted by its maximum before exponentiating, so large inputs do not overflow.
/// The output has the shape of `src`.
///
/// # Arguments
///
/// * `src`: Scores to normalise
/// * `index`: 1D index along `axis`, or an index with the same shape as `src`
/// * `axis`: Reduction axis. Negative values count from the last axis.
/// * `dim_size`: Number of groups. Inferred from the index if unset.
pub fn segment_softmax<T: FloatElement>(
    src: ArrayViewD<'_, T>,
    index: ArrayViewD<'_, i64>,
    axis: isize,
    dim_size: Option<usize>,
) -> Result<ArrayD<T>, ScatterError> {
    let normalized = scatter::normalize_axis(axis, src.ndim())?;
    if src.len_of(Axis(normalized)) == 0 {
        return Ok(ArrayD::zeros(src.raw_dim()));
    }
    event!(
        Level::DEBUG,
        "segment_softmax of {:?} along axis {}",
        src.shape(),
        normalized
    );
    let options = ScatterOptions::new().with_dim_size(dim_size);
    let (group_max, _) = scatter::scatter_max(src.clone(), index.clone(), axis, &options)?;
    let group_max = scatter::gather(group_max.view(), index.clone(), axis)?;
    let exp = Zip::from(&src)
        .and(&group_max)
        .map_collect(|&x, &max| (x - max).exp());
    let group_sum = scatter::scatter_add(exp.view(), index.clone(), axis, &options)?;
    let group_sum = scatter::gather(group_sum.view(), index, axis)?;
    Ok(Zip::from(&exp)
        .and(&group_sum)
        .map_collect(|&exp, &sum| exp / sum))
}
