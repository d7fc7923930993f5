//! Segment reduction operations.
//!
//! Each operation is implemented as a struct that implements the
//! [Operation](crate::operation::Operation) trait.

use crate::array;
use crate::error::ScatterError;
use crate::models;
use crate::operation::{
    dispatch_float, dispatch_num, Element, FloatElement, FloatOperation, NumOperation, Operation,
};
use crate::scatter::{self, Execution, ScatterOptions};
use crate::softmax;
use crate::types::TryFromDValue;

use bytes::Bytes;
use ndarray::ArrayD;

/// Returns engine options for the request, with the fill value converted to `T`.
fn scatter_options<T: Element>(
    request_data: &models::RequestData,
    execution: Execution,
) -> Result<ScatterOptions<T>, ScatterError> {
    let fill_value = request_data
        .fill_value
        .clone()
        .map(T::try_from_dvalue)
        .transpose()?;
    Ok(ScatterOptions::new()
        .with_dim_size(request_data.dim_size)
        .with_fill_value(fill_value)
        .with_execution(execution))
}

/// Build a response from a result array of the request's dtype.
fn response<T: Element>(
    request_data: &models::RequestData,
    result: &ArrayD<T>,
    argmax: Option<Vec<i64>>,
) -> models::Response {
    models::Response::new(
        array::to_bytes(result),
        request_data.dtype,
        result.shape().into(),
        argmax,
    )
}

/// Sum the source elements that share an index.
pub struct ScatterAdd {}

impl NumOperation for ScatterAdd {
    fn execute_t<T: Element>(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError> {
        let src = array::build_array::<T>(request_data, data)?;
        let index = array::build_index(request_data)?;
        let options = scatter_options::<T>(request_data, execution)?;
        let result = scatter::scatter_add(src, index, request_data.axis, &options)?;
        Ok(response(request_data, &result, None))
    }
}

impl Operation for ScatterAdd {
    fn execute(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError> {
        dispatch_num::<Self>(request_data, data, execution)
    }
}

/// Return the maximum of the source elements that share an index, and its position.
pub struct ScatterMax {}

impl NumOperation for ScatterMax {
    fn execute_t<T: Element>(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError> {
        let src = array::build_array::<T>(request_data, data)?;
        let index = array::build_index(request_data)?;
        let options = scatter_options::<T>(request_data, execution)?;
        let (result, argmax) = scatter::scatter_max(src, index, request_data.axis, &options)?;
        let argmax = argmax.iter().copied().collect::<Vec<i64>>();
        Ok(response(request_data, &result, Some(argmax)))
    }
}

impl Operation for ScatterMax {
    fn execute(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError> {
        dispatch_num::<Self>(request_data, data, execution)
    }
}

/// Select source elements along the axis. `dim_size` and `fill_value` are not used.
pub struct Gather {}

impl NumOperation for Gather {
    fn execute_t<T: Element>(
        request_data: &models::RequestData,
        data: &Bytes,
        _execution: Execution,
    ) -> Result<models::Response, ScatterError> {
        let src = array::build_array::<T>(request_data, data)?;
        let index = array::build_index(request_data)?;
        let result = scatter::gather(src, index, request_data.axis)?;
        Ok(response(request_data, &result, None))
    }
}

impl Operation for Gather {
    fn execute(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError> {
        dispatch_num::<Self>(request_data, data, execution)
    }
}

/// Normalise the source elements of each group into a probability distribution.
pub struct SegmentSoftmax {}

impl FloatOperation for SegmentSoftmax {
    const NAME: &'static str = "segment_softmax";

    fn execute_t<T: FloatElement>(
        request_data: &models::RequestData,
        data: &Bytes,
        _execution: Execution,
    ) -> Result<models::Response, ScatterError> {
        let src = array::build_array::<T>(request_data, data)?;
        let index = array::build_index(request_data)?;
        let result =
            softmax::segment_softmax(src, index, request_data.axis, request_data.dim_size)?;
        Ok(response(request_data, &result, None))
    }
}

impl Operation for SegmentSoftmax {
    fn execute(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError> {
        dispatch_float::<Self>(request_data, data, execution)
    }
}
