//! Data types and associated functions and methods

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use validator::{Validate, ValidationError};

use crate::types::{DValue, TryFromDValue};

/// Supported numerical data types
#[derive(Clone, Copy, Debug, Deserialize, Display, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    /// [i32]
    Int32,
    /// [i64]
    Int64,
    /// [u32]
    Uint32,
    /// [u64]
    Uint64,
    /// [f32]
    Float32,
    /// [f64]
    Float64,
}

impl DType {
    /// Returns the size of the associated type in bytes.
    pub fn size_of(self) -> usize {
        match self {
            Self::Int32 => std::mem::size_of::<i32>(),
            Self::Int64 => std::mem::size_of::<i64>(),
            Self::Uint32 => std::mem::size_of::<u32>(),
            Self::Uint64 => std::mem::size_of::<u64>(),
            Self::Float32 => std::mem::size_of::<f32>(),
            Self::Float64 => std::mem::size_of::<f64>(),
        }
    }
}

/// The last axis, following NumPy and PyTorch.
fn default_axis() -> isize {
    -1
}

/// Request data for operations
///
/// The source array itself is not part of the request. It is supplied separately as raw,
/// native-endian bytes.
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_request_data"))]
pub struct RequestData {
    /// Data type of the source array
    pub dtype: DType,
    /// Shape of the source array. Defaults to 1D.
    #[validate(length(min = 1, message = "shape length must be greater than 0"))]
    pub shape: Option<Vec<usize>>,
    /// Reduction axis. Negative values count from the last axis.
    #[serde(default = "default_axis")]
    pub axis: isize,
    /// Destination index of each source element, flattened in row-major order
    #[validate(custom = "validate_index")]
    pub index: Vec<i64>,
    /// Shape of the index array. Defaults to 1D, broadcast over the non-reduction axes.
    #[validate(length(min = 1, message = "index_shape length must be greater than 0"))]
    pub index_shape: Option<Vec<usize>>,
    /// Extent of the destination along the reduction axis
    pub dim_size: Option<usize>,
    /// Initial value of destination slots
    pub fill_value: Option<DValue>,
}

impl RequestData {
    /// Rank of the source array.
    pub fn rank(&self) -> usize {
        self.shape.as_ref().map_or(1, |shape| shape.len())
    }

    /// Shape of the index array.
    pub fn index_shape(&self) -> Vec<usize> {
        self.index_shape
            .clone()
            .unwrap_or_else(|| vec![self.index.len()])
    }
}

/// Validate index values
fn validate_index(index: &[i64]) -> Result<(), ValidationError> {
    if let Some(value) = index.iter().find(|value| **value < 0) {
        let mut error = ValidationError::new("index values must not be negative");
        error.add_param("value".into(), value);
        return Err(error);
    }
    Ok(())
}

/// Validate that the reduction axis exists for a source of the given rank
fn validate_axis(axis: isize, rank: usize) -> Result<(), ValidationError> {
    let rank_isize = isize::try_from(rank).unwrap_or(isize::MAX);
    if axis >= rank_isize || axis < -rank_isize {
        let mut error = ValidationError::new("axis is out of range for the source shape");
        error.add_param("axis".into(), &axis);
        error.add_param("rank".into(), &rank);
        return Err(error);
    }
    Ok(())
}

/// Validate that an index shape is consistent with the index values and the source rank
fn validate_index_shape(
    index_shape: &[usize],
    index_len: usize,
    rank: usize,
) -> Result<(), ValidationError> {
    if index_shape.len() != 1 && index_shape.len() != rank {
        let mut error =
            ValidationError::new("index_shape must be 1D or have the same rank as shape");
        error.add_param("index_shape".into(), &index_shape.len());
        error.add_param("shape".into(), &rank);
        return Err(error);
    }
    let expected = index_shape.iter().product::<usize>();
    if expected != index_len {
        let mut error =
            ValidationError::new("Index length must be equal to the product of index_shape");
        error.add_param("index length".into(), &index_len);
        error.add_param("expected length".into(), &expected);
        return Err(error);
    }
    Ok(())
}

/// Validate that a fill value can be represented in the data type
fn validate_fill_value(fill_value: &DValue, dtype: DType) -> Result<(), ValidationError> {
    let value = fill_value.clone();
    let result = match dtype {
        DType::Int32 => i32::try_from_dvalue(value).map(|_| ()),
        DType::Int64 => i64::try_from_dvalue(value).map(|_| ()),
        DType::Uint32 => u32::try_from_dvalue(value).map(|_| ()),
        DType::Uint64 => u64::try_from_dvalue(value).map(|_| ()),
        DType::Float32 => f32::try_from_dvalue(value).map(|_| ()),
        DType::Float64 => f64::try_from_dvalue(value).map(|_| ()),
    };
    result.map_err(|err| {
        let mut error = ValidationError::new("fill_value is not valid for dtype");
        error.add_param("error".into(), &err.to_string());
        error
    })
}

/// Validate raw data size against data type and shape.
///
/// # Arguments
///
/// * `raw_size`: Raw size of the data in bytes.
/// * `dtype`: Data type
/// * `shape`: Optional shape of the multi-dimensional array
pub fn validate_raw_size(
    raw_size: usize,
    dtype: DType,
    shape: &Option<Vec<usize>>,
) -> Result<(), ValidationError> {
    let dtype_size = dtype.size_of();
    if let Some(shape) = shape {
        let expected_size = shape.iter().product::<usize>() * dtype_size;
        if raw_size != expected_size {
            let mut error =
                ValidationError::new("Raw data size must be equal to the product of shape indices and dtype size in bytes");
            error.add_param("raw size".into(), &raw_size);
            error.add_param("dtype size".into(), &dtype_size);
            error.add_param("expected size".into(), &expected_size);
            return Err(error);
        }
    } else if raw_size % dtype_size != 0 {
        let mut error =
            ValidationError::new("Raw data size must be a multiple of dtype size in bytes");
        error.add_param("raw size".into(), &raw_size);
        error.add_param("dtype size".into(), &dtype_size);
        return Err(error);
    }
    Ok(())
}

/// Validate request data
fn validate_request_data(request_data: &RequestData) -> Result<(), ValidationError> {
    // Validation of multiple fields in RequestData.
    let rank = request_data.rank();
    validate_axis(request_data.axis, rank)?;
    if let Some(index_shape) = &request_data.index_shape {
        validate_index_shape(index_shape, request_data.index.len(), rank)?;
    }
    if let Some(fill_value) = &request_data.fill_value {
        validate_fill_value(fill_value, request_data.dtype)?;
    }
    Ok(())
}

/// Response containing the result of a computation and associated metadata.
pub struct Response {
    /// Response data, a native-endian multi-dimensional array.
    pub body: Bytes,
    /// Data type of the response
    pub dtype: DType,
    /// Shape of the response
    pub shape: Vec<usize>,
    /// Position along the reduction axis of each slot's maximum, for max reductions
    pub argmax: Option<Vec<i64>>,
}

impl Response {
    /// Return a Response object
    pub fn new(body: Bytes, dtype: DType, shape: Vec<usize>, argmax: Option<Vec<i64>>) -> Response {
        Response {
            body,
            dtype,
            shape,
            argmax,
        }
    }

    /// Return the metadata describing the body.
    pub fn header(&self) -> ResponseHeader<'_> {
        ResponseHeader {
            dtype: self.dtype,
            shape: &self.shape,
            argmax: self.argmax.as_deref(),
        }
    }
}

/// Serialisable metadata of a [Response].
#[derive(Debug, PartialEq, Serialize)]
pub struct ResponseHeader<'a> {
    /// Data type of the body
    pub dtype: DType,
    /// Shape of the body
    pub shape: &'a [usize],
    /// Argmax for max reductions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argmax: Option<&'a [i64]>,
}
