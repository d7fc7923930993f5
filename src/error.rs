//! Error handling.

use ndarray::ShapeError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tracing::{event, Level};

use crate::types::DValue;

/// Scatter reduction error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant is classified as either invalid input or an internal error by
/// [ErrorResponse](crate::error::ErrorResponse).
#[derive(Debug, Error)]
pub enum ScatterError {
    /// Destination size cannot be inferred from an empty input
    #[error("cannot infer destination size for {operation} on empty input, dim_size is required")]
    AmbiguousDimSize { operation: &'static str },

    /// Reduction axis does not exist in the source array
    #[error("axis {axis} is out of range for array of rank {rank}")]
    AxisOutOfRange { axis: isize, rank: usize },

    /// Destination array would exceed the maximum array size
    #[error("destination of shape {shape:?} is too large to allocate")]
    DestinationTooLarge { shape: Vec<usize> },

    /// Error converting from bytes to a type
    #[error("failed to convert from bytes to {type_name}")]
    FromBytes { type_name: &'static str },

    /// Incompatible fill value for the data type
    #[error("Incompatible value {0} for fill_value")]
    IncompatibleFillValue(DValue),

    /// An index would address a slot beyond the destination extent
    #[error("index {index} is out of bounds for axis {axis} with size {dim_size}")]
    IndexOutOfBounds {
        index: i64,
        axis: usize,
        dim_size: usize,
    },

    /// Indices must be non-negative
    #[error("negative index {index} is not supported")]
    NegativeIndex { index: i64 },

    /// Error reading or writing a file
    #[error("failed to access {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error deserialising request data into RequestData
    #[error("request data is not valid")]
    RequestDataJson(#[from] serde_json::Error),

    /// Error validating RequestData (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating RequestData (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Array shapes are not compatible
    #[error("{what} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Error creating ndarray ArrayView from Shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// Operation requested on a data type it does not support
    #[error("unsupported operation {operation} for dtype {dtype}")]
    UnsupportedDType {
        operation: &'static str,
        dtype: String,
    },
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    /// Main error message
    pub message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// Classification of an error for reporting purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied invalid arrays or request data
    InvalidInput,
    /// Something went wrong that the caller could not have prevented
    Internal,
}

impl ErrorKind {
    /// Process exit code used by the command line front end.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::InvalidInput => 2,
            Self::Internal => 1,
        }
    }
}

/// A report to emit in error cases
///
/// Implements serde (de)serialise.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// Classification of the error
    #[serde(skip, default = "internal")]
    pub kind: ErrorKind,

    /// Response body
    pub error: ErrorBody,
}

fn internal() -> ErrorKind {
    ErrorKind::Internal
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `kind`: Classification of the error
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(kind: ErrorKind, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            kind,
            error: ErrorBody::new(error),
        }
    }

    /// Return an invalid input ErrorResponse
    fn invalid_input<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(ErrorKind::InvalidInput, error)
    }

    /// Return an internal ErrorResponse
    fn internal<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(ErrorKind::Internal, error)
    }

    /// Render the response as pretty-printed JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|err| format!("Failed to serialise error response: {}", err))
    }
}

impl From<ScatterError> for ErrorResponse {
    /// Convert from a `ScatterError` into an `ErrorResponse`.
    fn from(error: ScatterError) -> Self {
        let response = match &error {
            // Invalid input
            ScatterError::AmbiguousDimSize { operation: _ }
            | ScatterError::AxisOutOfRange { axis: _, rank: _ }
            | ScatterError::DestinationTooLarge { shape: _ }
            | ScatterError::IncompatibleFillValue(_)
            | ScatterError::IndexOutOfBounds {
                index: _,
                axis: _,
                dim_size: _,
            }
            | ScatterError::NegativeIndex { index: _ }
            | ScatterError::Io { path: _, source: _ }
            | ScatterError::RequestDataJson(_)
            | ScatterError::RequestDataValidationSingle(_)
            | ScatterError::RequestDataValidation(_)
            | ScatterError::ShapeMismatch {
                what: _,
                expected: _,
                actual: _,
            }
            | ScatterError::ShapeInvalid(_)
            | ScatterError::UnsupportedDType {
                operation: _,
                dtype: _,
            } => Self::invalid_input(&error),

            // Internal error
            ScatterError::FromBytes { type_name: _ } | ScatterError::TryFromInt(_) => {
                Self::internal(&error)
            }
        };

        // Log internal errors.
        if response.kind == ErrorKind::Internal {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}
