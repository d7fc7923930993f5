use crate::error::ScatterError;
use crate::models;
use crate::scatter::Execution;
use crate::types::TryFromDValue;

use bytes::Bytes;

/// Trait for array elements.
pub trait Element:
    Clone
    + Copy
    + PartialOrd
    + Send
    + Sync
    + num_traits::Bounded
    + num_traits::Zero
    + std::fmt::Debug
    + std::ops::Add<Output = Self>
    + TryFromDValue
    + zerocopy::AsBytes
    + zerocopy::FromBytes
{
}

/// Blanket implementation of Element.
impl<T> Element for T where
    T: Clone
        + Copy
        + PartialOrd
        + Send
        + Sync
        + num_traits::Bounded
        + num_traits::Zero
        + std::fmt::Debug
        + std::ops::Add<Output = Self>
        + TryFromDValue
        + zerocopy::AsBytes
        + zerocopy::FromBytes
{
}

/// Trait for floating point array elements.
///
/// Operations that exponentiate or divide, such as the segment softmax, are only defined for
/// these.
pub trait FloatElement: Element + num_traits::Float {}

/// Blanket implementation of FloatElement.
impl<T> FloatElement for T where T: Element + num_traits::Float {}

/// Trait for scatter operations.
///
/// This forms the contract between the request layer and operations.
pub trait Operation {
    /// Execute the operation.
    ///
    /// Returns a [models::Response](crate::models::Response) object with response data.
    ///
    /// # Arguments
    ///
    /// * `request_data`: RequestData object for the request
    /// * `data`: Bytes containing the source array.
    /// * `execution`: Lane execution strategy
    fn execute(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError>;
}

/// Trait for scatter operations on numerical data of any supported type.
///
/// This trait provides an entry point into the type system based on the runtime `dtype` value.
pub trait NumOperation {
    fn execute_t<T: Element>(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError>;
}

/// Trait for scatter operations that are only defined on floating point data.
///
/// Integer `dtype`s are rejected with [ScatterError::UnsupportedDType].
pub trait FloatOperation {
    /// Name of the operation, used in error messages.
    const NAME: &'static str;

    fn execute_t<T: FloatElement>(
        request_data: &models::RequestData,
        data: &Bytes,
        execution: Execution,
    ) -> Result<models::Response, ScatterError>;
}

/// Dispatch a [NumOperation] based on the request's `dtype`.
pub fn dispatch_num<O: NumOperation>(
    request_data: &models::RequestData,
    data: &Bytes,
    execution: Execution,
) -> Result<models::Response, ScatterError> {
    // Convert runtime data type into concrete types.
    match request_data.dtype {
        models::DType::Int32 => O::execute_t::<i32>(request_data, data, execution),
        models::DType::Int64 => O::execute_t::<i64>(request_data, data, execution),
        models::DType::Uint32 => O::execute_t::<u32>(request_data, data, execution),
        models::DType::Uint64 => O::execute_t::<u64>(request_data, data, execution),
        models::DType::Float32 => O::execute_t::<f32>(request_data, data, execution),
        models::DType::Float64 => O::execute_t::<f64>(request_data, data, execution),
    }
}

/// Dispatch a [FloatOperation] based on the request's `dtype`.
pub fn dispatch_float<O: FloatOperation>(
    request_data: &models::RequestData,
    data: &Bytes,
    execution: Execution,
) -> Result<models::Response, ScatterError> {
    match request_data.dtype {
        models::DType::Float32 => O::execute_t::<f32>(request_data, data, execution),
        models::DType::Float64 => O::execute_t::<f64>(request_data, data, execution),
        dtype => Err(ScatterError::UnsupportedDType {
            operation: O::NAME,
            dtype: dtype.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils;

    struct TestOp {}

    impl Operation for TestOp {
        fn execute(
            request_data: &models::RequestData,
            data: &Bytes,
            _execution: Execution,
        ) -> Result<models::Response, ScatterError> {
            // Clone request body into response body.
            Ok(models::Response::new(
                data.clone(),
                request_data.dtype,
                vec![3],
                None,
            ))
        }
    }

    #[test]
    fn operation_u32() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.dtype = models::DType::Uint32;
        let data = [1, 2, 3, 4];
        let bytes = Bytes::copy_from_slice(&data);
        let response = TestOp::execute(&request_data, &bytes, Execution::Serial).unwrap();
        assert_eq!(&[1, 2, 3, 4][..], response.body);
        assert_eq!(models::DType::Uint32, response.dtype);
        assert_eq!(vec![3], response.shape);
        assert_eq!(None, response.argmax);
    }

    struct TestNumOp {}

    impl NumOperation for TestNumOp {
        fn execute_t<T: Element>(
            request_data: &models::RequestData,
            _data: &Bytes,
            _execution: Execution,
        ) -> Result<models::Response, ScatterError> {
            // Write the name of the type parameter to the body.
            let body = std::any::type_name::<T>();
            Ok(models::Response::new(
                body.into(),
                request_data.dtype,
                vec![1, 2],
                None,
            ))
        }
    }

    #[test]
    fn num_operation_i64() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.dtype = models::DType::Int64;
        let bytes = Bytes::copy_from_slice(&[1, 2, 3, 4]);
        let response =
            dispatch_num::<TestNumOp>(&request_data, &bytes, Execution::Serial).unwrap();
        assert_eq!("i64", response.body);
        assert_eq!(models::DType::Int64, response.dtype);
        assert_eq!(vec![1, 2], response.shape);
    }

    struct TestFloatOp {}

    impl FloatOperation for TestFloatOp {
        const NAME: &'static str = "test";

        fn execute_t<T: FloatElement>(
            request_data: &models::RequestData,
            _data: &Bytes,
            _execution: Execution,
        ) -> Result<models::Response, ScatterError> {
            let body = std::any::type_name::<T>();
            Ok(models::Response::new(
                body.into(),
                request_data.dtype,
                vec![],
                None,
            ))
        }
    }

    #[test]
    fn float_operation_f32() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.dtype = models::DType::Float32;
        let bytes = Bytes::new();
        let response =
            dispatch_float::<TestFloatOp>(&request_data, &bytes, Execution::Serial).unwrap();
        assert_eq!("f32", response.body);
    }

    #[test]
    fn float_operation_rejects_integers() {
        let request_data = test_utils::get_test_request_data();
        let bytes = Bytes::new();
        match dispatch_float::<TestFloatOp>(&request_data, &bytes, Execution::Serial) {
            Err(ScatterError::UnsupportedDType { operation, dtype }) => {
                assert_eq!("test", operation);
                assert_eq!("int32", dtype);
            }
            _ => panic!("expected unsupported dtype"),
        }
    }
}
