//! Functions and utilities for working with [ndarray] objects.

use crate::error::ScatterError;
use crate::models;

use bytes::Bytes;
use ndarray::prelude::*;
use ndarray::IxDyn;
// Bring trait into scope to use as_bytes method.
use zerocopy::AsBytes;

/// Convert from Bytes to `&[T]`.
///
/// Zerocopy provides a mechanism for converting between types.
/// Correct alignment of the data is necessary.
///
/// # Arguments
///
/// * `data`: Bytes containing data to convert.
fn from_bytes<T: zerocopy::FromBytes>(data: &Bytes) -> Result<&[T], ScatterError> {
    // An empty Bytes may point at a static with no particular alignment.
    if data.is_empty() {
        return Ok(&[]);
    }
    let layout = zerocopy::LayoutVerified::<_, [T]>::new_slice(&data[..]).ok_or(
        ScatterError::FromBytes {
            type_name: std::any::type_name::<T>(),
        },
    )?;
    Ok(layout.into_slice())
}

/// Returns the shape of the source array in the request.
///
/// # Arguments
///
/// * `size`: Number of elements in the array
/// * `request_data`: RequestData object for the request
fn get_shape(size: usize, request_data: &models::RequestData) -> IxDyn {
    // Use the provided shape, or fall back to a 1D array.
    let shape = request_data.shape.clone().unwrap_or(vec![size]);
    IxDyn(&shape)
}

/// Build an [ndarray::ArrayView](ndarray::ArrayView) object over the source data.
///
/// The resulting array will contain a reference to `data`; no copying takes place.
///
/// # Arguments
///
/// * `request_data`: RequestData object for the request
/// * `data`: Bytes containing data for the array. Must be at least as aligned as an instance of
///   `T`.
pub fn build_array<'a, T>(
    request_data: &models::RequestData,
    data: &'a Bytes,
) -> Result<ArrayViewD<'a, T>, ScatterError>
where
    T: zerocopy::FromBytes,
{
    models::validate_raw_size(data.len(), request_data.dtype, &request_data.shape)?;
    let data = from_bytes::<T>(data)?;
    let shape = get_shape(data.len(), request_data);
    ArrayView::from_shape(shape, data).map_err(ScatterError::ShapeInvalid)
}

/// Build an [ndarray::ArrayView](ndarray::ArrayView) object over the request's index values.
pub fn build_index(request_data: &models::RequestData) -> Result<ArrayViewD<'_, i64>, ScatterError> {
    let shape = IxDyn(&request_data.index_shape());
    ArrayView::from_shape(shape, &request_data.index[..]).map_err(ScatterError::ShapeInvalid)
}

/// Copy an array into native-endian bytes in row-major order.
pub fn to_bytes<T: zerocopy::AsBytes + Copy>(array: &ArrayD<T>) -> Bytes {
    // Avoid a copy for arrays that are already contiguous.
    match array.as_slice() {
        Some(values) => Bytes::copy_from_slice(values.as_bytes()),
        None => {
            let values = array.iter().copied().collect::<Vec<T>>();
            Bytes::copy_from_slice(values.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils;

    #[test]
    fn from_bytes_u32() {
        assert_eq!(
            [0x04030201_u32],
            from_bytes::<u32>(&test_utils::aligned_bytes(&[1_u8, 2, 3, 4])).unwrap()
        );
    }

    #[test]
    fn from_bytes_i64() {
        assert_eq!(
            [0x0807060504030201_i64],
            from_bytes::<i64>(&test_utils::aligned_bytes(&[1_u8, 2, 3, 4, 5, 6, 7, 8])).unwrap()
        );
    }

    #[test]
    fn from_bytes_f64() {
        let bytes = test_utils::aligned_bytes(&[1.5_f64, -2.0]);
        assert_eq!([1.5, -2.0], from_bytes::<f64>(&bytes).unwrap());
    }

    #[test]
    fn from_bytes_empty() {
        assert!(from_bytes::<f64>(&Bytes::new()).unwrap().is_empty());
    }

    fn assert_from_bytes_error<T: std::fmt::Debug>(result: Result<T, ScatterError>) {
        match result.unwrap_err() {
            ScatterError::FromBytes { type_name: _ } => (),
            _ => panic!("expected from_bytes to fail"),
        };
    }

    #[test]
    fn from_bytes_u32_too_small() {
        assert_from_bytes_error(from_bytes::<u32>(&test_utils::aligned_bytes(&[1_u8, 2, 3])))
    }

    #[test]
    fn from_bytes_u32_unaligned() {
        let bytes = test_utils::aligned_bytes(&[1_u8, 2, 3, 4, 5]);
        assert_from_bytes_error(from_bytes::<u32>(&bytes.slice(1..)))
    }

    #[test]
    fn get_shape_without_shape() {
        let request_data = test_utils::get_test_request_data();
        assert_eq!(IxDyn(&[42]), get_shape(42, &request_data));
    }

    #[test]
    fn get_shape_with_shape() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.shape = Some(vec![1, 2, 3]);
        assert_eq!(IxDyn(&[1, 2, 3]), get_shape(42, &request_data));
    }

    #[test]
    fn build_array_1d() {
        let request_data = test_utils::get_test_request_data();
        let bytes = test_utils::aligned_bytes(&[2_i32, 0, 1, 4, 3]);
        let array = build_array::<i32>(&request_data, &bytes).unwrap();
        assert_eq!(array![2, 0, 1, 4, 3].into_dyn(), array);
    }

    #[test]
    fn build_array_2d() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.dtype = models::DType::Float32;
        request_data.shape = Some(vec![2, 3]);
        let bytes = test_utils::aligned_bytes(&[1.0_f32, 2.1, 3.2, 4.3, 5.4, 6.5]);
        let array = build_array::<f32>(&request_data, &bytes).unwrap();
        assert_eq!(array![[1.0, 2.1, 3.2], [4.3, 5.4, 6.5]].into_dyn(), array);
    }

    #[test]
    fn build_array_empty() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.shape = Some(vec![2, 0]);
        let bytes = Bytes::new();
        let array = build_array::<i32>(&request_data, &bytes).unwrap();
        assert_eq!(&[2, 0], array.shape());
    }

    #[test]
    fn build_array_size_mismatch() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.shape = Some(vec![4]);
        let bytes = test_utils::aligned_bytes(&[1_i32, 2, 3]);
        match build_array::<i32>(&request_data, &bytes).unwrap_err() {
            ScatterError::RequestDataValidationSingle(_) => (),
            err => panic!("unexpected error {:?}", err),
        }
    }

    #[test]
    fn build_index_1d() {
        let request_data = test_utils::get_test_request_data();
        let index = build_index(&request_data).unwrap();
        assert_eq!(array![4_i64, 5, 4, 2, 3].into_dyn(), index);
    }

    #[test]
    fn build_index_2d() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.index = vec![4, 5, 4, 2, 3, 0, 0, 2, 2, 1];
        request_data.index_shape = Some(vec![2, 5]);
        let index = build_index(&request_data).unwrap();
        assert_eq!(
            array![[4_i64, 5, 4, 2, 3], [0, 0, 2, 2, 1]].into_dyn(),
            index
        );
    }

    #[test]
    fn to_bytes_2d() {
        let array = array![[1_i32, 2], [3, 4]].into_dyn();
        assert_eq!(test_utils::aligned_bytes(&[1_i32, 2, 3, 4]), to_bytes(&array));
    }

    #[test]
    fn to_bytes_transposed() {
        let array = array![[1_i32, 2], [3, 4]].reversed_axes().into_dyn();
        assert_eq!(test_utils::aligned_bytes(&[1_i32, 3, 2, 4]), to_bytes(&array));
    }
}
