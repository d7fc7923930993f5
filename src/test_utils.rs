use crate::models::*;

// Bring trait into scope to use as_bytes method.
use zerocopy::AsBytes;

/// Create a RequestData object with only required fields set.
pub(crate) fn get_test_request_data() -> RequestData {
    RequestData {
        dtype: DType::Int32,
        shape: None,
        axis: -1,
        index: vec![4, 5, 4, 2, 3],
        index_shape: None,
        dim_size: None,
        fill_value: None,
    }
}

/// Create a RequestData object with all fields set.
pub(crate) fn get_test_request_data_optional() -> RequestData {
    RequestData {
        dtype: DType::Float32,
        shape: Some(vec![2, 5]),
        axis: 1,
        index: vec![4, 5, 4, 2, 3],
        index_shape: Some(vec![5]),
        dim_size: Some(6),
        fill_value: Some((-1).into()),
    }
}

/// Copy a slice of numbers into an 8-byte aligned buffer, as the source loader does.
pub(crate) fn aligned_bytes<T: AsBytes>(values: &[T]) -> bytes::Bytes {
    let data = values.as_bytes();
    let mut buf = maligned::align_first::<u8, maligned::A8>(data.len());
    buf.extend_from_slice(data);
    buf.into()
}
