//! Loading requests and source data from files, and storing results.

use crate::error::ScatterError;
use crate::models::RequestData;

use std::path::{Path, PathBuf};

use bytes::Bytes;
use expanduser::expanduser;
use tracing::{event, Level};
use validator::Validate;

fn io_error(path: &Path, source: std::io::Error) -> ScatterError {
    ScatterError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Expand a leading `~` in a path to the user's home directory.
pub fn expand_path(path: &str) -> Result<PathBuf, ScatterError> {
    expanduser(path).map_err(|source| ScatterError::Io {
        path: path.to_string(),
        source,
    })
}

/// Read and validate a JSON request.
pub fn read_request(path: &Path) -> Result<RequestData, ScatterError> {
    let json = std::fs::read_to_string(path).map_err(|err| io_error(path, err))?;
    let request_data = serde_json::from_str::<RequestData>(&json)?;
    request_data.validate()?;
    Ok(request_data)
}

/// Read raw source data.
///
/// Operations reinterpret the data as a slice of the request's dtype without copying, so it is
/// returned in an 8-byte aligned buffer.
pub fn read_source(path: &Path) -> Result<Bytes, ScatterError> {
    let data = std::fs::read(path).map_err(|err| io_error(path, err))?;
    // For now we're hard-coding an alignment of 8 bytes, which suits all supported dtypes.
    let mut buf = maligned::align_first::<u8, maligned::A8>(data.len());
    buf.extend_from_slice(&data);
    event!(
        Level::DEBUG,
        "read {} bytes of source data from {}",
        buf.len(),
        path.display()
    );
    Ok(buf.into())
}

/// Write a response body.
pub fn write_output(path: &Path, body: &Bytes) -> Result<(), ScatterError> {
    std::fs::write(path, body).map_err(|err| io_error(path, err))
}
