//! Runs an operation described by command line arguments.

use crate::cli::{CommandLineArgs, OperationKind};
use crate::error::ScatterError;
use crate::models;
use crate::operation::Operation;
use crate::operations;
use crate::scatter::Execution;
use crate::source;

use bytes::Bytes;
use tracing::{event, Level};

/// Execute an operation, selected at runtime.
///
/// # Arguments
///
/// * `operation`: Operation to execute
/// * `request_data`: RequestData object for the request
/// * `data`: Bytes containing the source array
/// * `execution`: Lane execution strategy
#[tracing::instrument(level = "DEBUG", skip(request_data, data))]
pub fn execute(
    operation: OperationKind,
    request_data: &models::RequestData,
    data: &Bytes,
    execution: Execution,
) -> Result<models::Response, ScatterError> {
    match operation {
        OperationKind::Add => operations::ScatterAdd::execute(request_data, data, execution),
        OperationKind::Max => operations::ScatterMax::execute(request_data, data, execution),
        OperationKind::Gather => operations::Gather::execute(request_data, data, execution),
        OperationKind::Softmax => {
            operations::SegmentSoftmax::execute(request_data, data, execution)
        }
    }
}

/// Load the request and source, execute the operation, and store the result.
///
/// Returns the response, whose body has been written to the output file if one was given.
pub fn run(args: &CommandLineArgs) -> Result<models::Response, ScatterError> {
    let request_path = source::expand_path(&args.request)?;
    let source_path = source::expand_path(&args.source)?;
    let request_data = source::read_request(&request_path)?;
    let data = source::read_source(&source_path)?;

    let execution = if args.use_rayon {
        event!(
            Level::DEBUG,
            "using Rayon with {} threads",
            rayon::current_num_threads()
        );
        Execution::Rayon
    } else {
        Execution::Serial
    };

    let response = execute(args.operation, &request_data, &data, execution)?;
    event!(
        Level::INFO,
        "{} produced {:?} {} array",
        args.operation,
        response.shape,
        response.dtype
    );
    if let Some(output) = &args.output {
        source::write_output(&source::expand_path(output)?, &response.body)?;
    }
    Ok(response)
}

/// Render the response header as JSON.
pub fn header_json(response: &models::Response, pretty: bool) -> Result<String, ScatterError> {
    let header = response.header();
    let json = if pretty {
        serde_json::to_string_pretty(&header)?
    } else {
        serde_json::to_string(&header)?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils;

    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scatter-reduce-app-{}-{}", std::process::id(), name))
    }

    fn args(operation: OperationKind, name: &str, request: &str, data: &Bytes) -> CommandLineArgs {
        let request_path = temp_path(&format!("{}.json", name));
        let source_path = temp_path(&format!("{}.bin", name));
        std::fs::write(&request_path, request).unwrap();
        std::fs::write(&source_path, data).unwrap();
        CommandLineArgs {
            operation,
            request: request_path.display().to_string(),
            source: source_path.display().to_string(),
            output: Some(temp_path(&format!("{}.out", name)).display().to_string()),
            use_rayon: false,
            pretty: false,
        }
    }

    fn cleanup(args: &CommandLineArgs) {
        for path in [&args.request, &args.source] {
            let _ = std::fs::remove_file(path);
        }
        if let Some(output) = &args.output {
            let _ = std::fs::remove_file(output);
        }
    }

    #[test]
    fn run_max() {
        let data = test_utils::aligned_bytes(&[2_i32, 0, 1, 4, 3]);
        let args = args(
            OperationKind::Max,
            "max",
            r#"{"dtype": "int32", "index": [4, 5, 4, 2, 3]}"#,
            &data,
        );
        let response = run(&args).unwrap();
        let output = std::fs::read(args.output.as_ref().unwrap()).unwrap();
        cleanup(&args);
        assert_eq!(response.body, output);
        assert_eq!(
            r#"{"dtype":"int32","shape":[6],"argmax":[-1,-1,3,4,0,1]}"#,
            header_json(&response, false).unwrap()
        );
    }

    #[test]
    fn run_add_rayon() {
        let data = test_utils::aligned_bytes(&[1.0_f64, 2.0, 3.0, 4.0]);
        let mut args = args(
            OperationKind::Add,
            "add",
            r#"{"dtype": "float64", "shape": [2, 2], "axis": 0, "index": [0, 0]}"#,
            &data,
        );
        args.use_rayon = true;
        let response = run(&args).unwrap();
        cleanup(&args);
        assert_eq!(test_utils::aligned_bytes(&[4.0_f64, 6.0]), response.body);
        assert_eq!(vec![1, 2], response.shape);
    }

    #[test]
    fn run_invalid_request() {
        let data = test_utils::aligned_bytes(&[2_i32, 0, 1, 4, 3]);
        let args = args(
            OperationKind::Add,
            "invalid",
            r#"{"dtype": "int32", "index": [4, 5, 4, 2, 3], "axis": 1}"#,
            &data,
        );
        let result = run(&args);
        cleanup(&args);
        match result {
            Err(ScatterError::RequestDataValidation(_)) => (),
            _ => panic!("expected validation error"),
        }
    }
}
