//! This file defines the scatter-reduce binary entry point.

use scatter_reduce::app;
use scatter_reduce::cli;
use scatter_reduce::error::ErrorResponse;
use scatter_reduce::tracing;

use std::process::exit;

/// Application entry point
fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    match app::run(&args).and_then(|response| app::header_json(&response, args.pretty)) {
        Ok(header) => println!("{}", header),
        Err(error) => {
            let response = ErrorResponse::from(error);
            eprintln!("{}", response.to_json());
            exit(response.kind.exit_code())
        }
    }
}
