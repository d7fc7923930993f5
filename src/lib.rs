//! This crate provides segment (scatter) reductions over n-dimensional arrays. Each element of a
//! source array is routed by an index array to a slot of a destination array, and the elements
//! landing in the same slot are combined by sum or by maximum. These are the aggregation
//! primitives behind message passing in graph neural networks.
//!
//! Alongside the forward reductions, the crate provides:
//!
//! * Backward passes for the differentiable operations, in the [autograd] module.
//! * Gather (index select) along an axis, the counterpart of a scatter.
//! * Softmax over the groups of an index, used to normalise attention scores.
//! * A typed request layer and command line front end operating on raw binary arrays.
//!
//! The crate is built on top of a number of open source components.
//!
//! * [ndarray] provides [NumPy](https://numpy.org)-like n-dimensional arrays used in numerical
//!   computation. Reductions run over independent lanes, optionally in parallel with
//!   [Rayon](rayon).
//! * [Serde](serde) performs (de)serialisation of JSON request and response data, and
//!   [validator] checks requests before they reach an operation.
//! * [zerocopy] reinterprets raw source bytes as typed slices without copying.
//! * [clap] parses command line arguments.

pub mod app;
pub mod array;
pub mod autograd;
pub mod cli;
pub mod error;
pub mod models;
pub mod operation;
pub mod operations;
pub mod scatter;
pub mod softmax;
pub mod source;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod types;
