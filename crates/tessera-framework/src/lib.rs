#![deny(missing_docs)]
//! Execution frameworks over n-dimensional images.
//!
//! A framework owns the iteration, the type conversion, singleton expansion and the
//! threading, and calls a line filter for every image line. Operators only write the filter.

/// boundary conditions and line expansion.
pub mod boundary;

/// typed access to image lines and staging buffers.
pub mod line;

/// line filters for scalar functions.
pub mod monadic;

/// the Projection framework.
pub mod projection;

/// the Scan framework.
pub mod scan;

/// the Separable framework.
pub mod separable;

/// the process-wide thread count and worker pool.
pub mod threads;

pub use crate::boundary::{
    array_use_parameter, boundary_array_use_parameter, expand_buffer, BoundaryCondition,
};
pub use crate::line::{ConstLine, LineBuffer, MutLine};
pub use crate::monadic::{
    new_dyadic_scan_line_filter, new_monadic_scan_line_filter, new_variadic_scan_line_filter,
};
pub use crate::projection::{projection, ProjectionFunction, ProjectionOptions, SampleSlot};
pub use crate::scan::{
    scan, scan_dyadic, scan_monadic, scan_single_input, scan_single_output, ScanLineFilter,
    ScanLineFilterParameters, ScanOptions,
};
pub use crate::separable::{
    separable, SeparableBuffer, SeparableLineFilter, SeparableLineFilterParameters,
    SeparableOptions,
};
pub use crate::threads::{get_number_of_threads, set_number_of_threads, PerThread};
