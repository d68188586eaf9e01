#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
/// accumulators for statistics over a stream of values.
pub mod accumulators;

/// image cropping and padding module.
pub mod crop;

/// separable image filtering module.
pub mod filter;

/// point-wise sample mapping module.
pub mod mapping;

/// image comparison metrics module.
pub mod metrics;

/// projections reducing images along dimensions.
pub mod projection;

/// whole-image statistics module.
pub mod statistics;

mod values;
