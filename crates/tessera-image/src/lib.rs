#![deny(missing_docs)]
//! The n-dimensional image data model: sample types, tensor shapes, strided storage and views.

/// memory allocators for image data segments.
pub mod allocator;

/// copying and converting samples between strided buffers.
pub mod copy;

/// the closed set of sample types.
pub mod data_type;

/// run-time selection of generic code by sample type.
pub mod dispatch;

/// Error types for the image module.
pub mod error;

/// the image object and its lifecycle.
pub mod image;

/// line and sample iteration over images.
pub mod iterators;

/// metadata-only transforms, indexing and regular views.
pub mod manip;

/// physical pixel sizes.
pub mod physical;

/// detached pixel values.
pub mod pixel;

/// sample types and saturating casts.
pub mod sample;

/// reference-counted data segments.
pub mod storage;

/// tensor shapes.
pub mod tensor;

/// irregular views through masks and offset lists.
pub mod view;

pub use crate::allocator::{CpuAllocator, ImageAllocator, ImageAllocatorError};
pub use crate::copy::{copy_buffer, fill_buffer, SampleBuffer};
pub use crate::data_type::DataType;
pub use crate::error::ImageError;
pub use crate::image::{normal_strides, AcceptDataTypeChange, Image};
pub use crate::manip::Range;
pub use crate::physical::{PhysicalQuantity, PixelSize};
pub use crate::pixel::Pixel;
pub use crate::sample::{
    clamp_cast, Bin, BinarySample, ComplexSample, FlexSample, FloatSample, IntegerSample,
    NonBinarySample, NonComplexSample, RealSample, Sample, SampleValue, SignedSample,
    UnsignedSample,
};
pub use crate::storage::{DataSegment, ExternalAllocation, ExternalInterface, ReleaseFn};
pub use crate::tensor::{Tensor, TensorShape};
pub use crate::view::{Selection, View};
