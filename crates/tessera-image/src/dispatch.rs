//! Run-time selection of a generic routine by sample type.
//!
//! A generic routine is written once as a visitor, e.g. a `struct` implementing
//! [`RealVisitor`], whose `visit::<T>()` method instantiates the routine for sample type `T`.
//! The `dispatch_*` functions match the run-time [`DataType`] tag against the type group and
//! call the matching instantiation. A tag outside the group fails with
//! [`ImageError::DataTypeNotSupported`].
//!
//! ```
//! use tessera_image::dispatch::{dispatch_real, RealVisitor};
//! use tessera_image::{DataType, RealSample, Sample};
//!
//! struct Highest;
//!
//! impl RealVisitor for Highest {
//!     type Output = f64;
//!     fn visit<T: RealSample>(self) -> f64 {
//!         T::highest().as_f64()
//!     }
//! }
//!
//! assert_eq!(dispatch_real(DataType::UInt8, Highest).unwrap(), 255.0);
//! assert!(dispatch_real(DataType::SComplex, Highest).is_err());
//! ```

use num_complex::{Complex32, Complex64};

use crate::data_type::DataType;
use crate::error::ImageError;
use crate::sample::{
    Bin, BinarySample, ComplexSample, FlexSample, FloatSample, IntegerSample, NonBinarySample,
    NonComplexSample, RealSample, Sample, SignedSample, UnsignedSample,
};

/// A routine generic over every sample type.
pub trait AllVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: Sample>(self) -> Self::Output;
}

/// A routine generic over integer and floating-point sample types.
pub trait RealVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: RealSample>(self) -> Self::Output;
}

/// A routine generic over floating-point sample types.
pub trait FloatVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: FloatSample>(self) -> Self::Output;
}

/// A routine generic over signed sample types (signed integers, floats and complex).
pub trait SignedVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: SignedSample>(self) -> Self::Output;
}

/// A routine generic over binary and unsigned integer sample types.
pub trait UnsignedVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: UnsignedSample>(self) -> Self::Output;
}

/// A routine generic over integer sample types.
pub trait IntegerVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: IntegerSample>(self) -> Self::Output;
}

/// A routine generic over binary, integer and floating-point sample types.
pub trait NonComplexVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: NonComplexSample>(self) -> Self::Output;
}

/// A routine generic over every sample type except binary.
pub trait NonBinaryVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: NonBinarySample>(self) -> Self::Output;
}

/// A routine generic over complex sample types.
pub trait ComplexVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: ComplexSample>(self) -> Self::Output;
}

/// A routine for the binary sample type.
pub trait BinaryVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: BinarySample>(self) -> Self::Output;
}

/// A routine generic over floating-point and complex sample types.
pub trait FlexVisitor {
    /// The value produced by the routine.
    type Output;
    /// Runs the routine for sample type `T`.
    fn visit<T: FlexSample>(self) -> Self::Output;
}

/// Dispatches over every sample type. Never fails.
pub fn dispatch_all<V: AllVisitor>(data_type: DataType, visitor: V) -> V::Output {
    match data_type {
        DataType::Bin => visitor.visit::<Bin>(),
        DataType::UInt8 => visitor.visit::<u8>(),
        DataType::SInt8 => visitor.visit::<i8>(),
        DataType::UInt16 => visitor.visit::<u16>(),
        DataType::SInt16 => visitor.visit::<i16>(),
        DataType::UInt32 => visitor.visit::<u32>(),
        DataType::SInt32 => visitor.visit::<i32>(),
        DataType::SFloat => visitor.visit::<f32>(),
        DataType::DFloat => visitor.visit::<f64>(),
        DataType::SComplex => visitor.visit::<Complex32>(),
        DataType::DComplex => visitor.visit::<Complex64>(),
    }
}

/// Dispatches over integer and floating-point sample types.
pub fn dispatch_real<V: RealVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::UInt8 => visitor.visit::<u8>(),
        DataType::SInt8 => visitor.visit::<i8>(),
        DataType::UInt16 => visitor.visit::<u16>(),
        DataType::SInt16 => visitor.visit::<i16>(),
        DataType::UInt32 => visitor.visit::<u32>(),
        DataType::SInt32 => visitor.visit::<i32>(),
        DataType::SFloat => visitor.visit::<f32>(),
        DataType::DFloat => visitor.visit::<f64>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}

/// Dispatches over floating-point sample types.
pub fn dispatch_float<V: FloatVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::SFloat => visitor.visit::<f32>(),
        DataType::DFloat => visitor.visit::<f64>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}

/// Dispatches over signed integer, floating-point and complex sample types.
pub fn dispatch_signed<V: SignedVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::SInt8 => visitor.visit::<i8>(),
        DataType::SInt16 => visitor.visit::<i16>(),
        DataType::SInt32 => visitor.visit::<i32>(),
        DataType::SFloat => visitor.visit::<f32>(),
        DataType::DFloat => visitor.visit::<f64>(),
        DataType::SComplex => visitor.visit::<Complex32>(),
        DataType::DComplex => visitor.visit::<Complex64>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}

/// Dispatches over binary and unsigned integer sample types.
pub fn dispatch_unsigned<V: UnsignedVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::Bin => visitor.visit::<Bin>(),
        DataType::UInt8 => visitor.visit::<u8>(),
        DataType::UInt16 => visitor.visit::<u16>(),
        DataType::UInt32 => visitor.visit::<u32>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}

/// Dispatches over integer sample types.
pub fn dispatch_integer<V: IntegerVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::UInt8 => visitor.visit::<u8>(),
        DataType::SInt8 => visitor.visit::<i8>(),
        DataType::UInt16 => visitor.visit::<u16>(),
        DataType::SInt16 => visitor.visit::<i16>(),
        DataType::UInt32 => visitor.visit::<u32>(),
        DataType::SInt32 => visitor.visit::<i32>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}

/// Dispatches over binary, integer and floating-point sample types.
pub fn dispatch_non_complex<V: NonComplexVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::Bin => visitor.visit::<Bin>(),
        DataType::UInt8 => visitor.visit::<u8>(),
        DataType::SInt8 => visitor.visit::<i8>(),
        DataType::UInt16 => visitor.visit::<u16>(),
        DataType::SInt16 => visitor.visit::<i16>(),
        DataType::UInt32 => visitor.visit::<u32>(),
        DataType::SInt32 => visitor.visit::<i32>(),
        DataType::SFloat => visitor.visit::<f32>(),
        DataType::DFloat => visitor.visit::<f64>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}

/// Dispatches over every sample type except binary.
pub fn dispatch_non_binary<V: NonBinaryVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::UInt8 => visitor.visit::<u8>(),
        DataType::SInt8 => visitor.visit::<i8>(),
        DataType::UInt16 => visitor.visit::<u16>(),
        DataType::SInt16 => visitor.visit::<i16>(),
        DataType::UInt32 => visitor.visit::<u32>(),
        DataType::SInt32 => visitor.visit::<i32>(),
        DataType::SFloat => visitor.visit::<f32>(),
        DataType::DFloat => visitor.visit::<f64>(),
        DataType::SComplex => visitor.visit::<Complex32>(),
        DataType::DComplex => visitor.visit::<Complex64>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}

/// Dispatches over complex sample types.
pub fn dispatch_complex<V: ComplexVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::SComplex => visitor.visit::<Complex32>(),
        DataType::DComplex => visitor.visit::<Complex64>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}

/// Dispatches to the binary sample type.
pub fn dispatch_binary<V: BinaryVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    match data_type {
        DataType::Bin => Ok(visitor.visit::<Bin>()),
        other => Err(ImageError::DataTypeNotSupported(other)),
    }
}

/// Dispatches over floating-point and complex sample types.
pub fn dispatch_flex<V: FlexVisitor>(
    data_type: DataType,
    visitor: V,
) -> Result<V::Output, ImageError> {
    Ok(match data_type {
        DataType::SFloat => visitor.visit::<f32>(),
        DataType::DFloat => visitor.visit::<f64>(),
        DataType::SComplex => visitor.visit::<Complex32>(),
        DataType::DComplex => visitor.visit::<Complex64>(),
        other => return Err(ImageError::DataTypeNotSupported(other)),
    })
}
