use std::fmt;

use num_complex::{Complex32, Complex64};
use num_traits::{Float, Num, NumCast, PrimInt};

use crate::data_type::DataType;

/// A binary sample, stored in one byte.
///
/// Any non-zero byte reads as `true`; writing always stores 0 or 1.
#[repr(transparent)]
#[derive(Clone, Copy, Default)]
pub struct Bin(u8);

impl Bin {
    /// The `true` value.
    pub const TRUE: Bin = Bin(1);
    /// The `false` value.
    pub const FALSE: Bin = Bin(0);

    /// Creates a binary sample from a boolean.
    #[inline]
    pub const fn new(v: bool) -> Self {
        Bin(v as u8)
    }

    /// Returns the boolean value of the sample.
    #[inline]
    pub const fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bin {
    fn from(v: bool) -> Self {
        Bin::new(v)
    }
}

impl From<Bin> for bool {
    fn from(v: Bin) -> Self {
        v.is_set()
    }
}

impl PartialEq for Bin {
    fn eq(&self, other: &Self) -> bool {
        self.is_set() == other.is_set()
    }
}

impl PartialOrd for Bin {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.is_set().partial_cmp(&other.is_set())
    }
}

impl std::ops::Not for Bin {
    type Output = Bin;

    fn not(self) -> Bin {
        Bin::new(!self.is_set())
    }
}

impl fmt::Debug for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bin({})", self.is_set())
    }
}

/// A concrete sample type: one of the eleven types enumerated by [`DataType`].
///
/// Conversions between sample types go through `f64` (or `Complex64` when both sides are
/// complex) and saturate at the destination range, see [`clamp_cast`].
pub trait Sample: Copy + Send + Sync + fmt::Debug + Default + PartialEq + 'static {
    /// The data type tag of this sample type.
    const DATA_TYPE: DataType;

    /// The value as `f64`; complex samples yield their real part.
    fn as_f64(self) -> f64;

    /// The value as a double-precision complex number.
    fn as_complex(self) -> Complex64;

    /// Converts from `f64`, rounding to nearest and saturating for integer types.
    fn from_f64(v: f64) -> Self;

    /// Converts from a complex number; real types take the real part.
    fn from_complex(v: Complex64) -> Self {
        Self::from_f64(v.re)
    }

    /// The lowest finite value of the type.
    fn lowest() -> Self;

    /// The highest finite value of the type.
    fn highest() -> Self;

    /// The lower bound of the type, `-inf` for floating-point types.
    fn infimum() -> Self {
        Self::lowest()
    }

    /// The upper bound of the type, `+inf` for floating-point types.
    fn supremum() -> Self {
        Self::highest()
    }

    /// Saturated inversion: `max - v` for unsigned types, saturated negation for signed types,
    /// logical negation for binary.
    fn saturated_inv(self) -> Self;

    /// The modulus of the value.
    fn modulus(self) -> f64 {
        self.as_f64().abs()
    }

    /// True if the value is NaN (floating-point types only).
    fn is_nan_value(self) -> bool {
        false
    }

    /// Wraps the value into the type-erased [`SampleValue`].
    fn into_value(self) -> SampleValue;
}

macro_rules! impl_integer_sample {
    (@common $t:ty, $dt:ident) => {
        impl NonComplexSample for $t {}
        impl NonBinarySample for $t {}
        impl RealSample for $t {}
        impl IntegerSample for $t {}
    };
    ($t:ty, $dt:ident, unsigned) => {
        impl_integer_sample!(@common $t, $dt);

        impl Sample for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn as_complex(self) -> Complex64 {
                Complex64::new(self as f64, 0.0)
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                if v.is_nan() {
                    0
                } else {
                    v.round() as $t
                }
            }

            fn lowest() -> Self {
                <$t>::MIN
            }

            fn highest() -> Self {
                <$t>::MAX
            }

            #[inline]
            fn saturated_inv(self) -> Self {
                <$t>::MAX - self
            }

            fn into_value(self) -> SampleValue {
                SampleValue::$dt(self)
            }
        }

        impl UnsignedSample for $t {}
    };
    ($t:ty, $dt:ident, signed) => {
        impl_integer_sample!(@common $t, $dt);

        impl Sample for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn as_complex(self) -> Complex64 {
                Complex64::new(self as f64, 0.0)
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                if v.is_nan() {
                    0
                } else {
                    v.round() as $t
                }
            }

            fn lowest() -> Self {
                <$t>::MIN
            }

            fn highest() -> Self {
                <$t>::MAX
            }

            #[inline]
            fn saturated_inv(self) -> Self {
                self.saturating_neg()
            }

            fn into_value(self) -> SampleValue {
                SampleValue::$dt(self)
            }
        }

        impl SignedSample for $t {}
    };
}

impl_integer_sample!(u8, UInt8, unsigned);
impl_integer_sample!(u16, UInt16, unsigned);
impl_integer_sample!(u32, UInt32, unsigned);
impl_integer_sample!(i8, SInt8, signed);
impl_integer_sample!(i16, SInt16, signed);
impl_integer_sample!(i32, SInt32, signed);

macro_rules! impl_float_sample {
    ($t:ty, $dt:ident) => {
        impl Sample for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn as_complex(self) -> Complex64 {
                Complex64::new(self as f64, 0.0)
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }

            fn lowest() -> Self {
                <$t>::MIN
            }

            fn highest() -> Self {
                <$t>::MAX
            }

            fn infimum() -> Self {
                <$t>::NEG_INFINITY
            }

            fn supremum() -> Self {
                <$t>::INFINITY
            }

            #[inline]
            fn saturated_inv(self) -> Self {
                -self
            }

            #[inline]
            fn is_nan_value(self) -> bool {
                <$t>::is_nan(self)
            }

            fn into_value(self) -> SampleValue {
                SampleValue::$dt(self)
            }
        }

        impl NonComplexSample for $t {}
        impl NonBinarySample for $t {}
        impl RealSample for $t {}
        impl FloatSample for $t {}
        impl FlexSample for $t {}
        impl SignedSample for $t {}
    };
}

impl_float_sample!(f32, SFloat);
impl_float_sample!(f64, DFloat);

macro_rules! impl_complex_sample {
    ($t:ty, $real:ty, $dt:ident) => {
        impl Sample for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            #[inline]
            fn as_f64(self) -> f64 {
                self.re as f64
            }

            #[inline]
            fn as_complex(self) -> Complex64 {
                Complex64::new(self.re as f64, self.im as f64)
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                <$t>::new(v as $real, 0.0)
            }

            #[inline]
            fn from_complex(v: Complex64) -> Self {
                <$t>::new(v.re as $real, v.im as $real)
            }

            fn lowest() -> Self {
                <$t>::new(<$real>::MIN, 0.0)
            }

            fn highest() -> Self {
                <$t>::new(<$real>::MAX, 0.0)
            }

            #[inline]
            fn saturated_inv(self) -> Self {
                -self
            }

            #[inline]
            fn modulus(self) -> f64 {
                self.as_complex().norm()
            }

            #[inline]
            fn is_nan_value(self) -> bool {
                self.re.is_nan() || self.im.is_nan()
            }

            fn into_value(self) -> SampleValue {
                SampleValue::$dt(self)
            }
        }

        impl ComplexSample for $t {
            type Real = $real;

            fn re(self) -> $real {
                self.re
            }

            fn im(self) -> $real {
                self.im
            }
        }

        impl NonBinarySample for $t {}
        impl FlexSample for $t {}
        impl SignedSample for $t {}
    };
}

impl_complex_sample!(Complex32, f32, SComplex);
impl_complex_sample!(Complex64, f64, DComplex);

impl Sample for Bin {
    const DATA_TYPE: DataType = DataType::Bin;

    #[inline]
    fn as_f64(self) -> f64 {
        if self.is_set() {
            1.0
        } else {
            0.0
        }
    }

    #[inline]
    fn as_complex(self) -> Complex64 {
        Complex64::new(self.as_f64(), 0.0)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        Bin::new(v != 0.0)
    }

    #[inline]
    fn from_complex(v: Complex64) -> Self {
        Bin::new(v.re != 0.0 || v.im != 0.0)
    }

    fn lowest() -> Self {
        Bin::FALSE
    }

    fn highest() -> Self {
        Bin::TRUE
    }

    #[inline]
    fn saturated_inv(self) -> Self {
        !self
    }

    fn into_value(self) -> SampleValue {
        SampleValue::Bin(self)
    }
}

impl NonComplexSample for Bin {}
impl BinarySample for Bin {}
impl UnsignedSample for Bin {}

/// Samples with a total order between non-NaN values: binary, integer and floating-point.
pub trait NonComplexSample: Sample + PartialOrd {}

/// Integer and floating-point samples.
pub trait RealSample: NonComplexSample + Num + NumCast {}

/// Integer samples.
pub trait IntegerSample: RealSample + PrimInt {}

/// Floating-point samples.
pub trait FloatSample: RealSample + Float {}

/// Complex samples.
pub trait ComplexSample: Sample + Num {
    /// The floating-point type of each component.
    type Real: FloatSample;

    /// The real component.
    fn re(self) -> Self::Real;

    /// The imaginary component.
    fn im(self) -> Self::Real;
}

/// Floating-point and complex samples.
pub trait FlexSample: Sample + Num {}

/// Every sample type except binary.
pub trait NonBinarySample: Sample + Num {}

/// Signed integer, floating-point and complex samples.
pub trait SignedSample: Sample {}

/// Binary and unsigned integer samples.
pub trait UnsignedSample: Sample {}

/// The binary sample type.
pub trait BinarySample: NonComplexSample {}

/// Converts a sample to another sample type, saturating at the range of the destination.
///
/// * integer to integer clamps to the destination range,
/// * floating-point to integer rounds to nearest and clamps, NaN becomes zero,
/// * complex to real takes the real component, real to complex sets the imaginary part to zero,
/// * binary to numeric maps to 0 or 1, numeric to binary maps non-zero to true.
///
/// # Examples
///
/// ```
/// use tessera_image::{clamp_cast, Bin};
///
/// assert_eq!(clamp_cast::<i32, u8>(300), 255u8);
/// assert_eq!(clamp_cast::<f32, i8>(-3.6), -4i8);
/// assert_eq!(clamp_cast::<u16, Bin>(7), Bin::TRUE);
/// ```
#[inline]
pub fn clamp_cast<S: Sample, D: Sample>(v: S) -> D {
    if S::DATA_TYPE.is_complex() && D::DATA_TYPE.is_complex() {
        D::from_complex(v.as_complex())
    } else {
        D::from_f64(v.as_f64())
    }
}

/// A type-erased sample value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleValue {
    /// A binary sample.
    Bin(Bin),
    /// An 8-bit unsigned sample.
    UInt8(u8),
    /// An 8-bit signed sample.
    SInt8(i8),
    /// A 16-bit unsigned sample.
    UInt16(u16),
    /// A 16-bit signed sample.
    SInt16(i16),
    /// A 32-bit unsigned sample.
    UInt32(u32),
    /// A 32-bit signed sample.
    SInt32(i32),
    /// A 32-bit floating-point sample.
    SFloat(f32),
    /// A 64-bit floating-point sample.
    DFloat(f64),
    /// A single-precision complex sample.
    SComplex(Complex32),
    /// A double-precision complex sample.
    DComplex(Complex64),
}

impl Default for SampleValue {
    fn default() -> Self {
        SampleValue::SFloat(0.0)
    }
}

impl SampleValue {
    /// Wraps a typed sample.
    pub fn new<T: Sample>(v: T) -> Self {
        v.into_value()
    }

    /// The data type of the stored value.
    pub fn data_type(&self) -> DataType {
        match self {
            SampleValue::Bin(_) => DataType::Bin,
            SampleValue::UInt8(_) => DataType::UInt8,
            SampleValue::SInt8(_) => DataType::SInt8,
            SampleValue::UInt16(_) => DataType::UInt16,
            SampleValue::SInt16(_) => DataType::SInt16,
            SampleValue::UInt32(_) => DataType::UInt32,
            SampleValue::SInt32(_) => DataType::SInt32,
            SampleValue::SFloat(_) => DataType::SFloat,
            SampleValue::DFloat(_) => DataType::DFloat,
            SampleValue::SComplex(_) => DataType::SComplex,
            SampleValue::DComplex(_) => DataType::DComplex,
        }
    }

    /// Reads the value as type `T`, with [`clamp_cast`] semantics.
    pub fn get<T: Sample>(self) -> T {
        match self {
            SampleValue::Bin(v) => clamp_cast(v),
            SampleValue::UInt8(v) => clamp_cast(v),
            SampleValue::SInt8(v) => clamp_cast(v),
            SampleValue::UInt16(v) => clamp_cast(v),
            SampleValue::SInt16(v) => clamp_cast(v),
            SampleValue::UInt32(v) => clamp_cast(v),
            SampleValue::SInt32(v) => clamp_cast(v),
            SampleValue::SFloat(v) => clamp_cast(v),
            SampleValue::DFloat(v) => clamp_cast(v),
            SampleValue::SComplex(v) => clamp_cast(v),
            SampleValue::DComplex(v) => clamp_cast(v),
        }
    }

    /// Converts the value to another data type, saturating.
    pub fn cast(self, data_type: DataType) -> SampleValue {
        match data_type {
            DataType::Bin => SampleValue::Bin(self.get()),
            DataType::UInt8 => SampleValue::UInt8(self.get()),
            DataType::SInt8 => SampleValue::SInt8(self.get()),
            DataType::UInt16 => SampleValue::UInt16(self.get()),
            DataType::SInt16 => SampleValue::SInt16(self.get()),
            DataType::UInt32 => SampleValue::UInt32(self.get()),
            DataType::SInt32 => SampleValue::SInt32(self.get()),
            DataType::SFloat => SampleValue::SFloat(self.get()),
            DataType::DFloat => SampleValue::DFloat(self.get()),
            DataType::SComplex => SampleValue::SComplex(self.get()),
            DataType::DComplex => SampleValue::DComplex(self.get()),
        }
    }

    /// The value as `f64` (real part for complex values).
    pub fn as_f64(self) -> f64 {
        self.get::<f64>()
    }

    /// The value as a double-precision complex number.
    pub fn as_complex(self) -> Complex64 {
        self.get::<Complex64>()
    }

    /// Writes the value to `ptr` as a sample of type `data_type`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes of one sample of `data_type` and suitably aligned.
    pub unsafe fn write_to(self, ptr: *mut u8, data_type: DataType) {
        match self.cast(data_type) {
            SampleValue::Bin(v) => ptr.cast::<Bin>().write(v),
            SampleValue::UInt8(v) => ptr.cast::<u8>().write(v),
            SampleValue::SInt8(v) => ptr.cast::<i8>().write(v),
            SampleValue::UInt16(v) => ptr.cast::<u16>().write(v),
            SampleValue::SInt16(v) => ptr.cast::<i16>().write(v),
            SampleValue::UInt32(v) => ptr.cast::<u32>().write(v),
            SampleValue::SInt32(v) => ptr.cast::<i32>().write(v),
            SampleValue::SFloat(v) => ptr.cast::<f32>().write(v),
            SampleValue::DFloat(v) => ptr.cast::<f64>().write(v),
            SampleValue::SComplex(v) => ptr.cast::<Complex32>().write(v),
            SampleValue::DComplex(v) => ptr.cast::<Complex64>().write(v),
        }
    }

    /// Reads one sample of type `data_type` from `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of one sample of `data_type` and suitably aligned.
    pub unsafe fn read_from(ptr: *const u8, data_type: DataType) -> SampleValue {
        match data_type {
            DataType::Bin => SampleValue::Bin(ptr.cast::<Bin>().read()),
            DataType::UInt8 => SampleValue::UInt8(ptr.cast::<u8>().read()),
            DataType::SInt8 => SampleValue::SInt8(ptr.cast::<i8>().read()),
            DataType::UInt16 => SampleValue::UInt16(ptr.cast::<u16>().read()),
            DataType::SInt16 => SampleValue::SInt16(ptr.cast::<i16>().read()),
            DataType::UInt32 => SampleValue::UInt32(ptr.cast::<u32>().read()),
            DataType::SInt32 => SampleValue::SInt32(ptr.cast::<i32>().read()),
            DataType::SFloat => SampleValue::SFloat(ptr.cast::<f32>().read()),
            DataType::DFloat => SampleValue::DFloat(ptr.cast::<f64>().read()),
            DataType::SComplex => SampleValue::SComplex(ptr.cast::<Complex32>().read()),
            DataType::DComplex => SampleValue::DComplex(ptr.cast::<Complex64>().read()),
        }
    }
}

macro_rules! impl_from_sample {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SampleValue {
                fn from(v: $t) -> Self {
                    v.into_value()
                }
            }
        )*
    };
}

impl_from_sample!(Bin, u8, i8, u16, i16, u32, i32, f32, f64, Complex32, Complex64);

impl From<bool> for SampleValue {
    fn from(v: bool) -> Self {
        SampleValue::Bin(Bin::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_cast_integers() {
        assert_eq!(clamp_cast::<i16, u8>(-5), 0u8);
        assert_eq!(clamp_cast::<u32, i16>(100_000), i16::MAX);
        assert_eq!(clamp_cast::<i8, u32>(-1), 0u32);
        assert_eq!(clamp_cast::<u8, i8>(200), 127i8);
    }

    #[test]
    fn test_clamp_cast_floats() {
        assert_eq!(clamp_cast::<f64, u8>(2.5), 3u8);
        assert_eq!(clamp_cast::<f64, u8>(1e9), 255u8);
        assert_eq!(clamp_cast::<f32, i32>(f32::NAN), 0i32);
        assert_eq!(clamp_cast::<f64, u16>(-0.4), 0u16);
        assert_eq!(clamp_cast::<f64, f32>(1e300), f32::INFINITY);
    }

    #[test]
    fn test_clamp_cast_complex_and_binary() {
        let z = Complex64::new(3.7, -2.0);
        assert_eq!(clamp_cast::<Complex64, u8>(z), 4u8);
        assert_eq!(clamp_cast::<Complex64, f64>(z), 3.7);
        assert_eq!(
            clamp_cast::<Complex64, Complex32>(z),
            Complex32::new(3.7, -2.0)
        );
        assert_eq!(
            clamp_cast::<i16, Complex64>(-3),
            Complex64::new(-3.0, 0.0)
        );
        assert_eq!(clamp_cast::<Bin, u16>(Bin::TRUE), 1u16);
        assert_eq!(clamp_cast::<f32, Bin>(0.0), Bin::FALSE);
        assert_eq!(clamp_cast::<i8, Bin>(-3), Bin::TRUE);
    }

    #[test]
    fn test_saturated_inv() {
        assert_eq!(10u8.saturated_inv(), 245);
        assert_eq!(i8::MIN.saturated_inv(), i8::MAX);
        assert_eq!(2.5f64.saturated_inv(), -2.5);
        assert_eq!(Bin::TRUE.saturated_inv(), Bin::FALSE);
    }

    #[test]
    fn test_sample_value_cast() {
        let v = SampleValue::from(-7i32);
        assert_eq!(v.data_type(), DataType::SInt32);
        assert_eq!(v.cast(DataType::UInt8), SampleValue::UInt8(0));
        assert_eq!(v.cast(DataType::DFloat).as_f64(), -7.0);
        assert_eq!(SampleValue::from(true).get::<u8>(), 1);
    }

    #[test]
    fn test_sample_value_raw_roundtrip() {
        let mut buffer = [0u16; 2];
        let ptr = buffer.as_mut_ptr().cast::<u8>();
        // SAFETY: the buffer holds two u16 values.
        unsafe {
            SampleValue::DFloat(1234.4).write_to(ptr, DataType::UInt16);
            assert_eq!(
                SampleValue::read_from(ptr, DataType::UInt16),
                SampleValue::UInt16(1234)
            );
        }
        assert_eq!(buffer[0], 1234);
    }
}
