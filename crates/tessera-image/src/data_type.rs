use std::fmt;
use std::str::FromStr;

use crate::error::ImageError;

/// The closed set of sample types an image can hold.
///
/// The variants are declared in promotion order, so comparing two data types with `<` tells
/// which one is "wider" in the sense used by [`DataType::suggest_dyadic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DataType {
    /// One byte per sample, zero is false and anything else is true.
    Bin,
    /// 8-bit unsigned integer.
    UInt8,
    /// 8-bit signed integer.
    SInt8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 16-bit signed integer.
    SInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 32-bit signed integer.
    SInt32,
    /// 32-bit floating point.
    #[default]
    SFloat,
    /// 64-bit floating point.
    DFloat,
    /// Complex value made of two 32-bit floats.
    SComplex,
    /// Complex value made of two 64-bit floats.
    DComplex,
}

impl DataType {
    /// All data types, in promotion order.
    pub const ALL: [DataType; 11] = [
        DataType::Bin,
        DataType::UInt8,
        DataType::SInt8,
        DataType::UInt16,
        DataType::SInt16,
        DataType::UInt32,
        DataType::SInt32,
        DataType::SFloat,
        DataType::DFloat,
        DataType::SComplex,
        DataType::DComplex,
    ];

    /// Size of one sample in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DataType::Bin | DataType::UInt8 | DataType::SInt8 => 1,
            DataType::UInt16 | DataType::SInt16 => 2,
            DataType::UInt32 | DataType::SInt32 | DataType::SFloat => 4,
            DataType::DFloat | DataType::SComplex => 8,
            DataType::DComplex => 16,
        }
    }

    /// The canonical upper-case name of the type, e.g. `"UINT8"`.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Bin => "BIN",
            DataType::UInt8 => "UINT8",
            DataType::SInt8 => "SINT8",
            DataType::UInt16 => "UINT16",
            DataType::SInt16 => "SINT16",
            DataType::UInt32 => "UINT32",
            DataType::SInt32 => "SINT32",
            DataType::SFloat => "SFLOAT",
            DataType::DFloat => "DFLOAT",
            DataType::SComplex => "SCOMPLEX",
            DataType::DComplex => "DCOMPLEX",
        }
    }

    /// True for the binary type.
    pub fn is_binary(self) -> bool {
        self == DataType::Bin
    }

    /// True for the unsigned integer types and binary.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            DataType::Bin | DataType::UInt8 | DataType::UInt16 | DataType::UInt32
        )
    }

    /// True for the signed integer, floating-point and complex types.
    pub fn is_signed(self) -> bool {
        !self.is_unsigned()
    }

    /// True for the integer types (binary excluded).
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::UInt8
                | DataType::SInt8
                | DataType::UInt16
                | DataType::SInt16
                | DataType::UInt32
                | DataType::SInt32
        )
    }

    /// True for the two floating-point types.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::SFloat | DataType::DFloat)
    }

    /// True for the two complex types.
    pub fn is_complex(self) -> bool {
        matches!(self, DataType::SComplex | DataType::DComplex)
    }

    /// True for integer and floating-point types.
    pub fn is_real(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// True for every type except binary.
    pub fn is_non_binary(self) -> bool {
        !self.is_binary()
    }

    /// True for every type except the complex ones.
    pub fn is_non_complex(self) -> bool {
        !self.is_complex()
    }

    /// True for floating-point and complex types.
    pub fn is_flex(self) -> bool {
        self.is_float() || self.is_complex()
    }

    /// The floating-point type of the components of a complex type; other types map to themselves.
    pub fn real_type(self) -> DataType {
        match self {
            DataType::SComplex => DataType::SFloat,
            DataType::DComplex => DataType::DFloat,
            other => other,
        }
    }

    /// A floating-point type that can hold the samples of `self`.
    pub fn suggest_float(self) -> DataType {
        match self {
            DataType::UInt32 | DataType::SInt32 | DataType::DFloat | DataType::DComplex => {
                DataType::DFloat
            }
            _ => DataType::SFloat,
        }
    }

    /// A complex type that can hold the samples of `self`.
    pub fn suggest_complex(self) -> DataType {
        match self {
            DataType::UInt32 | DataType::SInt32 | DataType::DFloat | DataType::DComplex => {
                DataType::DComplex
            }
            _ => DataType::SComplex,
        }
    }

    /// A floating-point type for real input, the matching complex type for complex input.
    pub fn suggest_flex(self) -> DataType {
        match self {
            DataType::UInt32 | DataType::SInt32 | DataType::DFloat => DataType::DFloat,
            DataType::SComplex => DataType::SComplex,
            DataType::DComplex => DataType::DComplex,
            _ => DataType::SFloat,
        }
    }

    /// As [`DataType::suggest_flex`], but binary stays binary.
    pub fn suggest_flex_bin(self) -> DataType {
        match self {
            DataType::Bin => DataType::Bin,
            other => other.suggest_flex(),
        }
    }

    /// A double-precision type (real or complex) that can hold large sums of `self`.
    pub fn suggest_double(self) -> DataType {
        if self.is_complex() {
            DataType::DComplex
        } else {
            DataType::DFloat
        }
    }

    /// A signed type that can hold the negation of every sample of `self`.
    pub fn suggest_signed(self) -> DataType {
        match self {
            DataType::Bin => DataType::SInt8,
            DataType::UInt8 => DataType::SInt16,
            DataType::UInt16 => DataType::SInt32,
            DataType::UInt32 => DataType::DFloat,
            other => other,
        }
    }

    /// A type that can hold `abs(x)` for every sample `x` of `self`.
    pub fn suggest_abs(self) -> DataType {
        match self {
            DataType::SInt8 => DataType::UInt8,
            DataType::SInt16 => DataType::UInt16,
            DataType::SInt32 => DataType::UInt32,
            DataType::SComplex => DataType::SFloat,
            DataType::DComplex => DataType::DFloat,
            other => other,
        }
    }

    /// A real type that can hold the samples of `self`.
    pub fn suggest_real(self) -> DataType {
        match self {
            DataType::Bin => DataType::UInt8,
            DataType::SComplex => DataType::SFloat,
            DataType::DComplex => DataType::DFloat,
            other => other,
        }
    }

    /// A floating-point, complex or binary type that can hold the result of arithmetic
    /// between `a` and `b`.
    pub fn suggest_arithmetic(a: DataType, b: DataType) -> DataType {
        let (hi, lo) = ordered(a.suggest_flex_bin(), b.suggest_flex_bin());
        match (hi, lo) {
            (DataType::DComplex, _) => DataType::DComplex,
            (DataType::SComplex, DataType::DFloat) => DataType::DComplex,
            (DataType::SComplex, _) => DataType::SComplex,
            (DataType::DFloat, _) => DataType::DFloat,
            (DataType::SFloat, _) => DataType::SFloat,
            _ => DataType::Bin,
        }
    }

    /// A type that can hold any sample of either `a` or `b`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_image::DataType;
    ///
    /// assert_eq!(DataType::suggest_dyadic(DataType::SInt8, DataType::UInt8), DataType::SInt16);
    /// assert_eq!(DataType::suggest_dyadic(DataType::UInt32, DataType::SFloat), DataType::DFloat);
    /// ```
    pub fn suggest_dyadic(a: DataType, b: DataType) -> DataType {
        if a == b {
            return a;
        }
        let (hi, lo) = ordered(a, b);
        use DataType::*;
        match (hi, lo) {
            (DComplex, _) => DComplex,
            (SComplex, DFloat) => DComplex,
            (SComplex, _) => SComplex,
            (DFloat, _) => DFloat,
            (SFloat, UInt32 | SInt32) => DFloat,
            (SFloat, _) => SFloat,
            (SInt32, UInt32) => DFloat,
            (SInt32, _) => SInt32,
            (UInt32, SInt16 | SInt8) => DFloat,
            (UInt32, _) => UInt32,
            (SInt16, UInt16) => SInt32,
            (SInt16, _) => SInt16,
            (UInt16, SInt8) => SInt32,
            (UInt16, _) => UInt16,
            (SInt8, UInt8) => SInt16,
            (SInt8, _) => SInt8,
            _ => UInt8,
        }
    }
}

fn ordered(a: DataType, b: DataType) -> (DataType, DataType) {
    if b > a {
        (b, a)
    } else {
        (a, b)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        DataType::ALL
            .iter()
            .copied()
            .find(|dt| dt.name() == upper)
            .ok_or_else(|| ImageError::InvalidFlag(s.to_string()))
    }
}
