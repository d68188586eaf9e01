use crate::data_type::DataType;

/// An error type for the image data model and everything built on it.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    /// The operation requires a forged image.
    #[error("Image is not forged")]
    NotForged,

    /// The image is forged and the operation needs a raw image.
    #[error("Image is already forged")]
    AlreadyForged,

    /// The image must have a single tensor element.
    #[error("Image is not scalar")]
    NotScalar,

    /// The image must be of binary type.
    #[error("Image is not binary")]
    NotBinary,

    /// The image must be of a real type.
    #[error("Image is not real-valued")]
    NotReal,

    /// The image must be of a complex type.
    #[error("Image is not complex-valued")]
    NotComplex,

    /// The data type is not in the group accepted by the operation.
    #[error("Data type {0} not supported")]
    DataTypeNotSupported(DataType),

    /// The dimensionality is not supported by the operation.
    #[error("Dimensionality {0} not supported")]
    DimensionalityNotSupported(usize),

    /// A dimension index is outside the image dimensionality.
    #[error("Illegal dimension {0} for an image with {1} dimensions")]
    IllegalDimension(usize, usize),

    /// Two images must have the same number of dimensions.
    #[error("Dimensionalities don't match ({0} vs {1})")]
    DimensionalitiesDontMatch(usize, usize),

    /// Image sizes are not compatible.
    #[error("Sizes don't match ({0:?} vs {1:?})")]
    SizesDontMatch(Vec<usize>, Vec<usize>),

    /// Two array parameters must have the same length.
    #[error("Array sizes don't match")]
    ArraySizesDontMatch,

    /// An array parameter has the wrong number of elements.
    #[error("Array parameter has the wrong length ({0}, expected {1})")]
    ArrayParameterWrongLength(usize, usize),

    /// The number of tensor elements is not compatible.
    #[error("Number of tensor elements doesn't match ({0} vs {1})")]
    NTensorElementsDontMatch(usize, usize),

    /// An index or coordinate is outside the valid range.
    #[error("Index out of range")]
    IndexOutOfRange,

    /// A numeric parameter is outside its valid range.
    #[error("Parameter out of range: {0}")]
    ParameterOutOfRange(String),

    /// A mode string was not recognized.
    #[error("Invalid flag: {0}")]
    InvalidFlag(String),

    /// A parameter has an invalid value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The image is protected and cannot be reallocated.
    #[error("Image is protected")]
    ProtectedImage,

    /// The allocator could not provide memory for the image.
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),
}

impl From<crate::allocator::ImageAllocatorError> for ImageError {
    fn from(e: crate::allocator::ImageAllocatorError) -> Self {
        ImageError::AllocationFailed(e.to_string())
    }
}
