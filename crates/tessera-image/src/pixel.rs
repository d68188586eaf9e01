use std::fmt;

use crate::{
    data_type::DataType,
    error::ImageError,
    sample::{Sample, SampleValue},
    tensor::Tensor,
};

/// The values of one pixel, all tensor elements of the same data type.
///
/// A pixel is detached from any image: reading one with [`crate::Image::at`] copies the
/// samples out, writing one with [`crate::Image::set_pixel`] casts them into the image type.
#[derive(Clone, Debug, PartialEq)]
pub struct Pixel {
    data_type: DataType,
    tensor: Tensor,
    values: Vec<SampleValue>,
}

impl Pixel {
    /// A pixel with one value per tensor element, shaped as a column vector.
    pub fn from_values<T: Sample>(values: &[T]) -> Result<Self, ImageError> {
        Ok(Self {
            data_type: T::DATA_TYPE,
            tensor: Tensor::vector(values.len())?,
            values: values.iter().map(|&v| v.into_value()).collect(),
        })
    }

    /// A scalar pixel.
    pub fn scalar(value: SampleValue) -> Self {
        Self {
            data_type: value.data_type(),
            tensor: Tensor::scalar(),
            values: vec![value],
        }
    }

    /// A pixel of the given tensor shape and data type, values are cast to `data_type`.
    pub fn with_tensor(
        tensor: Tensor,
        data_type: DataType,
        values: Vec<SampleValue>,
    ) -> Result<Self, ImageError> {
        if values.len() != tensor.elements() {
            return Err(ImageError::NTensorElementsDontMatch(
                values.len(),
                tensor.elements(),
            ));
        }
        Ok(Self {
            data_type,
            tensor,
            values: values.into_iter().map(|v| v.cast(data_type)).collect(),
        })
    }

    /// The data type of the samples.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The tensor shape.
    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    /// The number of tensor elements.
    pub fn tensor_elements(&self) -> usize {
        self.values.len()
    }

    /// True for a single-sample pixel.
    pub fn is_scalar(&self) -> bool {
        self.values.len() == 1
    }

    /// The sample values.
    pub fn values(&self) -> &[SampleValue] {
        &self.values
    }

    /// Tensor element `t`.
    pub fn get(&self, t: usize) -> Result<SampleValue, ImageError> {
        self.values.get(t).copied().ok_or(ImageError::IndexOutOfRange)
    }

    /// Tensor element `t`, cast to `T`.
    pub fn get_as<T: Sample>(&self, t: usize) -> Result<T, ImageError> {
        Ok(self.get(t)?.get())
    }

    /// Sets tensor element `t`, casting to the pixel's data type.
    pub fn set(&mut self, t: usize, value: SampleValue) -> Result<(), ImageError> {
        let slot = self.values.get_mut(t).ok_or(ImageError::IndexOutOfRange)?;
        *slot = value.cast(self.data_type);
        Ok(())
    }

    /// The pixel with its samples cast to `data_type`.
    pub fn cast(&self, data_type: DataType) -> Pixel {
        Pixel {
            data_type,
            tensor: self.tensor.clone(),
            values: self.values.iter().map(|v| v.cast(data_type)).collect(),
        }
    }
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (ii, v) in self.values.iter().enumerate() {
            if ii > 0 {
                write!(f, ", ")?;
            }
            match v {
                SampleValue::SComplex(c) => write!(f, "{c}")?,
                SampleValue::DComplex(c) => write!(f, "{c}")?,
                _ => write!(f, "{}", v.as_f64())?,
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_cast() -> Result<(), ImageError> {
        let px = Pixel::from_values(&[300i32, -5, 7])?;
        assert_eq!(px.tensor_elements(), 3);
        let px8 = px.cast(DataType::UInt8);
        assert_eq!(px8.get_as::<u8>(0)?, 255);
        assert_eq!(px8.get_as::<u8>(1)?, 0);
        assert_eq!(px8.get(3), Err(ImageError::IndexOutOfRange));
        assert_eq!(px.to_string(), "(300, -5, 7)");
        Ok(())
    }

    #[test]
    fn test_pixel_set() -> Result<(), ImageError> {
        let mut px = Pixel::scalar(SampleValue::UInt16(3));
        px.set(0, SampleValue::DFloat(-2.0))?;
        assert_eq!(px.get(0)?, SampleValue::UInt16(0));
        assert!(Pixel::with_tensor(Tensor::matrix(2, 2)?, DataType::SFloat, vec![]).is_err());
        Ok(())
    }
}
