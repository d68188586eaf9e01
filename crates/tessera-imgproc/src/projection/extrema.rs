use tessera_framework::{ProjectionFunction, SampleSlot};
use tessera_image::{Bin, DataType, Image, ImageError};

use super::project;
use crate::values::{for_each_value, require_non_complex};

struct Extremum {
    maximum: bool,
    abs: bool,
}

impl ProjectionFunction for Extremum {
    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        _thread: usize,
    ) -> Result<(), ImageError> {
        // f64::max and f64::min skip NaN
        let mut res = if self.maximum {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        for_each_value(input, mask, |v| {
            let v = if self.abs { v.norm() } else { v.re };
            res = if self.maximum { res.max(v) } else { res.min(v) };
        })?;
        out.set_f64(res);
        Ok(())
    }
}

struct Logical {
    all: bool,
}

impl ProjectionFunction for Logical {
    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        _thread: usize,
    ) -> Result<(), ImageError> {
        let mut zeros = 0;
        let n = for_each_value(input, mask, |v| {
            if v.re == 0.0 && v.im == 0.0 {
                zeros += 1;
            }
        })?;
        let res = if self.all { zeros == 0 } else { zeros < n };
        out.set(Bin::from(res));
        Ok(())
    }
}

/// Computes the maximum pixel value over the dimensions selected by `process`.
///
/// NaN values are ignored. A fibre without selected pixels gives the lowest value of the
/// type, `-inf` for floating-point types. Binary images are handled by [`any`].
///
/// # Arguments
///
/// * `input` - The input image, of a real or binary type.
/// * `mask` - An optional binary mask selecting the pixels to use.
/// * `out` - The output image, of the input type.
/// * `process` - The dimensions to reduce. Empty means all dimensions.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::projection::maximum;
///
/// let image = Image::from_vec(vec![2, 2], 1, vec![4i16, -1, 0, 9])?;
/// let mut out = Image::default();
/// maximum(&image, None, &mut out, &[false, true])?;
/// assert_eq!(out.samples::<i16>()?, vec![4, 9]);
/// # Ok::<(), ImageError>(())
/// ```
pub fn maximum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    extremum(input, mask, out, process, true)
}

/// Computes the minimum pixel value over the dimensions selected by `process`.
///
/// The counterpart of [`maximum`]. Binary images are handled by [`all`].
pub fn minimum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    extremum(input, mask, out, process, false)
}

fn extremum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
    maximum: bool,
) -> Result<(), ImageError> {
    let dt = input.data_type();
    if dt == DataType::Bin {
        return project(input, mask, out, dt, process, &mut Logical { all: !maximum });
    }
    require_non_complex(dt)?;
    let mut function = Extremum {
        maximum,
        abs: false,
    };
    project(input, mask, out, dt, process, &mut function)
}

fn extremum_abs(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
    maximum: bool,
) -> Result<(), ImageError> {
    let dt = input.data_type();
    if dt.is_unsigned() {
        return extremum(input, mask, out, process, maximum);
    }
    let mut function = Extremum { maximum, abs: true };
    project(input, mask, out, dt.suggest_abs(), process, &mut function)
}

/// Computes the maximum absolute pixel value. Complex inputs use the modulus.
pub fn maximum_abs(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    extremum_abs(input, mask, out, process, true)
}

/// Computes the minimum absolute pixel value. Complex inputs use the modulus.
pub fn minimum_abs(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    extremum_abs(input, mask, out, process, false)
}

/// Sets an output pixel if every selected input pixel is non-zero. The output is binary.
pub fn all(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    project(input, mask, out, DataType::Bin, process, &mut Logical { all: true })
}

/// Sets an output pixel if any selected input pixel is non-zero. The output is binary.
pub fn any(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    project(input, mask, out, DataType::Bin, process, &mut Logical { all: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    #[test]
    fn test_maximum_minimum_skip_nan() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![4], 1, vec![f32::NAN, 3.0, -2.0, f32::NAN])?;
        let mut out = Image::default();
        maximum(&image, None, &mut out, &[])?;
        assert_eq!(out.data_type(), DataType::SFloat);
        assert_eq!(out.samples::<f32>()?, vec![3.0]);
        minimum(&image, None, &mut out, &[])?;
        assert_eq!(out.samples::<f32>()?, vec![-2.0]);
        Ok(())
    }

    #[test]
    fn test_empty_fibre_identity() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![2], 1, vec![1.0f64, 2.0])?;
        let mask = Image::from_vec(vec![2], 1, vec![Bin::FALSE; 2])?;
        let mut out = Image::default();
        maximum(&image, Some(&mask), &mut out, &[])?;
        assert_eq!(out.samples::<f64>()?, vec![f64::NEG_INFINITY]);
        minimum(&image, Some(&mask), &mut out, &[])?;
        assert_eq!(out.samples::<f64>()?, vec![f64::INFINITY]);
        Ok(())
    }

    #[test]
    fn test_abs_extrema() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3], 1, vec![-100i8, 5, -7])?;
        let mut out = Image::default();
        maximum_abs(&image, None, &mut out, &[])?;
        assert_eq!(out.data_type(), DataType::UInt8);
        assert_eq!(out.samples::<u8>()?, vec![100]);
        minimum_abs(&image, None, &mut out, &[])?;
        assert_eq!(out.samples::<u8>()?, vec![5]);

        let complex = Image::from_vec(
            vec![2],
            1,
            vec![Complex32::new(3.0, 4.0), Complex32::new(1.0, 0.0)],
        )?;
        maximum_abs(&complex, None, &mut out, &[])?;
        assert_eq!(out.data_type(), DataType::SFloat);
        assert_eq!(out.samples::<f32>()?, vec![5.0]);
        assert!(maximum(&complex, None, &mut out, &[]).is_err());
        Ok(())
    }

    #[test]
    fn test_all_any() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3, 2], 1, vec![1u8, 2, 0, 0, 0, 0])?;
        let mut out = Image::default();
        all(&image, None, &mut out, &[true, false])?;
        assert_eq!(out.samples::<Bin>()?, vec![Bin::FALSE, Bin::FALSE]);
        any(&image, None, &mut out, &[true, false])?;
        assert_eq!(out.samples::<Bin>()?, vec![Bin::TRUE, Bin::FALSE]);

        let binary = Image::from_vec(vec![2], 1, vec![Bin::TRUE, Bin::FALSE])?;
        maximum(&binary, None, &mut out, &[])?;
        assert_eq!(out.samples::<Bin>()?, vec![Bin::TRUE]);
        minimum(&binary, None, &mut out, &[])?;
        assert_eq!(out.samples::<Bin>()?, vec![Bin::FALSE]);
        Ok(())
    }
}
