//! Type-erased sample loops shared by the reductions.

use num_complex::Complex64;
use tessera_image::{
    dispatch::{dispatch_all, AllVisitor},
    iterators::for_each_sample_with_coordinates,
    DataType, Image, ImageError, Sample,
};

struct Visit<'a, F> {
    image: &'a Image,
    mask: Option<&'a Image>,
    f: F,
}

impl<F: FnMut(&[usize], Complex64)> AllVisitor for Visit<'_, F> {
    type Output = Result<(), ImageError>;

    fn visit<T: Sample>(mut self) -> Self::Output {
        for_each_sample_with_coordinates::<T, _>(self.image, self.mask, |coords, v| {
            (self.f)(coords, v.as_complex())
        })
    }
}

/// Calls `f` with the coordinates and value of every pixel of a scalar image selected by
/// `mask`, in linear index order.
pub(crate) fn for_each_value_with_coordinates<F>(
    image: &Image,
    mask: Option<&Image>,
    f: F,
) -> Result<(), ImageError>
where
    F: FnMut(&[usize], Complex64),
{
    dispatch_all(image.data_type(), Visit { image, mask, f })
}

/// Calls `f` with the value of every selected pixel and returns how many there were.
pub(crate) fn for_each_value<F>(
    image: &Image,
    mask: Option<&Image>,
    mut f: F,
) -> Result<usize, ImageError>
where
    F: FnMut(Complex64),
{
    let mut n = 0;
    for_each_value_with_coordinates(image, mask, |_, v| {
        n += 1;
        f(v)
    })?;
    Ok(n)
}

/// The real parts of the selected pixels that are not NaN.
pub(crate) fn non_nan_values(
    image: &Image,
    mask: Option<&Image>,
    buffer: &mut Vec<f64>,
) -> Result<(), ImageError> {
    buffer.clear();
    for_each_value(image, mask, |v| {
        if !v.re.is_nan() {
            buffer.push(v.re);
        }
    })?;
    Ok(())
}

/// A view with the tensor elements as the last spatial dimension.
pub(crate) fn spatial_view(image: &Image) -> Result<Image, ImageError> {
    if !image.is_forged() {
        return Err(ImageError::NotForged);
    }
    let mut view = image.clone();
    if !view.is_scalar() {
        view.tensor_to_spatial(None)?;
    }
    Ok(view)
}

pub(crate) fn require_forged(image: &Image) -> Result<(), ImageError> {
    if image.is_forged() {
        Ok(())
    } else {
        Err(ImageError::NotForged)
    }
}

pub(crate) fn require_scalar(image: &Image) -> Result<(), ImageError> {
    require_forged(image)?;
    if image.is_scalar() {
        Ok(())
    } else {
        Err(ImageError::NotScalar)
    }
}

pub(crate) fn require_non_complex(data_type: DataType) -> Result<(), ImageError> {
    if data_type.is_complex() {
        Err(ImageError::DataTypeNotSupported(data_type))
    } else {
        Ok(())
    }
}

pub(crate) fn require_float(data_type: DataType) -> Result<(), ImageError> {
    if data_type.is_float() {
        Ok(())
    } else {
        Err(ImageError::DataTypeNotSupported(data_type))
    }
}

pub(crate) fn require_binary(image: &Image) -> Result<(), ImageError> {
    require_forged(image)?;
    if image.data_type() == DataType::Bin {
        Ok(())
    } else {
        Err(ImageError::NotBinary)
    }
}

/// The element at `rank` of `values` once sorted, found by partial selection.
pub(crate) fn select_rank(values: &mut [f64], rank: usize) -> f64 {
    let (_, v, _) = values.select_nth_unstable_by(rank, f64::total_cmp);
    *v
}
