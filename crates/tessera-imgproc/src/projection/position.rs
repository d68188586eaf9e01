use tessera_framework::{
    projection, PerThread, ProjectionFunction, ProjectionOptions, SampleSlot,
};
use tessera_image::{DataType, Image, ImageError};

use super::{
    percentile::{check_percentile, rank_from_percentile},
    TieBreak,
};
use crate::values::{
    for_each_value_with_coordinates, non_nan_values, require_non_complex, require_scalar,
    select_rank,
};

struct PositionExtremum {
    dim: usize,
    maximum: bool,
    tie_break: TieBreak,
}

impl ProjectionFunction for PositionExtremum {
    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        _thread: usize,
    ) -> Result<(), ImageError> {
        let mut limit = if self.maximum {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        let mut position = 0;
        for_each_value_with_coordinates(input, mask, |coords, v| {
            let v = v.re;
            // comparisons with NaN are false, so NaN never wins
            let better = match (self.maximum, self.tie_break) {
                (true, TieBreak::First) => v > limit,
                (true, TieBreak::Last) => v >= limit,
                (false, TieBreak::First) => v < limit,
                (false, TieBreak::Last) => v <= limit,
            };
            if better {
                limit = v;
                position = coords[self.dim];
            }
        })?;
        out.set_f64(position as f64);
        Ok(())
    }
}

struct PositionPercentile {
    dim: usize,
    percentile: f64,
    tie_break: TieBreak,
    buffers: PerThread<Vec<f64>>,
}

impl ProjectionFunction for PositionPercentile {
    fn set_number_of_threads(&mut self, threads: usize) {
        self.buffers.reset(threads);
    }

    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        thread: usize,
    ) -> Result<(), ImageError> {
        let mut buffer = self.buffers.lock(thread)?;
        non_nan_values(input, mask, &mut buffer)?;
        let mut position = 0;
        if !buffer.is_empty() {
            let rank = rank_from_percentile(self.percentile, buffer.len());
            let target = select_rank(&mut buffer, rank);
            let mut found = false;
            for_each_value_with_coordinates(input, mask, |coords, v| {
                if v.re == target && !(found && self.tie_break == TieBreak::First) {
                    position = coords[self.dim];
                    found = true;
                }
            })?;
        }
        out.set_f64(position as f64);
        Ok(())
    }
}

fn position_projection(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    dim: usize,
    function: &mut dyn ProjectionFunction,
) -> Result<(), ImageError> {
    let mut process = vec![false; input.dimensionality()];
    process[dim] = true;
    let options = ProjectionOptions {
        keep_dimension_order: true,
        ..Default::default()
    };
    projection(input, mask, out, DataType::UInt32, &process, function, options)
}

fn check_position_input(input: &Image, dim: usize) -> Result<(), ImageError> {
    require_scalar(input)?;
    require_non_complex(input.data_type())?;
    let n_dims = input.dimensionality();
    if dim >= n_dims {
        return Err(ImageError::IllegalDimension(dim, n_dims));
    }
    Ok(())
}

fn position_extremum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    dim: usize,
    tie_break: TieBreak,
    maximum: bool,
) -> Result<(), ImageError> {
    check_position_input(input, dim)?;
    let mut function = PositionExtremum {
        dim,
        maximum,
        tie_break,
    };
    position_projection(input, mask, out, dim, &mut function)
}

/// Finds, along dimension `dim`, the coordinate of the maximum pixel value.
///
/// The output has the input sizes with dimension `dim` reduced to 1, and type `UInt32`.
/// NaN values are ignored. A line without selected pixels, or with only NaN values, gives 0.
///
/// # Arguments
///
/// * `input` - The input image, scalar and of a real or binary type.
/// * `mask` - An optional binary mask selecting the pixels to use.
/// * `out` - The output image.
/// * `dim` - The dimension along which to search.
/// * `tie_break` - Which of several maximal pixels to report.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::projection::{position_maximum, TieBreak};
///
/// let image = Image::from_vec(vec![4], 1, vec![1u8, 7, 3, 7])?;
/// let mut out = Image::default();
/// position_maximum(&image, None, &mut out, 0, TieBreak::First)?;
/// assert_eq!(out.samples::<u32>()?, vec![1]);
/// position_maximum(&image, None, &mut out, 0, TieBreak::Last)?;
/// assert_eq!(out.samples::<u32>()?, vec![3]);
/// # Ok::<(), ImageError>(())
/// ```
pub fn position_maximum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    dim: usize,
    tie_break: TieBreak,
) -> Result<(), ImageError> {
    position_extremum(input, mask, out, dim, tie_break, true)
}

/// Finds, along dimension `dim`, the coordinate of the minimum pixel value. See
/// [`position_maximum`].
pub fn position_minimum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    dim: usize,
    tie_break: TieBreak,
) -> Result<(), ImageError> {
    position_extremum(input, mask, out, dim, tie_break, false)
}

/// Finds, along dimension `dim`, the coordinate of the pixel holding percentile
/// `percentile`, computed as in [`super::percentile()`].
pub fn position_percentile(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    percentile: f64,
    dim: usize,
    tie_break: TieBreak,
) -> Result<(), ImageError> {
    check_percentile(percentile)?;
    if percentile == 0.0 {
        return position_minimum(input, mask, out, dim, tie_break);
    }
    if percentile == 100.0 {
        return position_maximum(input, mask, out, dim, tie_break);
    }
    check_position_input(input, dim)?;
    let mut function = PositionPercentile {
        dim,
        percentile,
        tie_break,
        buffers: PerThread::new(1),
    };
    position_projection(input, mask, out, dim, &mut function)
}

/// Finds, along dimension `dim`, the coordinate of the median pixel.
pub fn position_median(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    dim: usize,
    tie_break: TieBreak,
) -> Result<(), ImageError> {
    position_percentile(input, mask, out, 50.0, dim, tie_break)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Result<Image, ImageError> {
        // 3 × 2, rows [5, 9, 9] and [4, 1, 4]
        Image::from_vec(vec![3, 2], 1, vec![5i16, 9, 9, 4, 1, 4])
    }

    #[test]
    fn test_position_along_dimension() -> Result<(), ImageError> {
        let image = columns()?;
        let mut out = Image::default();
        position_maximum(&image, None, &mut out, 0, TieBreak::First)?;
        assert_eq!(out.sizes(), &[1, 2]);
        assert_eq!(out.data_type(), DataType::UInt32);
        assert_eq!(out.samples::<u32>()?, vec![1, 0]);
        position_maximum(&image, None, &mut out, 0, TieBreak::Last)?;
        assert_eq!(out.samples::<u32>()?, vec![2, 2]);
        position_minimum(&image, None, &mut out, 1, TieBreak::First)?;
        assert_eq!(out.sizes(), &[3, 1]);
        assert_eq!(out.samples::<u32>()?, vec![1, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_position_percentile_ties() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![5], 1, vec![3.0f64, 2.0, 3.0, 8.0, 1.0])?;
        let mut out = Image::default();
        position_median(&image, None, &mut out, 0, TieBreak::First)?;
        assert_eq!(out.samples::<u32>()?, vec![0]);
        position_median(&image, None, &mut out, 0, TieBreak::Last)?;
        assert_eq!(out.samples::<u32>()?, vec![2]);
        Ok(())
    }

    #[test]
    fn test_position_errors() -> Result<(), ImageError> {
        let image = columns()?;
        let mut out = Image::default();
        assert_eq!(
            position_maximum(&image, None, &mut out, 2, TieBreak::First),
            Err(ImageError::IllegalDimension(2, 2))
        );
        let tensor = Image::from_vec(vec![2], 2, vec![1u8, 2, 3, 4])?;
        assert_eq!(
            position_minimum(&tensor, None, &mut out, 0, TieBreak::First),
            Err(ImageError::NotScalar)
        );
        Ok(())
    }
}
