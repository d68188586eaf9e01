use tessera_framework::{PerThread, ProjectionFunction, SampleSlot};
use tessera_image::{Image, ImageError};

use super::{extrema::maximum, extrema::minimum, project};
use crate::values::{non_nan_values, require_non_complex, select_rank};

/// The rank, in a sorted list of `n` values, of percentile `p`.
///
/// Percentiles above 50 are ranked from the top, so that `p` and `100 - p` are symmetric.
///
/// # Example
///
/// ```
/// use tessera_imgproc::projection::rank_from_percentile;
///
/// assert_eq!(rank_from_percentile(50.0, 10), 5);
/// assert_eq!(rank_from_percentile(70.0, 10), 6);
/// assert_eq!(rank_from_percentile(0.0, 10), 0);
/// assert_eq!(rank_from_percentile(100.0, 10), 9);
/// ```
pub fn rank_from_percentile(p: f64, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    if p > 50.0 {
        return n - 1 - rank_from_percentile(100.0 - p, n);
    }
    let rank = (p.max(0.0) / 100.0 * (n - 1) as f64 + 0.5).floor() as usize;
    rank.min(n - 1)
}

pub(super) fn check_percentile(p: f64) -> Result<(), ImageError> {
    if (0.0..=100.0).contains(&p) {
        Ok(())
    } else {
        Err(ImageError::ParameterOutOfRange(format!(
            "percentile {p} outside [0, 100]"
        )))
    }
}

struct Percentile {
    percentile: f64,
    buffers: PerThread<Vec<f64>>,
}

impl ProjectionFunction for Percentile {
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
        if buffer.is_empty() {
            out.set_f64(0.0);
        } else {
            let rank = rank_from_percentile(self.percentile, buffer.len());
            out.set_f64(select_rank(&mut buffer, rank));
        }
        Ok(())
    }
}

struct MedianAbsoluteDeviation {
    buffers: PerThread<Vec<f64>>,
}

impl ProjectionFunction for MedianAbsoluteDeviation {
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
        if buffer.is_empty() {
            out.set_f64(0.0);
            return Ok(());
        }
        let rank = rank_from_percentile(50.0, buffer.len());
        let median = select_rank(&mut buffer, rank);
        buffer.iter_mut().for_each(|v| *v = (*v - median).abs());
        out.set_f64(select_rank(&mut buffer, rank));
        Ok(())
    }
}

/// Computes percentile `percentile` of the pixel values over the dimensions selected by
/// `process`.
///
/// NaN values are ignored. The value is the one at
/// [`rank_from_percentile`] among the selected pixels, no interpolation is done. Percentiles 0
/// and 100 are computed by [`minimum`] and [`maximum`]. A fibre without selected pixels gives 0.
///
/// # Arguments
///
/// * `input` - The input image, of a real or binary type.
/// * `mask` - An optional binary mask selecting the pixels to use.
/// * `out` - The output image, of the input type.
/// * `percentile` - The percentile, in `[0, 100]`.
/// * `process` - The dimensions to reduce. Empty means all dimensions.
///
/// # Errors
///
/// A percentile outside `[0, 100]` gives [`ImageError::ParameterOutOfRange`].
pub fn percentile(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    percentile: f64,
    process: &[bool],
) -> Result<(), ImageError> {
    check_percentile(percentile)?;
    if percentile == 0.0 {
        return minimum(input, mask, out, process);
    }
    if percentile == 100.0 {
        return maximum(input, mask, out, process);
    }
    let dt = input.data_type();
    require_non_complex(dt)?;
    let mut function = Percentile {
        percentile,
        buffers: PerThread::new(1),
    };
    project(input, mask, out, dt, process, &mut function)
}

/// Computes the median, percentile 50.
pub fn median(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    percentile(input, mask, out, 50.0, process)
}

/// Computes the median of the absolute differences to the median. The output is
/// floating-point.
pub fn median_absolute_deviation(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    let dt = input.data_type();
    require_non_complex(dt)?;
    let mut function = MedianAbsoluteDeviation {
        buffers: PerThread::new(1),
    };
    project(input, mask, out, dt.suggest_float(), process, &mut function)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_image::{Bin, DataType};

    #[test]
    fn test_rank_from_percentile() {
        assert_eq!(rank_from_percentile(50.0, 1), 0);
        assert_eq!(rank_from_percentile(100.0 / 7.0, 7), 1);
        assert_eq!(rank_from_percentile(200.0 / 7.0, 7), 2);
        assert_eq!(rank_from_percentile(100.0, 7), 6);
        // symmetric around the median
        for n in 1..20 {
            for p in [5.0, 12.5, 33.0, 49.0] {
                assert_eq!(
                    rank_from_percentile(p, n) + rank_from_percentile(100.0 - p, n),
                    n - 1
                );
            }
        }
    }

    #[test]
    fn test_percentile() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![10], 1, vec![7u16, 3, 10, 1, 9, 2, 8, 4, 6, 5])?;
        let mut out = Image::default();
        percentile(&image, None, &mut out, 70.0, &[])?;
        assert_eq!(out.data_type(), DataType::UInt16);
        assert_eq!(out.samples::<u16>()?, vec![7]);
        median(&image, None, &mut out, &[])?;
        assert_eq!(out.samples::<u16>()?, vec![6]);
        assert!(matches!(
            percentile(&image, None, &mut out, 100.5, &[]),
            Err(ImageError::ParameterOutOfRange(_))
        ));
        Ok(())
    }

    #[test]
    fn test_percentile_empty_fibre() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![2, 2], 1, vec![4.0f32, 6.0, 1.0, 3.0])?;
        let mask = Image::from_vec(
            vec![2, 2],
            1,
            vec![Bin::TRUE, Bin::TRUE, Bin::FALSE, Bin::FALSE],
        )?;
        let mut out = Image::default();
        median(&image, Some(&mask), &mut out, &[true, false])?;
        assert_eq!(out.samples::<f32>()?, vec![6.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_median_absolute_deviation() -> Result<(), ImageError> {
        // median 2, deviations [1, 1, 0, 0, 2, 4, 7]
        let image = Image::from_vec(vec![7], 1, vec![1i32, 1, 2, 2, 4, 6, 9])?;
        let mut out = Image::default();
        median_absolute_deviation(&image, None, &mut out, &[])?;
        assert_eq!(out.data_type(), DataType::DFloat);
        assert_eq!(out.samples::<f64>()?, vec![1.0]);
        Ok(())
    }
}
