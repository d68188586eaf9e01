use log::debug;
use tessera_image::{Image, ImageError};

use super::{check_real_pair, pair_total, scan_pairs};
use crate::statistics::maximum_and_minimum;

/// The mean signed difference `in1 - in2` over the selected samples.
///
/// Complex images give [`ImageError::DataTypeNotSupported`].
pub fn mean_error(in1: &Image, in2: &Image, mask: Option<&Image>) -> Result<f64, ImageError> {
    check_real_pair(in1, in2)?;
    Ok(pair_total(in1, in2, mask, |a, b| a.re - b.re)?.mean())
}

/// The mean squared difference. Complex differences use the square modulus.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::metrics::mean_square_error;
///
/// let a = Image::from_vec(vec![4], 1, vec![1u8, 2, 3, 4])?;
/// let b = Image::from_vec(vec![4], 1, vec![1u8, 2, 3, 6])?;
/// assert_eq!(mean_square_error(&a, &b, None)?, 1.0);
/// # Ok::<(), ImageError>(())
/// ```
pub fn mean_square_error(
    in1: &Image,
    in2: &Image,
    mask: Option<&Image>,
) -> Result<f64, ImageError> {
    Ok(pair_total(in1, in2, mask, |a, b| (a - b).norm_sqr())?.mean())
}

/// The square root of [`mean_square_error`].
pub fn root_mean_square_error(
    in1: &Image,
    in2: &Image,
    mask: Option<&Image>,
) -> Result<f64, ImageError> {
    Ok(mean_square_error(in1, in2, mask)?.sqrt())
}

/// The mean absolute difference. Complex differences use the modulus.
pub fn mean_absolute_error(
    in1: &Image,
    in2: &Image,
    mask: Option<&Image>,
) -> Result<f64, ImageError> {
    Ok(pair_total(in1, in2, mask, |a, b| (a - b).norm())?.mean())
}

/// The largest absolute difference, 0 if no samples are selected.
pub fn maximum_absolute_error(
    in1: &Image,
    in2: &Image,
    mask: Option<&Image>,
) -> Result<f64, ImageError> {
    let partials = scan_pairs(in1, in2, mask, |acc: &mut f64, a, b| {
        *acc = acc.max((a - b).norm())
    })?;
    Ok(partials.into_iter().fold(0.0, f64::max))
}

/// The I-divergence of `in1` with respect to `in2`, as used for Poisson-distributed data.
///
/// Each pair contributes `x ln(x / y) - x + y`, where the logarithm term is only included
/// when both values are positive. The result is the mean contribution.
pub fn i_divergence(in1: &Image, in2: &Image, mask: Option<&Image>) -> Result<f64, ImageError> {
    check_real_pair(in1, in2)?;
    let total = pair_total(in1, in2, mask, |a, b| {
        let (x, y) = (a.re, b.re);
        let mut v = y;
        if x > 0.0 && y > 0.0 {
            v += x * (x / y).ln() - x;
        }
        v
    })?;
    Ok(total.mean())
}

/// The sum of the sample-wise products.
pub fn in_product(in1: &Image, in2: &Image, mask: Option<&Image>) -> Result<f64, ImageError> {
    check_real_pair(in1, in2)?;
    Ok(pair_total(in1, in2, mask, |a, b| a.re * b.re)?.sum)
}

/// The `order`-norm of the difference, divided by the number of samples.
///
/// # Errors
///
/// `order` must be positive.
pub fn ln_norm_error(
    in1: &Image,
    in2: &Image,
    mask: Option<&Image>,
    order: f64,
) -> Result<f64, ImageError> {
    if order <= 0.0 || order.is_nan() {
        return Err(ImageError::ParameterOutOfRange(format!(
            "norm order must be positive, got {order}"
        )));
    }
    let total = pair_total(in1, in2, mask, |a, b| (a - b).norm().powf(order))?;
    if total.count == 0 {
        return Ok(0.0);
    }
    Ok(total.sum.powf(1.0 / order) / total.count as f64)
}

/// The peak signal-to-noise ratio of `input` with respect to `reference`, in decibels.
///
/// A `peak_signal` that is not positive is replaced by the range of the selected reference
/// samples. Identical images give `+inf`.
///
/// # Arguments
///
/// * `input` - The image to measure.
/// * `reference` - The reference image.
/// * `mask` - An optional binary mask selecting the pixels to compare.
/// * `peak_signal` - The largest possible signal value.
pub fn psnr(
    input: &Image,
    reference: &Image,
    mask: Option<&Image>,
    peak_signal: f64,
) -> Result<f64, ImageError> {
    let peak = if peak_signal > 0.0 {
        peak_signal
    } else {
        let range = maximum_and_minimum(reference, mask)?;
        range.maximum() - range.minimum()
    };
    let rmse = root_mean_square_error(input, reference, mask)?;
    debug!("psnr: peak {peak}, rmse {rmse}");
    if rmse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(20.0 * (peak / rmse).log10())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex32;
    use tessera_image::Bin;

    fn pair() -> Result<(Image, Image), ImageError> {
        Ok((
            Image::from_vec(vec![4], 1, vec![1.0f32, 2.0, 3.0, 4.0])?,
            Image::from_vec(vec![4], 1, vec![1i16, 2, 3, 6])?,
        ))
    }

    #[test]
    fn test_pixel_errors() -> Result<(), ImageError> {
        let (a, b) = pair()?;
        assert_eq!(mean_error(&a, &b, None)?, -0.5);
        assert_eq!(mean_square_error(&a, &b, None)?, 1.0);
        assert_eq!(root_mean_square_error(&a, &b, None)?, 1.0);
        assert_eq!(mean_absolute_error(&a, &b, None)?, 0.5);
        assert_eq!(maximum_absolute_error(&a, &b, None)?, 2.0);
        assert_eq!(in_product(&a, &b, None)?, 38.0);
        assert_eq!(ln_norm_error(&a, &b, None, 2.0)?, 0.5);
        // only the last pair differs
        let expected = (4.0 * (4.0f64 / 6.0).ln() - 4.0 + 6.0) / 4.0;
        assert_relative_eq!(i_divergence(&a, &b, None)?, expected, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_masked_errors() -> Result<(), ImageError> {
        let (a, b) = pair()?;
        let mut flags = vec![Bin::TRUE; 4];
        flags[3] = Bin::FALSE;
        let mask = Image::from_vec(vec![4], 1, flags)?;
        assert_eq!(mean_square_error(&a, &b, Some(&mask))?, 0.0);
        assert_eq!(maximum_absolute_error(&a, &b, Some(&mask))?, 0.0);
        Ok(())
    }

    #[test]
    fn test_psnr() -> Result<(), ImageError> {
        let (a, b) = pair()?;
        assert_relative_eq!(psnr(&a, &b, None, 0.0)?, 20.0 * 5.0f64.log10(), epsilon = 1e-12);
        assert_relative_eq!(psnr(&a, &b, None, 10.0)?, 20.0, epsilon = 1e-12);
        assert_eq!(psnr(&a, &a, None, 0.0)?, f64::INFINITY);
        Ok(())
    }

    #[test]
    fn test_complex_and_mismatch() -> Result<(), ImageError> {
        let a = Image::from_vec(vec![1], 1, vec![Complex32::new(3.0, 4.0)])?;
        let b = Image::from_vec(vec![1], 1, vec![0.0f32])?;
        assert_eq!(mean_absolute_error(&a, &b, None)?, 5.0);
        assert_eq!(mean_square_error(&a, &b, None)?, 25.0);
        assert!(matches!(
            mean_error(&a, &b, None),
            Err(ImageError::DataTypeNotSupported(_))
        ));
        let c = Image::from_vec(vec![2], 1, vec![0.0f32; 2])?;
        assert!(matches!(
            mean_square_error(&b, &c, None),
            Err(ImageError::SizesDontMatch(_, _))
        ));
        Ok(())
    }
}
