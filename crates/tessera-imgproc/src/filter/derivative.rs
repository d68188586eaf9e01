use tessera_framework::{array_use_parameter, BoundaryCondition};
use tessera_image::{Image, ImageError};

use super::separable_convolution;

fn difference_kernel(order: usize, smooth: bool) -> Result<Vec<f64>, ImageError> {
    match order {
        0 if smooth => Ok(vec![0.25, 0.5, 0.25]),
        0 => Ok(Vec::new()),
        1 => Ok(vec![0.5, 0.0, -0.5]),
        2 => Ok(vec![1.0, -2.0, 1.0]),
        _ => Err(ImageError::ParameterOutOfRange(format!(
            "derivative order {order} not in 0, 1 or 2"
        ))),
    }
}

/// Approximates derivatives with finite differences.
///
/// For each dimension, `derivative_order` selects the central difference `[1, 0, -1] / 2`
/// (order 1) or the second difference `[1, -2, 1]` (order 2). Dimensions with order 0 are
/// smoothed with `[1, 2, 1] / 4` if `smooth` is set, and left alone otherwise. The output is
/// a floating-point or complex type.
///
/// # Arguments
///
/// * `input` - The input image.
/// * `out` - The output image.
/// * `derivative_order` - The order per dimension, or a single order for all of them.
/// * `smooth` - Whether to smooth the dimensions not differentiated.
/// * `boundary` - The boundary condition per dimension, or one for all of them.
/// * `process` - The dimensions to filter. Empty means all dimensions.
///
/// # Example
///
/// ```
/// use tessera_framework::BoundaryCondition;
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::filter::finite_difference;
///
/// let image = Image::from_vec(vec![5], 1, vec![0u8, 2, 4, 6, 8])?;
/// let mut out = Image::default();
/// let boundary = [BoundaryCondition::FirstOrderExtrapolate];
/// finite_difference(&image, &mut out, &[1], false, &boundary, &[])?;
/// assert_eq!(out.samples::<f32>()?, vec![2.0; 5]);
/// # Ok::<(), ImageError>(())
/// ```
pub fn finite_difference(
    input: &Image,
    out: &mut Image,
    derivative_order: &[usize],
    smooth: bool,
    boundary: &[BoundaryCondition],
    process: &[bool],
) -> Result<(), ImageError> {
    if !input.is_forged() {
        return Err(ImageError::NotForged);
    }
    let n_dims = input.dimensionality();
    let order = array_use_parameter(derivative_order, n_dims, 0)?;
    let process = array_use_parameter(process, n_dims, true)?;
    let kernels = order
        .iter()
        .zip(&process)
        .map(|(&o, &p)| match p {
            true => difference_kernel(o, smooth),
            false => Ok(Vec::new()),
        })
        .collect::<Result<Vec<_>, _>>()?;
    separable_convolution(input, out, kernels, boundary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_difference() -> Result<(), ImageError> {
        // x^2 along dimension 0, constant along dimension 1
        let data = (0..12).map(|i| ((i % 4) * (i % 4)) as f64).collect();
        let image = Image::from_vec(vec![4, 3], 1, data)?;
        let mut out = Image::default();
        finite_difference(
            &image,
            &mut out,
            &[2, 0],
            true,
            &[BoundaryCondition::SymmetricMirror],
            &[],
        )?;
        assert_eq!(out.sizes(), &[4, 3]);
        let values = out.samples::<f64>()?;
        assert_eq!(values[1], 2.0);
        assert_eq!(values[4 + 2], 2.0);
        Ok(())
    }

    #[test]
    fn test_order_out_of_range() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3], 1, vec![1.0f32; 3])?;
        let mut out = Image::default();
        assert!(matches!(
            finite_difference(&image, &mut out, &[3], false, &[], &[]),
            Err(ImageError::ParameterOutOfRange(_))
        ));
        Ok(())
    }
}
