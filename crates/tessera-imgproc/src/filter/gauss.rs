use tessera_framework::{array_use_parameter, BoundaryCondition};
use tessera_image::{Image, ImageError};

use super::separable_convolution;

/// Create a sampled gaussian kernel.
///
/// # Arguments
///
/// * `sigma` - The standard deviation, in pixels.
/// * `truncation` - The half-width in units of `sigma`; the kernel has
///   `2 * ceil(truncation * sigma) + 1` taps.
///
/// # Returns
///
/// The kernel, normalized to sum 1.
pub fn gaussian_kernel_1d(sigma: f64, truncation: f64) -> Vec<f64> {
    let half = (truncation * sigma).ceil().max(0.0) as usize;
    let sigma_sq = sigma * sigma;
    let mut kernel: Vec<f64> = (0..2 * half + 1)
        .map(|i| {
            let x = i as f64 - half as f64;
            (-(x * x) / (2.0 * sigma_sq)).exp()
        })
        .collect();

    // normalize the kernel
    let norm = kernel.iter().sum::<f64>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// Gaussian smoothing with a finite impulse response filter.
///
/// Dimensions with a sigma of 0 are not filtered. A `truncation` that is not positive
/// means 3.
///
/// # Arguments
///
/// * `input` - The input image.
/// * `out` - The output image, of a floating-point or complex type.
/// * `sigmas` - The standard deviation per dimension, or one for all dimensions.
/// * `truncation` - The kernel half-width in units of sigma.
/// * `boundary` - The boundary condition per dimension, or one for all of them.
///
/// # Errors
///
/// Negative sigmas give [`ImageError::ParameterOutOfRange`].
pub fn gauss(
    input: &Image,
    out: &mut Image,
    sigmas: &[f64],
    truncation: f64,
    boundary: &[BoundaryCondition],
) -> Result<(), ImageError> {
    if !input.is_forged() {
        return Err(ImageError::NotForged);
    }
    let sigmas = array_use_parameter(sigmas, input.dimensionality(), 1.0)?;
    if sigmas.iter().any(|&s| s < 0.0 || s.is_nan()) {
        return Err(ImageError::ParameterOutOfRange(format!(
            "sigmas must not be negative, got {sigmas:?}"
        )));
    }
    let truncation = if truncation > 0.0 { truncation } else { 3.0 };
    let kernels = sigmas
        .iter()
        .map(|&s| {
            if s == 0.0 {
                Vec::new()
            } else {
                gaussian_kernel_1d(s, truncation)
            }
        })
        .collect();
    separable_convolution(input, out, kernels, boundary)
}
