//! Linear filters, applied one dimension at a time with the Separable framework.

use log::debug;
use tessera_framework::{
    separable, BoundaryCondition, SeparableLineFilter, SeparableLineFilterParameters,
    SeparableOptions,
};
use tessera_image::{
    dispatch::{dispatch_flex, FlexVisitor},
    FlexSample, Image, ImageError,
};

mod derivative;
mod gauss;

pub use derivative::finite_difference;
pub use gauss::{gauss, gaussian_kernel_1d};

/// A 1-D kernel per image dimension, in convolution order. An empty kernel leaves the
/// dimension alone.
struct SeparableConvolution {
    kernels: Vec<Vec<f64>>,
}

struct ConvolveLine<'k, 'p, 'a> {
    kernel: &'k [f64],
    params: &'p mut SeparableLineFilterParameters<'a>,
}

impl FlexVisitor for ConvolveLine<'_, '_, '_> {
    type Output = Result<(), ImageError>;

    fn visit<T: FlexSample>(self) -> Self::Output {
        let weights: Vec<T> = self.kernel.iter().map(|&w| T::from_f64(w)).collect();
        let half = (weights.len() / 2) as isize;
        let input = self.params.in_buffer.typed::<T>()?;
        let mut output = self.params.out_buffer.typed_mut::<T>()?;
        for t in 0..output.tensor_length() {
            for i in 0..output.len() as isize {
                let mut sum = T::zero();
                for (k, &w) in weights.iter().enumerate() {
                    sum = sum + input.get_t(i + half - k as isize, t) * w;
                }
                output.set_t(i, t, sum);
            }
        }
        Ok(())
    }
}

impl SeparableLineFilter for SeparableConvolution {
    fn get_number_of_operations(
        &self,
        line_length: usize,
        n_tensor: usize,
        _border: usize,
        dimension: usize,
    ) -> usize {
        let taps = self.kernels.get(dimension).map_or(1, |k| k.len());
        line_length * n_tensor * 2 * taps
    }

    fn filter(&self, params: &mut SeparableLineFilterParameters<'_>) -> Result<(), ImageError> {
        let kernel = self
            .kernels
            .get(params.dimension)
            .ok_or(ImageError::IllegalDimension(params.dimension, self.kernels.len()))?;
        dispatch_flex(params.in_buffer.data_type, ConvolveLine { kernel, params })?
    }
}

/// Convolves `input` with one kernel per dimension. Kernels have odd lengths.
fn separable_convolution(
    input: &Image,
    out: &mut Image,
    kernels: Vec<Vec<f64>>,
    boundary: &[BoundaryCondition],
) -> Result<(), ImageError> {
    let process: Vec<bool> = kernels.iter().map(|k| !k.is_empty()).collect();
    let border: Vec<usize> = kernels.iter().map(|k| k.len() / 2).collect();
    let dt = input.data_type().suggest_flex();
    let lengths: Vec<usize> = kernels.iter().map(Vec::len).collect();
    debug!("separable convolution, kernel lengths {lengths:?}");
    separable(
        input,
        out,
        dt,
        dt,
        &process,
        &border,
        boundary,
        &mut SeparableConvolution { kernels },
        SeparableOptions::new(),
    )
}
