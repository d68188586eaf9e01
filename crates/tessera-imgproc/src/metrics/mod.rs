//! Quality and comparison metrics between an image and a reference.
//!
//! All metrics take two images of the same sizes and number of tensor elements. Tensor
//! elements are compared as if they were an extra spatial dimension.
//!
//! - pixel errors: [`mean_error`], [`mean_square_error`], [`root_mean_square_error`],
//!   [`mean_absolute_error`], [`maximum_absolute_error`], [`i_divergence`], [`in_product`],
//!   [`ln_norm_error`] and [`psnr`]
//! - structural similarity: [`ssim`]
//! - information: [`entropy`] and [`mutual_information`]
//! - segmentation overlap: [`spatial_overlap`] and the single measures derived from it
//! - set distances between binary images: [`hausdorff_distance`],
//!   [`modified_hausdorff_distance`] and [`sum_of_minimal_distances`]

use num_complex::Complex64;
use tessera_framework::{scan, PerThread, ScanLineFilter, ScanLineFilterParameters, ScanOptions};
use tessera_image::{Bin, DataType, Image, ImageError, Sample};

mod distance;
mod error;
mod information;
mod overlap;
mod ssim;

pub use distance::{hausdorff_distance, modified_hausdorff_distance, sum_of_minimal_distances};
pub use error::{
    i_divergence, in_product, ln_norm_error, maximum_absolute_error, mean_absolute_error,
    mean_error, mean_square_error, psnr, root_mean_square_error,
};
pub use information::{entropy, mutual_information};
pub use overlap::{
    accuracy, dice_coefficient, jaccard_index, sensitivity, spatial_overlap, specificity,
    SpatialOverlapMetrics,
};
pub use ssim::ssim;

/// A running sum with the number of terms.
#[derive(Clone, Copy, Debug, Default)]
struct Total {
    sum: f64,
    count: usize,
}

impl Total {
    fn add(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    fn merge(mut self, other: Total) -> Total {
        self.sum += other.sum;
        self.count += other.count;
        self
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Calls `step` for every pair of corresponding samples, one accumulator per worker.
struct PairScan<A, F> {
    step: F,
    partials: PerThread<A>,
}

impl<A, F> PairScan<A, F>
where
    A: Default + Send,
    F: Fn(&mut A, Complex64, Complex64) + Sync,
{
    fn lines<T: Sample>(&self, params: &ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        let a = params.in_buffer[0].typed::<T>()?;
        let b = params.in_buffer[1].typed::<T>()?;
        let mask = params
            .in_buffer
            .get(2)
            .map(|m| m.typed::<Bin>())
            .transpose()?;
        let mut acc = self.partials.lock(params.thread)?;
        for i in 0..params.buffer_length {
            if mask.as_ref().map_or(true, |m| m.get(i).is_set()) {
                (self.step)(&mut acc, a.get(i).as_complex(), b.get(i).as_complex());
            }
        }
        Ok(())
    }
}

impl<A, F> ScanLineFilter for PairScan<A, F>
where
    A: Default + Send,
    F: Fn(&mut A, Complex64, Complex64) + Sync,
{
    fn set_number_of_threads(&mut self, threads: usize) {
        self.partials.reset(threads);
    }

    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        match params.in_buffer[0].data_type {
            DataType::DComplex => self.lines::<Complex64>(params),
            _ => self.lines::<f64>(params),
        }
    }
}

fn check_pair(in1: &Image, in2: &Image) -> Result<(), ImageError> {
    if !in1.is_forged() || !in2.is_forged() {
        return Err(ImageError::NotForged);
    }
    if in1.sizes() != in2.sizes() {
        return Err(ImageError::SizesDontMatch(
            in1.sizes().to_vec(),
            in2.sizes().to_vec(),
        ));
    }
    if in1.tensor_elements() != in2.tensor_elements() {
        return Err(ImageError::NTensorElementsDontMatch(
            in1.tensor_elements(),
            in2.tensor_elements(),
        ));
    }
    Ok(())
}

fn check_real_pair(in1: &Image, in2: &Image) -> Result<(), ImageError> {
    check_pair(in1, in2)?;
    for dt in [in1.data_type(), in2.data_type()] {
        if dt.is_complex() {
            return Err(ImageError::DataTypeNotSupported(dt));
        }
    }
    Ok(())
}

/// Runs `step` over all sample pairs of `in1` and `in2` selected by `mask`, and returns the
/// accumulator of each worker.
fn scan_pairs<A, F>(
    in1: &Image,
    in2: &Image,
    mask: Option<&Image>,
    step: F,
) -> Result<Vec<A>, ImageError>
where
    A: Default + Send,
    F: Fn(&mut A, Complex64, Complex64) + Sync,
{
    check_pair(in1, in2)?;
    let buffer_type = if in1.data_type().is_complex() || in2.data_type().is_complex() {
        DataType::DComplex
    } else {
        DataType::DFloat
    };
    let mut filter = PairScan {
        step,
        partials: PerThread::new(1),
    };
    let options = ScanOptions::new().with_tensor_as_spatial_dim();
    match mask {
        None => scan(
            &[in1, in2],
            &mut [],
            &[buffer_type, buffer_type],
            &[],
            &[],
            &[],
            &mut filter,
            options,
        )?,
        Some(mask) => {
            mask.check_is_mask(in1.sizes(), true)?;
            let mut mask = mask.clone();
            mask.expand_singleton_dimensions(in1.sizes())?;
            scan(
                &[in1, in2, &mask],
                &mut [],
                &[buffer_type, buffer_type, DataType::Bin],
                &[],
                &[],
                &[],
                &mut filter,
                options,
            )?
        }
    }
    Ok(filter.partials.into_inner())
}

/// Sums `term` over all selected sample pairs.
fn pair_total<F>(
    in1: &Image,
    in2: &Image,
    mask: Option<&Image>,
    term: F,
) -> Result<Total, ImageError>
where
    F: Fn(Complex64, Complex64) -> f64 + Sync,
{
    let partials = scan_pairs(in1, in2, mask, |acc: &mut Total, a, b| acc.add(term(a, b)))?;
    Ok(partials.into_iter().fold(Total::default(), Total::merge))
}
