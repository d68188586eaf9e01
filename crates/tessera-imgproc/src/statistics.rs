//! Whole-image statistics.
//!
//! These reduce an image, or the pixels selected by a mask, to a handful of numbers. Tensor
//! images are treated as if their tensor elements were an extra spatial dimension, unless a
//! function requires a scalar image.
//!
//! Every reduction is a Scan line filter with one accumulator per worker thread. The
//! accumulators are added up in thread order once the scan is done.

use std::ops::AddAssign;

use log::debug;
use num_complex::Complex64;
use tessera_framework::{
    new_dyadic_scan_line_filter, scan, scan_dyadic, scan_single_input, separable, ConstLine,
    PerThread, ScanLineFilter, ScanLineFilterParameters, ScanOptions, SeparableLineFilter,
    SeparableLineFilterParameters, SeparableOptions,
};
use tessera_image::{
    dispatch::{dispatch_flex, FlexVisitor},
    Bin, DataType, FlexSample, Image, ImageError, Sample,
};

use crate::{
    accumulators::{
        CovarianceAccumulator, MinMaxAccumulator, MomentAccumulator, StatisticsAccumulator,
    },
    projection::TieBreak,
    values::{require_forged, require_non_complex, require_scalar},
};

fn reduction_options() -> ScanOptions {
    ScanOptions::new().with_tensor_as_spatial_dim()
}

/// The mask line, if the scan was given a mask as input `index`.
fn mask_line<'b>(
    params: &'b ScanLineFilterParameters<'_>,
    index: usize,
) -> Result<Option<ConstLine<'b, Bin>>, ImageError> {
    params.in_buffer.get(index).map(|m| m.typed::<Bin>()).transpose()
}

fn is_selected(mask: &Option<ConstLine<'_, Bin>>, i: usize) -> bool {
    mask.as_ref().map_or(true, |m| m.get(i).is_set())
}

/// Calls `f` with the index and value of every pixel on the line selected by the mask.
fn visit_line<T: Sample>(
    params: &ScanLineFilterParameters<'_>,
    mut f: impl FnMut(usize, T),
) -> Result<(), ImageError> {
    let input = params.in_buffer[0].typed::<T>()?;
    let mask = mask_line(params, 1)?;
    for i in 0..params.buffer_length {
        if is_selected(&mask, i) {
            f(i, input.get(i));
        }
    }
    Ok(())
}

fn value_buffer_type(input: &Image) -> DataType {
    if input.data_type().is_complex() {
        DataType::DComplex
    } else {
        DataType::DFloat
    }
}

/// A per-thread reduction: each worker pushes into its own slot, the slots are added
/// afterwards in thread order.
struct Reduce<A, F> {
    slots: PerThread<A>,
    push: F,
    cost: usize,
}

impl<A, F> Reduce<A, F>
where
    A: Default + Send + AddAssign,
    F: Fn(&mut A, usize, Complex64) + Sync,
{
    fn new(push: F, cost: usize) -> Self {
        Self {
            slots: PerThread::default(),
            push,
            cost,
        }
    }

    fn total(self) -> A {
        self.slots.into_inner().into_iter().fold(A::default(), |mut total, slot| {
            total += slot;
            total
        })
    }
}

impl<A, F> ScanLineFilter for Reduce<A, F>
where
    A: Default + Send,
    F: Fn(&mut A, usize, Complex64) + Sync,
{
    fn set_number_of_threads(&mut self, threads: usize) {
        self.slots.reset(threads);
    }

    fn get_number_of_operations(&self, _: usize, _: usize, _: usize) -> usize {
        self.cost
    }

    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        let mut slot = self.slots.lock(params.thread)?;
        if params.in_buffer[0].data_type == DataType::DComplex {
            visit_line::<Complex64>(params, |i, v| (self.push)(&mut *slot, i, v))
        } else {
            visit_line::<f64>(params, |i, v| {
                (self.push)(&mut *slot, i, Complex64::new(v, 0.0))
            })
        }
    }
}

/// Counts the non-zero pixels of a scalar image, within `mask` if given.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::statistics::count;
///
/// let image = Image::from_vec(vec![5], 1, vec![0u8, 3, 0, 1, 9])?;
/// assert_eq!(count(&image, None)?, 3);
/// # Ok::<(), ImageError>(())
/// ```
pub fn count(input: &Image, mask: Option<&Image>) -> Result<usize, ImageError> {
    require_scalar(input)?;
    let mut filter = Reduce::new(
        |n: &mut Count, _: usize, v: Complex64| {
            if v.re != 0.0 || v.im != 0.0 {
                n.0 += 1;
            }
        },
        1,
    );
    scan_single_input(input, mask, value_buffer_type(input), &mut filter, ScanOptions::new())?;
    Ok(filter.total().0)
}

#[derive(Default)]
struct Count(usize);

impl AddAssign for Count {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// The smallest and largest sample values.
///
/// The real and imaginary parts of complex samples are both taken into account. NaN values
/// are ignored.
pub fn maximum_and_minimum(
    input: &Image,
    mask: Option<&Image>,
) -> Result<MinMaxAccumulator, ImageError> {
    require_forged(input)?;
    let complex = input.data_type().is_complex();
    let mut filter = Reduce::new(
        move |acc: &mut MinMaxAccumulator, _: usize, v: Complex64| {
            if complex {
                acc.push_pair(v.re, v.im);
            } else {
                acc.push(v.re);
            }
        },
        2,
    );
    scan_single_input(input, mask, value_buffer_type(input), &mut filter, reduction_options())?;
    Ok(filter.total())
}

/// Mean, variance, skewness and excess kurtosis of the sample values.
pub fn sample_statistics(
    input: &Image,
    mask: Option<&Image>,
) -> Result<StatisticsAccumulator, ImageError> {
    require_forged(input)?;
    require_non_complex(input.data_type())?;
    let mut filter = Reduce::new(
        |acc: &mut StatisticsAccumulator, _: usize, v: Complex64| acc.push(v.re),
        12,
    );
    scan_single_input(input, mask, DataType::DFloat, &mut filter, reduction_options())?;
    Ok(filter.total())
}

struct PairedValues {
    slots: PerThread<CovarianceAccumulator>,
}

impl ScanLineFilter for PairedValues {
    fn set_number_of_threads(&mut self, threads: usize) {
        self.slots.reset(threads);
    }

    fn get_number_of_operations(&self, _: usize, _: usize, _: usize) -> usize {
        12
    }

    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        let x = params.in_buffer[0].typed::<f64>()?;
        let y = params.in_buffer[1].typed::<f64>()?;
        let mask = mask_line(params, 2)?;
        let mut acc = self.slots.lock(params.thread)?;
        for i in 0..params.buffer_length {
            if is_selected(&mask, i) {
                acc.push(x.get(i), y.get(i));
            }
        }
        Ok(())
    }
}

/// Covariance and correlation between the samples of two images of the same sizes.
///
/// Both images must have the same number of tensor elements. Corresponding samples are
/// paired, the mask applies to every tensor element of a pixel.
pub fn covariance(
    in1: &Image,
    in2: &Image,
    mask: Option<&Image>,
) -> Result<CovarianceAccumulator, ImageError> {
    require_forged(in1)?;
    require_forged(in2)?;
    require_non_complex(in1.data_type())?;
    require_non_complex(in2.data_type())?;
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
    let mut filter = PairedValues {
        slots: PerThread::default(),
    };
    let expanded;
    let mut inputs = vec![in1, in2];
    let mut buffer_types = vec![DataType::DFloat, DataType::DFloat];
    if let Some(mask) = mask {
        mask.check_is_mask(in1.sizes(), true)?;
        let mut m = mask.clone();
        m.expand_singleton_dimensions(in1.sizes())?;
        expanded = m;
        inputs.push(&expanded);
        buffer_types.push(DataType::Bin);
    }
    let options = reduction_options().with_no_singleton_expansion();
    scan(&inputs, &mut [], &buffer_types, &[], &[], &[], &mut filter, options)?;
    let mut total = CovarianceAccumulator::default();
    for slot in filter.slots.into_inner() {
        total += slot;
    }
    Ok(total)
}

/// Moves `coords` to pixel `i` of the current line.
fn line_coordinates(params: &ScanLineFilterParameters<'_>, i: usize, coords: &mut [usize]) {
    let dim = params.dimension;
    if dim < coords.len() {
        coords[dim] = params.position[dim] + i;
    }
}

struct WeightedPositions {
    template: MomentAccumulator,
    slots: PerThread<Option<MomentAccumulator>>,
}

impl ScanLineFilter for WeightedPositions {
    fn set_number_of_threads(&mut self, threads: usize) {
        self.slots.reset(threads);
    }

    fn get_number_of_operations(&self, _: usize, _: usize, _: usize) -> usize {
        let n = self.template.dimensionality();
        2 + n * (n + 3)
    }

    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        let mut slot = self.slots.lock(params.thread)?;
        let acc = slot.get_or_insert_with(|| self.template.clone());
        let n = self.template.dimensionality();
        let mut coords: Vec<usize> = params.position.iter().copied().take(n).collect();
        coords.resize(n, 0);
        let mut pos = vec![0.0; n];
        visit_line::<f64>(params, |i, weight| {
            line_coordinates(params, i, &mut coords);
            for (p, &c) in pos.iter_mut().zip(&coords) {
                *p = c as f64;
            }
            acc.push(&pos, weight);
        })
    }
}

/// Zeroth, first and second order moments of a scalar image, with the pixel values as
/// weights and pixel coordinates as positions.
pub fn moments(input: &Image, mask: Option<&Image>) -> Result<MomentAccumulator, ImageError> {
    require_scalar(input)?;
    require_non_complex(input.data_type())?;
    let template = MomentAccumulator::new(input.dimensionality().max(1))?;
    let mut filter = WeightedPositions {
        template: template.clone(),
        slots: PerThread::default(),
    };
    let options = ScanOptions::new().with_need_coordinates();
    scan_single_input(input, mask, DataType::DFloat, &mut filter, options)?;
    let mut total = template;
    for slot in filter.slots.into_inner().into_iter().flatten() {
        total += slot;
    }
    Ok(total)
}

/// The center of mass of a scalar image, one coordinate per dimension.
///
/// Gives all zeros if the pixel values sum to zero.
pub fn center_of_mass(input: &Image, mask: Option<&Image>) -> Result<Vec<f64>, ImageError> {
    Ok(moments(input, mask)?.first_order())
}

#[derive(Clone, Debug)]
struct Candidate {
    value: f64,
    index: usize,
    coords: Vec<usize>,
}

struct ExtremePixel {
    maximum: bool,
    tie_break: TieBreak,
    // linear index step of each dimension
    steps: Vec<usize>,
    slots: PerThread<Option<Candidate>>,
}

impl ExtremePixel {
    fn beats(&self, value: f64, index: usize, other: &Candidate) -> bool {
        if value == other.value {
            match self.tie_break {
                TieBreak::First => index < other.index,
                TieBreak::Last => index > other.index,
            }
        } else if self.maximum {
            value > other.value
        } else {
            value < other.value
        }
    }
}

impl ScanLineFilter for ExtremePixel {
    fn set_number_of_threads(&mut self, threads: usize) {
        self.slots.reset(threads);
    }

    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        let mut best = self.slots.lock(params.thread)?;
        let mut coords = params.position.to_vec();
        let start: usize = coords.iter().zip(&self.steps).map(|(c, s)| c * s).sum();
        let step = self.steps.get(params.dimension).copied().unwrap_or(1);
        visit_line::<f64>(params, |i, value| {
            if value.is_nan() {
                return;
            }
            let index = start + i * step;
            let better = match best.as_ref() {
                Some(b) => self.beats(value, index, b),
                None => true,
            };
            if better {
                line_coordinates(params, i, &mut coords);
                *best = Some(Candidate {
                    value,
                    index,
                    coords: coords.clone(),
                });
            }
        })
    }
}

fn extreme_pixel(
    input: &Image,
    mask: Option<&Image>,
    tie_break: TieBreak,
    maximum: bool,
) -> Result<Vec<usize>, ImageError> {
    require_scalar(input)?;
    require_non_complex(input.data_type())?;
    let mut steps = Vec::with_capacity(input.dimensionality().max(1));
    let mut step = 1;
    for &size in input.sizes() {
        steps.push(step);
        step *= size;
    }
    if steps.is_empty() {
        steps.push(1);
    }
    let mut filter = ExtremePixel {
        maximum,
        tie_break,
        steps,
        slots: PerThread::default(),
    };
    let options = ScanOptions::new().with_need_coordinates();
    scan_single_input(input, mask, DataType::DFloat, &mut filter, options)?;
    let mut winner: Option<Candidate> = None;
    for candidate in std::mem::take(&mut filter.slots).into_inner().into_iter().flatten() {
        let better = match &winner {
            Some(w) => filter.beats(candidate.value, candidate.index, w),
            None => true,
        };
        if better {
            winner = Some(candidate);
        }
    }
    let mut position = winner.map_or_else(Vec::new, |w| w.coords);
    position.resize(input.dimensionality(), 0);
    Ok(position)
}

/// The coordinates of the pixel with the largest value.
///
/// With [`TieBreak::First`] the first such pixel in linear index order is returned,
/// with [`TieBreak::Last`] the last one. NaN values are ignored.
pub fn maximum_pixel(
    input: &Image,
    mask: Option<&Image>,
    tie_break: TieBreak,
) -> Result<Vec<usize>, ImageError> {
    extreme_pixel(input, mask, tie_break, true)
}

/// The coordinates of the pixel with the smallest value. See [`maximum_pixel`].
pub fn minimum_pixel(
    input: &Image,
    mask: Option<&Image>,
    tie_break: TieBreak,
) -> Result<Vec<usize>, ImageError> {
    extreme_pixel(input, mask, tie_break, false)
}

/// True if any selected sample is NaN. Only floating-point and complex images can hold NaN.
pub fn contains_not_a_number(input: &Image, mask: Option<&Image>) -> Result<bool, ImageError> {
    require_forged(input)?;
    if !input.data_type().is_flex() {
        return Ok(false);
    }
    let mut filter = Reduce::new(
        |n: &mut Count, _: usize, v: Complex64| {
            if v.re.is_nan() || v.im.is_nan() {
                n.0 += 1;
            }
        },
        1,
    );
    scan_single_input(input, mask, value_buffer_type(input), &mut filter, reduction_options())?;
    Ok(filter.total().0 > 0)
}

struct CumulativeSum;

struct CumulativeSumLine<'p, 'a> {
    params: &'p mut SeparableLineFilterParameters<'a>,
}

impl FlexVisitor for CumulativeSumLine<'_, '_> {
    type Output = Result<(), ImageError>;

    fn visit<T: FlexSample>(self) -> Self::Output {
        let input = self.params.in_buffer.typed::<T>()?;
        let mut output = self.params.out_buffer.typed_mut::<T>()?;
        for t in 0..output.tensor_length() {
            let mut sum = T::zero();
            for i in 0..output.len() as isize {
                sum = sum + input.get_t(i, t);
                output.set_t(i, t, sum);
            }
        }
        Ok(())
    }
}

impl SeparableLineFilter for CumulativeSum {
    fn get_number_of_operations(
        &self,
        line_length: usize,
        n_tensor: usize,
        _border: usize,
        _dimension: usize,
    ) -> usize {
        line_length * n_tensor
    }

    fn filter(&self, params: &mut SeparableLineFilterParameters<'_>) -> Result<(), ImageError> {
        dispatch_flex(params.in_buffer.data_type, CumulativeSumLine { params })?
    }
}

struct ZeroOutsideMask<'a> {
    input: &'a Image,
    mask: &'a Image,
    out: &'a mut Image,
}

impl FlexVisitor for ZeroOutsideMask<'_> {
    type Output = Result<(), ImageError>;

    fn visit<T: FlexSample>(self) -> Self::Output {
        let mut filter =
            new_dyadic_scan_line_filter::<T, _>(|v, m| if m == T::zero() { m } else { v }, 1);
        scan_dyadic(
            self.input,
            self.mask,
            self.out,
            T::DATA_TYPE,
            T::DATA_TYPE,
            &mut filter,
            ScanOptions::new(),
        )
    }
}

/// Computes the cumulative sum of the pixel values along the dimensions selected by
/// `process`.
///
/// Along each processed dimension, every output pixel holds the sum of itself and all
/// preceding pixels. Pixels outside `mask` count as 0. The output is a floating-point or
/// complex type that can hold the sums.
///
/// # Arguments
///
/// * `input` - The input image, of any type.
/// * `mask` - An optional binary mask selecting the pixels to add.
/// * `out` - The output image, with the sizes of the input.
/// * `process` - The dimensions to accumulate along. Empty means all dimensions.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::statistics::cumulative_sum;
///
/// let image = Image::from_vec(vec![2, 2], 1, vec![1u8, 2, 3, 4])?;
/// let mut out = Image::default();
/// cumulative_sum(&image, None, &mut out, &[])?;
/// assert_eq!(out.samples::<f32>()?, vec![1.0, 3.0, 4.0, 10.0]);
/// # Ok::<(), ImageError>(())
/// ```
pub fn cumulative_sum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    require_forged(input)?;
    let dt = input.data_type().suggest_flex();
    let masked = match mask {
        Some(mask) => {
            mask.check_is_mask(input.sizes(), true)?;
            let mut tmp = Image::default();
            dispatch_flex(
                dt,
                ZeroOutsideMask {
                    input,
                    mask,
                    out: &mut tmp,
                },
            )??;
            Some(tmp)
        }
        None => None,
    };
    let source = masked.as_ref().unwrap_or(input);
    debug!("cumulative sum over {:?} in {}", source.sizes(), dt.name());
    separable(
        source,
        out,
        dt,
        dt,
        process,
        &[],
        &[],
        &mut CumulativeSum,
        SeparableOptions::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex32;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tessera_framework::set_number_of_threads;

    #[test]
    fn test_count_and_extremes() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3, 2], 1, vec![0i16, -4, 7, 7, 0, -4])?;
        assert_eq!(count(&image, None)?, 4);
        let acc = maximum_and_minimum(&image, None)?;
        assert_eq!((acc.minimum(), acc.maximum()), (-4.0, 7.0));
        assert_eq!(maximum_pixel(&image, None, TieBreak::First)?, vec![2, 0]);
        assert_eq!(maximum_pixel(&image, None, TieBreak::Last)?, vec![0, 1]);
        assert_eq!(minimum_pixel(&image, None, TieBreak::Last)?, vec![2, 1]);

        let tensor = Image::from_vec(vec![2], 2, vec![1u8, 2, 3, 4])?;
        assert_eq!(count(&tensor, None), Err(ImageError::NotScalar));
        Ok(())
    }

    #[test]
    fn test_complex_extremes_and_nan() -> Result<(), ImageError> {
        let image = Image::from_vec(
            vec![2],
            1,
            vec![Complex32::new(1.0, -6.0), Complex32::new(f32::NAN, 2.0)],
        )?;
        let acc = maximum_and_minimum(&image, None)?;
        assert_eq!((acc.minimum(), acc.maximum()), (-6.0, 2.0));
        assert!(contains_not_a_number(&image, None)?);
        let mask = Image::from_vec(vec![2], 1, vec![Bin::TRUE, Bin::FALSE])?;
        assert!(!contains_not_a_number(&image, Some(&mask))?);
        let ints = Image::from_vec(vec![2], 1, vec![1u8, 2])?;
        assert!(!contains_not_a_number(&ints, None)?);
        Ok(())
    }

    #[test]
    fn test_sample_statistics_with_tensor() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![5], 2, (1..=10).map(|v| v as f64).collect())?;
        let acc = sample_statistics(&image, None)?;
        assert_eq!(acc.number(), 10);
        assert_relative_eq!(acc.mean(), 5.5);
        assert_relative_eq!(acc.variance(), 9.166_666_666_666_666, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_covariance() -> Result<(), ImageError> {
        let x = Image::from_vec(vec![2, 2], 1, vec![1.0f32, 2.0, 3.0, 4.0])?;
        let y = Image::from_vec(vec![2, 2], 1, vec![3u8, 5, 7, 9])?;
        let acc = covariance(&x, &y, None)?;
        assert_relative_eq!(acc.correlation(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(acc.regression().slope, 2.0, epsilon = 1e-12);
        let z = Image::from_vec(vec![4], 1, vec![1u8; 4])?;
        assert!(matches!(
            covariance(&x, &z, None),
            Err(ImageError::SizesDontMatch(_, _))
        ));
        Ok(())
    }

    #[test]
    fn test_masked_covariance_of_tensor_images() -> Result<(), ImageError> {
        let x = Image::from_vec(vec![3], 2, vec![1.0f64, 10.0, 2.0, 20.0, 100.0, -5.0])?;
        let y = Image::from_vec(vec![3], 2, vec![2.0f64, 20.0, 4.0, 40.0, 0.0, 7.0])?;
        let mask = Image::from_vec(vec![3], 1, vec![Bin::TRUE, Bin::TRUE, Bin::FALSE])?;
        let acc = covariance(&x, &y, Some(&mask))?;
        assert_eq!(acc.number(), 4);
        assert_relative_eq!(acc.slope(), 2.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_reductions_do_not_depend_on_the_thread_count() -> Result<(), ImageError> {
        let mut rng = StdRng::seed_from_u64(11);
        let data: Vec<f64> = (0..512 * 384).map(|_| rng.random_range(0.0..10.0)).collect();
        let image = Image::from_vec(vec![512, 384], 1, data)?;
        let flat = Image::from_vec(vec![512, 384], 1, vec![4u8; 512 * 384])?;

        let mut runs = Vec::new();
        for threads in [1, 4] {
            set_number_of_threads(threads);
            runs.push((
                sample_statistics(&image, None)?,
                moments(&image, None)?,
                maximum_pixel(&flat, None, TieBreak::First)?,
                maximum_pixel(&flat, None, TieBreak::Last)?,
                minimum_pixel(&image, None, TieBreak::First)?,
            ));
        }
        set_number_of_threads(0);
        let (one, four) = (&runs[0], &runs[1]);

        // the partial accumulators are added in a different order, equal up to rounding
        assert_eq!(one.0.number(), four.0.number());
        assert_relative_eq!(one.0.mean(), four.0.mean(), max_relative = 1e-12);
        assert_relative_eq!(one.0.variance(), four.0.variance(), max_relative = 1e-10);
        assert_relative_eq!(one.0.skewness(), four.0.skewness(), epsilon = 1e-8);
        assert_relative_eq!(
            one.0.excess_kurtosis(),
            four.0.excess_kurtosis(),
            epsilon = 1e-8
        );
        assert_relative_eq!(one.1.sum(), four.1.sum(), max_relative = 1e-12);
        for (a, b) in one.1.first_order().iter().zip(four.1.first_order()) {
            assert_relative_eq!(*a, b, max_relative = 1e-12);
        }
        for (a, b) in one.1.second_order().iter().zip(four.1.second_order()) {
            assert_relative_eq!(*a, b, max_relative = 1e-9);
        }

        // ties go to the lowest or highest linear index, whichever thread saw them
        assert_eq!(one.2, vec![0, 0]);
        assert_eq!(four.2, vec![0, 0]);
        assert_eq!(one.3, vec![511, 383]);
        assert_eq!(four.3, vec![511, 383]);
        assert_eq!(one.4, four.4);
        Ok(())
    }

    #[test]
    fn test_center_of_mass() -> Result<(), ImageError> {
        let mut data = vec![0u8; 12];
        data[4 + 2] = 1;
        data[4 + 3] = 3;
        let image = Image::from_vec(vec![4, 3], 1, data)?;
        assert_eq!(center_of_mass(&image, None)?, vec![2.75, 1.0]);
        let empty = Image::from_vec(vec![4, 3], 1, vec![0u8; 12])?;
        assert_eq!(center_of_mass(&empty, None)?, vec![0.0, 0.0]);
        let m = moments(&image, None)?;
        assert_eq!(m.sum(), 4.0);
        Ok(())
    }

    #[test]
    fn test_cumulative_sum() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3, 2], 1, vec![1i32, 2, 3, 4, 5, 6])?;
        let mut out = Image::default();
        cumulative_sum(&image, None, &mut out, &[true, false])?;
        assert_eq!(out.data_type(), DataType::DFloat);
        assert_eq!(out.samples::<f64>()?, vec![1.0, 3.0, 6.0, 4.0, 9.0, 15.0]);

        let mask = Image::from_vec(vec![3, 1], 1, vec![Bin::TRUE, Bin::FALSE, Bin::TRUE])?;
        cumulative_sum(&image, Some(&mask), &mut out, &[true, false])?;
        assert_eq!(out.samples::<f64>()?, vec![1.0, 1.0, 4.0, 4.0, 4.0, 10.0]);
        Ok(())
    }
}
