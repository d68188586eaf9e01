use num_complex::Complex64;
use tessera_framework::{ProjectionFunction, SampleSlot};
use tessera_image::{Image, ImageError};

use super::{project, MeanMode};
use crate::{
    accumulators::DirectionalStatisticsAccumulator,
    values::{for_each_value, require_float},
};

#[derive(Clone, Copy)]
enum Term {
    Plain,
    Abs,
    Square,
    SquareModulus,
}

impl Term {
    fn apply(self, v: Complex64) -> Complex64 {
        match self {
            Term::Plain => v,
            Term::Abs => Complex64::new(v.norm(), 0.0),
            Term::Square => v * v,
            Term::SquareModulus => Complex64::new(v.norm_sqr(), 0.0),
        }
    }
}

struct SumMean {
    term: Term,
    mean: bool,
}

impl ProjectionFunction for SumMean {
    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        _thread: usize,
    ) -> Result<(), ImageError> {
        let mut sum = Complex64::new(0.0, 0.0);
        let n = for_each_value(input, mask, |v| sum += self.term.apply(v))?;
        if self.mean && n > 0 {
            sum /= n as f64;
        }
        out.set_complex(sum);
        Ok(())
    }
}

struct MeanDirectional;

impl ProjectionFunction for MeanDirectional {
    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        _thread: usize,
    ) -> Result<(), ImageError> {
        let mut acc = DirectionalStatisticsAccumulator::default();
        for_each_value(input, mask, |v| acc.push(v.re))?;
        out.set_f64(acc.mean());
        Ok(())
    }
}

struct ProductGeometricMean {
    mean: bool,
    complex: bool,
}

impl ProjectionFunction for ProductGeometricMean {
    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        _thread: usize,
    ) -> Result<(), ImageError> {
        if !self.mean {
            let mut product = Complex64::new(1.0, 0.0);
            for_each_value(input, mask, |v| product *= v)?;
            out.set_complex(product);
            return Ok(());
        }
        // sum of logarithms, the product over- or underflows quickly
        let mut log_sum = Complex64::new(0.0, 0.0);
        let n = for_each_value(input, mask, |v| {
            log_sum += if self.complex {
                v.ln()
            } else {
                Complex64::new(v.re.ln(), 0.0)
            }
        })?;
        out.set_complex((log_sum / n.max(1) as f64).exp());
        Ok(())
    }
}

fn sum_mean(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
    term: Term,
    mean: bool,
) -> Result<(), ImageError> {
    let dt = input.data_type();
    let out_type = match term {
        Term::Plain | Term::Square => dt.suggest_flex(),
        Term::Abs | Term::SquareModulus => dt.suggest_float(),
    };
    project(input, mask, out, out_type, process, &mut SumMean { term, mean })
}

/// Computes the sum of the pixel values over the dimensions selected by `process`.
///
/// # Arguments
///
/// * `input` - The input image, of any type.
/// * `mask` - An optional binary mask selecting the pixels to add.
/// * `out` - The output image. Reduced dimensions are singletons. Its type is a
///   floating-point or complex type that can hold the sum.
/// * `process` - The dimensions to reduce. Empty means all dimensions.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::projection::sum;
///
/// let image = Image::from_vec(vec![3, 2], 1, vec![1u8, 2, 3, 4, 5, 6])?;
/// let mut rows = Image::default();
/// sum(&image, None, &mut rows, &[true, false])?;
/// assert_eq!(rows.sizes(), &[1, 2]);
/// assert_eq!(rows.samples::<f32>()?, vec![6.0, 15.0]);
/// # Ok::<(), ImageError>(())
/// ```
pub fn sum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    sum_mean(input, mask, out, process, Term::Plain, false)
}

/// Computes the mean of the pixel values over the dimensions selected by `process`.
///
/// A fibre without selected pixels gives 0. [`MeanMode::Directional`] computes the circular
/// mean of angles in radians, and fails for inputs that are not floating-point.
///
/// # Arguments
///
/// * `input` - The input image, of any type.
/// * `mask` - An optional binary mask selecting the pixels to average.
/// * `out` - The output image, of a floating-point or complex type.
/// * `mode` - The kind of mean.
/// * `process` - The dimensions to reduce. Empty means all dimensions.
pub fn mean(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    mode: MeanMode,
    process: &[bool],
) -> Result<(), ImageError> {
    match mode {
        MeanMode::Plain => sum_mean(input, mask, out, process, Term::Plain, true),
        MeanMode::Directional => {
            let dt = input.data_type();
            require_float(dt)?;
            project(input, mask, out, dt.suggest_flex(), process, &mut MeanDirectional)
        }
    }
}

/// Computes the product of the pixel values over the dimensions selected by `process`.
pub fn product(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    let mut function = ProductGeometricMean {
        mean: false,
        complex: input.data_type().is_complex(),
    };
    project(input, mask, out, input.data_type().suggest_flex(), process, &mut function)
}

/// Computes the geometric mean, `exp(mean(ln(x)))`, over the dimensions selected by
/// `process`.
///
/// Real inputs with negative values give NaN. Complex inputs use the principal complex
/// logarithm.
pub fn geometric_mean(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    let mut function = ProductGeometricMean {
        mean: true,
        complex: input.data_type().is_complex(),
    };
    project(input, mask, out, input.data_type().suggest_flex(), process, &mut function)
}

/// Computes the sum of the absolute pixel values. The output is real.
pub fn sum_abs(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    if input.data_type().is_unsigned() {
        return sum_mean(input, mask, out, process, Term::Plain, false);
    }
    sum_mean(input, mask, out, process, Term::Abs, false)
}

/// Computes the mean of the absolute pixel values. The output is real.
pub fn mean_abs(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    if input.data_type().is_unsigned() {
        return sum_mean(input, mask, out, process, Term::Plain, true);
    }
    sum_mean(input, mask, out, process, Term::Abs, true)
}

/// Computes the sum of the squared pixel values. Complex values are squared, not their
/// modulus, see [`sum_square_modulus`].
pub fn sum_square(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    sum_mean(input, mask, out, process, Term::Square, false)
}

/// Computes the mean of the squared pixel values.
pub fn mean_square(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    sum_mean(input, mask, out, process, Term::Square, true)
}

/// Computes the sum of the squared modulus of the pixel values. For real inputs this is
/// [`sum_square`].
pub fn sum_square_modulus(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    if !input.data_type().is_complex() {
        return sum_square(input, mask, out, process);
    }
    sum_mean(input, mask, out, process, Term::SquareModulus, false)
}

/// Computes the mean of the squared modulus of the pixel values. For real inputs this is
/// [`mean_square`].
pub fn mean_square_modulus(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    process: &[bool],
) -> Result<(), ImageError> {
    if !input.data_type().is_complex() {
        return mean_square(input, mask, out, process);
    }
    sum_mean(input, mask, out, process, Term::SquareModulus, true)
}
