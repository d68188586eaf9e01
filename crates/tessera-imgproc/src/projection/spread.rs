use tessera_framework::{ProjectionFunction, SampleSlot};
use tessera_image::{Image, ImageError};

use super::{project, VarianceMode};
use crate::{
    accumulators::{
        DirectionalStatisticsAccumulator, FastVarianceAccumulator, VarianceAccumulator,
    },
    values::{for_each_value, require_float, require_non_complex},
};

struct Spread {
    mode: VarianceMode,
    standard_deviation: bool,
}

impl ProjectionFunction for Spread {
    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        _thread: usize,
    ) -> Result<(), ImageError> {
        let (variance, std) = match self.mode {
            VarianceMode::Stable => {
                let mut acc = VarianceAccumulator::default();
                for_each_value(input, mask, |v| acc.push(v.re))?;
                (acc.variance(), acc.standard_deviation())
            }
            VarianceMode::Fast => {
                let mut acc = FastVarianceAccumulator::default();
                for_each_value(input, mask, |v| acc.push(v.re))?;
                (acc.variance(), acc.standard_deviation())
            }
            VarianceMode::Directional => {
                let mut acc = DirectionalStatisticsAccumulator::default();
                for_each_value(input, mask, |v| acc.push(v.re))?;
                (acc.variance(), acc.standard_deviation())
            }
        };
        out.set_f64(if self.standard_deviation { std } else { variance });
        Ok(())
    }
}

fn spread(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    mut mode: VarianceMode,
    process: &[bool],
    standard_deviation: bool,
) -> Result<(), ImageError> {
    let dt = input.data_type();
    require_non_complex(dt)?;
    match mode {
        VarianceMode::Stable if dt.size_of() <= 2 => mode = VarianceMode::Fast,
        VarianceMode::Directional => require_float(dt)?,
        _ => {}
    }
    let mut function = Spread {
        mode,
        standard_deviation,
    };
    project(input, mask, out, dt.suggest_float(), process, &mut function)
}

/// Computes the unbiased sample variance over the dimensions selected by `process`.
///
/// Fibres with fewer than two selected pixels give 0. Complex inputs are not supported.
///
/// # Arguments
///
/// * `input` - The input image, of a real or binary type.
/// * `mask` - An optional binary mask selecting the pixels to use.
/// * `out` - The output image, of a floating-point type.
/// * `mode` - How the variance is accumulated, see [`VarianceMode`].
/// * `process` - The dimensions to reduce. Empty means all dimensions.
pub fn variance(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    mode: VarianceMode,
    process: &[bool],
) -> Result<(), ImageError> {
    spread(input, mask, out, mode, process, false)
}

/// Computes the square root of [`variance`].
pub fn standard_deviation(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    mode: VarianceMode,
    process: &[bool],
) -> Result<(), ImageError> {
    spread(input, mask, out, mode, process, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tessera_image::DataType;

    #[test]
    fn test_variance_modes() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![10], 1, (1..=10).map(|v| v as f32).collect())?;
        let mut out = Image::default();
        for mode in [VarianceMode::Stable, VarianceMode::Fast] {
            variance(&image, None, &mut out, mode, &[])?;
            assert_eq!(out.data_type(), DataType::SFloat);
            assert_relative_eq!(out.sample::<f64>(&[0], 0)?, 9.166_666, epsilon = 1e-5);
        }
        standard_deviation(&image, None, &mut out, VarianceMode::Stable, &[])?;
        assert_relative_eq!(out.sample::<f64>(&[0], 0)?, 3.027_650, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn test_variance_per_row() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3, 2], 1, vec![1u8, 2, 3, 5, 5, 5])?;
        let mut out = Image::default();
        variance(&image, None, &mut out, VarianceMode::Stable, &[true, false])?;
        assert_eq!(out.samples::<f32>()?, vec![1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_variance_rejects() -> Result<(), ImageError> {
        let mut out = Image::default();
        let complex = Image::from_vec(vec![2], 1, vec![num_complex::Complex64::new(1.0, 0.0); 2])?;
        assert!(variance(&complex, None, &mut out, VarianceMode::Stable, &[]).is_err());
        let ints = Image::from_vec(vec![2], 1, vec![1i32, 2])?;
        assert_eq!(
            variance(&ints, None, &mut out, VarianceMode::Directional, &[]),
            Err(ImageError::DataTypeNotSupported(DataType::SInt32))
        );
        Ok(())
    }
}
