//! Reductions of images along a subset of their dimensions.
//!
//! Each operator takes an input image, an optional binary mask, an output image and a
//! `process` array selecting the dimensions to reduce (empty means all of them). The reduced
//! dimensions become singletons in the output, tensor elements are reduced independently.
//!
//! - [`sum`], [`mean`], [`product`] and [`geometric_mean`]
//! - [`sum_abs`], [`mean_abs`], [`sum_square`], [`mean_square`], [`sum_square_modulus`] and
//!   [`mean_square_modulus`]
//! - [`variance`] and [`standard_deviation`]
//! - [`maximum`], [`minimum`], [`maximum_abs`], [`minimum_abs`], [`all`] and [`any`]
//! - [`percentile`], [`median`] and [`median_absolute_deviation`]
//! - [`position_maximum`], [`position_minimum`], [`position_percentile`] and
//!   [`position_median`], which reduce a single dimension to the coordinate of the selected
//!   pixel
//! - [`radial_sum`], [`radial_mean`], [`radial_minimum`] and [`radial_maximum`], which bin
//!   the pixels by their distance to a center

use std::str::FromStr;

use tessera_framework::{projection, ProjectionFunction, ProjectionOptions};
use tessera_image::{DataType, Image, ImageError};

mod extrema;
mod percentile;
mod position;
mod radial;
mod spread;
mod sum;

pub use extrema::{all, any, maximum, maximum_abs, minimum, minimum_abs};
pub use percentile::{median, median_absolute_deviation, percentile, rank_from_percentile};
pub use position::{position_maximum, position_median, position_minimum, position_percentile};
pub use radial::{radial_maximum, radial_mean, radial_minimum, radial_sum, MaxRadius};
pub use spread::{standard_deviation, variance};
pub use sum::{
    geometric_mean, mean, mean_abs, mean_square, mean_square_modulus, product, sum, sum_abs,
    sum_square, sum_square_modulus,
};

/// How [`mean`] averages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MeanMode {
    /// The arithmetic mean.
    #[default]
    Plain,
    /// The circular mean of angles in radians. Needs floating-point input.
    Directional,
}

impl FromStr for MeanMode {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(MeanMode::Plain),
            "directional" => Ok(MeanMode::Directional),
            _ => Err(ImageError::InvalidFlag(s.to_string())),
        }
    }
}

/// How [`variance`] and [`standard_deviation`] accumulate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VarianceMode {
    /// Welford's update. Inputs of 8 and 16 bits use [`VarianceMode::Fast`], which is exact
    /// for them.
    #[default]
    Stable,
    /// Sums of values and squared values.
    Fast,
    /// Circular variance of angles in radians. Needs floating-point input.
    Directional,
}

impl FromStr for VarianceMode {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "stable" => Ok(VarianceMode::Stable),
            "fast" => Ok(VarianceMode::Fast),
            "directional" => Ok(VarianceMode::Directional),
            _ => Err(ImageError::InvalidFlag(s.to_string())),
        }
    }
}

/// Which pixel the position projections report when several qualify.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// The one with the lowest coordinate.
    #[default]
    First,
    /// The one with the highest coordinate.
    Last,
}

impl FromStr for TieBreak {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "first" => Ok(TieBreak::First),
            "last" => Ok(TieBreak::Last),
            _ => Err(ImageError::InvalidFlag(s.to_string())),
        }
    }
}

fn project(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    out_type: DataType,
    process: &[bool],
    function: &mut dyn ProjectionFunction,
) -> Result<(), ImageError> {
    projection(
        input,
        mask,
        out,
        out_type,
        process,
        function,
        ProjectionOptions::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("directional".parse(), Ok(MeanMode::Directional));
        assert_eq!("".parse(), Ok(VarianceMode::Stable));
        assert_eq!("fast".parse(), Ok(VarianceMode::Fast));
        assert_eq!("last".parse(), Ok(TieBreak::Last));
        assert_eq!(
            "middle".parse::<TieBreak>(),
            Err(ImageError::InvalidFlag("middle".to_string()))
        );
    }
}
