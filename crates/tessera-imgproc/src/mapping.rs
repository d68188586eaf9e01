//! Point-wise mappings of sample values: clipping, thresholding to zero, inversion and
//! contrast stretching.
//!
//! Every mapping treats the tensor elements as an extra spatial dimension, so all samples
//! of a tensor image are mapped independently.

use std::str::FromStr;

use log::debug;
use tessera_framework::{new_monadic_scan_line_filter, scan_monadic, ScanOptions};
use tessera_image::{
    dispatch::{dispatch_all, dispatch_real, AllVisitor, RealVisitor},
    AcceptDataTypeChange, DataType, Image, ImageError, RealSample, Sample, SampleValue,
};

use crate::{
    projection::percentile,
    values::{require_forged, require_non_complex, spatial_view},
};

/// Which side of the range [`clip`] and [`erf_clip`] act on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipMode {
    /// Clip below `low` and above `high`.
    #[default]
    Both,
    /// Clip below `low` only.
    Low,
    /// Clip above `high` only.
    High,
    /// `low` is the center of the range and `high` its width.
    Range,
}

impl FromStr for ClipMode {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "both" => Ok(ClipMode::Both),
            "low" => Ok(ClipMode::Low),
            "high" => Ok(ClipMode::High),
            "range" => Ok(ClipMode::Range),
            _ => Err(ImageError::InvalidFlag(s.to_string())),
        }
    }
}

impl ClipMode {
    fn clips_low(self) -> bool {
        self != ClipMode::High
    }

    fn clips_high(self) -> bool {
        self != ClipMode::Low
    }
}

/// The mapping applied by [`contrast_stretch`] between the input and output ranges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StretchMethod {
    /// A straight line through the two range ends.
    #[default]
    Linear,
    /// Linear over a range symmetric around 0, so that 0 maps to the middle of the output.
    SignedLinear,
    /// `ln(v - min + 1)`, scaled to the output range.
    Logarithmic,
    /// A logarithmic mapping mirrored around 0.
    SignedLogarithmic,
    /// An error-function soft clip centered on the input range.
    Erf,
    /// Each decade below the input maximum is stretched over the full output range. The first
    /// parameter is the number of decades shown.
    Decade,
    /// `x / (1 + |x|)` applied to `slope · v + point`, with the slope and point given by the
    /// two parameters.
    Sigmoid,
}

impl FromStr for StretchMethod {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "linear" => Ok(StretchMethod::Linear),
            "signed linear" => Ok(StretchMethod::SignedLinear),
            "logarithmic" => Ok(StretchMethod::Logarithmic),
            "signed logarithmic" => Ok(StretchMethod::SignedLogarithmic),
            "erf" => Ok(StretchMethod::Erf),
            "decade" => Ok(StretchMethod::Decade),
            "sigmoid" => Ok(StretchMethod::Sigmoid),
            _ => Err(ImageError::InvalidFlag(s.to_string())),
        }
    }
}

/// The error function.
///
/// Uses the Maclaurin series below `|x| = 3` and the continued fraction of the complementary
/// function above it. The absolute error is below `1e-13`.
///
/// # Example
///
/// ```
/// use approx::assert_relative_eq;
/// use tessera_imgproc::mapping::erf;
///
/// assert_eq!(erf(0.0), 0.0);
/// assert_relative_eq!(erf(1.0), 0.842_700_792_949_714_9, epsilon = 1e-14);
/// assert_relative_eq!(erf(-1.0), -erf(1.0));
/// ```
pub fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    let a = x.abs();
    let value = if a < 3.0 {
        // terms alternate in sign and fall below 1e-17 well before 100 terms
        let x2 = a * a;
        let mut term = a;
        let mut sum = a;
        for n in 1..100 {
            term *= -x2 / n as f64;
            let contribution = term / (2 * n + 1) as f64;
            sum += contribution;
            if contribution.abs() < 1e-17 * sum.abs() {
                break;
            }
        }
        sum * std::f64::consts::FRAC_2_SQRT_PI
    } else if a < 27.0 {
        let mut t = a;
        for k in (1..=60).rev() {
            t = a + (k as f64 * 0.5) / t;
        }
        let erfc = (-a * a).exp() / (t * std::f64::consts::PI.sqrt());
        1.0 - erfc
    } else {
        1.0
    };
    value.copysign(x)
}

fn scan_options() -> ScanOptions {
    ScanOptions::new().with_tensor_as_spatial_dim()
}

struct Clamp<'a> {
    input: &'a Image,
    out: &'a mut Image,
    low: f64,
    high: f64,
}

impl RealVisitor for Clamp<'_> {
    type Output = Result<(), ImageError>;

    fn visit<T: RealSample>(self) -> Self::Output {
        let (low, high) = (T::from_f64(self.low), T::from_f64(self.high));
        let mut filter = new_monadic_scan_line_filter::<T, _>(
            move |v| num_traits::clamp(v, low, high),
            2,
        );
        let dt = T::DATA_TYPE;
        let n = self.input.tensor_elements();
        scan_monadic(self.input, self.out, dt, dt, n, &mut filter, scan_options())
    }
}

/// Limits the sample values to `[low, high]`.
///
/// The output has the data type of the input. With [`ClipMode::Range`], `low` is the center
/// of the range and `high` its width. The bounds are swapped if given in the wrong order.
/// NaN samples stay NaN.
///
/// # Arguments
///
/// * `input` - The input image, of a real type.
/// * `out` - The output image.
/// * `low` - The lower bound, or the center of the range.
/// * `high` - The upper bound, or the width of the range.
/// * `mode` - Which bounds to apply.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::mapping::{clip, ClipMode};
///
/// let image = Image::from_vec(vec![4], 1, vec![0u8, 50, 100, 200])?;
/// let mut out = Image::default();
/// clip(&image, &mut out, 20.0, 150.0, ClipMode::Both)?;
/// assert_eq!(out.samples::<u8>()?, vec![20, 50, 100, 150]);
/// # Ok::<(), ImageError>(())
/// ```
pub fn clip(
    input: &Image,
    out: &mut Image,
    low: f64,
    high: f64,
    mode: ClipMode,
) -> Result<(), ImageError> {
    require_forged(input)?;
    let (mut low, mut high) = if mode == ClipMode::Range {
        (low - high / 2.0, low + high / 2.0)
    } else {
        (low, high)
    };
    if low > high {
        std::mem::swap(&mut low, &mut high);
    }
    if !mode.clips_low() {
        low = f64::NEG_INFINITY;
    }
    if !mode.clips_high() {
        high = f64::INFINITY;
    }
    dispatch_real(
        input.data_type(),
        Clamp {
            input,
            out,
            low,
            high,
        },
    )?
}

/// Clips softly with the error function.
///
/// Values inside the range are left nearly untouched, values outside it approach the bounds
/// asymptotically. The output is floating-point.
///
/// With [`ClipMode::Low`] or [`ClipMode::High`] only the values on that side of the range
/// center are mapped. With [`ClipMode::Range`], `low` is the center of the range and `high`
/// its width.
pub fn erf_clip(
    input: &Image,
    out: &mut Image,
    low: f64,
    high: f64,
    mode: ClipMode,
) -> Result<(), ImageError> {
    require_forged(input)?;
    require_non_complex(input.data_type())?;
    if input.data_type() == DataType::Bin {
        return Err(ImageError::DataTypeNotSupported(DataType::Bin));
    }
    let (threshold, range) = if mode == ClipMode::Range {
        (low, high)
    } else {
        let (low, high) = if low > high { (high, low) } else { (low, high) };
        ((low + high) / 2.0, high - low)
    };
    let scale_in = std::f64::consts::PI.sqrt() / range;
    let scale_out = range / 2.0;
    let (clips_low, clips_high) = (mode.clips_low(), mode.clips_high());
    let mut filter = new_monadic_scan_line_filter::<f64, _>(
        move |v| {
            let d = v - threshold;
            let mapped = (clips_low && clips_high)
                || (!clips_low && d > 0.0)
                || (!clips_high && d < 0.0);
            if mapped {
                threshold + scale_out * erf(d * scale_in)
            } else {
                v
            }
        },
        22,
    );
    let out_type = input.data_type().suggest_float();
    let n = input.tensor_elements();
    scan_monadic(input, out, DataType::DFloat, out_type, n, &mut filter, scan_options())
}

struct ZeroBelow<'a> {
    input: &'a Image,
    out: &'a mut Image,
    threshold: f64,
}

impl RealVisitor for ZeroBelow<'_> {
    type Output = Result<(), ImageError>;

    fn visit<T: RealSample>(self) -> Self::Output {
        let threshold = self.threshold;
        let mut filter = new_monadic_scan_line_filter::<T, _>(
            move |v| if v.as_f64() < threshold { T::zero() } else { v },
            2,
        );
        let dt = T::DATA_TYPE;
        let n = self.input.tensor_elements();
        scan_monadic(self.input, self.out, dt, dt, n, &mut filter, scan_options())
    }
}

/// Sets samples below `threshold` to zero. The output has the data type of the input.
pub fn zero(input: &Image, out: &mut Image, threshold: f64) -> Result<(), ImageError> {
    require_forged(input)?;
    dispatch_real(
        input.data_type(),
        ZeroBelow {
            input,
            out,
            threshold,
        },
    )?
}

struct Invert<'a> {
    input: &'a Image,
    out: &'a mut Image,
}

impl AllVisitor for Invert<'_> {
    type Output = Result<(), ImageError>;

    fn visit<T: Sample>(self) -> Self::Output {
        let mut filter = new_monadic_scan_line_filter::<T, _>(T::saturated_inv, 1);
        let dt = T::DATA_TYPE;
        let n = self.input.tensor_elements();
        scan_monadic(self.input, self.out, dt, dt, n, &mut filter, scan_options())
    }
}

/// Inverts every sample, keeping the data type.
///
/// Unsigned samples map to `MAX - v`, signed and complex samples are negated (saturating
/// for integers) and binary samples are complemented.
pub fn invert(input: &Image, out: &mut Image) -> Result<(), ImageError> {
    require_forged(input)?;
    dispatch_all(input.data_type(), Invert { input, out })
}

fn percentile_of(view: &Image, p: f64) -> Result<f64, ImageError> {
    let mut out = Image::default();
    percentile(view, None, &mut out, p, &[])?;
    Ok(out.samples::<f64>()?.first().copied().unwrap_or(0.0))
}

fn sigmoid(x: f64) -> f64 {
    x / (1.0 + x.abs())
}

type Mapping = Box<dyn Fn(f64) -> f64 + Sync>;

fn stretch_mapping(
    method: StretchMethod,
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
    parameter1: f64,
    parameter2: f64,
) -> (Mapping, usize) {
    match method {
        StretchMethod::Linear | StretchMethod::SignedLinear => {
            let (in_min, in_max) = if method == StretchMethod::SignedLinear {
                let m = in_min.abs().max(in_max.abs());
                (-m, m)
            } else {
                (in_min, in_max)
            };
            let scale = (out_max - out_min) / (in_max - in_min);
            let offset = out_min - scale * in_min;
            (
                Box::new(move |v: f64| offset + scale * v.clamp(in_min, in_max)),
                4,
            )
        }
        StretchMethod::Logarithmic => {
            let scale = (out_max - out_min) / (in_max - in_min + 1.0).ln();
            (
                Box::new(move |v: f64| {
                    out_min + scale * (v.clamp(in_min, in_max) - in_min + 1.0).ln()
                }),
                27,
            )
        }
        StretchMethod::SignedLogarithmic => {
            let m = in_min.abs().max(in_max.abs());
            let scale = (out_max - out_min) / (2.0 * (m + 1.0).ln());
            let offset = (out_max + out_min) / 2.0;
            (
                Box::new(move |v: f64| {
                    let v = v.clamp(-m, m);
                    if v > 0.0 {
                        offset + scale * (v + 1.0).ln()
                    } else {
                        offset - scale * (m + v + 1.0).ln()
                    }
                }),
                27,
            )
        }
        StretchMethod::Erf => {
            let scale_out = (out_max - out_min) / 2.0;
            let offset = scale_out + out_min;
            let scale_in = std::f64::consts::PI.sqrt() / (in_max - in_min);
            let threshold = (in_max + in_min) / 2.0;
            (
                Box::new(move |v: f64| offset + scale_out * erf((v - threshold) * scale_in)),
                30,
            )
        }
        StretchMethod::Decade => {
            let scale_in = in_max - in_min;
            let scale_out = out_max - out_min;
            let max_decade = parameter1;
            (
                Box::new(move |v: f64| {
                    let v = v.clamp(in_min, in_max);
                    let decade = (scale_in / (v - in_min + 10.0 * f64::MIN_POSITIVE)).log10();
                    if decade < max_decade {
                        out_min + scale_out * (1.0 - (decade - decade.floor()))
                    } else {
                        0.0
                    }
                }),
                30,
            )
        }
        StretchMethod::Sigmoid => {
            let (slope, point) = (parameter1, parameter2);
            let low = sigmoid(slope * in_min + point);
            let high = sigmoid(slope * in_max + point);
            let scale = (out_max - out_min) / (high - low);
            let offset = out_min - scale * low;
            (
                Box::new(move |v: f64| {
                    offset + scale * sigmoid(slope * v.clamp(in_min, in_max) + point)
                }),
                10,
            )
        }
    }
}

/// Maps the sample values between two percentiles onto `[out_min, out_max]`.
///
/// The input range is given by percentiles `lower_bound` and `upper_bound` of all samples,
/// tensor elements included. Values outside the input range are clipped before mapping,
/// except by [`StretchMethod::Erf`], whose error function saturates by itself. The output
/// is floating-point.
///
/// If the input range or the output range is empty, the output is filled with `out_min`.
///
/// # Arguments
///
/// * `input` - The input image, of a real type.
/// * `out` - The output image.
/// * `lower_bound` - The percentile mapped to `out_min`, in `[0, 100]`.
/// * `upper_bound` - The percentile mapped to `out_max`, in `[0, 100]`.
/// * `out_min` - The lowest output value.
/// * `out_max` - The highest output value.
/// * `method` - The shape of the mapping.
/// * `parameter1` - The number of decades for [`StretchMethod::Decade`], the slope for
///   [`StretchMethod::Sigmoid`].
/// * `parameter2` - The center point for [`StretchMethod::Sigmoid`].
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::mapping::{contrast_stretch, StretchMethod};
///
/// let image = Image::from_vec(vec![3], 1, vec![10u8, 15, 20])?;
/// let mut out = Image::default();
/// contrast_stretch(&image, &mut out, 0.0, 100.0, 0.0, 1.0, StretchMethod::Linear, 1.0, 0.0)?;
/// assert_eq!(out.samples::<f32>()?, vec![0.0, 0.5, 1.0]);
/// # Ok::<(), ImageError>(())
/// ```
#[allow(clippy::too_many_arguments)]
pub fn contrast_stretch(
    input: &Image,
    out: &mut Image,
    lower_bound: f64,
    upper_bound: f64,
    out_min: f64,
    out_max: f64,
    method: StretchMethod,
    parameter1: f64,
    parameter2: f64,
) -> Result<(), ImageError> {
    require_forged(input)?;
    require_non_complex(input.data_type())?;
    let view = spatial_view(input)?;
    let mut in_min = percentile_of(&view, lower_bound)?;
    let mut in_max = percentile_of(&view, upper_bound)?;
    if in_max < in_min {
        std::mem::swap(&mut in_min, &mut in_max);
    }
    debug!("contrast stretch {method:?}: [{in_min}, {in_max}] to [{out_min}, {out_max}]");
    let out_type = input.data_type().suggest_float();
    if in_max == in_min || out_max == out_min {
        out.reforge_as(input, out_type, AcceptDataTypeChange::DoAllow)?;
        return out.fill(SampleValue::new(out_min));
    }
    let (mapping, cost) = stretch_mapping(
        method, in_min, in_max, out_min, out_max, parameter1, parameter2,
    );
    let mut filter = new_monadic_scan_line_filter::<f64, _>(mapping, cost);
    let n = input.tensor_elements();
    scan_monadic(input, out, DataType::DFloat, out_type, n, &mut filter, scan_options())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex32;
    use tessera_image::Bin;

    #[test]
    fn test_erf() {
        assert_relative_eq!(erf(0.5), 0.520_499_877_813_046_5, epsilon = 1e-14);
        assert_relative_eq!(erf(-2.0), -0.995_322_265_018_952_7, epsilon = 1e-14);
        assert_relative_eq!(erf(3.5), 0.999_999_256_901_627_7, epsilon = 1e-14);
        assert_eq!(erf(40.0), 1.0);
        assert!(erf(f64::NAN).is_nan());
    }

    #[test]
    fn test_clip_modes() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![4], 1, vec![0u8, 50, 100, 200])?;
        let mut out = Image::default();
        clip(&image, &mut out, 150.0, 20.0, ClipMode::Both)?;
        assert_eq!(out.samples::<u8>()?, vec![20, 50, 100, 150]);
        let mut out = Image::default();
        clip(&image, &mut out, 20.0, 150.0, ClipMode::Low)?;
        assert_eq!(out.samples::<u8>()?, vec![20, 50, 100, 200]);
        let mut out = Image::default();
        clip(&image, &mut out, 20.0, 150.0, ClipMode::High)?;
        assert_eq!(out.samples::<u8>()?, vec![0, 50, 100, 150]);
        let mut out = Image::default();
        clip(&image, &mut out, 100.0, 100.0, ClipMode::Range)?;
        assert_eq!(out.data_type(), DataType::UInt8);
        assert_eq!(out.samples::<u8>()?, vec![50, 50, 100, 150]);
        Ok(())
    }

    #[test]
    fn test_clip_tensor_and_errors() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![2], 2, vec![-3.0f32, 0.5, 7.0, f32::NAN])?;
        let mut out = Image::default();
        clip(&image, &mut out, 0.0, 1.0, ClipMode::Both)?;
        let values = out.samples::<f32>()?;
        assert_eq!(out.tensor_elements(), 2);
        assert_eq!(&values[..3], &[0.0, 0.5, 1.0]);
        assert!(values[3].is_nan());

        let complex = Image::from_vec(vec![1], 1, vec![Complex32::new(1.0, 1.0)])?;
        assert!(matches!(
            clip(&complex, &mut Image::default(), 0.0, 1.0, ClipMode::Both),
            Err(ImageError::DataTypeNotSupported(_))
        ));
        assert!(matches!(
            "middle".parse::<ClipMode>(),
            Err(ImageError::InvalidFlag(_))
        ));
        assert_eq!("range".parse::<ClipMode>()?, ClipMode::Range);
        Ok(())
    }

    #[test]
    fn test_erf_clip() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3], 1, vec![5u8, 100, 0])?;
        let mut out = Image::default();
        erf_clip(&image, &mut out, 0.0, 10.0, ClipMode::Both)?;
        assert_eq!(out.data_type(), DataType::SFloat);
        let values = out.samples::<f64>()?;
        assert_eq!(values[0], 5.0);
        assert_relative_eq!(values[1], 10.0, epsilon = 1e-6);
        assert!(values[2] > 0.0 && values[2] < 5.0);

        // only values above the center are mapped
        let mut out = Image::default();
        erf_clip(&image, &mut out, 0.0, 10.0, ClipMode::High)?;
        let values = out.samples::<f64>()?;
        assert_relative_eq!(values[1], 10.0, epsilon = 1e-6);
        assert_eq!(values[2], 0.0);
        Ok(())
    }

    #[test]
    fn test_zero_and_invert() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3], 1, vec![-1.0f32, 0.5, 2.0])?;
        let mut out = Image::default();
        zero(&image, &mut out, 1.0)?;
        assert_eq!(out.samples::<f32>()?, vec![0.0, 0.0, 2.0]);

        let mut out = Image::default();
        invert(&image, &mut out)?;
        assert_eq!(out.samples::<f32>()?, vec![1.0, -0.5, -2.0]);

        let bytes = Image::from_vec(vec![2], 1, vec![0u8, 10])?;
        let mut out = Image::default();
        invert(&bytes, &mut out)?;
        assert_eq!(out.samples::<u8>()?, vec![255, 245]);

        let flags = Image::from_vec(vec![2], 1, vec![Bin::TRUE, Bin::FALSE])?;
        let mut out = Image::default();
        invert(&flags, &mut out)?;
        assert_eq!(out.samples::<Bin>()?, vec![Bin::FALSE, Bin::TRUE]);
        Ok(())
    }

    #[test]
    fn test_contrast_stretch_methods() -> Result<(), ImageError> {
        let signed = Image::from_vec(vec![2], 1, vec![-2.0f64, 1.0])?;
        let mut out = Image::default();
        contrast_stretch(
            &signed,
            &mut out,
            0.0,
            100.0,
            0.0,
            1.0,
            StretchMethod::SignedLinear,
            0.0,
            0.0,
        )?;
        assert_eq!(out.data_type(), DataType::DFloat);
        assert_eq!(out.samples::<f64>()?, vec![0.0, 0.75]);

        let e = std::f64::consts::E;
        let ramp = Image::from_vec(vec![2], 1, vec![0.0f64, e - 1.0])?;
        let mut out = Image::default();
        contrast_stretch(
            &ramp,
            &mut out,
            0.0,
            100.0,
            0.0,
            1.0,
            StretchMethod::Logarithmic,
            0.0,
            0.0,
        )?;
        let values = out.samples::<f64>()?;
        assert_eq!(values[0], 0.0);
        assert_relative_eq!(values[1], 1.0, epsilon = 1e-12);

        let decades = Image::from_vec(vec![3], 1, vec![0.0f64, 50.0, 100.0])?;
        let mut out = Image::default();
        contrast_stretch(
            &decades,
            &mut out,
            0.0,
            100.0,
            0.0,
            1.0,
            StretchMethod::Decade,
            3.0,
            0.0,
        )?;
        let values = out.samples::<f64>()?;
        assert_eq!(values[0], 0.0);
        assert_relative_eq!(values[1], 1.0 - 2.0f64.log10(), epsilon = 1e-12);
        assert_eq!(values[2], 1.0);
        Ok(())
    }

    #[test]
    fn test_contrast_stretch_degenerate() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![2, 2], 1, vec![7u16; 4])?;
        let mut out = Image::default();
        contrast_stretch(
            &image,
            &mut out,
            0.0,
            100.0,
            3.0,
            9.0,
            StretchMethod::Sigmoid,
            1.0,
            0.0,
        )?;
        assert_eq!(out.sizes(), &[2, 2]);
        assert_eq!(out.samples::<f32>()?, vec![3.0; 4]);
        Ok(())
    }
}
