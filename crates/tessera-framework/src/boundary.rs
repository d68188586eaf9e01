use std::{fmt, str::FromStr};

use num_complex::Complex64;
use tessera_image::{
    dispatch::{dispatch_all, AllVisitor},
    ImageError, Sample,
};

use crate::line::{LineBuffer, MutLine};

/// How samples outside the image are made up when a filter reads past the edge of a line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BoundaryCondition {
    /// The line is reflected at its edges, the edge sample repeated: `... x1 x0 | x0 x1 ...`.
    #[default]
    SymmetricMirror,
    /// As [`BoundaryCondition::SymmetricMirror`], with the reflected samples inverted.
    AsymmetricMirror,
    /// The line repeats: `... xn-2 xn-1 | x0 x1 ...`.
    Periodic,
    /// As [`BoundaryCondition::Periodic`], with the repeated samples inverted.
    AsymmetricPeriodic,
    /// Zeros.
    AddZeros,
    /// The highest value of the sample type.
    AddMaxValue,
    /// The lowest value of the sample type.
    AddMinValue,
    /// The edge sample is repeated.
    ZeroOrderExtrapolate,
    /// Linear continuation of the two edge samples.
    FirstOrderExtrapolate,
    /// A parabola through the two edge samples that reaches zero just past the border.
    SecondOrderExtrapolate,
    /// A cubic through the two edge samples that reaches zero smoothly just past the border.
    ThirdOrderExtrapolate,
}

impl BoundaryCondition {
    /// The name accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryCondition::SymmetricMirror => "mirror",
            BoundaryCondition::AsymmetricMirror => "asym mirror",
            BoundaryCondition::Periodic => "periodic",
            BoundaryCondition::AsymmetricPeriodic => "asym periodic",
            BoundaryCondition::AddZeros => "add zeros",
            BoundaryCondition::AddMaxValue => "add max",
            BoundaryCondition::AddMinValue => "add min",
            BoundaryCondition::ZeroOrderExtrapolate => "zero order",
            BoundaryCondition::FirstOrderExtrapolate => "first order",
            BoundaryCondition::SecondOrderExtrapolate => "second order",
            BoundaryCondition::ThirdOrderExtrapolate => "third order",
        }
    }
}

impl fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundaryCondition {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bc = match s {
            "" | "default" | "mirror" => BoundaryCondition::SymmetricMirror,
            "asym mirror" => BoundaryCondition::AsymmetricMirror,
            "periodic" => BoundaryCondition::Periodic,
            "asym periodic" => BoundaryCondition::AsymmetricPeriodic,
            "add zeros" => BoundaryCondition::AddZeros,
            "add max" => BoundaryCondition::AddMaxValue,
            "add min" => BoundaryCondition::AddMinValue,
            "zero order" => BoundaryCondition::ZeroOrderExtrapolate,
            "first order" => BoundaryCondition::FirstOrderExtrapolate,
            "second order" => BoundaryCondition::SecondOrderExtrapolate,
            "third order" => BoundaryCondition::ThirdOrderExtrapolate,
            _ => return Err(ImageError::InvalidFlag(s.to_string())),
        };
        Ok(bc)
    }
}

/// Parses a list of boundary condition names.
pub fn parse_boundary_conditions(names: &[&str]) -> Result<Vec<BoundaryCondition>, ImageError> {
    names.iter().map(|s| s.parse()).collect()
}

/// Expands a per-dimension parameter to `n_dims` values.
///
/// An empty slice gives `n_dims` copies of `default`, a single value is broadcast, and a slice
/// of length `n_dims` is taken as is.
pub fn array_use_parameter<T: Clone>(
    values: &[T],
    n_dims: usize,
    default: T,
) -> Result<Vec<T>, ImageError> {
    match values.len() {
        0 => Ok(vec![default; n_dims]),
        1 => Ok(vec![values[0].clone(); n_dims]),
        n if n == n_dims => Ok(values.to_vec()),
        n => Err(ImageError::ArrayParameterWrongLength(n, n_dims)),
    }
}

/// [`array_use_parameter`] for boundary conditions, defaulting to
/// [`BoundaryCondition::SymmetricMirror`].
pub fn boundary_array_use_parameter(
    bc: &[BoundaryCondition],
    n_dims: usize,
) -> Result<Vec<BoundaryCondition>, ImageError> {
    array_use_parameter(bc, n_dims, BoundaryCondition::default())
}

/// Fills the `line.border` samples beyond both ends of `line` according to `bc`.
///
/// Every tensor element is expanded independently. The extrapolations need two (first and
/// second order) or three (third order) samples, and fall back to a lower order on lines
/// that are too short.
pub fn expand_buffer(line: &mut LineBuffer, bc: BoundaryCondition) -> Result<(), ImageError> {
    if line.border == 0 || line.length == 0 || line.stride == 0 {
        return Ok(());
    }
    dispatch_all(line.data_type, Expand { line: *line, bc })
}

struct Expand {
    line: LineBuffer,
    bc: BoundaryCondition,
}

impl AllVisitor for Expand {
    type Output = Result<(), ImageError>;

    fn visit<T: Sample>(self) -> Self::Output {
        let mut line = self.line;
        let mut typed = line.typed_mut::<T>()?;
        for t in 0..typed.tensor_length() {
            expand_tensor_element(&mut typed, t, self.bc);
        }
        Ok(())
    }
}

fn reflect(i: isize, n: isize) -> isize {
    let m = i.rem_euclid(2 * n);
    if m >= n {
        2 * n - 1 - m
    } else {
        m
    }
}

fn fill<T: Sample>(line: &mut MutLine<'_, T>, t: usize, source: impl Fn(isize) -> T) {
    let n = line.len() as isize;
    for k in 1..=line.border() as isize {
        line.set_t(-k, t, source(-k));
        line.set_t(n - 1 + k, t, source(n - 1 + k));
    }
}

fn expand_tensor_element<T: Sample>(line: &mut MutLine<'_, T>, t: usize, bc: BoundaryCondition) {
    let n = line.len() as isize;
    match bc {
        BoundaryCondition::SymmetricMirror | BoundaryCondition::AsymmetricMirror => {
            let values = snapshot(line, t);
            let invert = bc == BoundaryCondition::AsymmetricMirror;
            fill(line, t, |i| maybe_inverted(values[reflect(i, n) as usize], invert));
        }
        BoundaryCondition::Periodic | BoundaryCondition::AsymmetricPeriodic => {
            let values = snapshot(line, t);
            let invert = bc == BoundaryCondition::AsymmetricPeriodic;
            fill(line, t, |i| maybe_inverted(values[i.rem_euclid(n) as usize], invert));
        }
        BoundaryCondition::AddZeros => fill(line, t, |_| T::default()),
        BoundaryCondition::AddMaxValue => fill(line, t, |_| T::highest()),
        BoundaryCondition::AddMinValue => fill(line, t, |_| T::lowest()),
        BoundaryCondition::ThirdOrderExtrapolate if n > 2 => extrapolate(line, t, third_order),
        BoundaryCondition::SecondOrderExtrapolate | BoundaryCondition::ThirdOrderExtrapolate
            if n > 1 =>
        {
            extrapolate(line, t, second_order)
        }
        BoundaryCondition::FirstOrderExtrapolate if n > 1 => extrapolate(line, t, first_order),
        BoundaryCondition::ZeroOrderExtrapolate
        | BoundaryCondition::FirstOrderExtrapolate
        | BoundaryCondition::SecondOrderExtrapolate
        | BoundaryCondition::ThirdOrderExtrapolate => {
            let (first, last) = (line.get_t(0, t), line.get_t(n - 1, t));
            fill(line, t, |i| if i < 0 { first } else { last })
        }
    }
}

fn snapshot<T: Sample>(line: &MutLine<'_, T>, t: usize) -> Vec<T> {
    (0..line.len() as isize).map(|i| line.get_t(i, t)).collect()
}

fn maybe_inverted<T: Sample>(v: T, invert: bool) -> T {
    if invert {
        v.saturated_inv()
    } else {
        v
    }
}

/// Value at step `k` (1-based) outside the edge, from the edge sample `d0`, the next sample
/// inwards `f1`, and the border width.
type Extrapolation = fn(Complex64, Complex64, usize, usize) -> Complex64;

fn first_order(d0: Complex64, f1: Complex64, k: usize, _: usize) -> Complex64 {
    d0 + (d0 - f1) * k as f64
}

fn second_order(d0: Complex64, f1: Complex64, k: usize, border: usize) -> Complex64 {
    let b = (border + 1) as f64;
    let d1 = d0 * ((b - 1.0) / b) - f1 * (b / (b + 1.0));
    let d2 = -d0 / b + f1 / (b + 1.0);
    let k = k as f64;
    d0 + d1 * k + d2 * (k * k)
}

fn third_order(d0: Complex64, f1: Complex64, k: usize, border: usize) -> Complex64 {
    let b = (border + 1) as f64;
    let b12 = (b + 1.0) * (b + 1.0);
    let d1 = -(d0 * 2.0) / b + d0 - f1 * (b * b) / b12;
    let d2 = f1 * (2.0 * b) / b12 - d0 * (2.0 * b - 1.0) / (b * b);
    let d3 = d0 / (b * b) - f1 / b12;
    let k = k as f64;
    d0 + d1 * k + d2 * (k * k) + d3 * (k * k * k)
}

fn extrapolate<T: Sample>(line: &mut MutLine<'_, T>, t: usize, f: Extrapolation) {
    let n = line.len() as isize;
    let border = line.border();
    let (d0, f1) = (line.get_t(0, t).as_complex(), line.get_t(1, t).as_complex());
    for k in 1..=border {
        line.set_t(-(k as isize), t, T::from_complex(f(d0, f1, k, border)));
    }
    let (d0, f1) = (line.get_t(n - 1, t).as_complex(), line.get_t(n - 2, t).as_complex());
    for k in 1..=border {
        line.set_t(n - 1 + k as isize, t, T::from_complex(f(d0, f1, k, border)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_image::DataType;

    const BORDER: usize = 3;

    fn expanded<T: Sample>(values: &[T], bc: BoundaryCondition) -> Result<Vec<T>, ImageError> {
        let mut data = vec![T::default(); values.len() + 2 * BORDER];
        data[BORDER..BORDER + values.len()].copy_from_slice(values);
        let mut line = LineBuffer {
            ptr: data[BORDER..].as_mut_ptr() as *mut u8,
            data_type: T::DATA_TYPE,
            length: values.len(),
            border: BORDER,
            stride: 1,
            tensor_stride: 1,
            tensor_length: 1,
        };
        expand_buffer(&mut line, bc)?;
        Ok(data)
    }

    #[test]
    fn test_parse() -> Result<(), ImageError> {
        assert_eq!("".parse::<BoundaryCondition>()?, BoundaryCondition::SymmetricMirror);
        assert_eq!("add max".parse::<BoundaryCondition>()?, BoundaryCondition::AddMaxValue);
        assert_eq!(
            parse_boundary_conditions(&["periodic", "third order"])?,
            vec![
                BoundaryCondition::Periodic,
                BoundaryCondition::ThirdOrderExtrapolate
            ]
        );
        assert_eq!(
            "sideways".parse::<BoundaryCondition>(),
            Err(ImageError::InvalidFlag("sideways".to_string()))
        );
        for bc in [BoundaryCondition::AsymmetricPeriodic, BoundaryCondition::AddZeros] {
            assert_eq!(bc.to_string().parse::<BoundaryCondition>()?, bc);
        }
        Ok(())
    }

    #[test]
    fn test_array_use_parameter() -> Result<(), ImageError> {
        assert_eq!(array_use_parameter::<usize>(&[], 2, 7)?, vec![7, 7]);
        assert_eq!(array_use_parameter(&[1], 3, 0)?, vec![1, 1, 1]);
        assert_eq!(array_use_parameter(&[1, 2], 2, 0)?, vec![1, 2]);
        assert_eq!(
            boundary_array_use_parameter(&[BoundaryCondition::Periodic; 2], 3),
            Err(ImageError::ArrayParameterWrongLength(2, 3))
        );
        Ok(())
    }

    #[test]
    fn test_mirror_and_periodic() -> Result<(), ImageError> {
        let x = [1u8, 2, 3, 4];
        assert_eq!(
            expanded(&x, BoundaryCondition::SymmetricMirror)?,
            vec![3, 2, 1, 1, 2, 3, 4, 4, 3, 2]
        );
        assert_eq!(
            expanded(&x, BoundaryCondition::Periodic)?,
            vec![2, 3, 4, 1, 2, 3, 4, 1, 2, 3]
        );
        assert_eq!(
            expanded(&x, BoundaryCondition::AsymmetricMirror)?,
            vec![252, 253, 254, 1, 2, 3, 4, 251, 252, 253]
        );
        // shorter than the border
        assert_eq!(
            expanded(&[5i16, 6], BoundaryCondition::SymmetricMirror)?,
            vec![6, 6, 5, 5, 6, 6, 5, 5]
        );
        assert_eq!(
            expanded(&[5i16, 6], BoundaryCondition::AsymmetricPeriodic)?,
            vec![-6, -5, -6, 5, 6, -5, -6, -5]
        );
        assert_eq!(
            expanded(&[9i32], BoundaryCondition::Periodic)?,
            vec![9; 1 + 2 * BORDER]
        );
        Ok(())
    }

    #[test]
    fn test_constant() -> Result<(), ImageError> {
        let x = [10i8, 20];
        assert_eq!(
            expanded(&x, BoundaryCondition::AddZeros)?,
            vec![0, 0, 0, 10, 20, 0, 0, 0]
        );
        assert_eq!(
            expanded(&x, BoundaryCondition::AddMaxValue)?,
            vec![127, 127, 127, 10, 20, 127, 127, 127]
        );
        assert_eq!(
            expanded(&x, BoundaryCondition::AddMinValue)?,
            vec![-128, -128, -128, 10, 20, -128, -128, -128]
        );
        assert_eq!(
            expanded(&x, BoundaryCondition::ZeroOrderExtrapolate)?,
            vec![10, 10, 10, 10, 20, 20, 20, 20]
        );
        Ok(())
    }

    #[test]
    fn test_extrapolation() -> Result<(), ImageError> {
        assert_eq!(
            expanded(&[4.0f64, 6.0, 10.0], BoundaryCondition::FirstOrderExtrapolate)?,
            vec![-2.0, 0.0, 2.0, 4.0, 6.0, 10.0, 14.0, 18.0, 22.0]
        );
        // clamped to the unsigned range
        assert_eq!(
            expanded(&[4u8, 6], BoundaryCondition::FirstOrderExtrapolate)?,
            vec![0, 0, 2, 4, 6, 8, 10, 12]
        );

        // the parabola passes through the next sample inwards and reaches zero at border + 1
        let out = expanded(&[8.0f64, 4.0], BoundaryCondition::SecondOrderExtrapolate)?;
        assert_eq!(out[BORDER], 8.0);
        let d0 = Complex64::new(8.0, 0.0);
        let f1 = Complex64::new(4.0, 0.0);
        approx::assert_relative_eq!(second_order(d0, f1, 4, BORDER).re, 0.0, epsilon = 1e-12);
        approx::assert_relative_eq!(third_order(d0, f1, 4, BORDER).re, 0.0, epsilon = 1e-12);
        approx::assert_relative_eq!(
            out[BORDER - 1],
            second_order(d0, f1, 1, BORDER).re,
            epsilon = 1e-12
        );

        // too short for third order, falls back to second order
        let third = expanded(&[8.0f64, 4.0], BoundaryCondition::ThirdOrderExtrapolate)?;
        assert_eq!(third, out);
        // a single sample falls back to zero order
        assert_eq!(
            expanded(&[3.0f32], BoundaryCondition::ThirdOrderExtrapolate)?,
            vec![3.0; 1 + 2 * BORDER]
        );
        Ok(())
    }

    #[test]
    fn test_tensor_elements() -> Result<(), ImageError> {
        // two interleaved tensor elements, one pixel of border
        let mut data = vec![0u16, 0, 1, 10, 2, 20, 0, 0];
        let mut line = LineBuffer {
            ptr: data[2..].as_mut_ptr() as *mut u8,
            data_type: DataType::UInt16,
            length: 2,
            border: 1,
            stride: 2,
            tensor_stride: 1,
            tensor_length: 2,
        };
        expand_buffer(&mut line, BoundaryCondition::Periodic)?;
        assert_eq!(data, vec![2, 20, 1, 10, 2, 20, 1, 10]);
        Ok(())
    }
}
