use tessera_image::{Image, ImageError};

use super::{check_pair, scan_pairs};
use crate::values::{non_nan_values, require_non_complex, require_scalar};

/// Equal-width bins spanning the range of the data.
struct Bins {
    lower: f64,
    width: f64,
    n_bins: usize,
}

impl Bins {
    fn spanning(values: impl Iterator<Item = f64>, n_bins: usize) -> Self {
        let (lower, upper) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let width = if upper > lower {
            (upper - lower) / n_bins as f64
        } else {
            0.0
        };
        Self {
            lower,
            width,
            n_bins,
        }
    }

    fn index(&self, v: f64) -> usize {
        if self.width == 0.0 {
            return 0;
        }
        // the upper bound falls in the last bin
        (((v - self.lower) / self.width) as usize).min(self.n_bins - 1)
    }
}

fn check_bins(n_bins: usize) -> Result<(), ImageError> {
    if n_bins == 0 {
        return Err(ImageError::ParameterOutOfRange(
            "the number of bins must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Shannon entropy, in bits, of a histogram.
fn histogram_entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    -counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

/// The entropy, in bits, of the histogram of `input`.
///
/// The histogram has `n_bins` bins of equal width spanning the range of the selected
/// values. NaN values are ignored.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::metrics::entropy;
///
/// let image = Image::from_vec(vec![4], 1, vec![0u8, 1, 2, 3])?;
/// assert_eq!(entropy(&image, None, 4)?, 2.0);
/// assert_eq!(entropy(&image, None, 2)?, 1.0);
/// # Ok::<(), ImageError>(())
/// ```
pub fn entropy(input: &Image, mask: Option<&Image>, n_bins: usize) -> Result<f64, ImageError> {
    require_scalar(input)?;
    require_non_complex(input.data_type())?;
    check_bins(n_bins)?;
    let mut values = Vec::new();
    non_nan_values(input, mask, &mut values)?;
    let bins = Bins::spanning(values.iter().copied(), n_bins);
    let mut counts = vec![0usize; n_bins];
    for &v in &values {
        counts[bins.index(v)] += 1;
    }
    Ok(histogram_entropy(&counts))
}

/// The mutual information, in bits, between `input` and `reference`.
///
/// Computed from the joint histogram of the two images, with `n_bins` bins along each axis
/// spanning the range of each image's selected values. Pixel pairs with a NaN value are
/// ignored.
pub fn mutual_information(
    input: &Image,
    reference: &Image,
    mask: Option<&Image>,
    n_bins: usize,
) -> Result<f64, ImageError> {
    check_pair(input, reference)?;
    require_scalar(input)?;
    require_scalar(reference)?;
    require_non_complex(input.data_type())?;
    require_non_complex(reference.data_type())?;
    check_bins(n_bins)?;
    let partials = scan_pairs(input, reference, mask, |acc: &mut Vec<(f64, f64)>, a, b| {
        if !a.re.is_nan() && !b.re.is_nan() {
            acc.push((a.re, b.re));
        }
    })?;
    let pairs: Vec<(f64, f64)> = partials.into_iter().flatten().collect();

    let bins_a = Bins::spanning(pairs.iter().map(|p| p.0), n_bins);
    let bins_b = Bins::spanning(pairs.iter().map(|p| p.1), n_bins);
    let mut joint = vec![0usize; n_bins * n_bins];
    let mut marginal_a = vec![0usize; n_bins];
    let mut marginal_b = vec![0usize; n_bins];
    for &(a, b) in &pairs {
        let (i, j) = (bins_a.index(a), bins_b.index(b));
        joint[i * n_bins + j] += 1;
        marginal_a[i] += 1;
        marginal_b[j] += 1;
    }
    Ok(histogram_entropy(&marginal_a) + histogram_entropy(&marginal_b)
        - histogram_entropy(&joint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_entropy_constant() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3, 3], 1, vec![5i32; 9])?;
        assert_eq!(entropy(&image, None, 10)?, 0.0);
        assert!(matches!(
            entropy(&image, None, 0),
            Err(ImageError::ParameterOutOfRange(_))
        ));
        Ok(())
    }

    #[test]
    fn test_mutual_information() -> Result<(), ImageError> {
        let a = Image::from_vec(vec![8], 1, vec![0u8, 1, 2, 3, 0, 1, 2, 3])?;
        let flat = Image::from_vec(vec![8], 1, vec![4.0f32; 8])?;
        // information shared with itself is its entropy
        assert_relative_eq!(mutual_information(&a, &a, None, 4)?, 2.0, epsilon = 1e-12);
        assert_relative_eq!(mutual_information(&a, &flat, None, 4)?, 0.0, epsilon = 1e-12);
        // a half-resolution copy shares one bit
        let b = Image::from_vec(vec![8], 1, vec![0u8, 0, 1, 1, 0, 0, 1, 1])?;
        assert_relative_eq!(mutual_information(&a, &b, None, 2)?, 1.0, epsilon = 1e-12);
        Ok(())
    }
}
