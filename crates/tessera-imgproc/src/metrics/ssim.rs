use log::debug;
use tessera_framework::{
    new_dyadic_scan_line_filter, new_monadic_scan_line_filter, new_variadic_scan_line_filter,
    scan, scan_dyadic, scan_monadic, ScanOptions,
};
use tessera_image::{DataType, Image, ImageError};

use super::{check_real_pair, Total};
use crate::{
    filter::gauss,
    statistics::maximum_and_minimum,
    values::{for_each_value, spatial_view},
};

fn smoothed(input: &Image, sigma: f64) -> Result<Image, ImageError> {
    let mut out = Image::default();
    gauss(input, &mut out, &[sigma], 3.0, &[])?;
    Ok(out)
}

/// The structural similarity index of `input` with respect to `reference`.
///
/// Local means, variances and the covariance are computed with a Gaussian window of size
/// `sigma`, and the local index
/// `(2 μx μy + C1)(2 σxy + C2) / ((μx² + μy² + C1)(σx² + σy² + C2))` is averaged over the
/// pixels selected by `mask`. The constants are `C1 = (k1 L)²` and `C2 = (k2 L)²`, with `L`
/// the larger of the two value ranges. Values of `k1` or `k2` that are not positive are
/// replaced by `1e-6`.
///
/// Identical images give 1.
///
/// # Errors
///
/// Complex images give [`ImageError::DataTypeNotSupported`]. The images must have the same
/// sizes.
pub fn ssim(
    input: &Image,
    reference: &Image,
    mask: Option<&Image>,
    sigma: f64,
    k1: f64,
    k2: f64,
) -> Result<f64, ImageError> {
    check_real_pair(input, reference)?;
    let k1 = if k1 > 0.0 { k1 } else { 1e-6 };
    let k2 = if k2 > 0.0 { k2 } else { 1e-6 };
    let range_in = maximum_and_minimum(input, mask)?;
    let range_ref = maximum_and_minimum(reference, mask)?;
    let l = (range_in.maximum() - range_in.minimum())
        .max(range_ref.maximum() - range_ref.minimum());
    let c1 = (k1 * l).powi(2);
    let c2 = (k2 * l).powi(2);
    debug!("ssim: sigma {sigma}, L {l}, C1 {c1}, C2 {c2}");

    let dt = DataType::DFloat;
    let options = ScanOptions::new().with_tensor_as_spatial_dim();
    let mut square = new_monadic_scan_line_filter::<f64, _>(|v| v * v, 1);
    let mut in_sq = Image::default();
    scan_monadic(input, &mut in_sq, dt, dt, 1, &mut square, options)?;
    let mut ref_sq = Image::default();
    scan_monadic(reference, &mut ref_sq, dt, dt, 1, &mut square, options)?;
    let mut multiply = new_dyadic_scan_line_filter::<f64, _>(|a, b| a * b, 1);
    let mut cross = Image::default();
    scan_dyadic(input, reference, &mut cross, dt, dt, &mut multiply, options)?;

    let mean_in = smoothed(input, sigma)?;
    let mean_ref = smoothed(reference, sigma)?;
    let second_in = smoothed(&in_sq, sigma)?;
    let second_ref = smoothed(&ref_sq, sigma)?;
    let second_cross = smoothed(&cross, sigma)?;

    let mut index = new_variadic_scan_line_filter::<f64, _>(
        move |v: &[f64]| {
            let (mx, my) = (v[0], v[1]);
            let var_x = v[2] - mx * mx;
            let var_y = v[3] - my * my;
            let cov = v[4] - mx * my;
            let numerator = (2.0 * mx * my + c1) * (2.0 * cov + c2);
            let denominator = (mx * mx + my * my + c1) * (var_x + var_y + c2);
            numerator / denominator
        },
        20,
    );
    let mut map = Image::default();
    scan(
        &[&mean_in, &mean_ref, &second_in, &second_ref, &second_cross],
        &mut [&mut map],
        &[dt; 5],
        &[dt],
        &[dt],
        &[1],
        &mut index,
        options,
    )?;

    let mut total = Total::default();
    for_each_value(&spatial_view(&map)?, mask, |v| total.add(v.re))?;
    Ok(total.mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(seed: u64) -> Result<Image, ImageError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..20 * 16).map(|_| rng.random_range(0..=255u8)).collect();
        Image::from_vec(vec![20, 16], 1, data)
    }

    #[test]
    fn test_ssim_identical() -> Result<(), ImageError> {
        let image = noise(7)?;
        assert_relative_eq!(ssim(&image, &image, None, 1.5, 0.01, 0.03)?, 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_ssim_decreases_with_noise() -> Result<(), ImageError> {
        let a = noise(7)?;
        let b = noise(8)?;
        let value = ssim(&a, &b, None, 1.5, 0.01, 0.03)?;
        assert!(value < 0.5, "unrelated images gave {value}");
        assert!(value > -1.0);
        Ok(())
    }
}
