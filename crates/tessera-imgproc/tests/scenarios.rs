use approx::assert_abs_diff_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

use tessera_framework::{
    new_monadic_scan_line_filter, scan_monadic, set_number_of_threads, BoundaryCondition,
    ScanOptions,
};
use tessera_image::{clamp_cast, Bin, DataType, Image, ImageError};
use tessera_imgproc::{
    crop::{crop, pad, CropLocation},
    filter::gauss,
    metrics::{psnr, ssim},
    projection::{
        maximum, mean, minimum, percentile, position_percentile, standard_deviation, sum,
        variance, MeanMode, TieBreak, VarianceMode,
    },
    statistics::{cumulative_sum, maximum_and_minimum},
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_image(seed: u64, sizes: Vec<usize>) -> Result<Image, ImageError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n: usize = sizes.iter().product();
    let data: Vec<f64> = (0..n).map(|_| rng.random_range(-50.0..200.0)).collect();
    Image::from_vec(sizes, 1, data)
}

fn first(image: &Image) -> Result<f64, ImageError> {
    Ok(image.samples::<f64>()?[0])
}

#[test]
fn sum_over_strided_image() -> Result<(), ImageError> {
    init_logger();
    let mut data = Vec::with_capacity(24);
    for z in 0..2u8 {
        for y in 0..4u8 {
            for x in 0..3u8 {
                data.push(x + 10 * y + 100 * z);
            }
        }
    }
    let image = Image::from_vec(vec![3, 4, 2], 1, data)?;
    let mut out = Image::default();
    sum(&image, None, &mut out, &[])?;
    assert_eq!(first(&out)?, 1584.0);

    // the same sum through a mirrored, permuted view
    let mut view = image.clone();
    view.mirror(&[true, false, true])?;
    view.permute_dimensions(&[2, 0, 1])?;
    sum(&view, None, &mut out, &[])?;
    assert_eq!(first(&out)?, 1584.0);
    Ok(())
}

#[test]
fn percentile_with_nan() -> Result<(), ImageError> {
    init_logger();
    let nan = f64::NAN;
    let values = vec![
        nan, 10.0, 2.0, nan, nan, 5.0, nan, 6.0, 3.0, 7.0, 4.0, nan, nan,
    ];
    let image = Image::from_vec(vec![13], 1, values)?;
    let mut out = Image::default();
    for (p, expected) in [(0.0, 2.0), (100.0 / 7.0, 3.0), (200.0 / 7.0, 4.0), (100.0, 10.0)] {
        percentile(&image, None, &mut out, p, &[])?;
        assert_eq!(first(&out)?, expected, "percentile {p}");
    }
    position_percentile(&image, None, &mut out, 0.0, 0, TieBreak::First)?;
    assert_eq!(first(&out)?, 2.0);
    position_percentile(&image, None, &mut out, 100.0, 0, TieBreak::First)?;
    assert_eq!(first(&out)?, 1.0);
    Ok(())
}

#[test]
fn masked_maximum_over_tensor_image() -> Result<(), ImageError> {
    init_logger();
    let sizes = vec![3, 4, 2];
    let index = |x: usize, y: usize, z: usize| x + 3 * y + 12 * z;
    let mut data = vec![1u8; 24 * 3];
    for ((x, y, z), pixel) in [
        ((0, 0, 0), [2, 3, 4]),
        ((0, 1, 0), [3, 2, 2]),
        ((0, 0, 1), [4, 2, 3]),
        ((1, 0, 0), [4, 2, 1]),
    ] {
        let i = index(x, y, z) * 3;
        data[i..i + 3].copy_from_slice(&pixel);
    }
    let image = Image::from_vec(sizes.clone(), 3, data)?;
    let mut flags = vec![Bin::TRUE; 24];
    flags[index(0, 0, 0)] = Bin::FALSE;
    let mask = Image::from_vec(sizes, 1, flags)?;

    let mut out = Image::default();
    maximum(&image, Some(&mask), &mut out, &[true, true, false])?;
    assert_eq!(out.sizes(), &[1, 1, 2]);
    assert_eq!(out.tensor_elements(), 3);
    assert_eq!(out.samples::<f64>()?, vec![4.0, 2.0, 2.0, 4.0, 2.0, 3.0]);
    Ok(())
}

#[test]
fn cumulative_sum_1d() -> Result<(), ImageError> {
    init_logger();
    let image = Image::from_vec(vec![8], 1, vec![3u8, 1, 4, 1, 5, 9, 2, 6])?;
    let mut out = Image::default();
    cumulative_sum(&image, None, &mut out, &[])?;
    assert_eq!(
        out.samples::<f64>()?,
        vec![3.0, 4.0, 8.0, 9.0, 14.0, 23.0, 25.0, 31.0]
    );
    Ok(())
}

#[test]
fn constant_image_statistics() -> Result<(), ImageError> {
    init_logger();
    let image = Image::from_vec(vec![100, 100], 1, vec![7.0f32; 100 * 100])?;
    let range = maximum_and_minimum(&image, None)?;
    assert_eq!(range.minimum(), 7.0);
    assert_eq!(range.maximum(), 7.0);
    let mut out = Image::default();
    variance(&image, None, &mut out, VarianceMode::Stable, &[])?;
    assert_abs_diff_eq!(first(&out)?, 0.0, epsilon = 1e-12);
    standard_deviation(&image, None, &mut out, VarianceMode::Stable, &[])?;
    assert_abs_diff_eq!(first(&out)?, 0.0, epsilon = 1e-6);
    Ok(())
}

#[test]
fn pad_crop_round_trip() -> Result<(), ImageError> {
    init_logger();
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<u16> = (0..20).map(|_| rng.random()).collect();
    let image = Image::from_vec(vec![5, 4], 1, data.clone())?;
    let padded = pad(&image, &[11, 11], CropLocation::Center)?;
    assert_eq!(padded.sizes(), &[11, 11]);
    let back = crop(&padded, &[5, 4], CropLocation::Center)?;
    assert_eq!(back.data_type(), DataType::UInt16);
    assert_eq!(back.samples::<u16>()?, data);
    Ok(())
}

#[test]
fn monadic_scan_casts_the_kernel_result() -> Result<(), ImageError> {
    init_logger();
    let image = random_image(1, vec![17, 9])?;
    let f = |v: f64| v * 1.5 - 20.0;
    let mut filter = new_monadic_scan_line_filter::<f64, _>(f, 2);
    let mut out = Image::default();
    scan_monadic(
        &image,
        &mut out,
        DataType::DFloat,
        DataType::UInt8,
        1,
        &mut filter,
        ScanOptions::new(),
    )?;
    let expected: Vec<u8> = image
        .samples::<f64>()?
        .into_iter()
        .map(|v| clamp_cast::<f64, u8>(f(v)))
        .collect();
    assert_eq!(out.samples::<u8>()?, expected);
    Ok(())
}

#[test]
fn mean_equals_sum_over_count() -> Result<(), ImageError> {
    init_logger();
    let image = random_image(2, vec![31, 17, 3])?;
    let mut total = Image::default();
    sum(&image, None, &mut total, &[])?;
    let mut average = Image::default();
    mean(&image, None, &mut average, MeanMode::Plain, &[])?;
    let total = first(&total)?;
    let n = image.number_of_samples() as f64;
    assert_abs_diff_eq!(first(&average)?, total / n, epsilon = 2.0 * f64::EPSILON * total.abs());
    Ok(())
}

#[test]
fn projection_range_properties() -> Result<(), ImageError> {
    init_logger();
    let image = random_image(3, vec![12, 10])?;
    let (mut lo, mut hi, mut avg) = (Image::default(), Image::default(), Image::default());
    minimum(&image, None, &mut lo, &[])?;
    maximum(&image, None, &mut hi, &[])?;
    mean(&image, None, &mut avg, MeanMode::Plain, &[])?;
    assert!(first(&lo)? <= first(&avg)? && first(&avg)? <= first(&hi)?);

    let mut p = Image::default();
    percentile(&image, None, &mut p, 0.0, &[])?;
    assert_eq!(first(&p)?, first(&lo)?);
    percentile(&image, None, &mut p, 100.0, &[])?;
    assert_eq!(first(&p)?, first(&hi)?);

    let mut var = Image::default();
    variance(&image, None, &mut var, VarianceMode::Stable, &[])?;
    assert!(first(&var)? >= 0.0);

    // reducing one dimension first gives the same sum up to rounding
    let mut rows = Image::default();
    sum(&image, None, &mut rows, &[true, false])?;
    let mut staged = Image::default();
    sum(&rows, None, &mut staged, &[])?;
    let mut direct = Image::default();
    sum(&image, None, &mut direct, &[])?;
    assert_abs_diff_eq!(first(&staged)?, first(&direct)?, epsilon = 1e-9);
    Ok(())
}

#[test]
fn comparing_an_image_with_itself() -> Result<(), ImageError> {
    init_logger();
    let image = random_image(4, vec![24, 20])?;
    assert_eq!(psnr(&image, &image, None, 0.0)?, f64::INFINITY);
    assert_abs_diff_eq!(ssim(&image, &image, None, 2.0, 0.01, 0.03)?, 1.0, epsilon = 1e-12);
    Ok(())
}

#[test]
fn rotated_masked_image_keeps_its_sum() -> Result<(), ImageError> {
    init_logger();
    let image = Image::from_vec(vec![3, 2], 1, vec![1i32, 2, 3, 4, 5, 6])?;
    let (t, f) = (Bin::TRUE, Bin::FALSE);
    let mask = Image::from_vec(vec![3, 2], 1, vec![t, f, t, f, t, t])?;
    let mut out = Image::default();
    sum(&image, Some(&mask), &mut out, &[])?;
    let expected = first(&out)?;

    let mut rotated = image.clone();
    rotated.rotation90(1, 0, 1)?;
    let mut rotated_mask = mask.clone();
    rotated_mask.rotation90(1, 0, 1)?;
    assert_eq!(rotated.sizes(), &[2, 3]);
    sum(&rotated, Some(&rotated_mask), &mut out, &[])?;
    assert_eq!(first(&out)?, expected);
    assert_eq!(expected, 1.0 + 3.0 + 5.0 + 6.0);
    Ok(())
}

#[test]
fn filtering_does_not_depend_on_the_thread_count() -> Result<(), ImageError> {
    init_logger();
    let image = random_image(5, vec![256, 192])?;
    let boundary = [BoundaryCondition::SymmetricMirror];
    set_number_of_threads(1);
    let mut single = Image::default();
    gauss(&image, &mut single, &[2.0], 3.0, &boundary)?;
    set_number_of_threads(4);
    let mut several = Image::default();
    gauss(&image, &mut several, &[2.0], 3.0, &boundary)?;
    set_number_of_threads(0);
    assert_eq!(single.samples::<f64>()?, several.samples::<f64>()?);
    Ok(())
}
