use std::str::FromStr;

use log::debug;
use num_complex::Complex64;
use tessera_image::{AcceptDataTypeChange, Image, ImageError};

use crate::values::{for_each_value_with_coordinates, require_forged, require_non_complex};

/// The largest radius covered by the radial projections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaxRadius {
    /// The distance from the center to the farthest image corner.
    #[default]
    Outer,
    /// The distance from the center to the nearest image edge.
    Inner,
}

impl FromStr for MaxRadius {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "outer radius" => Ok(MaxRadius::Outer),
            "inner radius" => Ok(MaxRadius::Inner),
            _ => Err(ImageError::InvalidFlag(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Radial {
    Sum,
    Mean,
    Minimum,
    Maximum,
}

fn resolve_center(input: &Image, center: &[f64]) -> Result<Vec<f64>, ImageError> {
    let sizes = input.sizes();
    if center.is_empty() {
        return Ok(sizes.iter().map(|&s| (s / 2) as f64).collect());
    }
    if center.len() != sizes.len() {
        return Err(ImageError::ArrayParameterWrongLength(
            center.len(),
            sizes.len(),
        ));
    }
    let inside = center
        .iter()
        .zip(sizes)
        .all(|(&c, &s)| c >= 0.0 && c <= (s - 1) as f64);
    if !inside {
        return Err(ImageError::ParameterOutOfRange(
            "center is outside the image".to_string(),
        ));
    }
    Ok(center.to_vec())
}

fn maximum_radius(sizes: &[usize], center: &[f64], max_radius: MaxRadius) -> f64 {
    let far_side = |(&s, &c): (&usize, &f64)| ((s - 1) as f64 - c, c);
    match max_radius {
        MaxRadius::Inner => sizes
            .iter()
            .zip(center)
            .map(far_side)
            .map(|(a, b)| a.min(b))
            .fold(f64::INFINITY, f64::min),
        MaxRadius::Outer => sizes
            .iter()
            .zip(center)
            .map(far_side)
            .map(|(a, b)| a.max(b).powi(2))
            .sum::<f64>()
            .sqrt(),
    }
}

fn radial_projection(
    kind: Radial,
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    bin_size: f64,
    max_radius: MaxRadius,
    center: &[f64],
) -> Result<(), ImageError> {
    require_forged(input)?;
    let n_dims = input.dimensionality();
    if n_dims < 2 {
        return Err(ImageError::DimensionalityNotSupported(n_dims));
    }
    if bin_size <= 0.0 || bin_size.is_nan() {
        return Err(ImageError::ParameterOutOfRange(format!(
            "bin size must be positive, got {bin_size}"
        )));
    }
    let dt = input.data_type();
    let out_type = match kind {
        Radial::Sum | Radial::Mean => dt.suggest_double(),
        Radial::Minimum | Radial::Maximum => {
            require_non_complex(dt)?;
            dt
        }
    };
    let center = resolve_center(input, center)?;
    let radius = maximum_radius(input.sizes(), &center, max_radius);
    let n_bins = (radius / bin_size) as usize + 1;
    let n_tensor = input.tensor_elements();
    debug!("radial projection: {n_bins} bins of size {bin_size} around {center:?}");

    let init = match kind {
        Radial::Sum | Radial::Mean => Complex64::new(0.0, 0.0),
        Radial::Minimum => Complex64::new(f64::INFINITY, 0.0),
        Radial::Maximum => Complex64::new(f64::NEG_INFINITY, 0.0),
    };
    // bin-major, tensor elements innermost
    let mut bins = vec![init; n_bins * n_tensor];
    let mut counts = vec![0usize; n_bins];
    for t in 0..n_tensor {
        let element = input.tensor_element(t)?;
        for_each_value_with_coordinates(&element, mask, |coords, v| {
            let r2: f64 = coords
                .iter()
                .zip(&center)
                .map(|(&x, &c)| (x as f64 - c).powi(2))
                .sum();
            let bin = (r2.sqrt() / bin_size).floor() as usize;
            if bin >= n_bins {
                return;
            }
            let acc = &mut bins[bin * n_tensor + t];
            match kind {
                Radial::Sum | Radial::Mean => *acc += v,
                Radial::Minimum if v.re < acc.re => acc.re = v.re,
                Radial::Maximum if v.re > acc.re => acc.re = v.re,
                _ => {}
            }
            if t == 0 {
                counts[bin] += 1;
            }
        })?;
    }
    if kind == Radial::Mean {
        for (bin, &n) in counts.iter().enumerate() {
            for v in &mut bins[bin * n_tensor..(bin + 1) * n_tensor] {
                *v = if n > 0 { *v / n as f64 } else { init };
            }
        }
    }

    if out.is_forged() && out.is_overlapping_view(input) {
        out.strip()?;
    }
    out.reforge(&[n_bins], n_tensor, out_type, AcceptDataTypeChange::DontAllow)?;
    out.reshape_tensor_like(input.tensor())?;
    out.set_color_space(input.color_space().to_string());
    for bin in 0..n_bins {
        for t in 0..n_tensor {
            out.set_sample(&[bin], t, bins[bin * n_tensor + t])?;
        }
    }
    Ok(())
}

/// Sums the pixel values in bins of distance to `center`.
///
/// The output is a 1-D image with `floor(radius / bin_size) + 1` bins, where the radius is
/// given by `max_radius`. Pixels farther away are ignored. Tensor elements are binned
/// independently.
///
/// The radial projections walk the image on the calling thread, outside the Projection
/// framework, since every pixel may land in any bin.
///
/// # Arguments
///
/// * `input` - The input image, with at least two dimensions.
/// * `mask` - An optional binary mask selecting the pixels to use.
/// * `out` - The output image, of a double-precision type.
/// * `bin_size` - The width of the bins, in pixels. Must be positive.
/// * `max_radius` - The largest radius to bin.
/// * `center` - The center, one coordinate per dimension. Empty means `floor(size / 2)`.
///
/// # Errors
///
/// Fails with [`ImageError::DimensionalityNotSupported`] for 1-D images, and with
/// [`ImageError::ParameterOutOfRange`] for a non-positive bin size or a center outside the
/// image.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::projection::{radial_sum, MaxRadius};
///
/// let image = Image::from_vec(vec![3, 3], 1, vec![1u8; 9])?;
/// let mut out = Image::default();
/// radial_sum(&image, None, &mut out, 1.0, MaxRadius::Inner, &[])?;
/// // the center, then the other eight pixels at distances 1 and √2
/// assert_eq!(out.samples::<f64>()?, vec![1.0, 8.0]);
/// # Ok::<(), ImageError>(())
/// ```
pub fn radial_sum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    bin_size: f64,
    max_radius: MaxRadius,
    center: &[f64],
) -> Result<(), ImageError> {
    radial_projection(Radial::Sum, input, mask, out, bin_size, max_radius, center)
}

/// Averages the pixel values in bins of distance to `center`. Empty bins are 0. See
/// [`radial_sum`].
pub fn radial_mean(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    bin_size: f64,
    max_radius: MaxRadius,
    center: &[f64],
) -> Result<(), ImageError> {
    radial_projection(Radial::Mean, input, mask, out, bin_size, max_radius, center)
}

/// The minimum pixel value in bins of distance to `center`. The output has the input type.
/// See [`radial_sum`].
pub fn radial_minimum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    bin_size: f64,
    max_radius: MaxRadius,
    center: &[f64],
) -> Result<(), ImageError> {
    radial_projection(Radial::Minimum, input, mask, out, bin_size, max_radius, center)
}

/// The maximum pixel value in bins of distance to `center`. The output has the input type.
/// See [`radial_sum`].
pub fn radial_maximum(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    bin_size: f64,
    max_radius: MaxRadius,
    center: &[f64],
) -> Result<(), ImageError> {
    radial_projection(Radial::Maximum, input, mask, out, bin_size, max_radius, center)
}
