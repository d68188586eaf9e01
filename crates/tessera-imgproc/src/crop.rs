//! Cropping, padding, and moving masked pixels to and from 1-D images.

use log::debug;
use tessera_image::{Image, ImageError, Range, View};

/// Where a window of a smaller size sits inside a larger one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CropLocation {
    /// The center pixels coincide: the window starts at `in / 2 - out / 2`.
    #[default]
    Center,
    /// Like [`CropLocation::Center`], rounding the other way for even sizes: the window starts
    /// at `(in - 1) / 2 - (out - 1) / 2`.
    MirrorCenter,
    /// The window starts at the origin.
    TopLeft,
    /// The window ends at the last pixel.
    BottomRight,
}

impl CropLocation {
    fn start(self, size: usize, window: usize) -> usize {
        match self {
            CropLocation::Center => size / 2 - window / 2,
            CropLocation::MirrorCenter => (size - 1) / 2 - (window - 1) / 2,
            CropLocation::TopLeft => 0,
            CropLocation::BottomRight => size - window,
        }
    }
}

/// The ranges selecting a window of `window` pixels inside an image of `sizes` pixels.
///
/// # Errors
///
/// The two arrays must have the same length, and the window must not be larger than the image
/// along any dimension.
///
/// # Example
///
/// ```
/// use tessera_image::Range;
/// use tessera_imgproc::crop::{crop_window, CropLocation};
///
/// let window = crop_window(&[10, 7], &[4, 7], CropLocation::Center).unwrap();
/// assert_eq!(window, vec![Range::new(3, 6), Range::new(0, 6)]);
/// ```
pub fn crop_window(
    sizes: &[usize],
    window: &[usize],
    location: CropLocation,
) -> Result<Vec<Range>, ImageError> {
    if window.len() != sizes.len() {
        return Err(ImageError::ArrayParameterWrongLength(window.len(), sizes.len()));
    }
    sizes
        .iter()
        .zip(window)
        .map(|(&size, &w)| {
            if w > size || w == 0 {
                return Err(ImageError::IndexOutOfRange);
            }
            let start = location.start(size, w);
            Ok(Range::new(start as isize, (start + w - 1) as isize))
        })
        .collect()
}

/// A view of a window of `sizes` pixels of `input`.
///
/// The view shares its data with `input`.
///
/// # Errors
///
/// Fails with [`ImageError::IndexOutOfRange`] if the window is larger than the image.
pub fn crop(input: &Image, sizes: &[usize], location: CropLocation) -> Result<Image, ImageError> {
    let window = crop_window(input.sizes(), sizes, location)?;
    input.at_range(&window)
}

/// A new image of `sizes` pixels with `input` copied into the window given by `location`, and
/// zeros elsewhere.
///
/// The output has the data type, tensor shape and pixel size of the input. Cropping the result
/// with the same location gives back the input.
///
/// # Example
///
/// ```
/// use tessera_image::{Image, ImageError};
/// use tessera_imgproc::crop::{pad, CropLocation};
///
/// let image = Image::from_vec(vec![2], 1, vec![1u8, 2])?;
/// let padded = pad(&image, &[5], CropLocation::Center)?;
/// assert_eq!(padded.samples::<u8>()?, vec![0, 1, 2, 0, 0]);
/// # Ok::<(), ImageError>(())
/// ```
pub fn pad(input: &Image, sizes: &[usize], location: CropLocation) -> Result<Image, ImageError> {
    if !input.is_forged() {
        return Err(ImageError::NotForged);
    }
    let window = crop_window(sizes, input.sizes(), location)?;
    debug!("padding {:?} to {:?}", input.sizes(), sizes);
    let mut out = Image::new(sizes.to_vec(), input.tensor_elements(), input.data_type())?;
    out.copy_non_data_properties(input);
    let mut target = out.at_range(&window)?;
    target.copy_from(input)?;
    Ok(out)
}

fn gather(view: View, out: &mut Image) -> Result<(), ImageError> {
    if view.number_of_pixels()? == 0 {
        // nothing selected leaves a raw image
        return out.strip();
    }
    out.copy_from(&view.copy_to_image()?)
}

/// Copies the pixels of `input` selected by `mask` into the 1-D image `out`, in linear index
/// order.
///
/// If `out` is forged with the right number of pixels and tensor elements it is reused, and
/// the samples are cast to its data type. If the mask selects no pixels, `out` is left raw.
pub fn copy_from(input: &Image, out: &mut Image, mask: &Image) -> Result<(), ImageError> {
    gather(input.at_mask(mask)?, out)
}

/// Copies the pixels of `input` at `offsets` into the 1-D image `out`.
pub fn copy_from_offsets(
    input: &Image,
    out: &mut Image,
    offsets: &[isize],
) -> Result<(), ImageError> {
    gather(input.at_offsets(offsets.to_vec())?, out)
}

/// Writes the pixels of the 1-D image `input` into the pixels of `out` selected by `mask`.
///
/// # Errors
///
/// `out` must be forged, and `input` must have one pixel per selected pixel.
pub fn copy_to(input: &Image, out: &mut Image, mask: &Image) -> Result<(), ImageError> {
    out.at_mask(mask)?.copy_from(input)
}

/// Writes the pixels of the 1-D image `input` into the pixels of `out` at `offsets`.
pub fn copy_to_offsets(
    input: &Image,
    out: &mut Image,
    offsets: &[isize],
) -> Result<(), ImageError> {
    out.at_offsets(offsets.to_vec())?.copy_from(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tessera_image::{Bin, DataType, SampleValue};

    #[test]
    fn test_crop_locations() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![5], 1, (0..5).collect::<Vec<u8>>())?;
        let cases = [
            (CropLocation::Center, vec![1, 2]),
            (CropLocation::MirrorCenter, vec![2, 3]),
            (CropLocation::TopLeft, vec![0, 1]),
            (CropLocation::BottomRight, vec![3, 4]),
        ];
        for (location, expected) in cases {
            assert_eq!(crop(&image, &[2], location)?.samples::<u8>()?, expected);
        }
        assert!(matches!(
            crop(&image, &[6], CropLocation::Center),
            Err(ImageError::IndexOutOfRange)
        ));
        assert!(matches!(
            crop(&image, &[2, 2], CropLocation::Center),
            Err(ImageError::ArrayParameterWrongLength(2, 1))
        ));
        Ok(())
    }

    #[test]
    fn test_crop_is_a_view() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![3, 3], 1, vec![0i16; 9])?;
        let mut center = crop(&image, &[1, 1], CropLocation::Center)?;
        center.fill(SampleValue::SInt16(7))?;
        assert_eq!(image.samples::<i16>()?[4], 7);
        Ok(())
    }

    #[test]
    fn test_pad_crop_random() -> Result<(), ImageError> {
        let mut rng = StdRng::seed_from_u64(3);
        for location in [
            CropLocation::Center,
            CropLocation::MirrorCenter,
            CropLocation::TopLeft,
            CropLocation::BottomRight,
        ] {
            let sizes = vec![rng.random_range(1..6), rng.random_range(1..6)];
            let n: usize = sizes.iter().product::<usize>() * 2;
            let data: Vec<f32> = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();
            let image = Image::from_vec(sizes.clone(), 2, data.clone())?;
            let big = [sizes[0] + rng.random_range(0..4), sizes[1] + rng.random_range(0..4)];
            let padded = pad(&image, &big, location)?;
            assert_eq!(padded.sizes(), &big);
            assert_eq!(padded.tensor_elements(), 2);
            let total: f64 = padded.samples::<f64>()?.iter().sum();
            let expected: f64 = data.iter().map(|&v| v as f64).sum();
            assert!((total - expected).abs() < 1e-4);
            assert_eq!(crop(&padded, &sizes, location)?.samples::<f32>()?, data);
        }
        Ok(())
    }

    #[test]
    fn test_copy_masked_pixels() -> Result<(), ImageError> {
        let image = Image::from_vec(vec![2, 2], 1, vec![1u16, 2, 3, 4])?;
        let (t, f) = (Bin::TRUE, Bin::FALSE);
        let mask = Image::from_vec(vec![2, 2], 1, vec![f, t, t, f])?;
        let mut picked = Image::default();
        copy_from(&image, &mut picked, &mask)?;
        assert_eq!(picked.sizes(), &[2]);
        assert_eq!(picked.samples::<u16>()?, vec![2, 3]);

        // a forged output of the right size keeps its type
        let mut doubles = Image::new(vec![2], 1, DataType::DFloat)?;
        copy_from_offsets(&image, &mut doubles, &[3, 0])?;
        assert_eq!(doubles.data_type(), DataType::DFloat);
        assert_eq!(doubles.samples::<f64>()?, vec![4.0, 1.0]);

        let mut target = Image::new(vec![2, 2], 1, DataType::UInt16)?;
        copy_to(&picked, &mut target, &mask)?;
        assert_eq!(target.samples::<u16>()?, vec![0, 2, 3, 0]);
        copy_to_offsets(&doubles, &mut target, &[0, 3])?;
        assert_eq!(target.samples::<u16>()?, vec![4, 2, 3, 1]);

        let nothing = Image::from_vec(vec![2, 2], 1, vec![f; 4])?;
        copy_from(&image, &mut picked, &nothing)?;
        assert!(!picked.is_forged());
        Ok(())
    }
}
