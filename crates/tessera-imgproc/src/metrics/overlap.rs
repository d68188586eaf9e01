use tessera_image::{Image, ImageError};

use super::{check_real_pair, scan_pairs};
use crate::values::require_scalar;

/// Overlap measures between a segmentation and a reference segmentation.
///
/// Binary images count pixels. Other images are taken as fuzzy segmentations with values
/// in `[0, 1]`, where the minimum of two values is their intersection and the maximum their
/// union.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpatialOverlapMetrics {
    /// Intersection of the segmentation and the reference.
    pub true_positives: f64,
    /// Pixels outside both.
    pub true_negatives: f64,
    /// Segmented, but not in the reference.
    pub false_positives: f64,
    /// In the reference, but not segmented.
    pub false_negatives: f64,
    /// `2 TP / (2 TP + FP + FN)`.
    pub dice_coefficient: f64,
    /// `TP / (TP + FP + FN)`.
    pub jaccard_index: f64,
    /// `TP / (TP + FN)`, also known as recall.
    pub sensitivity: f64,
    /// `TN / (TN + FP)`.
    pub specificity: f64,
    /// `FP / (TN + FP)`.
    pub fallout: f64,
    /// `(TP + TN) / (TP + FP + TN + FN)`.
    pub accuracy: f64,
    /// `TP / (TP + FP)`.
    pub precision: f64,
}

#[derive(Default)]
struct Tally {
    intersection: f64,
    union: f64,
    only_in: f64,
    only_ref: f64,
    agreement: f64,
    pixels: usize,
}

fn tally(input: &Image, reference: &Image) -> Result<Tally, ImageError> {
    check_real_pair(input, reference)?;
    require_scalar(input)?;
    require_scalar(reference)?;
    let partials = scan_pairs(input, reference, None, |t: &mut Tally, a, b| {
        let (a, b) = (a.re, b.re);
        t.intersection += a.min(b);
        t.union += a.max(b);
        t.only_in += (a - b).max(0.0);
        t.only_ref += (b - a).max(0.0);
        t.agreement += (1.0 - (a - b).abs()).max(0.0);
        t.pixels += 1;
    })?;
    Ok(partials.into_iter().fold(Tally::default(), |mut acc, t| {
        acc.intersection += t.intersection;
        acc.union += t.union;
        acc.only_in += t.only_in;
        acc.only_ref += t.only_ref;
        acc.agreement += t.agreement;
        acc.pixels += t.pixels;
        acc
    }))
}

/// Computes all overlap measures between `input` and `reference` in one pass.
///
/// # Example
///
/// ```
/// use tessera_image::{Bin, Image, ImageError};
/// use tessera_imgproc::metrics::spatial_overlap;
///
/// let f = Bin::FALSE;
/// let t = Bin::TRUE;
/// let segmented = Image::from_vec(vec![4], 1, vec![t, t, f, f])?;
/// let reference = Image::from_vec(vec![4], 1, vec![t, f, t, f])?;
/// let m = spatial_overlap(&segmented, &reference)?;
/// assert_eq!(m.true_positives, 1.0);
/// assert_eq!(m.dice_coefficient, 0.5);
/// # Ok::<(), ImageError>(())
/// ```
pub fn spatial_overlap(
    input: &Image,
    reference: &Image,
) -> Result<SpatialOverlapMetrics, ImageError> {
    let t = tally(input, reference)?;
    let tp = t.intersection;
    let tn = t.pixels as f64 - t.union;
    let fp = t.only_in;
    let fn_ = t.only_ref;
    Ok(SpatialOverlapMetrics {
        true_positives: tp,
        true_negatives: tn,
        false_positives: fp,
        false_negatives: fn_,
        dice_coefficient: 2.0 * tp / (2.0 * tp + fp + fn_),
        jaccard_index: tp / (tp + fp + fn_),
        sensitivity: tp / (tp + fn_),
        specificity: tn / (tn + fp),
        fallout: fp / (tn + fp),
        accuracy: (tp + tn) / (tp + fp + tn + fn_),
        precision: tp / (tp + fp),
    })
}

/// The Dice coefficient, `2 |A ∩ B| / (|A| + |B|)`.
pub fn dice_coefficient(input: &Image, reference: &Image) -> Result<f64, ImageError> {
    Ok(spatial_overlap(input, reference)?.dice_coefficient)
}

/// The Jaccard index, `|A ∩ B| / |A ∪ B|`.
pub fn jaccard_index(input: &Image, reference: &Image) -> Result<f64, ImageError> {
    Ok(spatial_overlap(input, reference)?.jaccard_index)
}

/// The fraction of the reference background that is not segmented.
pub fn specificity(input: &Image, reference: &Image) -> Result<f64, ImageError> {
    Ok(spatial_overlap(input, reference)?.specificity)
}

/// The fraction of the reference foreground that is segmented.
pub fn sensitivity(input: &Image, reference: &Image) -> Result<f64, ImageError> {
    Ok(spatial_overlap(input, reference)?.sensitivity)
}

/// The fraction of pixels on which the segmentation and the reference agree.
///
/// Fuzzy values contribute `max(1 - |a - b|, 0)`.
pub fn accuracy(input: &Image, reference: &Image) -> Result<f64, ImageError> {
    let t = tally(input, reference)?;
    Ok(t.agreement / t.pixels as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_image::Bin;

    fn segmentations() -> Result<(Image, Image), ImageError> {
        let (f, t) = (Bin::FALSE, Bin::TRUE);
        // 3 × 2: TP at 0, FP at 1 and 2, FN at 3, TN at 4 and 5
        let segmented = Image::from_vec(vec![3, 2], 1, vec![t, t, t, f, f, f])?;
        let reference = Image::from_vec(vec![3, 2], 1, vec![t, f, f, t, f, f])?;
        Ok((segmented, reference))
    }

    #[test]
    fn test_spatial_overlap() -> Result<(), ImageError> {
        let (a, b) = segmentations()?;
        let m = spatial_overlap(&a, &b)?;
        assert_eq!(
            (m.true_positives, m.false_positives, m.false_negatives, m.true_negatives),
            (1.0, 2.0, 1.0, 2.0)
        );
        assert_eq!(m.dice_coefficient, 2.0 / 5.0);
        assert_eq!(m.jaccard_index, 0.25);
        assert_eq!(m.sensitivity, 0.5);
        assert_eq!(m.specificity, 0.5);
        assert_eq!(m.fallout, 0.5);
        assert_eq!(m.precision, 1.0 / 3.0);
        assert_eq!(m.accuracy, 0.5);
        assert_eq!(accuracy(&a, &b)?, 0.5);
        assert_eq!(dice_coefficient(&a, &a)?, 1.0);
        assert_eq!(jaccard_index(&b, &b)?, 1.0);
        Ok(())
    }

    #[test]
    fn test_fuzzy_overlap() -> Result<(), ImageError> {
        let a = Image::from_vec(vec![2], 1, vec![0.5f32, 1.0])?;
        let b = Image::from_vec(vec![2], 1, vec![1.0f32, 1.0])?;
        let m = spatial_overlap(&a, &b)?;
        assert_eq!(m.true_positives, 1.5);
        assert_eq!(m.false_negatives, 0.5);
        assert_eq!(sensitivity(&a, &b)?, 0.75);
        assert!(specificity(&a, &b)?.is_nan());
        Ok(())
    }
}
