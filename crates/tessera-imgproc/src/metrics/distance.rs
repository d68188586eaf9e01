use log::debug;
use rayon::{iter::ParallelIterator, slice::ParallelSliceMut};
use tessera_image::{Bin, Image, ImageError};

use super::check_pair;
use crate::values::{require_binary, require_scalar};

// stands in for an infinite distance, small enough to keep the envelope arithmetic finite
const FAR: f64 = 1e18;

/// Squared distances to the nearest point of the lower envelope of the parabolas rooted at
/// `f`, the exact 1-D squared distance transform of a sampled function.
fn lower_envelope(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    let mut k = 0;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        loop {
            let (vk, qq) = (v[k] as f64, q as f64);
            let s = ((f[q] + qq * qq) - (f[v[k]] + vk * vk)) / (2.0 * qq - 2.0 * vk);
            if s > z[k] {
                k += 1;
                v[k] = q;
                z[k] = s;
                z[k + 1] = f64::INFINITY;
                break;
            }
            if k == 0 {
                v[0] = q;
                z[1] = f64::INFINITY;
                break;
            }
            k -= 1;
        }
    }
    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let diff = q as f64 - v[k] as f64;
        *out = diff * diff + f[v[k]];
    }
}

/// Euclidean distance from every pixel to the nearest set pixel of `objects`, in linear
/// index order. Distances are infinite if no pixel is set.
fn distance_to_objects(objects: &[bool], sizes: &[usize]) -> Vec<f64> {
    let mut dist: Vec<f64> = objects
        .iter()
        .map(|&o| if o { 0.0 } else { FAR })
        .collect();
    let mut stride = 1;
    for &n in sizes {
        if n > 1 {
            dist.par_chunks_mut(stride * n).for_each(|block| {
                let mut f = vec![0.0; n];
                let mut d = vec![0.0; n];
                let mut v = vec![0; n];
                let mut z = vec![0.0; n + 1];
                for offset in 0..stride {
                    for (i, fi) in f.iter_mut().enumerate() {
                        *fi = block[offset + i * stride];
                    }
                    lower_envelope(&f, &mut d, &mut v, &mut z);
                    for (i, &di) in d.iter().enumerate() {
                        block[offset + i * stride] = di;
                    }
                }
            });
        }
        stride *= n;
    }
    dist.into_iter()
        .map(|d| if d >= FAR { f64::INFINITY } else { d.sqrt() })
        .collect()
}

/// For each of the two sets, the distances from its pixels to the nearest pixel of the
/// other set.
fn cross_distances(
    input: &Image,
    reference: &Image,
) -> Result<(Vec<f64>, Vec<f64>), ImageError> {
    check_pair(input, reference)?;
    require_scalar(input)?;
    require_scalar(reference)?;
    require_binary(input)?;
    require_binary(reference)?;
    let a: Vec<bool> = input.samples::<Bin>()?.into_iter().map(Bin::is_set).collect();
    let b: Vec<bool> = reference.samples::<Bin>()?.into_iter().map(Bin::is_set).collect();
    let to_a = distance_to_objects(&a, input.sizes());
    let to_b = distance_to_objects(&b, input.sizes());
    let from_b = b.iter().zip(&to_a).filter_map(|(&s, &d)| s.then_some(d)).collect();
    let from_a = a.iter().zip(&to_b).filter_map(|(&s, &d)| s.then_some(d)).collect();
    debug!("set distances over {:?}", input.sizes());
    Ok((from_a, from_b))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// The Hausdorff distance between the set pixels of two binary images.
///
/// This is the largest distance from a pixel of either set to the nearest pixel of the
/// other set, measured in pixels. It is infinite if exactly one of the sets is empty.
///
/// # Example
///
/// ```
/// use tessera_image::{Bin, Image, ImageError};
/// use tessera_imgproc::metrics::hausdorff_distance;
///
/// let mut a = vec![Bin::FALSE; 20];
/// let mut b = vec![Bin::FALSE; 20];
/// a[0] = Bin::TRUE;
/// b[4 * 4 + 3] = Bin::TRUE;
/// let a = Image::from_vec(vec![4, 5], 1, a)?;
/// let b = Image::from_vec(vec![4, 5], 1, b)?;
/// assert_eq!(hausdorff_distance(&a, &b)?, 5.0);
/// # Ok::<(), ImageError>(())
/// ```
pub fn hausdorff_distance(input: &Image, reference: &Image) -> Result<f64, ImageError> {
    let (from_a, from_b) = cross_distances(input, reference)?;
    Ok(from_a.into_iter().chain(from_b).fold(0.0, f64::max))
}

/// The modified Hausdorff distance: the larger of the two mean distances from the pixels
/// of one set to the nearest pixel of the other.
pub fn modified_hausdorff_distance(input: &Image, reference: &Image) -> Result<f64, ImageError> {
    let (from_a, from_b) = cross_distances(input, reference)?;
    Ok(mean(&from_a).max(mean(&from_b)))
}

/// Half the sum of all distances from the pixels of one set to the nearest pixel of the
/// other, taken both ways.
pub fn sum_of_minimal_distances(input: &Image, reference: &Image) -> Result<f64, ImageError> {
    let (from_a, from_b) = cross_distances(input, reference)?;
    Ok((from_a.iter().sum::<f64>() + from_b.iter().sum::<f64>()) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(set: &[usize]) -> Result<Image, ImageError> {
        let mut data = vec![Bin::FALSE; 6];
        for &i in set {
            data[i] = Bin::TRUE;
        }
        Image::from_vec(vec![6], 1, data)
    }

    #[test]
    fn test_distance_to_objects() {
        let objects = [false, true, false, false, false, false, true];
        let d = distance_to_objects(&objects, &[7]);
        assert_eq!(d, vec![1.0, 0.0, 1.0, 2.0, 2.0, 1.0, 0.0]);
        // 3 × 3 with the center set
        let mut objects = [false; 9];
        objects[4] = true;
        let d = distance_to_objects(&objects, &[3, 3]);
        assert_eq!(d[0], 2.0f64.sqrt());
        assert_eq!(d[1], 1.0);
        assert!(distance_to_objects(&[false; 4], &[2, 2])
            .iter()
            .all(|d| d.is_infinite()));
    }

    #[test]
    fn test_set_distances() -> Result<(), ImageError> {
        let a = line(&[0, 1])?;
        let b = line(&[4])?;
        assert_eq!(hausdorff_distance(&a, &b)?, 4.0);
        assert_eq!(modified_hausdorff_distance(&a, &b)?, 3.5);
        assert_eq!(sum_of_minimal_distances(&a, &b)?, 5.0);
        assert_eq!(hausdorff_distance(&a, &a)?, 0.0);
        assert_eq!(hausdorff_distance(&a, &line(&[])?)?, f64::INFINITY);
        Ok(())
    }

    #[test]
    fn test_set_distances_need_binary() -> Result<(), ImageError> {
        let a = Image::from_vec(vec![6], 1, vec![0u8; 6])?;
        let b = line(&[4])?;
        assert_eq!(hausdorff_distance(&a, &b), Err(ImageError::NotBinary));
        Ok(())
    }
}
