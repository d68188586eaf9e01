use std::marker::PhantomData;

use crate::{error::ImageError, image::Image, sample::Sample};

// below this size a dimension is not worth walking along if a longer one exists
const SMALL_IMAGE: usize = 63;

/// Picks the dimension to walk along when processing an image line by line.
///
/// This is the dimension with the smallest non-zero stride, unless it is very short and a
/// longer dimension exists.
pub fn optimal_processing_dim_for(sizes: &[usize], strides: &[isize]) -> usize {
    let mut dim = 0;
    for ii in 1..strides.len().min(sizes.len()) {
        if strides[ii] != 0 && strides[ii].abs() < strides[dim].abs() {
            if sizes[ii] > SMALL_IMAGE || sizes[ii] > sizes[dim] {
                dim = ii;
            }
        } else if sizes[dim] <= SMALL_IMAGE && sizes[ii] > sizes[dim] {
            dim = ii;
        }
    }
    dim
}

/// The processing dimension of a forged image, see [`optimal_processing_dim_for`].
pub fn optimal_processing_dim(image: &Image) -> Result<usize, ImageError> {
    if !image.is_forged() {
        return Err(ImageError::NotForged);
    }
    Ok(optimal_processing_dim_for(image.sizes(), image.strides()))
}

/// Splits `0..n` into `parts` contiguous ranges whose lengths differ by at most one.
pub fn split_evenly(n: usize, parts: usize) -> Vec<std::ops::Range<usize>> {
    let parts = parts.max(1);
    let (chunk, extra) = (n / parts, n % parts);
    let mut start = 0;
    (0..parts)
        .map(|ii| {
            let len = chunk + usize::from(ii < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// An odometer over the coordinates of an image, optionally holding one dimension at 0.
///
/// Dimension 0 runs fastest.
#[derive(Clone, Debug)]
pub struct CoordinatesCounter {
    sizes: Vec<usize>,
    skip: Option<usize>,
    coords: Vec<usize>,
    done: bool,
}

impl CoordinatesCounter {
    /// Creates a counter at the origin. The `skip` dimension is never advanced.
    pub fn new(sizes: &[usize], skip: Option<usize>) -> Self {
        Self {
            sizes: sizes.to_vec(),
            skip,
            coords: vec![0; sizes.len()],
            done: sizes.iter().any(|&s| s == 0),
        }
    }

    /// The number of positions the counter visits.
    pub fn len(&self) -> usize {
        self.sizes
            .iter()
            .enumerate()
            .filter(|&(d, _)| Some(d) != self.skip)
            .map(|(_, &s)| s)
            .product()
    }

    /// True if the counter visits no positions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current coordinates.
    #[inline]
    pub fn coordinates(&self) -> &[usize] {
        &self.coords
    }

    /// True once the counter has wrapped around.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Jumps to the `index`-th position of the walk.
    pub fn seek(&mut self, mut index: usize) {
        self.done = index >= self.len();
        for d in 0..self.sizes.len() {
            if Some(d) == self.skip {
                self.coords[d] = 0;
                continue;
            }
            self.coords[d] = index % self.sizes[d];
            index /= self.sizes[d];
        }
    }

    /// Moves to the next position. Returns the dimension that was incremented, all lower
    /// dimensions having been reset to 0, or `None` when the walk is over.
    pub fn advance(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        for d in 0..self.sizes.len() {
            if Some(d) == self.skip {
                continue;
            }
            self.coords[d] += 1;
            if self.coords[d] < self.sizes[d] {
                return Some(d);
            }
            self.coords[d] = 0;
        }
        self.done = true;
        None
    }
}

/// Walks the lines of several images with identical sizes in lockstep.
///
/// Each line runs along the processing dimension. The walker keeps, for every image, the
/// offset in samples from its origin to the first pixel of the current line.
#[derive(Clone, Debug)]
pub struct LineWalker {
    counter: CoordinatesCounter,
    sizes: Vec<usize>,
    strides: Vec<Vec<isize>>,
    offsets: Vec<isize>,
    dim: usize,
}

impl LineWalker {
    /// Creates a walker over `sizes`, with one stride array per image.
    pub fn new(sizes: &[usize], strides: Vec<Vec<isize>>, dim: usize) -> Self {
        let skip = (dim < sizes.len()).then_some(dim);
        Self {
            counter: CoordinatesCounter::new(sizes, skip),
            sizes: sizes.to_vec(),
            offsets: vec![0; strides.len()],
            strides,
            dim,
        }
    }

    /// The processing dimension.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// The number of pixels on each line.
    pub fn line_length(&self) -> usize {
        self.sizes.get(self.dim).copied().unwrap_or(1)
    }

    /// The number of lines.
    pub fn number_of_lines(&self) -> usize {
        self.counter.len()
    }

    /// Offsets of the first pixel of the current line, one per image.
    #[inline]
    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// Coordinates of the first pixel of the current line.
    #[inline]
    pub fn coordinates(&self) -> &[usize] {
        self.counter.coordinates()
    }

    /// True once all lines have been visited.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.counter.is_done()
    }

    /// Jumps to the `line`-th line.
    pub fn seek(&mut self, line: usize) {
        self.counter.seek(line);
        let coords = self.counter.coordinates();
        for (offset, strides) in self.offsets.iter_mut().zip(&self.strides) {
            *offset = coords
                .iter()
                .zip(strides)
                .map(|(&c, &s)| c as isize * s)
                .sum();
        }
    }

    /// Moves to the next line, returns false when there are no more lines.
    pub fn next_line(&mut self) -> bool {
        let Some(d) = self.counter.advance() else {
            return false;
        };
        for (offset, strides) in self.offsets.iter_mut().zip(&self.strides) {
            *offset += strides[d];
            for k in (0..d).filter(|&k| k != self.dim) {
                *offset -= (self.sizes[k] as isize - 1) * strides[k];
            }
        }
        true
    }
}

/// An iterator over the first tensor element of every pixel of an image, in linear index
/// order.
///
/// The sample type must be the data type of the image.
pub struct SampleIter<'a, T> {
    base: *const T,
    walker: LineWalker,
    stride: isize,
    pos: usize,
    _image: PhantomData<&'a Image>,
}

impl<'a, T: Sample> SampleIter<'a, T> {
    /// Creates an iterator over `image`.
    pub fn new(image: &'a Image) -> Result<Self, ImageError> {
        if T::DATA_TYPE != image.data_type() {
            return Err(ImageError::DataTypeNotSupported(image.data_type()));
        }
        let base = image.origin_ptr()? as *const T;
        let walker = LineWalker::new(image.sizes(), vec![image.strides().to_vec()], 0);
        let stride = image.strides().first().copied().unwrap_or(1);
        Ok(Self {
            base,
            walker,
            stride,
            pos: 0,
            _image: PhantomData,
        })
    }
}

impl<T: Sample> Iterator for SampleIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.walker.is_done() {
            return None;
        }
        if self.pos == self.walker.line_length() {
            if !self.walker.next_line() {
                return None;
            }
            self.pos = 0;
        }
        let offset = self.walker.offsets()[0] + self.pos as isize * self.stride;
        self.pos += 1;
        // SAFETY: the offset addresses a pixel of the image, which holds samples of type T.
        Some(unsafe { *self.base.offset(offset) })
    }
}

fn prepare_mask(image: &Image, mask: Option<&Image>) -> Result<Option<Image>, ImageError> {
    let Some(mask) = mask else {
        return Ok(None);
    };
    mask.check_is_mask(image.sizes(), true)?;
    let mut mask = mask.clone();
    mask.expand_singleton_dimensions(image.sizes())?;
    Ok(Some(mask))
}

/// Calls `f` with the coordinates and the first tensor element of every pixel selected by
/// `mask`, in linear index order.
pub fn for_each_sample_with_coordinates<T, F>(
    image: &Image,
    mask: Option<&Image>,
    mut f: F,
) -> Result<(), ImageError>
where
    T: Sample,
    F: FnMut(&[usize], T),
{
    if T::DATA_TYPE != image.data_type() {
        return Err(ImageError::DataTypeNotSupported(image.data_type()));
    }
    let base = image.origin_ptr()? as *const T;
    let mask = prepare_mask(image, mask)?;
    let mut strides = vec![image.strides().to_vec()];
    let mask_base = match &mask {
        Some(m) => {
            strides.push(m.strides().to_vec());
            Some(m.origin_ptr()? as *const u8)
        }
        None => None,
    };
    if image.dimensionality() == 0 {
        // SAFETY: a 0-D forged image holds one pixel at the origin.
        unsafe {
            if mask_base.map_or(true, |m| *m != 0) {
                f(&[], *base);
            }
        }
        return Ok(());
    }
    let mut walker = LineWalker::new(image.sizes(), strides, 0);
    let n = walker.line_length();
    let mut coords = vec![0; image.dimensionality()];
    loop {
        coords.copy_from_slice(walker.coordinates());
        let offsets = walker.offsets();
        for ii in 0..n {
            coords[0] = ii;
            // SAFETY: the offsets address pixels inside both images.
            unsafe {
                if let Some(m) = mask_base {
                    let mo = offsets[1] + ii as isize * walker.strides[1][0];
                    if *m.offset(mo) == 0 {
                        continue;
                    }
                }
                let value = *base.offset(offsets[0] + ii as isize * walker.strides[0][0]);
                f(&coords, value);
            }
        }
        if !walker.next_line() {
            break;
        }
    }
    Ok(())
}

/// Calls `f` with the first tensor element of every pixel selected by `mask`.
pub fn for_each_sample<T, F>(
    image: &Image,
    mask: Option<&Image>,
    mut f: F,
) -> Result<(), ImageError>
where
    T: Sample,
    F: FnMut(T),
{
    for_each_sample_with_coordinates::<T, _>(image, mask, |_, v| f(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data_type::DataType, manip::Range, sample::Bin};

    #[test]
    fn test_optimal_processing_dim() {
        assert_eq!(optimal_processing_dim_for(&[100, 200], &[1, 100]), 0);
        assert_eq!(optimal_processing_dim_for(&[100, 200], &[200, 1]), 1);
        // short first dimension loses to a long one
        assert_eq!(optimal_processing_dim_for(&[3, 500], &[1, 3]), 1);
        assert_eq!(optimal_processing_dim_for(&[], &[]), 0);
    }

    #[test]
    fn test_split_evenly() {
        let parts = split_evenly(10, 3);
        assert_eq!(parts, vec![0..4, 4..7, 7..10]);
        assert_eq!(split_evenly(2, 4).iter().map(|r| r.len()).sum::<usize>(), 2);
    }

    #[test]
    fn test_coordinates_counter() {
        let mut counter = CoordinatesCounter::new(&[2, 3, 2], Some(1));
        assert_eq!(counter.len(), 4);
        let mut visited = vec![counter.coordinates().to_vec()];
        while counter.advance().is_some() {
            visited.push(counter.coordinates().to_vec());
        }
        assert_eq!(
            visited,
            vec![vec![0, 0, 0], vec![1, 0, 0], vec![0, 0, 1], vec![1, 0, 1]]
        );
        counter.seek(3);
        assert_eq!(counter.coordinates(), &[1, 0, 1]);
    }

    #[test]
    fn test_line_walker_offsets() -> Result<(), ImageError> {
        let img = Image::new(vec![4, 3, 2], 1, DataType::UInt8)?;
        let mut walker = LineWalker::new(img.sizes(), vec![img.strides().to_vec()], 1);
        assert_eq!(walker.number_of_lines(), 8);
        assert_eq!(walker.line_length(), 3);
        let mut offsets = vec![walker.offsets()[0]];
        while walker.next_line() {
            offsets.push(walker.offsets()[0]);
        }
        assert_eq!(offsets, vec![0, 1, 2, 3, 12, 13, 14, 15]);
        walker.seek(5);
        assert_eq!(walker.offsets()[0], 13);
        Ok(())
    }

    #[test]
    fn test_sample_iter_strided() -> Result<(), ImageError> {
        let img = Image::from_vec(vec![3, 2], 1, vec![1u8, 2, 3, 4, 5, 6])?;
        let mut view = img.at_range(&[Range::new(2, 0), Range::all()])?;
        view.swap_dimensions(0, 1)?;
        let values: Vec<u8> = SampleIter::new(&view)?.collect();
        assert_eq!(values, vec![3, 6, 2, 5, 1, 4]);
        assert!(SampleIter::<f32>::new(&img).is_err());
        Ok(())
    }

    #[test]
    fn test_for_each_sample_masked() -> Result<(), ImageError> {
        let img = Image::from_vec(vec![2, 2], 1, vec![1.0f32, 2.0, 3.0, 4.0])?;
        let mask = Image::from_vec(
            vec![2, 2],
            1,
            vec![Bin::TRUE, Bin::FALSE, Bin::FALSE, Bin::TRUE],
        )?;
        let mut seen = Vec::new();
        for_each_sample_with_coordinates::<f32, _>(&img, Some(&mask), |c, v| {
            seen.push((c.to_vec(), v))
        })?;
        assert_eq!(seen, vec![(vec![0, 0], 1.0), (vec![1, 1], 4.0)]);
        let mut sum = 0.0;
        for_each_sample::<f32, _>(&img, None, |v| sum += v)?;
        assert_eq!(sum, 10.0);
        Ok(())
    }
}
