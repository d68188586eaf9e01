//! Metadata-only transforms, indexing and aliasing tests.
//!
//! None of these functions touch the samples, they only rearrange the sizes, strides,
//! tensor and origin of an image. The results are views of the same data segment.

use crate::{
    data_type::DataType,
    error::ImageError,
    image::{data_block_size_and_start, simple_stride_and_start, Image},
    physical::PhysicalQuantity,
    tensor::Tensor,
};

/// A range of indices along one dimension, `start..=stop` taken every `step` pixels.
///
/// Negative `start` and `stop` count from the end, `-1` is the last pixel. If `start` is
/// larger than `stop` the pixels are taken in reverse order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    /// The first index.
    pub start: isize,
    /// The last index, inclusive.
    pub stop: isize,
    /// The step, at least 1.
    pub step: usize,
}

impl Default for Range {
    fn default() -> Self {
        Self::all()
    }
}

impl Range {
    /// All pixels along a dimension.
    pub fn all() -> Self {
        Self {
            start: 0,
            stop: -1,
            step: 1,
        }
    }

    /// A single pixel.
    pub fn single(index: isize) -> Self {
        Self {
            start: index,
            stop: index,
            step: 1,
        }
    }

    /// The pixels `start..=stop`.
    pub fn new(start: isize, stop: isize) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    /// The pixels `start..=stop`, every `step` pixels.
    pub fn with_step(start: isize, stop: isize, step: usize) -> Self {
        Self { start, stop, step }
    }

    /// Resolves negative indices against `size`; returns the offset of the first pixel, the
    /// number of pixels and the signed step.
    pub fn resolve(&self, size: usize) -> Result<(usize, usize, isize), ImageError> {
        let size = size as isize;
        let fix = |i: isize| if i < 0 { i + size } else { i };
        let (start, stop) = (fix(self.start), fix(self.stop));
        if start < 0 || start >= size || stop < 0 || stop >= size || self.step == 0 {
            return Err(ImageError::IndexOutOfRange);
        }
        let step = self.step as isize;
        let n = (stop - start).unsigned_abs() / self.step + 1;
        let step = if start > stop { -step } else { step };
        Ok((start as usize, n, step))
    }
}

fn gcd(mut a: isize, mut b: isize) -> isize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

impl Image {
    fn test_forged(&self) -> Result<(), ImageError> {
        if !self.is_forged() {
            return Err(ImageError::NotForged);
        }
        Ok(())
    }

    fn test_dim(&self, d: usize) -> Result<(), ImageError> {
        if d >= self.sizes.len() {
            return Err(ImageError::IllegalDimension(d, self.sizes.len()));
        }
        Ok(())
    }

    /// Moves the origin by `offset` samples.
    ///
    /// # Safety
    ///
    /// Every sample addressed by the image after the shift must lie inside its data segment.
    #[inline]
    pub unsafe fn shift_origin_unchecked(&mut self, offset: isize) {
        let bytes = offset * self.data_type.size_of() as isize;
        self.origin = self.origin.wrapping_add_signed(bytes);
    }

    /// Sets the sizes of a forged view without checking the data segment bounds.
    ///
    /// # Safety
    ///
    /// Every sample addressed by the image after the change must lie inside its data segment.
    pub unsafe fn set_sizes_unchecked(&mut self, sizes: Vec<usize>) {
        self.sizes = sizes;
    }

    /// Sets the strides of a forged view without checking the data segment bounds.
    ///
    /// # Safety
    ///
    /// Every sample addressed by the image after the change must lie inside its data segment.
    pub unsafe fn set_strides_unchecked(&mut self, strides: Vec<isize>) {
        self.strides = strides;
    }

    // ---- tensor ----

    /// Makes the tensor elements a new spatial dimension at `dim` (default: the last one) and
    /// the image scalar.
    pub fn tensor_to_spatial(&mut self, dim: Option<usize>) -> Result<(), ImageError> {
        self.test_forged()?;
        let nd = self.sizes.len();
        let dim = dim.unwrap_or(nd);
        if dim > nd {
            return Err(ImageError::IllegalDimension(dim, nd));
        }
        self.sizes.insert(dim, self.tensor.elements());
        self.strides.insert(dim, self.tensor_stride);
        self.pixel_size.insert(dim, PhysicalQuantity::pixel());
        self.tensor = Tensor::scalar();
        Ok(())
    }

    /// Makes spatial dimension `dim` the tensor, with the given number of rows and columns.
    pub fn spatial_to_tensor(
        &mut self,
        dim: usize,
        rows: usize,
        cols: usize,
    ) -> Result<(), ImageError> {
        self.test_forged()?;
        if !self.is_scalar() {
            return Err(ImageError::NotScalar);
        }
        self.test_dim(dim)?;
        if self.sizes[dim] != rows * cols {
            return Err(ImageError::NTensorElementsDontMatch(
                self.sizes[dim],
                rows * cols,
            ));
        }
        self.tensor = Tensor::matrix(rows, cols)?;
        self.tensor_stride = self.strides[dim];
        self.sizes.remove(dim);
        self.strides.remove(dim);
        self.pixel_size.remove(dim);
        Ok(())
    }

    /// Gives the tensor a column-major matrix shape.
    pub fn reshape_tensor(&mut self, rows: usize, cols: usize) -> Result<(), ImageError> {
        if rows * cols != self.tensor.elements() {
            return Err(ImageError::NTensorElementsDontMatch(
                self.tensor.elements(),
                rows * cols,
            ));
        }
        self.tensor = Tensor::matrix(rows, cols)?;
        Ok(())
    }

    /// Gives the tensor the shape of `example`, which must have the same number of elements.
    pub fn reshape_tensor_like(&mut self, example: &Tensor) -> Result<(), ImageError> {
        self.tensor.change_shape_like(example)
    }

    /// Makes the tensor a column vector.
    pub fn reshape_tensor_as_vector(&mut self) {
        self.tensor.change_shape_to_vector();
    }

    /// Makes a vector tensor a diagonal matrix.
    pub fn reshape_tensor_as_diagonal(&mut self) -> Result<(), ImageError> {
        self.tensor.change_shape_to_diagonal()
    }

    /// Transposes the tensor.
    pub fn transpose_tensor(&mut self) {
        self.tensor.transpose();
    }

    /// Repeats a single tensor element `n` times using a zero tensor stride.
    pub fn expand_singleton_tensor(&mut self, n: usize) -> Result<(), ImageError> {
        self.test_forged()?;
        if !self.is_scalar() {
            return Err(ImageError::NotScalar);
        }
        self.tensor = Tensor::vector(n)?;
        self.tensor_stride = 0;
        Ok(())
    }

    // ---- dimensions ----

    /// Rearranges the dimensions: new dimension `i` is old dimension `order[i]`.
    ///
    /// Dimensions not named in `order` are dropped, they must be singletons.
    pub fn permute_dimensions(&mut self, order: &[usize]) -> Result<(), ImageError> {
        self.test_forged()?;
        let nd = self.sizes.len();
        if order.len() > nd {
            return Err(ImageError::ArrayParameterWrongLength(order.len(), nd));
        }
        let mut keep = vec![false; nd];
        for &d in order {
            self.test_dim(d)?;
            if keep[d] {
                return Err(ImageError::InvalidParameter(
                    "cannot duplicate a dimension".to_string(),
                ));
            }
            keep[d] = true;
        }
        if (0..nd).any(|d| !keep[d] && self.sizes[d] > 1) {
            return Err(ImageError::InvalidParameter(
                "cannot discard a non-singleton dimension".to_string(),
            ));
        }
        self.sizes = order.iter().map(|&d| self.sizes[d]).collect();
        self.strides = order.iter().map(|&d| self.strides[d]).collect();
        self.pixel_size.permute(order);
        Ok(())
    }

    /// Swaps two dimensions.
    pub fn swap_dimensions(&mut self, d1: usize, d2: usize) -> Result<(), ImageError> {
        self.test_forged()?;
        self.test_dim(d1)?;
        self.test_dim(d2)?;
        self.sizes.swap(d1, d2);
        self.strides.swap(d1, d2);
        self.pixel_size.swap(d1, d2);
        Ok(())
    }

    /// Reverses the order of the dimensions.
    pub fn reverse_dimensions(&mut self) -> Result<(), ImageError> {
        let order: Vec<usize> = (0..self.sizes.len()).rev().collect();
        self.permute_dimensions(&order)
    }

    /// Mirrors the dimensions flagged in `process`.
    pub fn mirror(&mut self, process: &[bool]) -> Result<(), ImageError> {
        self.test_forged()?;
        let nd = self.sizes.len();
        if process.len() != nd {
            return Err(ImageError::ArrayParameterWrongLength(process.len(), nd));
        }
        for d in (0..nd).filter(|&d| process[d]) {
            let offset = (self.sizes[d] as isize - 1) * self.strides[d];
            // SAFETY: the shift moves the origin to the last pixel along `d`, inside the image.
            unsafe { self.shift_origin_unchecked(offset) };
            self.strides[d] = -self.strides[d];
        }
        Ok(())
    }

    /// Rotates the image by `n` times 90 degrees in the plane of dimensions `d1` and `d2`,
    /// from `d1` towards `d2`.
    pub fn rotation90(&mut self, n: i32, d1: usize, d2: usize) -> Result<(), ImageError> {
        self.test_forged()?;
        self.test_dim(d1)?;
        self.test_dim(d2)?;
        if d1 == d2 {
            return Err(ImageError::InvalidParameter(
                "rotation needs two different dimensions".to_string(),
            ));
        }
        let nd = self.sizes.len();
        let flags = |d: usize| (0..nd).map(|ii| ii == d).collect::<Vec<_>>();
        match n.rem_euclid(4) {
            1 => {
                self.mirror(&flags(d2))?;
                self.swap_dimensions(d1, d2)?;
            }
            2 => {
                let both: Vec<bool> = (0..nd).map(|ii| ii == d1 || ii == d2).collect();
                self.mirror(&both)?;
            }
            3 => {
                self.mirror(&flags(d1))?;
                self.swap_dimensions(d1, d2)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Removes all singleton dimensions.
    pub fn squeeze(&mut self) -> Result<(), ImageError> {
        self.test_forged()?;
        let keep: Vec<bool> = self.sizes.iter().map(|&s| s > 1).collect();
        self.keep_dimensions(&keep);
        Ok(())
    }

    /// Removes singleton dimension `dim`.
    pub fn squeeze_dimension(&mut self, dim: usize) -> Result<(), ImageError> {
        self.test_forged()?;
        self.test_dim(dim)?;
        if self.sizes[dim] != 1 {
            return Err(ImageError::InvalidParameter(
                "dimension is not a singleton".to_string(),
            ));
        }
        let keep: Vec<bool> = (0..self.sizes.len()).map(|d| d != dim).collect();
        self.keep_dimensions(&keep);
        Ok(())
    }

    fn keep_dimensions(&mut self, keep: &[bool]) {
        let mut d = 0;
        self.sizes.retain(|_| {
            d += 1;
            keep[d - 1]
        });
        let mut d = 0;
        self.strides.retain(|_| {
            d += 1;
            keep[d - 1]
        });
        self.pixel_size.select(keep);
    }

    /// Inserts a singleton dimension at `dim`.
    pub fn add_singleton(&mut self, dim: usize) -> Result<(), ImageError> {
        self.test_forged()?;
        let nd = self.sizes.len();
        if dim > nd {
            return Err(ImageError::IllegalDimension(dim, nd));
        }
        self.sizes.insert(dim, 1);
        self.strides.insert(dim, 0);
        self.pixel_size.insert(dim, PhysicalQuantity::pixel());
        Ok(())
    }

    /// Appends singleton dimensions until the image has `n` dimensions.
    pub fn expand_dimensionality(&mut self, n: usize) -> Result<(), ImageError> {
        self.test_forged()?;
        while self.sizes.len() < n {
            self.sizes.push(1);
            self.strides.push(0);
        }
        Ok(())
    }

    /// Splits dimension `dim` into two dimensions of sizes `size` and `sizes[dim] / size`.
    pub fn split_dimension(&mut self, dim: usize, size: usize) -> Result<(), ImageError> {
        self.test_forged()?;
        self.test_dim(dim)?;
        if size == 0 || self.sizes[dim] % size != 0 {
            return Err(ImageError::InvalidParameter(format!(
                "size {} does not divide dimension {dim}",
                size
            )));
        }
        let outer = self.sizes[dim] / size;
        self.sizes[dim] = size;
        self.sizes.insert(dim + 1, outer);
        self.strides
            .insert(dim + 1, self.strides[dim] * size as isize);
        self.pixel_size.insert(dim + 1, self.pixel_size.get(dim));
        Ok(())
    }

    /// True if the image can be singleton-expanded to `target`.
    pub fn is_singleton_expansion_possible(&self, target: &[usize]) -> bool {
        if self.sizes.len() > target.len() {
            return false;
        }
        self.sizes
            .iter()
            .zip(target)
            .all(|(&s, &t)| s == t || s == 1)
    }

    /// Expands singleton dimensions to `target` using zero strides. Missing trailing
    /// dimensions are added first.
    pub fn expand_singleton_dimensions(&mut self, target: &[usize]) -> Result<(), ImageError> {
        self.test_forged()?;
        if !self.is_singleton_expansion_possible(target) {
            return Err(ImageError::SizesDontMatch(
                self.sizes.clone(),
                target.to_vec(),
            ));
        }
        self.expand_dimensionality(target.len())?;
        for (d, &t) in target.iter().enumerate() {
            if self.sizes[d] != t {
                self.sizes[d] = t;
                self.strides[d] = 0;
            }
        }
        Ok(())
    }

    /// Sets dimensions with a zero stride, and a tensor with a zero tensor stride, back to size 1.
    pub fn unexpand_singleton_dimensions(&mut self) -> Result<(), ImageError> {
        self.test_forged()?;
        for (size, &stride) in self.sizes.iter_mut().zip(&self.strides) {
            if stride == 0 {
                *size = 1;
            }
        }
        if self.tensor.elements() > 1 && self.tensor_stride == 0 {
            self.tensor = Tensor::scalar();
        }
        Ok(())
    }

    /// Sets dimension `d` back to size 1 if it has a zero stride.
    pub fn unexpand_singleton_dimension(&mut self, d: usize) -> Result<(), ImageError> {
        self.test_forged()?;
        self.test_dim(d)?;
        if self.strides[d] == 0 {
            self.sizes[d] = 1;
        }
        Ok(())
    }

    /// Makes a tensor with a zero tensor stride scalar again.
    pub fn unexpand_singleton_tensor(&mut self) -> Result<(), ImageError> {
        self.test_forged()?;
        if self.tensor_stride == 0 {
            self.tensor = Tensor::scalar();
        }
        Ok(())
    }

    /// Undoes mirroring, dimension permutations and singleton expansion.
    ///
    /// All strides become positive and sorted in increasing order, singleton dimensions move
    /// to the end.
    pub fn standardize_strides(&mut self) -> Result<(), ImageError> {
        self.unexpand_singleton_dimensions()?;
        let nd = self.sizes.len();
        let flip: Vec<bool> = (0..nd).map(|d| self.strides[d] < 0).collect();
        self.mirror(&flip)?;
        let mut order: Vec<usize> = (0..nd).collect();
        order.sort_by_key(|&d| (self.sizes[d] == 1, self.strides[d]));
        self.permute_dimensions(&order)
    }

    /// Makes the image 1-D. Without a simple stride the samples are copied to a new segment.
    pub fn flatten(&mut self) -> Result<(), ImageError> {
        self.test_forged()?;
        let (stride, start) = match self.simple_stride() {
            Some(s) => s,
            None => {
                *self = self.copy()?;
                self.simple_stride().ok_or(ImageError::InvalidParameter(
                    "copy without simple stride".to_string(),
                ))?
            }
        };
        // SAFETY: `start` is the offset of the lowest pixel of the image.
        unsafe { self.shift_origin_unchecked(start) };
        self.sizes = vec![self.number_of_pixels()];
        self.strides = vec![stride];
        if !self.pixel_size.is_isotropic() {
            self.pixel_size.clear();
        }
        Ok(())
    }

    /// Merges dimensions that can be merged without copying data.
    ///
    /// Dimensions may be reordered and reversed in the process.
    pub fn flatten_as_much_as_possible(&mut self) -> Result<(), ImageError> {
        self.test_forged()?;
        if self.simple_stride().is_some() {
            return self.flatten();
        }
        self.standardize_strides()?;
        self.squeeze()?;
        let mut sizes = vec![self.sizes[0]];
        let mut strides = vec![self.strides[0]];
        for d in 1..self.sizes.len() {
            let last = sizes.len() - 1;
            if self.strides[d] == strides[last] * sizes[last] as isize {
                sizes[last] *= self.sizes[d];
            } else {
                sizes.push(self.sizes[d]);
                strides.push(self.strides[d]);
            }
        }
        self.sizes = sizes;
        self.strides = strides;
        self.pixel_size.clear();
        Ok(())
    }

    /// Views a complex image as a real image with a new dimension of size 2 at `dim` (default:
    /// the last one) holding the real and imaginary parts.
    pub fn split_complex(&mut self, dim: Option<usize>) -> Result<(), ImageError> {
        self.test_forged()?;
        if !self.data_type.is_complex() {
            return Err(ImageError::NotComplex);
        }
        let nd = self.sizes.len();
        let dim = dim.unwrap_or(nd);
        if dim > nd {
            return Err(ImageError::IllegalDimension(dim, nd));
        }
        self.data_type = self.data_type.real_type();
        for s in self.strides.iter_mut() {
            *s *= 2;
        }
        self.tensor_stride *= 2;
        self.sizes.insert(dim, 2);
        self.strides.insert(dim, 1);
        self.pixel_size.insert(dim, PhysicalQuantity::pixel());
        Ok(())
    }

    /// Views the real part of a complex image.
    pub fn real_part(&self) -> Result<Image, ImageError> {
        self.test_forged()?;
        if !self.data_type.is_complex() {
            return Err(ImageError::NotComplex);
        }
        let mut out = self.clone();
        out.data_type = self.data_type.real_type();
        for s in out.strides.iter_mut() {
            *s *= 2;
        }
        out.tensor_stride *= 2;
        Ok(out)
    }

    // ---- indexing ----

    /// The offset, in samples from the origin, of the pixel at `coords`.
    pub fn offset(&self, coords: &[usize]) -> Result<isize, ImageError> {
        self.test_forged()?;
        if coords.len() != self.sizes.len() {
            return Err(ImageError::ArrayParameterWrongLength(
                coords.len(),
                self.sizes.len(),
            ));
        }
        let mut offset = 0isize;
        for ((&c, &sz), &s) in coords.iter().zip(&self.sizes).zip(&self.strides) {
            if c >= sz {
                return Err(ImageError::IndexOutOfRange);
            }
            offset += c as isize * s;
        }
        Ok(offset)
    }

    /// The coordinates of the pixel at `offset` samples from the origin.
    ///
    /// Singleton-expanded dimensions always get coordinate 0.
    pub fn offset_to_coordinates(&self, offset: isize) -> Result<Vec<usize>, ImageError> {
        self.test_forged()?;
        let nd = self.sizes.len();
        // measure from the lowest address, with all strides positive
        let (_, start) = data_block_size_and_start(&self.strides, &self.sizes);
        let mut rem = offset - start;
        let mut order: Vec<usize> = (0..nd)
            .filter(|&d| self.strides[d] != 0 && self.sizes[d] > 1)
            .collect();
        order.sort_by_key(|&d| std::cmp::Reverse(self.strides[d].abs()));
        let mut coords = vec![0usize; nd];
        for d in order {
            let s = self.strides[d].abs();
            let c = rem / s;
            rem %= s;
            if c < 0 || c as usize >= self.sizes[d] {
                return Err(ImageError::IndexOutOfRange);
            }
            coords[d] = if self.strides[d] < 0 {
                self.sizes[d] - 1 - c as usize
            } else {
                c as usize
            };
        }
        if rem != 0 {
            return Err(ImageError::IndexOutOfRange);
        }
        Ok(coords)
    }

    /// The linear index of the pixel at `coords`, with dimension 0 running fastest.
    pub fn index(&self, coords: &[usize]) -> Result<usize, ImageError> {
        if coords.len() != self.sizes.len() {
            return Err(ImageError::ArrayParameterWrongLength(
                coords.len(),
                self.sizes.len(),
            ));
        }
        let mut index = 0;
        let mut step = 1;
        for (&c, &sz) in coords.iter().zip(&self.sizes) {
            if c >= sz {
                return Err(ImageError::IndexOutOfRange);
            }
            index += c * step;
            step *= sz;
        }
        Ok(index)
    }

    /// The coordinates of the pixel with linear index `index`.
    pub fn index_to_coordinates(&self, mut index: usize) -> Result<Vec<usize>, ImageError> {
        if index >= self.number_of_pixels() {
            return Err(ImageError::IndexOutOfRange);
        }
        Ok(self
            .sizes
            .iter()
            .map(|&sz| {
                let c = index % sz;
                index /= sz;
                c
            })
            .collect())
    }

    /// True if both images address exactly the same samples in the same way.
    pub fn is_identical_view(&self, other: &Image) -> bool {
        match (&self.segment, &other.segment) {
            (Some(a), Some(b)) => {
                a.ptr_eq(b)
                    && self.origin == other.origin
                    && self.data_type == other.data_type
                    && self.sizes == other.sizes
                    && self.strides == other.strides
                    && self.tensor.elements() == other.tensor.elements()
                    && (self.tensor.elements() == 1 || self.tensor_stride == other.tensor_stride)
            }
            _ => false,
        }
    }

    /// True if writing to this image could change samples of `other`.
    ///
    /// The test compares the address sets of both images and is exact for images with
    /// regular strides; it errs on the side of reporting an overlap.
    pub fn is_overlapping_view(&self, other: &Image) -> bool {
        let (Some(seg1), Some(seg2)) = (&self.segment, &other.segment) else {
            return false;
        };
        if !seg1.ptr_eq(seg2) {
            return false;
        }
        if self.origin == other.origin {
            return true;
        }

        let with_tensor = |img: &Image| {
            let mut strides = img.strides.clone();
            let mut sizes = img.sizes.clone();
            if img.tensor.elements() > 1 {
                strides.push(img.tensor_stride);
                sizes.push(img.tensor.elements());
            }
            (strides, sizes)
        };
        let (mut strides1, mut sizes1) = with_tensor(self);
        let (mut strides2, mut sizes2) = with_tensor(other);

        // express both images in units of the smaller sample
        let dts1 = self.data_type.size_of();
        let dts2 = other.data_type.size_of();
        let dts = dts1.min(dts2);
        for (strides, sizes, n) in [
            (&mut strides1, &mut sizes1, dts1 / dts),
            (&mut strides2, &mut sizes2, dts2 / dts),
        ] {
            if n > 1 {
                strides.iter_mut().for_each(|s| *s *= n as isize);
                strides.push(1);
                sizes.push(n);
            }
        }
        let mut origin1 = (self.origin / dts) as isize;
        let mut origin2 = (other.origin / dts) as isize;

        let (size1, start1) = data_block_size_and_start(&strides1, &sizes1);
        let (size2, start2) = data_block_size_and_start(&strides2, &sizes2);
        let sstride1 = simple_stride_and_start(&strides1, &sizes1).map_or(0, |s| s.0);
        let sstride2 = simple_stride_and_start(&strides2, &sizes2).map_or(0, |s| s.0);
        let (start1, start2) = (start1 + origin1, start2 + origin2);
        if sstride1 > 1 && sstride1 == sstride2 && (start1 - start2) % sstride1 != 0 {
            return false;
        }
        if start1 + size1 as isize <= start2 || start2 + size2 as isize <= start1 {
            return false;
        }

        // normalise: no singletons, positive strides, sorted
        let normalise = |strides: Vec<isize>, sizes: Vec<usize>, origin: &mut isize| {
            let mut dims: Vec<(isize, usize)> = strides
                .into_iter()
                .zip(sizes)
                .filter(|&(_, sz)| sz > 1)
                .map(|(s, sz)| {
                    if s < 0 {
                        *origin += (sz as isize - 1) * s;
                    }
                    (s.abs(), sz)
                })
                .collect();
            dims.sort_by_key(|&(s, _)| s);
            dims
        };
        let dims1 = normalise(strides1, sizes1, &mut origin1);
        let dims2 = normalise(strides2, sizes2, &mut origin2);

        // match up the dimensions of both images
        let (n1, n2) = (dims1.len(), dims2.len());
        let mut i1 = dims1.iter().take_while(|d| d.0 == 0).count();
        let mut i2 = dims2.iter().take_while(|d| d.0 == 0).count();
        let mut common: Vec<(isize, isize, isize, usize, usize)> = Vec::new();
        while i1 < n1 || i2 < n2 {
            let (mut s1, mut d1) = if i1 < n1 { dims1[i1] } else { (0, 1) };
            let (mut s2, mut d2) = if i2 < n2 { dims2[i2] } else { (0, 1) };
            if s1 == 0 {
                s1 = s2;
                i2 += 1;
            } else if s2 == 0 {
                s2 = s1;
                i1 += 1;
            } else if i1 + 1 < n1 && dims1[i1 + 1].0 <= s2 * (d2 as isize - 1) {
                s2 = s1;
                d2 = 1;
                i1 += 1;
            } else if i2 + 1 < n2 && dims2[i2 + 1].0 <= s1 * (d1 as isize - 1) {
                s1 = s2;
                d1 = 1;
                i2 += 1;
            } else {
                i1 += 1;
                i2 += 1;
            }
            let cs = if common.is_empty() { 1 } else { gcd(s1, s2).max(1) };
            common.push((cs, s1 / cs, s2 / cs, d1, d2));
        }

        let to_coords = |mut offset: isize| {
            let mut coords = vec![0isize; common.len()];
            for ii in (0..common.len()).rev() {
                coords[ii] = offset / common[ii].0;
                offset %= common[ii].0;
            }
            coords
        };
        let c1 = to_coords(origin1);
        let c2 = to_coords(origin2);
        for (ii, &(_, ns1, ns2, d1, d2)) in common.iter().enumerate() {
            if c1[ii] + (d1 as isize - 1) * ns1 < c2[ii] {
                return false;
            }
            if c2[ii] + (d2 as isize - 1) * ns2 < c1[ii] {
                return false;
            }
            if ns1 == ns2 && ns1 > 1 && (c1[ii] - c2[ii]) % ns1 != 0 {
                return false;
            }
        }
        true
    }

    // ---- views ----

    /// A view of the pixels selected by one range per dimension.
    pub fn at_range(&self, ranges: &[Range]) -> Result<Image, ImageError> {
        self.test_forged()?;
        let nd = self.sizes.len();
        if ranges.len() != nd {
            return Err(ImageError::ArrayParameterWrongLength(ranges.len(), nd));
        }
        let mut out = self.clone();
        let mut offset = 0isize;
        for (d, range) in ranges.iter().enumerate() {
            let (start, n, step) = range.resolve(self.sizes[d])?;
            offset += start as isize * self.strides[d];
            out.sizes[d] = n;
            out.strides[d] = self.strides[d] * step;
            if range.step > 1 {
                out.pixel_size.scale(d, range.step as f64);
            }
        }
        // SAFETY: every range was checked to lie inside the image.
        unsafe { out.shift_origin_unchecked(offset) };
        Ok(out)
    }

    /// A view of a single tensor element as a scalar image.
    pub fn tensor_element(&self, index: usize) -> Result<Image, ImageError> {
        self.test_forged()?;
        if index >= self.tensor.elements() {
            return Err(ImageError::IndexOutOfRange);
        }
        let mut out = self.clone();
        // SAFETY: the tensor element exists in every pixel.
        unsafe { out.shift_origin_unchecked(index as isize * self.tensor_stride) };
        out.tensor = Tensor::scalar();
        Ok(out)
    }

    /// Checks that the image can be used as a mask for an image of the given sizes: forged,
    /// scalar, binary and, if `allow_singleton_expansion`, singleton-expandable to `sizes`.
    pub fn check_is_mask(
        &self,
        sizes: &[usize],
        allow_singleton_expansion: bool,
    ) -> Result<(), ImageError> {
        self.test_forged()?;
        if !self.is_scalar() {
            return Err(ImageError::NotScalar);
        }
        if self.data_type != DataType::Bin {
            return Err(ImageError::NotBinary);
        }
        let ok = if allow_singleton_expansion {
            self.is_singleton_expansion_possible(sizes)
        } else {
            self.sizes == sizes
        };
        if !ok {
            return Err(ImageError::SizesDontMatch(self.sizes.clone(), sizes.to_vec()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(sizes: Vec<usize>) -> Result<Image, ImageError> {
        let n: usize = sizes.iter().product();
        Image::from_vec(sizes, 1, (0..n as i32).collect::<Vec<_>>())
    }

    #[test]
    fn test_range_resolve() -> Result<(), ImageError> {
        assert_eq!(Range::all().resolve(5)?, (0, 5, 1));
        assert_eq!(Range::new(4, 0).resolve(5)?, (4, 5, -1));
        assert_eq!(Range::with_step(1, -1, 2).resolve(6)?, (1, 3, 2));
        assert_eq!(Range::single(5).resolve(5), Err(ImageError::IndexOutOfRange));
        Ok(())
    }

    #[test]
    fn test_tensor_to_spatial_roundtrip() -> Result<(), ImageError> {
        let mut img = Image::new(vec![3, 4], 3, DataType::UInt8)?;
        img.tensor_to_spatial(Some(0))?;
        assert_eq!(img.sizes(), &[3, 3, 4]);
        assert_eq!(img.strides(), &[1, 3, 9]);
        assert!(img.is_scalar());
        img.spatial_to_tensor(0, 3, 1)?;
        assert_eq!(img.sizes(), &[3, 4]);
        assert_eq!(img.tensor_elements(), 3);
        assert_eq!(img.tensor_stride(), 1);
        Ok(())
    }

    #[test]
    fn test_permute_inverse() -> Result<(), ImageError> {
        let img = ramp(vec![2, 3, 4])?;
        let mut p = img.clone();
        p.permute_dimensions(&[2, 0, 1])?;
        assert_eq!(p.sizes(), &[4, 2, 3]);
        assert_eq!(p.offset(&[3, 1, 2])?, img.offset(&[1, 2, 3])?);
        p.permute_dimensions(&[1, 2, 0])?;
        assert!(p.is_identical_view(&img));
        let mut q = ramp(vec![2, 1, 3])?;
        q.permute_dimensions(&[2, 0])?;
        assert_eq!(q.sizes(), &[3, 2]);
        assert!(ramp(vec![2, 3])?.permute_dimensions(&[1]).is_err());
        Ok(())
    }

    #[test]
    fn test_rotation90() -> Result<(), ImageError> {
        let mut img = ramp(vec![3, 2, 4])?;
        img.rotation90(1, 0, 1)?;
        assert_eq!(img.sizes(), &[2, 3, 4]);
        assert_eq!(img.strides(), &[-3, 1, 6]);
        let mut full = ramp(vec![3, 2])?;
        let original = full.clone();
        full.rotation90(4, 0, 1)?;
        assert!(full.is_identical_view(&original));
        full.rotation90(2, 0, 1)?;
        assert_eq!(
            full.pointer(full.offset(&[0, 0])?)?,
            original.pointer(original.offset(&[2, 1])?)?
        );
        Ok(())
    }

    #[test]
    fn test_offset_to_coordinates() -> Result<(), ImageError> {
        let mut img = ramp(vec![3, 4, 2])?;
        img.mirror(&[false, true, false])?;
        for coords in [vec![0, 0, 0], vec![2, 3, 1], vec![1, 2, 0]] {
            let offset = img.offset(&coords)?;
            assert_eq!(img.offset_to_coordinates(offset)?, coords);
        }
        assert_eq!(img.index(&[1, 2, 1])?, 1 + 2 * 3 + 12);
        assert_eq!(img.index_to_coordinates(19)?, vec![1, 2, 1]);
        Ok(())
    }

    #[test]
    fn test_singleton_expansion() -> Result<(), ImageError> {
        let mut img = ramp(vec![3, 1])?;
        assert!(img.is_singleton_expansion_possible(&[3, 5, 2]));
        img.expand_singleton_dimensions(&[3, 5, 2])?;
        assert_eq!(img.sizes(), &[3, 5, 2]);
        assert_eq!(img.strides(), &[1, 0, 0]);
        assert!(img.is_singleton_expanded());
        img.unexpand_singleton_dimensions()?;
        assert_eq!(img.sizes(), &[3, 1, 1]);
        assert!(ramp(vec![3, 2])?.expand_singleton_dimensions(&[3, 5]).is_err());
        Ok(())
    }

    #[test]
    fn test_flatten() -> Result<(), ImageError> {
        let mut img = ramp(vec![3, 4])?;
        img.mirror(&[true, false])?;
        img.flatten()?;
        assert_eq!(img.sizes(), &[12]);
        assert_eq!(img.strides(), &[1]);

        let big = ramp(vec![4, 4])?;
        let mut window = big.at_range(&[Range::new(0, 1), Range::all()])?;
        assert!(window.simple_stride().is_none());
        window.flatten_as_much_as_possible()?;
        assert_eq!(window.sizes(), &[2, 4]);
        Ok(())
    }

    #[test]
    fn test_overlapping_views() -> Result<(), ImageError> {
        let img = ramp(vec![4, 4])?;
        let left = img.at_range(&[Range::new(0, 1), Range::all()])?;
        let right = img.at_range(&[Range::new(2, 3), Range::all()])?;
        let even = img.at_range(&[Range::with_step(0, -1, 2), Range::all()])?;
        let odd = img.at_range(&[Range::with_step(1, -1, 2), Range::all()])?;
        assert!(img.is_overlapping_view(&left));
        assert!(!left.is_overlapping_view(&right));
        assert!(!even.is_overlapping_view(&odd));
        assert!(even.is_overlapping_view(&left));
        let other = ramp(vec![4, 4])?;
        assert!(!img.is_overlapping_view(&other));
        Ok(())
    }

    #[test]
    fn test_split_complex() -> Result<(), ImageError> {
        let mut img = Image::new(vec![3], 1, DataType::SComplex)?;
        img.split_complex(None)?;
        assert_eq!(img.data_type(), DataType::SFloat);
        assert_eq!(img.sizes(), &[3, 2]);
        assert_eq!(img.strides(), &[2, 1]);
        Ok(())
    }

    #[test]
    fn test_check_is_mask() -> Result<(), ImageError> {
        let mask = Image::new(vec![3, 1], 1, DataType::Bin)?;
        mask.check_is_mask(&[3, 4], true)?;
        assert!(mask.check_is_mask(&[3, 4], false).is_err());
        let not_bin = Image::new(vec![3, 4], 1, DataType::UInt8)?;
        assert_eq!(not_bin.check_is_mask(&[3, 4], true), Err(ImageError::NotBinary));
        Ok(())
    }
}
