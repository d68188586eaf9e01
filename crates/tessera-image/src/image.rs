use std::{fmt, str::FromStr, sync::Arc};

use crate::{
    data_type::DataType,
    error::ImageError,
    physical::PixelSize,
    sample::{Sample, SampleValue},
    storage::{DataSegment, ExternalInterface, ReleaseFn},
    tensor::Tensor,
};

/// Whether [`Image::reforge`] may keep the current data type of a protected image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AcceptDataTypeChange {
    /// The image must get the requested data type.
    #[default]
    DontAllow,
    /// A protected image keeps its data type; the data is cast on write.
    DoAllow,
}

impl FromStr for AcceptDataTypeChange {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dont allow" => Ok(Self::DontAllow),
            "do allow" => Ok(Self::DoAllow),
            _ => Err(ImageError::InvalidFlag(s.to_string())),
        }
    }
}

/// An n-dimensional image with a tensor at each pixel.
///
/// An image is either *raw*, when it only carries properties, or *forged*, when it is backed by
/// a [`DataSegment`]. Strides are expressed in samples and may be negative or zero. Cloning an
/// image is shallow: the clone shares the data segment, making it a view of the same pixels.
///
/// # Examples
///
/// ```
/// use tessera_image::{DataType, Image};
///
/// let img = Image::new(vec![3, 4], 2, DataType::UInt8).unwrap();
/// assert!(img.is_forged());
/// assert_eq!(img.strides(), &[2, 6]);
/// assert_eq!(img.tensor_stride(), 1);
/// assert_eq!(img.number_of_samples(), 24);
/// ```
pub struct Image {
    pub(crate) data_type: DataType,
    pub(crate) sizes: Vec<usize>,
    pub(crate) strides: Vec<isize>,
    pub(crate) tensor: Tensor,
    pub(crate) tensor_stride: isize,
    pub(crate) protect: bool,
    pub(crate) color_space: String,
    pub(crate) pixel_size: PixelSize,
    pub(crate) segment: Option<DataSegment>,
    /// Byte offset of the sample at coordinates `(0, 0, ...)` within the segment.
    pub(crate) origin: usize,
    pub(crate) external_interface: Option<Arc<dyn ExternalInterface>>,
}

impl Default for Image {
    fn default() -> Self {
        Self {
            data_type: DataType::SFloat,
            sizes: Vec::new(),
            strides: Vec::new(),
            tensor: Tensor::scalar(),
            tensor_stride: 1,
            protect: false,
            color_space: String::new(),
            pixel_size: PixelSize::default(),
            segment: None,
            origin: 0,
            external_interface: None,
        }
    }
}

impl Clone for Image {
    /// Shallow copy. The protect flag is not copied.
    fn clone(&self) -> Self {
        Self {
            data_type: self.data_type,
            sizes: self.sizes.clone(),
            strides: self.strides.clone(),
            tensor: self.tensor.clone(),
            tensor_stride: self.tensor_stride,
            protect: false,
            color_space: self.color_space.clone(),
            pixel_size: self.pixel_size.clone(),
            segment: self.segment.clone(),
            origin: self.origin,
            external_interface: self.external_interface.clone(),
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("data_type", &self.data_type)
            .field("sizes", &self.sizes)
            .field("strides", &self.strides)
            .field("tensor", &self.tensor)
            .field("tensor_stride", &self.tensor_stride)
            .field("protect", &self.protect)
            .field("color_space", &self.color_space)
            .field("segment", &self.segment)
            .field("origin", &self.origin)
            .finish()
    }
}

pub(crate) fn test_sizes(sizes: &[usize]) -> Result<(), ImageError> {
    if sizes.iter().any(|&s| s == 0) {
        return Err(ImageError::ParameterOutOfRange(format!(
            "image sizes must be positive, got {sizes:?}"
        )));
    }
    Ok(())
}

/// Strides of a compact image with the tensor elements interleaved: dimension 0 has stride
/// `tensor_elements` and every following dimension the product of the previous ones.
pub fn normal_strides(sizes: &[usize], tensor_elements: usize) -> Vec<isize> {
    let mut s = tensor_elements as isize;
    sizes
        .iter()
        .map(|&sz| {
            let stride = s;
            s *= sz as isize;
            stride
        })
        .collect()
}

/// The number of samples spanned by `strides` and `sizes`, and the (non-positive) offset of
/// the lowest sample relative to the origin.
pub(crate) fn data_block_size_and_start(strides: &[isize], sizes: &[usize]) -> (usize, isize) {
    let (mut min, mut max) = (0isize, 0isize);
    for (&s, &sz) in strides.iter().zip(sizes) {
        let p = (sz as isize - 1) * s;
        if p < 0 {
            min += p;
        } else {
            max += p;
        }
    }
    ((max - min + 1) as usize, min)
}

/// The single stride that walks all pixels, together with the offset of the first pixel on
/// that walk, if such a stride exists.
pub(crate) fn simple_stride_and_start(
    strides: &[isize],
    sizes: &[usize],
) -> Option<(isize, isize)> {
    if strides.is_empty() {
        return Some((1, 0));
    }
    let sstride = strides
        .iter()
        .zip(sizes)
        .filter(|(_, &sz)| sz > 1)
        .map(|(s, _)| s.abs())
        .min()
        .unwrap_or(1);
    let (size, start) = data_block_size_and_start(strides, sizes);
    let n: usize = sizes.iter().product();
    if size != (n - 1) * sstride as usize + 1 {
        return None;
    }
    Some((sstride, start))
}

impl Image {
    /// Creates a forged image with normal strides, all samples set to zero.
    ///
    /// # Arguments
    ///
    /// * `sizes` - The size of each spatial dimension, may be empty for a 0-D image.
    /// * `tensor_elements` - The number of tensor elements per pixel (a column vector).
    /// * `data_type` - The sample type.
    pub fn new(
        sizes: Vec<usize>,
        tensor_elements: usize,
        data_type: DataType,
    ) -> Result<Self, ImageError> {
        let mut img = Self::raw(sizes, tensor_elements, data_type)?;
        img.forge()?;
        Ok(img)
    }

    /// Creates a raw image with the given properties.
    pub fn raw(
        sizes: Vec<usize>,
        tensor_elements: usize,
        data_type: DataType,
    ) -> Result<Self, ImageError> {
        test_sizes(&sizes)?;
        Ok(Self {
            data_type,
            sizes,
            tensor: Tensor::vector(tensor_elements)?,
            ..Default::default()
        })
    }

    /// Creates a forged image that takes its samples from `data`.
    ///
    /// Samples are ordered with the tensor index fastest, then dimension 0, dimension 1, etc.
    ///
    /// # Errors
    ///
    /// Fails with `ArrayParameterWrongLength` if `data` does not hold exactly
    /// `product(sizes) * tensor_elements` samples.
    pub fn from_vec<T: Sample>(
        sizes: Vec<usize>,
        tensor_elements: usize,
        data: Vec<T>,
    ) -> Result<Self, ImageError> {
        let mut img = Self::raw(sizes, tensor_elements, T::DATA_TYPE)?;
        let expected = img.number_of_samples();
        if data.len() != expected {
            return Err(ImageError::ArrayParameterWrongLength(data.len(), expected));
        }
        img.strides = normal_strides(&img.sizes, tensor_elements);
        img.tensor_stride = 1;
        img.segment = Some(DataSegment::from_vec(data)?);
        Ok(img)
    }

    /// Creates a 0-D scalar image holding `value`.
    pub fn from_sample<T: Sample>(value: T) -> Result<Self, ImageError> {
        Self::from_vec(Vec::new(), 1, vec![value])
    }

    /// Creates a 0-D scalar image holding a type-erased value.
    pub fn from_value(value: SampleValue) -> Result<Self, ImageError> {
        let img = Self::new(Vec::new(), 1, value.data_type())?;
        // SAFETY: the image was just forged with the data type of `value`.
        unsafe { value.write_to(img.origin_ptr()?, img.data_type) };
        Ok(img)
    }

    /// Creates a forged image over externally owned memory.
    ///
    /// # Safety
    ///
    /// `ptr` must point at the sample at coordinates `(0, 0, ...)` and every sample addressed
    /// by `sizes`, `strides`, `tensor` and `tensor_stride` must be valid for reads and writes
    /// until `release` is called (or forever, if `release` is `None`).
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn from_raw_parts(
        ptr: *mut u8,
        data_type: DataType,
        sizes: Vec<usize>,
        strides: Vec<isize>,
        tensor: Tensor,
        tensor_stride: isize,
        release: Option<ReleaseFn>,
    ) -> Result<Self, ImageError> {
        test_sizes(&sizes)?;
        if strides.len() != sizes.len() {
            return Err(ImageError::ArraySizesDontMatch);
        }
        let mut all_strides = strides.clone();
        all_strides.push(tensor_stride);
        let mut all_sizes = sizes.clone();
        all_sizes.push(tensor.elements());
        let (len, start) = data_block_size_and_start(&all_strides, &all_sizes);
        let sz = data_type.size_of();
        let origin = (-start) as usize * sz;
        let base = ptr.wrapping_sub(origin);
        let segment = DataSegment::from_external(base, len * sz, release)?;
        Ok(Self {
            data_type,
            sizes,
            strides,
            tensor,
            tensor_stride,
            segment: Some(segment),
            origin,
            ..Default::default()
        })
    }

    // ---- getters ----

    /// The size of each spatial dimension.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// The size of dimension `d`.
    pub fn size(&self, d: usize) -> Result<usize, ImageError> {
        self.sizes
            .get(d)
            .copied()
            .ok_or(ImageError::IllegalDimension(d, self.sizes.len()))
    }

    /// The number of spatial dimensions.
    #[inline]
    pub fn dimensionality(&self) -> usize {
        self.sizes.len()
    }

    /// The stride of each spatial dimension, in samples.
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// The stride of dimension `d`.
    pub fn stride(&self, d: usize) -> Result<isize, ImageError> {
        self.strides
            .get(d)
            .copied()
            .ok_or(ImageError::IllegalDimension(d, self.strides.len()))
    }

    /// The tensor descriptor.
    #[inline]
    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    /// The number of tensor elements per pixel.
    #[inline]
    pub fn tensor_elements(&self) -> usize {
        self.tensor.elements()
    }

    /// The stride between consecutive tensor elements of a pixel.
    #[inline]
    pub fn tensor_stride(&self) -> isize {
        self.tensor_stride
    }

    /// The sample type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The number of pixels, 1 for a 0-D image.
    #[inline]
    pub fn number_of_pixels(&self) -> usize {
        self.sizes.iter().product()
    }

    /// The number of samples, pixels times tensor elements.
    #[inline]
    pub fn number_of_samples(&self) -> usize {
        self.number_of_pixels() * self.tensor.elements()
    }

    /// True if the image is backed by a data segment.
    #[inline]
    pub fn is_forged(&self) -> bool {
        self.segment.is_some()
    }

    /// True if each pixel has a single sample.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.tensor.is_scalar()
    }

    /// The physical pixel size.
    #[inline]
    pub fn pixel_size(&self) -> &PixelSize {
        &self.pixel_size
    }

    /// The color space tag, empty if none.
    #[inline]
    pub fn color_space(&self) -> &str {
        &self.color_space
    }

    /// True if the image is protected against reallocation.
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.protect
    }

    /// The data segment, if forged.
    #[inline]
    pub fn data_segment(&self) -> Option<&DataSegment> {
        self.segment.as_ref()
    }

    /// True if another image shares the data segment.
    pub fn is_shared(&self) -> bool {
        self.segment.as_ref().is_some_and(|s| s.is_shared())
    }

    /// True if an external interface is set.
    pub fn has_external_interface(&self) -> bool {
        self.external_interface.is_some()
    }

    /// Pointer to the sample at coordinates `(0, 0, ...)`.
    pub fn origin_ptr(&self) -> Result<*mut u8, ImageError> {
        let segment = self.segment.as_ref().ok_or(ImageError::NotForged)?;
        Ok(segment.as_ptr().wrapping_add(self.origin))
    }

    /// Pointer to the sample `offset` samples away from the origin.
    ///
    /// The pointer is not checked to lie within the data segment.
    pub fn pointer(&self, offset: isize) -> Result<*mut u8, ImageError> {
        let origin = self.origin_ptr()?;
        Ok(origin.wrapping_offset(offset * self.data_type.size_of() as isize))
    }

    /// True if the samples of the image fill a block of memory without gaps.
    pub fn has_contiguous_data(&self) -> Result<bool, ImageError> {
        if !self.is_forged() {
            return Err(ImageError::NotForged);
        }
        let (size, _) = self.block_size_and_start_with_tensor();
        Ok(size == self.number_of_samples())
    }

    /// True if the strides are the ones [`Image::forge`] assigns by default.
    pub fn has_normal_strides(&self) -> Result<bool, ImageError> {
        if !self.is_forged() {
            return Err(ImageError::NotForged);
        }
        if self.tensor.elements() > 1 && self.tensor_stride != 1 {
            return Ok(false);
        }
        Ok(self.strides == normal_strides(&self.sizes, self.tensor.elements()))
    }

    /// True if any non-singleton dimension (or the tensor) has a zero stride.
    pub fn is_singleton_expanded(&self) -> bool {
        if self.tensor.elements() > 1 && self.tensor_stride == 0 {
            return true;
        }
        self.sizes
            .iter()
            .zip(&self.strides)
            .any(|(&sz, &s)| sz > 1 && s == 0)
    }

    /// The single stride that walks all pixels and the offset (in samples, relative to the
    /// origin) of the pixel with the lowest address, if such a stride exists.
    ///
    /// The tensor dimension is not part of the walk.
    pub fn simple_stride(&self) -> Option<(isize, isize)> {
        if self.strides.len() != self.sizes.len() {
            return None;
        }
        simple_stride_and_start(&self.strides, &self.sizes)
    }

    /// True if the non-singleton dimensions of both images are ordered the same way in memory
    /// and run in the same direction.
    pub fn has_same_dimension_order(&self, other: &Image) -> bool {
        same_dimension_order(&self.sizes, &self.strides, &other.sizes, &other.strides)
    }

    pub(crate) fn block_size_and_start_with_tensor(&self) -> (usize, isize) {
        if self.tensor.elements() > 1 {
            let mut strides = self.strides.clone();
            strides.push(self.tensor_stride);
            let mut sizes = self.sizes.clone();
            sizes.push(self.tensor.elements());
            data_block_size_and_start(&strides, &sizes)
        } else {
            data_block_size_and_start(&self.strides, &self.sizes)
        }
    }

    /// True if the strides address every sample exactly once.
    pub fn has_valid_strides(&self) -> bool {
        if self.strides.len() != self.sizes.len() {
            return false;
        }
        let mut dims: Vec<(isize, usize)> = self
            .strides
            .iter()
            .map(|s| s.abs())
            .zip(self.sizes.iter().copied())
            .collect();
        if self.tensor.elements() > 1 {
            dims.push((self.tensor_stride.abs(), self.tensor.elements()));
        }
        if dims.is_empty() {
            return true;
        }
        dims.sort_by_key(|&(s, _)| s);
        if dims[0].0 == 0 {
            return false;
        }
        dims.windows(2)
            .all(|w| w[1].0 > w[0].0 * (w[0].1 as isize - 1))
    }

    // ---- raw-image setters ----

    fn test_raw(&self) -> Result<(), ImageError> {
        if self.is_forged() {
            return Err(ImageError::AlreadyForged);
        }
        Ok(())
    }

    /// Sets the sizes of a raw image. The strides are cleared.
    pub fn set_sizes(&mut self, sizes: Vec<usize>) -> Result<(), ImageError> {
        self.test_raw()?;
        test_sizes(&sizes)?;
        self.sizes = sizes;
        self.strides.clear();
        Ok(())
    }

    /// Sets the data type of a raw image.
    pub fn set_data_type(&mut self, data_type: DataType) -> Result<(), ImageError> {
        self.test_raw()?;
        self.data_type = data_type;
        Ok(())
    }

    /// Sets the tensor of a raw image.
    pub fn set_tensor(&mut self, tensor: Tensor) -> Result<(), ImageError> {
        self.test_raw()?;
        self.tensor = tensor;
        Ok(())
    }

    /// Sets the tensor of a raw image to a column vector with `n` elements.
    pub fn set_tensor_sizes(&mut self, n: usize) -> Result<(), ImageError> {
        self.set_tensor(Tensor::vector(n)?)
    }

    /// Sets the strides of a raw image, used by [`Image::forge`] if they are valid.
    pub fn set_strides(&mut self, strides: Vec<isize>) -> Result<(), ImageError> {
        self.test_raw()?;
        self.strides = strides;
        Ok(())
    }

    /// Sets the tensor stride of a raw image.
    pub fn set_tensor_stride(&mut self, tensor_stride: isize) -> Result<(), ImageError> {
        self.test_raw()?;
        self.tensor_stride = tensor_stride;
        Ok(())
    }

    /// Sets the interface used to allocate the data segment when forging.
    pub fn set_external_interface(
        &mut self,
        interface: Option<Arc<dyn ExternalInterface>>,
    ) -> Result<(), ImageError> {
        self.test_raw()?;
        self.external_interface = interface;
        Ok(())
    }

    /// Sets the pixel size.
    pub fn set_pixel_size(&mut self, pixel_size: PixelSize) {
        self.pixel_size = pixel_size;
    }

    /// Sets the color space tag.
    pub fn set_color_space(&mut self, color_space: impl Into<String>) {
        self.color_space = color_space.into();
    }

    /// Sets the protect flag, returning the previous value.
    pub fn protect(&mut self, set: bool) -> bool {
        std::mem::replace(&mut self.protect, set)
    }

    /// Copies the pixel size and color space from `src`.
    pub fn copy_non_data_properties(&mut self, src: &Image) {
        self.pixel_size = src.pixel_size.clone();
        self.color_space = src.color_space.clone();
        if self.tensor.elements() == src.tensor.elements() {
            self.tensor = src.tensor.clone();
        }
    }

    // ---- lifecycle ----

    /// Allocates the data segment.
    ///
    /// If an external interface is set it is asked for the memory first. Otherwise the current
    /// strides are kept if they address a compact block, or normal strides are assigned.
    pub fn forge(&mut self) -> Result<(), ImageError> {
        if self.is_forged() {
            return Err(ImageError::AlreadyForged);
        }
        test_sizes(&self.sizes)?;
        let size = self
            .sizes
            .iter()
            .try_fold(self.tensor.elements(), |acc, &s| acc.checked_mul(s))
            .filter(|&n| n <= isize::MAX as usize)
            .ok_or_else(|| {
                ImageError::ParameterOutOfRange("image size exceeds the addressable range".into())
            })?;
        if let Some(interface) = self.external_interface.clone() {
            let allocation = interface.allocate(
                self.data_type,
                &self.sizes,
                &mut self.strides,
                &self.tensor,
                &mut self.tensor_stride,
            )?;
            if let Some(allocation) = allocation {
                if self.strides.len() != self.sizes.len() {
                    return Err(ImageError::InvalidParameter(
                        "external interface returned bad strides".to_string(),
                    ));
                }
                self.segment = Some(allocation.segment);
                self.origin = allocation.origin;
                return Ok(());
            }
        }
        let mut start = 0;
        if self.has_valid_strides() {
            let (sz, st) = self.block_size_and_start_with_tensor();
            if sz == size {
                start = st;
            } else {
                self.set_normal_strides();
            }
        } else {
            self.set_normal_strides();
        }
        let sample_size = self.data_type.size_of();
        self.segment = Some(DataSegment::allocate(size * sample_size)?);
        self.origin = (-start) as usize * sample_size;
        Ok(())
    }

    fn set_normal_strides(&mut self) {
        self.tensor_stride = 1;
        self.strides = normal_strides(&self.sizes, self.tensor.elements());
    }

    /// Releases the data segment. The memory is freed when no other image shares it.
    ///
    /// # Errors
    ///
    /// Fails with `ProtectedImage` if the image is forged and protected.
    pub fn strip(&mut self) -> Result<(), ImageError> {
        if self.is_forged() {
            if self.protect {
                return Err(ImageError::ProtectedImage);
            }
            self.segment = None;
            self.origin = 0;
        }
        Ok(())
    }

    /// Makes sure the image is forged with the given sizes, tensor elements and data type.
    ///
    /// A forged image that already matches is left alone. The data segment is reused when it
    /// is not shared and has the right number of bytes. Otherwise the image is stripped and
    /// forged anew, losing its tensor shape, pixel size and color space.
    ///
    /// # Errors
    ///
    /// Fails with `ProtectedImage` if the image is protected and would need reallocating. With
    /// [`AcceptDataTypeChange::DoAllow`] a protected image keeps its data type.
    pub fn reforge(
        &mut self,
        sizes: &[usize],
        tensor_elements: usize,
        data_type: DataType,
        accept: AcceptDataTypeChange,
    ) -> Result<(), ImageError> {
        test_sizes(sizes)?;
        let tensor = Tensor::vector(tensor_elements)?;
        let data_type = if accept == AcceptDataTypeChange::DoAllow && self.protect {
            self.data_type
        } else {
            data_type
        };
        if let Some(segment) = &self.segment {
            if !self.is_singleton_expanded() {
                if self.sizes == sizes
                    && self.tensor.elements() == tensor_elements
                    && self.data_type == data_type
                {
                    return Ok(());
                }
                let bytes_now = self.number_of_samples() * self.data_type.size_of();
                let bytes_new =
                    sizes.iter().product::<usize>() * tensor_elements * data_type.size_of();
                if !segment.is_external()
                    && !self.protect
                    && !segment.is_shared()
                    && self.has_contiguous_data()?
                    && bytes_now == bytes_new
                    && bytes_now == segment.len()
                {
                    self.data_type = data_type;
                    self.sizes = sizes.to_vec();
                    self.tensor = tensor;
                    self.set_normal_strides();
                    self.origin = 0;
                    return Ok(());
                }
            }
        }
        self.strip()?;
        self.data_type = data_type;
        self.sizes = sizes.to_vec();
        self.tensor = tensor;
        self.strides.clear();
        self.tensor_stride = 1;
        self.pixel_size.clear();
        self.color_space.clear();
        self.forge()
    }

    /// Reforges to match the sizes, tensor and data type of `src`, and copies its pixel size
    /// and color space.
    pub fn reforge_like(&mut self, src: &Image) -> Result<(), ImageError> {
        self.reforge_as(src, src.data_type, AcceptDataTypeChange::DontAllow)
    }

    /// Like [`Image::reforge_like`] with a different data type.
    pub fn reforge_as(
        &mut self,
        src: &Image,
        data_type: DataType,
        accept: AcceptDataTypeChange,
    ) -> Result<(), ImageError> {
        let pixel_size = src.pixel_size.clone();
        let color_space = src.color_space.clone();
        let tensor = src.tensor.clone();
        self.reforge(&src.sizes, tensor.elements(), data_type, accept)?;
        self.tensor = tensor;
        self.pixel_size = pixel_size;
        self.color_space = color_space;
        Ok(())
    }
}

fn non_singleton_strides(sizes: &[usize], strides: &[isize]) -> Vec<isize> {
    sizes
        .iter()
        .zip(strides)
        .filter(|(&sz, _)| sz > 1)
        .map(|(_, &s)| s)
        .collect()
}

pub(crate) fn same_dimension_order(
    sizes1: &[usize],
    strides1: &[isize],
    sizes2: &[usize],
    strides2: &[isize],
) -> bool {
    let s1: Vec<isize> = non_singleton_strides(sizes1, strides1);
    let s2: Vec<isize> = non_singleton_strides(sizes2, strides2);
    if s1.len() != s2.len() {
        return false;
    }
    if s1
        .iter()
        .zip(&s2)
        .any(|(&a, &b)| (a != 0 || b != 0) && a * b <= 0)
    {
        return false;
    }
    let mut order: Vec<usize> = (0..s1.len()).collect();
    order.sort_by_key(|&i| s1[i].abs());
    order
        .windows(2)
        .all(|w| s2[w[1]].abs() >= s2[w[0]].abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ExternalAllocation;

    #[test]
    fn test_default_is_raw() {
        let img = Image::default();
        assert!(!img.is_forged());
        assert_eq!(img.dimensionality(), 0);
        assert_eq!(img.data_type(), DataType::SFloat);
        assert!(img.is_scalar());
        assert_eq!(img.origin_ptr(), Err(ImageError::NotForged));
    }

    #[test]
    fn test_forge_normal_strides() -> Result<(), ImageError> {
        let img = Image::new(vec![3, 4, 2], 3, DataType::UInt16)?;
        assert_eq!(img.strides(), &[3, 9, 36]);
        assert_eq!(img.tensor_stride(), 1);
        assert!(img.has_normal_strides()?);
        assert!(img.has_contiguous_data()?);
        assert_eq!(img.data_segment().map(|s| s.len()), Some(3 * 4 * 2 * 3 * 2));
        Ok(())
    }

    #[test]
    fn test_forge_custom_strides() -> Result<(), ImageError> {
        let mut img = Image::raw(vec![3, 4], 1, DataType::UInt8)?;
        img.set_strides(vec![-4, 1])?;
        img.forge()?;
        assert_eq!(img.strides(), &[-4, 1]);
        // the origin sits at the end of the block, the last row starts at the block start
        assert_eq!(img.origin, 8);
        assert_eq!(img.simple_stride(), Some((1, -8)));

        let mut gaps = Image::raw(vec![3], 1, DataType::UInt8)?;
        gaps.set_strides(vec![2])?;
        gaps.forge()?;
        assert_eq!(gaps.strides(), &[1]);
        Ok(())
    }

    #[test]
    fn test_setters_need_raw_image() -> Result<(), ImageError> {
        let mut img = Image::new(vec![2, 2], 1, DataType::UInt8)?;
        assert_eq!(img.set_sizes(vec![3]), Err(ImageError::AlreadyForged));
        assert_eq!(img.set_data_type(DataType::Bin), Err(ImageError::AlreadyForged));
        assert_eq!(img.forge(), Err(ImageError::AlreadyForged));
        img.set_color_space("RGB");
        assert_eq!(img.color_space(), "RGB");
        Ok(())
    }

    #[test]
    fn test_strip_and_protect() -> Result<(), ImageError> {
        let mut img = Image::new(vec![4], 1, DataType::SFloat)?;
        let view = img.clone();
        assert!(img.is_shared());
        assert!(!img.protect(true));
        assert_eq!(img.strip(), Err(ImageError::ProtectedImage));
        assert_eq!(
            img.reforge(&[5], 1, DataType::SFloat, AcceptDataTypeChange::DontAllow),
            Err(ImageError::ProtectedImage)
        );
        img.reforge(&[4], 1, DataType::UInt8, AcceptDataTypeChange::DoAllow)?;
        assert_eq!(img.data_type(), DataType::SFloat);
        assert!(img.protect(false));
        img.strip()?;
        assert!(!img.is_forged());
        assert!(view.is_forged());
        assert!(!view.is_shared());
        Ok(())
    }

    #[test]
    fn test_reforge_reuses_segment() -> Result<(), ImageError> {
        let mut img = Image::new(vec![4, 2], 1, DataType::UInt16)?;
        let id = img.data_segment().map(|s| s.id());
        img.reforge(&[2, 2], 1, DataType::UInt32, AcceptDataTypeChange::DontAllow)?;
        assert_eq!(img.data_segment().map(|s| s.id()), id);
        assert_eq!(img.strides(), &[1, 2]);
        img.reforge(&[3, 3], 1, DataType::UInt32, AcceptDataTypeChange::DontAllow)?;
        assert_ne!(img.data_segment().map(|s| s.id()), id);
        Ok(())
    }

    #[test]
    fn test_from_vec() -> Result<(), ImageError> {
        let img = Image::from_vec(vec![2, 3], 1, vec![0u8, 1, 2, 3, 4, 5])?;
        assert_eq!(img.data_type(), DataType::UInt8);
        assert_eq!(img.strides(), &[1, 2]);
        assert_eq!(
            Image::from_vec(vec![2, 3], 1, vec![0u8; 5]).err(),
            Some(ImageError::ArrayParameterWrongLength(5, 6))
        );
        Ok(())
    }

    #[test]
    fn test_valid_strides() -> Result<(), ImageError> {
        let mut img = Image::raw(vec![3, 4], 2, DataType::UInt8)?;
        assert!(!img.has_valid_strides());
        img.set_strides(vec![1, 3])?;
        img.set_tensor_stride(12)?;
        assert!(img.has_valid_strides());
        img.set_tensor_stride(2)?;
        assert!(!img.has_valid_strides());
        Ok(())
    }

    #[test]
    fn test_same_dimension_order() -> Result<(), ImageError> {
        let a = Image::new(vec![3, 4], 1, DataType::UInt8)?;
        let mut b = Image::raw(vec![3, 4], 1, DataType::UInt8)?;
        b.set_strides(vec![4, 1])?;
        b.forge()?;
        assert!(a.has_same_dimension_order(&a));
        assert!(!a.has_same_dimension_order(&b));
        Ok(())
    }

    struct PlanarInterface;

    impl ExternalInterface for PlanarInterface {
        fn allocate(
            &self,
            data_type: DataType,
            sizes: &[usize],
            strides: &mut Vec<isize>,
            tensor: &Tensor,
            tensor_stride: &mut isize,
        ) -> Result<Option<ExternalAllocation>, ImageError> {
            let n: usize = sizes.iter().product();
            *strides = normal_strides(sizes, 1);
            *tensor_stride = n as isize;
            let segment = DataSegment::allocate(n * tensor.elements() * data_type.size_of())?;
            Ok(Some(ExternalAllocation { segment, origin: 0 }))
        }
    }

    #[test]
    fn test_external_interface() -> Result<(), ImageError> {
        let mut img = Image::raw(vec![3, 2], 3, DataType::SFloat)?;
        img.set_external_interface(Some(Arc::new(PlanarInterface)))?;
        img.forge()?;
        assert!(img.has_external_interface());
        assert_eq!(img.strides(), &[1, 3]);
        assert_eq!(img.tensor_stride(), 6);
        Ok(())
    }
}
