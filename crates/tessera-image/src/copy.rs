//! Sample copying and conversion between strided buffers, and the image operations built on it.

use std::marker::PhantomData;

use log::debug;

use crate::{
    data_type::DataType,
    dispatch::{dispatch_all, AllVisitor},
    error::ImageError,
    image::{
        normal_strides, same_dimension_order, simple_stride_and_start, AcceptDataTypeChange,
        Image,
    },
    iterators::{optimal_processing_dim_for, LineWalker},
    pixel::Pixel,
    sample::{clamp_cast, Sample, SampleValue},
    tensor::Tensor,
};

/// A strided run of pixels in memory, as seen by [`copy_buffer`] and [`fill_buffer`].
#[derive(Clone, Copy, Debug)]
pub struct SampleBuffer {
    /// Pointer to the first tensor element of the first pixel.
    pub ptr: *mut u8,
    /// The type of the samples.
    pub data_type: DataType,
    /// Distance between consecutive pixels, in samples.
    pub stride: isize,
    /// Distance between consecutive tensor elements, in samples.
    pub tensor_stride: isize,
}

#[inline]
fn convert<S: Sample, D: Sample>(v: S) -> D {
    if S::DATA_TYPE == D::DATA_TYPE {
        // SAFETY: S and D are the same type.
        unsafe { std::ptr::read(&v as *const S as *const D) }
    } else {
        clamp_cast(v)
    }
}

#[derive(Clone, Copy)]
struct CopyJob<'a> {
    src: SampleBuffer,
    dst: SampleBuffer,
    pixels: usize,
    tensor_elements: usize,
    look_up_table: Option<&'a [isize]>,
}

struct ReadAs<'a>(CopyJob<'a>);

struct WriteAs<'a, S>(CopyJob<'a>, PhantomData<S>);

impl AllVisitor for ReadAs<'_> {
    type Output = ();
    fn visit<S: Sample>(self) {
        dispatch_all(self.0.dst.data_type, WriteAs::<S>(self.0, PhantomData))
    }
}

impl<S: Sample> AllVisitor for WriteAs<'_, S> {
    type Output = ();
    fn visit<D: Sample>(self) {
        // SAFETY: the caller of `copy_buffer` guarantees that both buffers are valid.
        unsafe { copy_line::<S, D>(&self.0) }
    }
}

unsafe fn copy_line<S: Sample, D: Sample>(job: &CopyJob) {
    let src = job.src.ptr as *const S;
    let dst = job.dst.ptr as *mut D;
    for p in 0..job.pixels as isize {
        let sp = src.offset(p * job.src.stride);
        let dp = dst.offset(p * job.dst.stride);
        match job.look_up_table {
            None => {
                for t in 0..job.tensor_elements as isize {
                    let v = *sp.offset(t * job.src.tensor_stride);
                    *dp.offset(t * job.dst.tensor_stride) = convert::<S, D>(v);
                }
            }
            Some(lut) => {
                for (t, &index) in lut.iter().enumerate() {
                    let v = if index < 0 {
                        D::default()
                    } else {
                        convert::<S, D>(*sp.offset(index * job.src.tensor_stride))
                    };
                    *dp.offset(t as isize * job.dst.tensor_stride) = v;
                }
            }
        }
    }
}

/// Copies `pixels` pixels of `tensor_elements` samples each from `src` to `dst`, casting every
/// sample with [`clamp_cast`] semantics.
///
/// With a look-up table, destination tensor element `t` is read from source tensor element
/// `look_up_table[t]`, or set to zero where the table holds a negative value. The table then
/// determines the number of destination tensor elements.
///
/// # Safety
///
/// Every sample addressed in `src` must be valid for reads and every sample addressed in `dst`
/// valid for writes, both aligned for their data type. The two buffers must not overlap, unless
/// they are the same buffer and the data types have the same size.
pub unsafe fn copy_buffer(
    src: SampleBuffer,
    dst: SampleBuffer,
    pixels: usize,
    tensor_elements: usize,
    look_up_table: Option<&[isize]>,
) {
    dispatch_all(
        src.data_type,
        ReadAs(CopyJob {
            src,
            dst,
            pixels,
            tensor_elements,
            look_up_table,
        }),
    )
}

struct Fill(SampleBuffer, usize, usize, SampleValue);

impl AllVisitor for Fill {
    type Output = ();
    fn visit<T: Sample>(self) {
        let Fill(buf, pixels, tensor_elements, value) = self;
        let value: T = value.get();
        let ptr = buf.ptr as *mut T;
        for p in 0..pixels as isize {
            for t in 0..tensor_elements as isize {
                // SAFETY: the caller of `fill_buffer` guarantees the buffer is valid.
                unsafe { *ptr.offset(p * buf.stride + t * buf.tensor_stride) = value };
            }
        }
    }
}

/// Writes `value`, cast to the buffer type, into every sample of `dst`.
///
/// # Safety
///
/// Every sample addressed in `dst` must be valid for writes and aligned for its data type.
pub unsafe fn fill_buffer(
    dst: SampleBuffer,
    pixels: usize,
    tensor_elements: usize,
    value: SampleValue,
) {
    dispatch_all(dst.data_type, Fill(dst, pixels, tensor_elements, value))
}

/// The memory layout of an image, without its sizes.
#[derive(Clone, Copy)]
pub(crate) struct Strided<'a> {
    pub ptr: *mut u8,
    pub data_type: DataType,
    pub strides: &'a [isize],
    pub tensor_stride: isize,
}

impl<'a> Strided<'a> {
    pub(crate) fn of(image: &'a Image) -> Result<Self, ImageError> {
        Ok(Self {
            ptr: image.origin_ptr()?,
            data_type: image.data_type(),
            strides: image.strides(),
            tensor_stride: image.tensor_stride(),
        })
    }

    fn at(&self, offset: isize, stride: isize) -> SampleBuffer {
        SampleBuffer {
            ptr: self
                .ptr
                .wrapping_offset(offset * self.data_type.size_of() as isize),
            data_type: self.data_type,
            stride,
            tensor_stride: self.tensor_stride,
        }
    }
}

/// Copies all pixels of an n-D region between two layouts with the same sizes.
///
/// # Safety
///
/// Both layouts must address valid memory for `sizes`, see [`copy_buffer`].
pub(crate) unsafe fn copy_strided(
    sizes: &[usize],
    src: Strided,
    dst: Strided,
    tensor_elements: usize,
    look_up_table: Option<&[isize]>,
) {
    if let (Some((ss, s0)), Some((ds, d0))) = (
        simple_stride_and_start(src.strides, sizes),
        simple_stride_and_start(dst.strides, sizes),
    ) {
        if same_dimension_order(sizes, src.strides, sizes, dst.strides) {
            let n = sizes.iter().product();
            copy_buffer(src.at(s0, ss), dst.at(d0, ds), n, tensor_elements, look_up_table);
            return;
        }
    }
    let dim = optimal_processing_dim_for(sizes, src.strides);
    let mut walker = LineWalker::new(
        sizes,
        vec![src.strides.to_vec(), dst.strides.to_vec()],
        dim,
    );
    let n = walker.line_length();
    let ss = src.strides.get(dim).copied().unwrap_or(0);
    let ds = dst.strides.get(dim).copied().unwrap_or(0);
    loop {
        let offsets = walker.offsets();
        copy_buffer(
            src.at(offsets[0], ss),
            dst.at(offsets[1], ds),
            n,
            tensor_elements,
            look_up_table,
        );
        if !walker.next_line() {
            break;
        }
    }
}

impl Image {
    /// Copies the samples of `src` into this image.
    ///
    /// An identical view is left alone. If the image is forged with the same sizes and number
    /// of tensor elements, and does not share memory with `src`, its data segment is reused and
    /// the samples are cast to its data type. Otherwise it is stripped and forged like `src`.
    pub fn copy_from(&mut self, src: &Image) -> Result<(), ImageError> {
        if !src.is_forged() {
            return Err(ImageError::NotForged);
        }
        if self.is_forged() {
            if self.is_identical_view(src) {
                self.copy_non_data_properties(src);
                return Ok(());
            }
            if self.sizes != src.sizes
                || self.tensor.elements() != src.tensor.elements()
                || self.is_overlapping_view(src)
            {
                self.strip()?;
            } else {
                self.copy_non_data_properties(src);
            }
        }
        if !self.is_forged() {
            self.data_type = src.data_type;
            self.sizes = src.sizes.clone();
            self.strides = src.strides.clone();
            self.tensor = src.tensor.clone();
            self.tensor_stride = src.tensor_stride;
            self.copy_non_data_properties(src);
            self.forge()?;
        }
        // SAFETY: both images are forged with the same sizes and tensor elements.
        unsafe {
            copy_strided(
                &self.sizes,
                Strided::of(src)?,
                Strided::of(self)?,
                self.tensor.elements(),
                None,
            );
        }
        Ok(())
    }

    /// A deep copy of the image, with its own data segment.
    pub fn copy(&self) -> Result<Image, ImageError> {
        let mut out = Image::default();
        out.external_interface = self.external_interface.clone();
        out.copy_from(self)?;
        Ok(out)
    }

    /// Converts the samples to another data type.
    ///
    /// The conversion happens in place if the new type has the same sample size and the data
    /// segment is not shared, otherwise a new segment is allocated.
    pub fn convert(&mut self, data_type: DataType) -> Result<(), ImageError> {
        if !self.is_forged() {
            return Err(ImageError::NotForged);
        }
        if data_type == self.data_type {
            return Ok(());
        }
        if self.protect {
            return Err(ImageError::ProtectedImage);
        }
        if !self.is_shared() && data_type.size_of() == self.data_type.size_of() {
            debug!("converting {} to {} in place", self.data_type, data_type);
            let src = Strided::of(self)?;
            let dst = Strided { data_type, ..src };
            // SAFETY: source and destination are the same memory with equal sample sizes.
            unsafe { copy_strided(&self.sizes, src, dst, self.tensor.elements(), None) };
            self.data_type = data_type;
        } else {
            let mut out = Image::default();
            out.reforge_as(self, data_type, AcceptDataTypeChange::DontAllow)?;
            out.copy_from(self)?;
            *self = out;
        }
        Ok(())
    }

    /// Stores every tensor element explicitly, so that symmetric, triangular and diagonal
    /// tensors become full column-major matrices.
    pub fn expand_tensor(&mut self) -> Result<(), ImageError> {
        if !self.is_forged() {
            return Err(ImageError::NotForged);
        }
        if self.tensor.has_normal_order() {
            return Ok(());
        }
        let lut = self.tensor.look_up_table();
        let tensor = Tensor::matrix(self.tensor.rows(), self.tensor.columns())?;
        let source = self.clone();
        let pixel_size = self.pixel_size.clone();
        let color_space = self.color_space.clone();
        self.reforge(
            &source.sizes,
            tensor.elements(),
            source.data_type,
            AcceptDataTypeChange::DoAllow,
        )?;
        self.tensor = tensor;
        self.pixel_size = pixel_size;
        self.color_space = color_space;
        // SAFETY: the destination was just forged with the sizes of the source and one tensor
        // element per look-up table entry.
        unsafe {
            copy_strided(
                &self.sizes,
                Strided::of(&source)?,
                Strided::of(self)?,
                lut.len(),
                Some(&lut),
            );
        }
        Ok(())
    }

    /// Sets every sample to `value`, cast to the image type.
    pub fn fill(&mut self, value: SampleValue) -> Result<(), ImageError> {
        let layout = Strided::of(self)?;
        let n = self.tensor.elements();
        let dim = optimal_processing_dim_for(&self.sizes, &self.strides);
        let mut walker = LineWalker::new(&self.sizes, vec![self.strides.clone()], dim);
        let stride = self.strides.get(dim).copied().unwrap_or(0);
        loop {
            // SAFETY: the walker only visits pixels of the image.
            unsafe {
                fill_buffer(
                    layout.at(walker.offsets()[0], stride),
                    walker.line_length(),
                    n,
                    value,
                )
            };
            if !walker.next_line() {
                break;
            }
        }
        Ok(())
    }

    /// Sets every pixel to `pixel`, which must have as many tensor elements as the image.
    pub fn fill_pixel(&mut self, pixel: &Pixel) -> Result<(), ImageError> {
        if !self.is_forged() {
            return Err(ImageError::NotForged);
        }
        let n = self.tensor.elements();
        if pixel.tensor_elements() != n {
            return Err(ImageError::NTensorElementsDontMatch(
                pixel.tensor_elements(),
                n,
            ));
        }
        for (t, &value) in pixel.values().iter().enumerate() {
            self.tensor_element(t)?.fill(value)?;
        }
        Ok(())
    }

    /// The pixel at `coords`.
    pub fn at(&self, coords: &[usize]) -> Result<Pixel, ImageError> {
        let offset = self.offset(coords)?;
        let ptr = self.pointer(offset)?;
        let sz = self.data_type.size_of() as isize;
        let values = (0..self.tensor.elements() as isize)
            // SAFETY: the offset was checked against the sizes, so the pixel is in the image.
            .map(|t| unsafe {
                SampleValue::read_from(
                    ptr.wrapping_offset(t * self.tensor_stride * sz),
                    self.data_type,
                )
            })
            .collect();
        Pixel::with_tensor(self.tensor.clone(), self.data_type, values)
    }

    /// Writes `pixel` at `coords`, casting to the image type.
    pub fn set_pixel(&mut self, coords: &[usize], pixel: &Pixel) -> Result<(), ImageError> {
        let n = self.tensor.elements();
        if pixel.tensor_elements() != n {
            return Err(ImageError::NTensorElementsDontMatch(
                pixel.tensor_elements(),
                n,
            ));
        }
        let ptr = self.pointer(self.offset(coords)?)?;
        let sz = self.data_type.size_of() as isize;
        for (t, value) in pixel.values().iter().enumerate() {
            // SAFETY: the offset was checked against the sizes, so the pixel is in the image.
            unsafe {
                value.write_to(
                    ptr.wrapping_offset(t as isize * self.tensor_stride * sz),
                    self.data_type,
                )
            };
        }
        Ok(())
    }

    fn sample_ptr(&self, coords: &[usize], t: usize) -> Result<*mut u8, ImageError> {
        if t >= self.tensor.elements() {
            return Err(ImageError::IndexOutOfRange);
        }
        self.pointer(self.offset(coords)? + t as isize * self.tensor_stride)
    }

    /// Tensor element `t` of the pixel at `coords`, cast to `T`.
    pub fn sample<T: Sample>(&self, coords: &[usize], t: usize) -> Result<T, ImageError> {
        let ptr = self.sample_ptr(coords, t)?;
        // SAFETY: the sample lies inside the image.
        Ok(unsafe { SampleValue::read_from(ptr, self.data_type) }.get())
    }

    /// Sets tensor element `t` of the pixel at `coords`, casting to the image type.
    pub fn set_sample<T: Sample>(
        &mut self,
        coords: &[usize],
        t: usize,
        value: T,
    ) -> Result<(), ImageError> {
        let ptr = self.sample_ptr(coords, t)?;
        // SAFETY: the sample lies inside the image.
        unsafe { value.into_value().write_to(ptr, self.data_type) };
        Ok(())
    }

    /// All samples cast to `T`, in linear index order with the tensor elements innermost.
    pub fn samples<T: Sample>(&self) -> Result<Vec<T>, ImageError> {
        let src = Strided::of(self)?;
        let n = self.tensor.elements();
        let mut out = vec![T::default(); self.number_of_samples()];
        let strides = normal_strides(&self.sizes, n);
        let dst = Strided {
            ptr: out.as_mut_ptr() as *mut u8,
            data_type: T::DATA_TYPE,
            strides: &strides,
            tensor_stride: 1,
        };
        // SAFETY: `out` holds exactly one sample per image sample in normal stride order.
        unsafe { copy_strided(&self.sizes, src, dst, n, None) };
        Ok(out)
    }
}
