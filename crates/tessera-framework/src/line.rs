use std::marker::PhantomData;

use tessera_image::{DataType, ImageError, Sample};

/// One image line as seen by a line filter.
///
/// The line either points straight into an image or into a staging buffer owned by the
/// framework. Strides are in samples. `border` samples before the first and after the last
/// pixel are addressable as well (only the separable framework sets a border).
#[derive(Clone, Copy, Debug)]
pub struct LineBuffer {
    /// Pointer to tensor element 0 of pixel 0.
    pub ptr: *mut u8,
    /// Sample type of the buffer.
    pub data_type: DataType,
    /// Number of pixels on the line.
    pub length: usize,
    /// Number of addressable pixels beyond each end of the line.
    pub border: usize,
    /// Distance between consecutive pixels. Zero for a broadcast input.
    pub stride: isize,
    /// Distance between consecutive tensor elements.
    pub tensor_stride: isize,
    /// Number of tensor elements per pixel.
    pub tensor_length: usize,
}

// SAFETY: a line buffer is handed to exactly one worker for the duration of a line.
unsafe impl Send for LineBuffer {}
unsafe impl Sync for LineBuffer {}

impl LineBuffer {
    fn check<T: Sample>(&self) -> Result<(), ImageError> {
        if T::DATA_TYPE != self.data_type {
            return Err(ImageError::DataTypeNotSupported(self.data_type));
        }
        Ok(())
    }

    /// A typed read-only accessor.
    pub fn typed<T: Sample>(&self) -> Result<ConstLine<'_, T>, ImageError> {
        self.check::<T>()?;
        Ok(ConstLine {
            buffer: *self,
            _marker: PhantomData,
        })
    }

    /// A typed writable accessor.
    pub fn typed_mut<T: Sample>(&mut self) -> Result<MutLine<'_, T>, ImageError> {
        self.check::<T>()?;
        Ok(MutLine {
            buffer: *self,
            _marker: PhantomData,
        })
    }
}

#[inline]
fn sample_offset(buffer: &LineBuffer, index: isize, t: usize) -> isize {
    let lo = -(buffer.border as isize);
    let hi = (buffer.length + buffer.border) as isize;
    assert!(
        index >= lo && index < hi,
        "pixel {index} outside the line [{lo}, {hi})"
    );
    assert!(
        t < buffer.tensor_length,
        "tensor element {t} outside the pixel ({})",
        buffer.tensor_length
    );
    index * buffer.stride + t as isize * buffer.tensor_stride
}

/// Read access to the samples of a [`LineBuffer`].
pub struct ConstLine<'a, T> {
    buffer: LineBuffer,
    _marker: PhantomData<&'a T>,
}

impl<T: Sample> ConstLine<'_, T> {
    /// Number of pixels on the line.
    pub fn len(&self) -> usize {
        self.buffer.length
    }

    /// True for an empty line.
    pub fn is_empty(&self) -> bool {
        self.buffer.length == 0
    }

    /// Number of tensor elements per pixel.
    pub fn tensor_length(&self) -> usize {
        self.buffer.tensor_length
    }

    /// Number of addressable pixels beyond each end of the line.
    pub fn border(&self) -> usize {
        self.buffer.border
    }

    /// Tensor element 0 of pixel `i`.
    #[inline]
    pub fn get(&self, i: usize) -> T {
        self.get_t(i as isize, 0)
    }

    /// Tensor element `t` of pixel `i`, where `i` may reach into the border.
    #[inline]
    pub fn get_t(&self, i: isize, t: usize) -> T {
        let offset = sample_offset(&self.buffer, i, t);
        // SAFETY: the offset was bounds-checked against the line and its border.
        unsafe { *(self.buffer.ptr as *const T).offset(offset) }
    }

    /// Tensor element 0 of every pixel, in order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// All tensor elements of pixel `i`.
    pub fn pixel(&self, i: usize) -> impl Iterator<Item = T> + '_ {
        (0..self.tensor_length()).map(move |t| self.get_t(i as isize, t))
    }
}

/// Write access to the samples of a [`LineBuffer`].
pub struct MutLine<'a, T> {
    buffer: LineBuffer,
    _marker: PhantomData<&'a mut T>,
}

impl<T: Sample> MutLine<'_, T> {
    /// Number of pixels on the line.
    pub fn len(&self) -> usize {
        self.buffer.length
    }

    /// True for an empty line.
    pub fn is_empty(&self) -> bool {
        self.buffer.length == 0
    }

    /// Number of tensor elements per pixel.
    pub fn tensor_length(&self) -> usize {
        self.buffer.tensor_length
    }

    /// Number of addressable pixels beyond each end of the line.
    pub fn border(&self) -> usize {
        self.buffer.border
    }

    /// Tensor element 0 of pixel `i`.
    #[inline]
    pub fn get(&self, i: usize) -> T {
        self.get_t(i as isize, 0)
    }

    /// Tensor element `t` of pixel `i`.
    #[inline]
    pub fn get_t(&self, i: isize, t: usize) -> T {
        let offset = sample_offset(&self.buffer, i, t);
        // SAFETY: bounds-checked above.
        unsafe { *(self.buffer.ptr as *const T).offset(offset) }
    }

    /// Sets tensor element 0 of pixel `i`.
    #[inline]
    pub fn set(&mut self, i: usize, value: T) {
        self.set_t(i as isize, 0, value);
    }

    /// Sets tensor element `t` of pixel `i`.
    #[inline]
    pub fn set_t(&mut self, i: isize, t: usize, value: T) {
        let offset = sample_offset(&self.buffer, i, t);
        // SAFETY: bounds-checked above, and the framework hands each output line to one worker.
        unsafe { *(self.buffer.ptr as *mut T).offset(offset) = value };
    }

    /// Sets every sample of the line, border included, to `value`.
    pub fn fill(&mut self, value: T) {
        let border = self.buffer.border as isize;
        for i in -border..self.buffer.length as isize + border {
            for t in 0..self.tensor_length() {
                self.set_t(i, t, value);
            }
        }
    }
}
