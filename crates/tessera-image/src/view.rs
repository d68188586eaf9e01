use crate::{
    copy::{copy_buffer, fill_buffer, SampleBuffer},
    error::ImageError,
    image::Image,
    iterators::LineWalker,
    sample::SampleValue,
};

/// The pixels a [`View`] selects.
#[derive(Clone, Debug)]
pub enum Selection {
    /// The pixels where a binary mask image is set.
    Mask(Image),
    /// The pixels at the given offsets from the origin, in samples.
    Offsets(Vec<isize>),
}

/// An irregular selection of the pixels of an image.
///
/// A view shares the data segment of the image it was made from, so writing through the view
/// modifies that image. The selected pixels are visited in linear index order for a mask, and
/// in the given order for an offset list.
#[derive(Clone, Debug)]
pub struct View {
    reference: Image,
    selection: Selection,
}

impl View {
    /// The image the view refers to.
    pub fn reference(&self) -> &Image {
        &self.reference
    }

    /// The selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Offsets of the selected pixels.
    pub fn offsets(&self) -> Result<Vec<isize>, ImageError> {
        match &self.selection {
            Selection::Offsets(offsets) => Ok(offsets.clone()),
            Selection::Mask(mask) => {
                let mut offsets = Vec::new();
                let base = mask.origin_ptr()? as *const u8;
                let img = &self.reference;
                if img.dimensionality() == 0 {
                    // SAFETY: a 0-D mask holds a single sample at its origin.
                    if unsafe { *base } != 0 {
                        offsets.push(0);
                    }
                    return Ok(offsets);
                }
                let mut walker = LineWalker::new(
                    img.sizes(),
                    vec![img.strides().to_vec(), mask.strides().to_vec()],
                    0,
                );
                let (is, ms) = (img.strides()[0], mask.strides()[0]);
                loop {
                    let o = walker.offsets();
                    for ii in 0..walker.line_length() as isize {
                        // SAFETY: the walker visits pixels of the mask only.
                        if unsafe { *base.offset(o[1] + ii * ms) } != 0 {
                            offsets.push(o[0] + ii * is);
                        }
                    }
                    if !walker.next_line() {
                        break;
                    }
                }
                Ok(offsets)
            }
        }
    }

    /// The number of selected pixels.
    pub fn number_of_pixels(&self) -> Result<usize, ImageError> {
        match &self.selection {
            Selection::Offsets(offsets) => Ok(offsets.len()),
            Selection::Mask(_) => Ok(self.offsets()?.len()),
        }
    }

    fn buffer(&self, offset: isize) -> Result<SampleBuffer, ImageError> {
        Ok(SampleBuffer {
            ptr: self.reference.pointer(offset)?,
            data_type: self.reference.data_type(),
            stride: 0,
            tensor_stride: self.reference.tensor_stride(),
        })
    }

    /// Copies the selected pixels into a new 1-D image of the same data type and tensor shape.
    pub fn copy_to_image(&self) -> Result<Image, ImageError> {
        let offsets = self.offsets()?;
        let img = &self.reference;
        let mut out = Image::new(
            vec![offsets.len().max(1)],
            img.tensor_elements(),
            img.data_type(),
        )?;
        out.tensor = img.tensor().clone();
        out.copy_non_data_properties(img);
        out.pixel_size.clear();
        if offsets.is_empty() {
            // a single zero pixel stands in for an empty selection
            return Ok(out);
        }
        let stride = out.strides()[0];
        for (ii, &offset) in offsets.iter().enumerate() {
            let dst = SampleBuffer {
                ptr: out.pointer(ii as isize * stride)?,
                data_type: out.data_type(),
                stride: 0,
                tensor_stride: out.tensor_stride(),
            };
            // SAFETY: the offset addresses a pixel of the reference image, the destination
            // pixel lies in the freshly forged output.
            unsafe { copy_buffer(self.buffer(offset)?, dst, 1, img.tensor_elements(), None) };
        }
        Ok(out)
    }

    /// Writes the pixels of a 1-D image into the selected pixels, in selection order.
    pub fn copy_from(&self, src: &Image) -> Result<(), ImageError> {
        let offsets = self.offsets()?;
        if src.dimensionality() != 1 {
            return Err(ImageError::DimensionalityNotSupported(src.dimensionality()));
        }
        if src.number_of_pixels() != offsets.len() {
            return Err(ImageError::SizesDontMatch(
                src.sizes().to_vec(),
                vec![offsets.len()],
            ));
        }
        let n = self.reference.tensor_elements();
        if src.tensor_elements() != n {
            return Err(ImageError::NTensorElementsDontMatch(
                src.tensor_elements(),
                n,
            ));
        }
        let stride = src.strides()[0];
        for (ii, &offset) in offsets.iter().enumerate() {
            let from = SampleBuffer {
                ptr: src.pointer(ii as isize * stride)?,
                data_type: src.data_type(),
                stride: 0,
                tensor_stride: src.tensor_stride(),
            };
            // SAFETY: both pixels lie inside their images.
            unsafe { copy_buffer(from, self.buffer(offset)?, 1, n, None) };
        }
        Ok(())
    }

    /// Sets every sample of the selected pixels to `value`.
    pub fn fill(&self, value: SampleValue) -> Result<(), ImageError> {
        let n = self.reference.tensor_elements();
        for offset in self.offsets()? {
            // SAFETY: the offset addresses a pixel of the reference image.
            unsafe { fill_buffer(self.buffer(offset)?, 1, n, value) };
        }
        Ok(())
    }
}

impl Image {
    /// A view of the pixels where `mask` is set. The mask is singleton-expanded to the image.
    pub fn at_mask(&self, mask: &Image) -> Result<View, ImageError> {
        if !self.is_forged() {
            return Err(ImageError::NotForged);
        }
        mask.check_is_mask(self.sizes(), true)?;
        let mut mask = mask.clone();
        mask.expand_singleton_dimensions(self.sizes())?;
        Ok(View {
            reference: self.clone(),
            selection: Selection::Mask(mask),
        })
    }

    /// A view of the pixels at `offsets`, each of which must address a pixel of the image.
    pub fn at_offsets(&self, offsets: Vec<isize>) -> Result<View, ImageError> {
        if !self.is_forged() {
            return Err(ImageError::NotForged);
        }
        for &offset in &offsets {
            self.offset_to_coordinates(offset)?;
        }
        Ok(View {
            reference: self.clone(),
            selection: Selection::Offsets(offsets),
        })
    }

    /// A view of the pixels at the given coordinates.
    pub fn at_coordinates(&self, coords: &[Vec<usize>]) -> Result<View, ImageError> {
        let offsets = coords
            .iter()
            .map(|c| self.offset(c))
            .collect::<Result<Vec<_>, _>>()?;
        self.at_offsets(offsets)
    }
}
