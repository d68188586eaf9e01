//! The Scan framework: applies a line filter to every line of a set of images.
//!
//! Inputs are singleton-expanded to a common size, outputs are (re)forged to that size, and
//! the image domain is split into lines along a processing dimension. Each line of each
//! image is handed to the filter as a [`LineBuffer`], either pointing into the image or into
//! a per-thread staging buffer holding the samples converted to the requested buffer type.

use log::debug;

use tessera_image::{
    copy_buffer,
    iterators::{optimal_processing_dim_for, split_evenly, LineWalker},
    AcceptDataTypeChange, DataSegment, DataType, Image, ImageError, SampleBuffer, Tensor,
};

use crate::{
    line::LineBuffer,
    threads::{get_number_of_threads, run_workers, threads_for_operations, StopFlag},
};

/// The largest number of pixels staged per line when a 1-D walk is split into chunks.
pub const MAX_BUFFER_SIZE: usize = 256 * 1024;

/// Options for [`scan`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Run on the calling thread only.
    pub no_multi_threading: bool,
    /// Process the tensor elements as an additional spatial dimension, so the filter sees
    /// scalar lines.
    pub tensor_as_spatial_dim: bool,
    /// The filter reads `params.position`, so the image cannot be walked as a single line.
    pub need_coordinates: bool,
    /// Inputs must have identical sizes.
    pub no_singleton_expansion: bool,
    /// Stage tensors that are not stored densely (symmetric, triangular, diagonal) through a
    /// look-up table so the filter sees every matrix element.
    pub expand_tensor_in_buffer: bool,
    /// Outputs never share memory with inputs while the filter runs.
    pub not_in_place: bool,
    /// Process lines along this dimension instead of the optimal one.
    pub processing_dimension: Option<usize>,
}

impl ScanOptions {
    /// The default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `no_multi_threading`.
    pub fn with_no_multi_threading(mut self) -> Self {
        self.no_multi_threading = true;
        self
    }

    /// Sets `tensor_as_spatial_dim`.
    pub fn with_tensor_as_spatial_dim(mut self) -> Self {
        self.tensor_as_spatial_dim = true;
        self
    }

    /// Sets `need_coordinates`.
    pub fn with_need_coordinates(mut self) -> Self {
        self.need_coordinates = true;
        self
    }

    /// Sets `no_singleton_expansion`.
    pub fn with_no_singleton_expansion(mut self) -> Self {
        self.no_singleton_expansion = true;
        self
    }

    /// Sets `expand_tensor_in_buffer`.
    pub fn with_expand_tensor_in_buffer(mut self) -> Self {
        self.expand_tensor_in_buffer = true;
        self
    }

    /// Sets `not_in_place`.
    pub fn with_not_in_place(mut self) -> Self {
        self.not_in_place = true;
        self
    }

    /// Pins the processing dimension.
    pub fn with_processing_dimension(mut self, dim: usize) -> Self {
        self.processing_dimension = Some(dim);
        self
    }
}

/// What a [`ScanLineFilter`] gets to see for one line.
pub struct ScanLineFilterParameters<'a> {
    /// One buffer per input image.
    pub in_buffer: &'a [LineBuffer],
    /// One buffer per output image.
    pub out_buffer: &'a mut [LineBuffer],
    /// Number of pixels on the line.
    pub buffer_length: usize,
    /// The dimension the line runs along.
    pub dimension: usize,
    /// Number of tensor elements of the first output, or of the first input without outputs.
    pub n_tensor_elements: usize,
    /// True if the tensor was turned into the last spatial dimension.
    pub tensor_to_spatial: bool,
    /// The worker processing the line, in `0..n_threads`.
    pub thread: usize,
    /// Coordinates of the first pixel on the line. Only meaningful with `need_coordinates`.
    pub position: &'a [usize],
}

/// A line filter for [`scan`].
pub trait ScanLineFilter: Sync {
    /// Called once before the first line with the number of workers that will call
    /// [`ScanLineFilter::filter`].
    fn set_number_of_threads(&mut self, _threads: usize) {}

    /// Estimated cost, in clock cycles, of processing one pixel.
    fn get_number_of_operations(
        &self,
        n_input: usize,
        n_output: usize,
        n_tensor_elements: usize,
    ) -> usize {
        n_input.max(n_output) * n_tensor_elements
    }

    /// Processes one line. Lines of one worker are processed in order.
    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError>;
}

/// The sizes all `images` can be singleton-expanded to.
pub fn singleton_expanded_sizes(images: &[Image]) -> Result<Vec<usize>, ImageError> {
    let n_dims = images.iter().map(|i| i.dimensionality()).max().unwrap_or(0);
    let mut sizes = vec![1usize; n_dims];
    for img in images {
        for (d, &s) in img.sizes().iter().enumerate() {
            if sizes[d] == 1 {
                sizes[d] = s;
            } else if s != 1 && s != sizes[d] {
                return Err(ImageError::SizesDontMatch(img.sizes().to_vec(), sizes));
            }
        }
    }
    Ok(sizes)
}

/// The number of tensor elements all `images` can be singleton-expanded to.
pub fn singleton_expanded_tensor_elements(images: &[Image]) -> Result<usize, ImageError> {
    let mut n = 1;
    for img in images {
        let t = img.tensor_elements();
        if n == 1 {
            n = t;
        } else if t != 1 && t != n {
            return Err(ImageError::NTensorElementsDontMatch(t, n));
        }
    }
    Ok(n)
}

fn check_length(len: usize, expected: usize) -> Result<(), ImageError> {
    if len != expected {
        return Err(ImageError::ArrayParameterWrongLength(len, expected));
    }
    Ok(())
}

fn all_same_simple_stride(ins: &[Image], outs: &[Image]) -> bool {
    if ins.iter().chain(outs).any(|i| i.simple_stride().is_none()) {
        return false;
    }
    let same_as_first = |images: &[Image]| {
        images
            .iter()
            .skip(1)
            .all(|i| i.has_same_dimension_order(&images[0]))
    };
    if !same_as_first(ins) || !same_as_first(outs) {
        return false;
    }
    match (ins.first(), outs.first()) {
        (Some(i), Some(o)) => i.has_same_dimension_order(o),
        _ => true,
    }
}

/// Everything the workers share.
struct LinePlan<'a> {
    ins: &'a [Image],
    outs: &'a [Image],
    in_buffer_types: &'a [DataType],
    out_buffer_types: &'a [DataType],
    in_use_buffer: Vec<bool>,
    out_use_buffer: Vec<bool>,
    look_up_tables: Vec<Option<Vec<isize>>>,
    dimension: usize,
    buffer_length: usize,
    n_tensor_elements: usize,
    tensor_to_spatial: bool,
}

/// A worker's staging buffers and line descriptors.
struct Staging {
    _segments: Vec<DataSegment>,
    in_lines: Vec<LineBuffer>,
    out_lines: Vec<LineBuffer>,
}

fn staging_line(
    segments: &mut Vec<DataSegment>,
    data_type: DataType,
    tensor_length: usize,
    pixels: usize,
    broadcast: bool,
) -> Result<LineBuffer, ImageError> {
    let pixels = if broadcast { 1 } else { pixels.max(1) };
    let segment = DataSegment::allocate(pixels * tensor_length.max(1) * data_type.size_of())?;
    let ptr = segment.as_ptr();
    segments.push(segment);
    Ok(LineBuffer {
        ptr,
        data_type,
        length: 0,
        border: 0,
        stride: if broadcast { 0 } else { tensor_length as isize },
        tensor_stride: 1,
        tensor_length,
    })
}

fn image_line(img: &Image, dim: usize) -> LineBuffer {
    LineBuffer {
        ptr: std::ptr::null_mut(),
        data_type: img.data_type(),
        length: 0,
        border: 0,
        stride: img.strides()[dim],
        tensor_stride: img.tensor_stride(),
        tensor_length: img.tensor_elements(),
    }
}

impl LinePlan<'_> {
    fn staging(&self) -> Result<Staging, ImageError> {
        let dim = self.dimension;
        let mut segments = Vec::new();
        let mut in_lines = Vec::with_capacity(self.ins.len());
        for (ii, img) in self.ins.iter().enumerate() {
            in_lines.push(if self.in_use_buffer[ii] {
                let tensor_length = match &self.look_up_tables[ii] {
                    Some(lut) => lut.len(),
                    None => img.tensor_elements(),
                };
                staging_line(
                    &mut segments,
                    self.in_buffer_types[ii],
                    tensor_length,
                    self.buffer_length,
                    img.strides()[dim] == 0,
                )?
            } else {
                image_line(img, dim)
            });
        }
        let mut out_lines = Vec::with_capacity(self.outs.len());
        for (ii, img) in self.outs.iter().enumerate() {
            out_lines.push(if self.out_use_buffer[ii] {
                staging_line(
                    &mut segments,
                    self.out_buffer_types[ii],
                    img.tensor_elements(),
                    self.buffer_length,
                    false,
                )?
            } else {
                image_line(img, dim)
            });
        }
        Ok(Staging {
            _segments: segments,
            in_lines,
            out_lines,
        })
    }

    /// Processes `length` pixels starting at the given per-image offsets (inputs first).
    fn process_line(
        &self,
        filter: &dyn ScanLineFilter,
        staging: &mut Staging,
        offsets: &[isize],
        position: &[usize],
        length: usize,
        thread: usize,
    ) -> Result<(), ImageError> {
        let dim = self.dimension;
        let n_in = self.ins.len();
        for (ii, img) in self.ins.iter().enumerate() {
            let ptr = img.pointer(offsets[ii])?;
            let line = &mut staging.in_lines[ii];
            line.length = length;
            if self.in_use_buffer[ii] {
                let src = SampleBuffer {
                    ptr,
                    data_type: img.data_type(),
                    stride: img.strides()[dim],
                    tensor_stride: img.tensor_stride(),
                };
                let dst = SampleBuffer {
                    ptr: line.ptr,
                    data_type: line.data_type,
                    stride: line.stride,
                    tensor_stride: 1,
                };
                let pixels = if line.stride == 0 { 1 } else { length };
                // SAFETY: the source is a line of a forged image, the staging buffer holds
                // `buffer_length >= length` pixels.
                unsafe {
                    copy_buffer(
                        src,
                        dst,
                        pixels,
                        img.tensor_elements(),
                        self.look_up_tables[ii].as_deref(),
                    )
                };
            } else {
                line.ptr = ptr;
            }
        }
        for (ii, img) in self.outs.iter().enumerate() {
            let line = &mut staging.out_lines[ii];
            line.length = length;
            if !self.out_use_buffer[ii] {
                line.ptr = img.pointer(offsets[n_in + ii])?;
            }
        }
        let mut params = ScanLineFilterParameters {
            in_buffer: &staging.in_lines,
            out_buffer: &mut staging.out_lines,
            buffer_length: length,
            dimension: dim,
            n_tensor_elements: self.n_tensor_elements,
            tensor_to_spatial: self.tensor_to_spatial,
            thread,
            position,
        };
        filter.filter(&mut params)?;
        for (ii, img) in self.outs.iter().enumerate() {
            if !self.out_use_buffer[ii] {
                continue;
            }
            let line = &staging.out_lines[ii];
            let src = SampleBuffer {
                ptr: line.ptr,
                data_type: line.data_type,
                stride: line.stride,
                tensor_stride: 1,
            };
            let dst = SampleBuffer {
                ptr: img.pointer(offsets[n_in + ii])?,
                data_type: img.data_type(),
                stride: img.strides()[dim],
                tensor_stride: img.tensor_stride(),
            };
            // SAFETY: as above, in the other direction.
            unsafe { copy_buffer(src, dst, length, img.tensor_elements(), None) };
        }
        Ok(())
    }
}

enum Target {
    Direct,
    Temporary(Image),
}

/// Applies `filter` to every line of the input and output images.
///
/// * `in_buffer_types[i]` is the sample type the filter sees for input `i`.
/// * `out_buffer_types[i]` is the sample type the filter writes for output `i`.
/// * `out_image_types[i]` is the sample type output `i` is forged with.
/// * `n_tensor_elements[i]` is the number of tensor elements of output `i`.
///
/// Inputs are singleton-expanded to a common size and the outputs are forged to it. An
/// output that is an identical view of an input is computed in place, unless `not_in_place`
/// is set. Dimensions that are broadcast in every input are computed once and the result is
/// copied along them. Output pixel size and color space are taken from the inputs.
///
/// After a filter error, the workers stop at their next line and the first error is returned.
#[allow(clippy::too_many_arguments)]
pub fn scan(
    inputs: &[&Image],
    outputs: &mut [&mut Image],
    in_buffer_types: &[DataType],
    out_buffer_types: &[DataType],
    out_image_types: &[DataType],
    n_tensor_elements: &[usize],
    filter: &mut dyn ScanLineFilter,
    options: ScanOptions,
) -> Result<(), ImageError> {
    let n_in = inputs.len();
    let n_out = outputs.len();
    if n_in == 0 && n_out == 0 {
        return Ok(());
    }
    check_length(in_buffer_types.len(), n_in)?;
    check_length(out_buffer_types.len(), n_out)?;
    check_length(out_image_types.len(), n_out)?;
    check_length(n_tensor_elements.len(), n_out)?;
    if inputs.iter().any(|i| !i.is_forged()) {
        return Err(ImageError::NotForged);
    }

    let mut ins: Vec<Image> = inputs.iter().map(|&i| i.clone()).collect();
    let pixel_size = ins
        .iter()
        .map(|i| i.pixel_size())
        .find(|p| p.is_defined())
        .cloned()
        .unwrap_or_default();
    let tensor_to_spatial = options.tensor_as_spatial_dim && ins.iter().any(|i| !i.is_scalar());

    let mut sizes = if ins.is_empty() {
        outputs[0].sizes().to_vec()
    } else if options.no_singleton_expansion {
        let sizes = ins[0].sizes().to_vec();
        if let Some(other) = ins.iter().find(|i| i.sizes() != sizes.as_slice()) {
            return Err(ImageError::SizesDontMatch(other.sizes().to_vec(), sizes));
        }
        sizes
    } else {
        singleton_expanded_sizes(&ins)?
    };
    let mut t_size = 1;
    let mut out_tensor = Tensor::scalar();
    if tensor_to_spatial {
        t_size = singleton_expanded_tensor_elements(&ins)?;
        if let Some(img) = ins.iter().find(|i| i.tensor_elements() == t_size) {
            out_tensor = img.tensor().clone();
        }
        for img in ins.iter_mut() {
            if img.is_scalar() && t_size > 1 {
                img.expand_singleton_tensor(t_size)?;
            }
        }
    }
    let color_spaces: Vec<Option<String>> = (0..n_out)
        .map(|ii| {
            let n_t = if tensor_to_spatial {
                t_size
            } else {
                n_tensor_elements[ii]
            };
            inputs
                .iter()
                .find(|i| !i.color_space().is_empty() && i.tensor_elements() == n_t)
                .map(|i| i.color_space().to_string())
        })
        .collect();
    for img in ins.iter_mut() {
        img.expand_singleton_dimensions(&sizes)?;
    }

    // dimensions that every input broadcasts are computed once, unless the filter only
    // reads, in which case every pixel must reach it
    let true_sizes = sizes.clone();
    let true_t_size = t_size;
    if !ins.is_empty() && n_out > 0 {
        for d in 0..sizes.len() {
            if sizes[d] > 1 && ins.iter().all(|i| i.strides()[d] == 0) {
                sizes[d] = 1;
                for img in ins.iter_mut() {
                    img.unexpand_singleton_dimension(d)?;
                }
            }
        }
        if t_size > 1 && ins.iter().all(|i| i.tensor_stride() == 0) {
            t_size = 1;
            for img in ins.iter_mut() {
                img.unexpand_singleton_tensor()?;
            }
        }
    }
    let collapsed = sizes != true_sizes || t_size != true_t_size;
    if collapsed {
        debug!("scan: broadcast dimensions collapsed, {true_sizes:?} computed as {sizes:?}");
    }

    let mut targets = Vec::with_capacity(n_out);
    for (ii, out) in outputs.iter_mut().enumerate() {
        let n_t = if tensor_to_spatial {
            t_size
        } else {
            n_tensor_elements[ii]
        };
        if collapsed {
            let mut temp = Image::default();
            temp.reforge(&sizes, n_t, out_image_types[ii], AcceptDataTypeChange::DontAllow)?;
            targets.push(Target::Temporary(temp));
            continue;
        }
        if out.is_forged() {
            let identical = inputs.iter().any(|i| out.is_identical_view(i));
            let overlapping = inputs.iter().any(|i| out.is_overlapping_view(i));
            if overlapping && (!identical || options.not_in_place) {
                out.strip()?;
            }
        }
        out.reforge(&sizes, n_t, out_image_types[ii], AcceptDataTypeChange::DoAllow)?;
        targets.push(Target::Direct);
    }
    let mut outs: Vec<Image> = targets
        .iter()
        .zip(outputs.iter())
        .map(|(target, out)| match target {
            Target::Direct => (**out).clone(),
            Target::Temporary(temp) => temp.clone(),
        })
        .collect();

    if tensor_to_spatial {
        for img in ins.iter_mut().chain(outs.iter_mut()) {
            img.tensor_to_spatial(None)?;
        }
        sizes.push(t_size);
    }
    if sizes.is_empty() {
        for img in ins.iter_mut().chain(outs.iter_mut()) {
            img.expand_dimensionality(1)?;
        }
        sizes.push(1);
    }

    let mut scan_1d = sizes.len() == 1;
    if !scan_1d
        && !options.need_coordinates
        && options.processing_dimension.is_none()
        && all_same_simple_stride(&ins, &outs)
    {
        for img in ins.iter_mut().chain(outs.iter_mut()) {
            img.flatten()?;
        }
        sizes = vec![sizes.iter().product()];
        scan_1d = true;
        debug!("scan: all images share a simple stride, walking {} pixels", sizes[0]);
    }

    let dimension = if scan_1d {
        0
    } else {
        match options.processing_dimension {
            Some(d) if d >= sizes.len() => {
                return Err(ImageError::IllegalDimension(d, sizes.len()))
            }
            Some(d) => d,
            None => {
                let reference = ins.first().or(outs.first()).ok_or(ImageError::NotForged)?;
                optimal_processing_dim_for(&sizes, reference.strides())
            }
        }
    };

    let mut in_use_buffer: Vec<bool> = ins
        .iter()
        .zip(in_buffer_types)
        .map(|(i, &t)| i.data_type() != t)
        .collect();
    let mut look_up_tables = vec![None; n_in];
    if options.expand_tensor_in_buffer && !tensor_to_spatial {
        for (ii, img) in ins.iter().enumerate() {
            if !img.tensor().has_normal_order() {
                look_up_tables[ii] = Some(img.tensor().look_up_table());
                in_use_buffer[ii] = true;
            }
        }
    }
    let mut out_use_buffer: Vec<bool> = outs
        .iter()
        .zip(out_buffer_types)
        .map(|(o, &t)| o.data_type() != t)
        .collect();
    if options.not_in_place {
        for (ii, out) in outs.iter().enumerate() {
            if !out_use_buffer[ii] {
                out_use_buffer[ii] = ins
                    .iter()
                    .enumerate()
                    .any(|(jj, i)| !in_use_buffer[jj] && out.is_overlapping_view(i));
            }
        }
    }
    let any_buffer = in_use_buffer.iter().chain(&out_use_buffer).any(|&b| b);

    let n_pixels: usize = sizes.iter().product();
    let line_length = sizes[dimension];
    let n_lines = n_pixels / line_length.max(1);
    let n_tensor = outs
        .first()
        .or(ins.first())
        .map(|i| i.tensor_elements())
        .unwrap_or(1);
    let operations =
        n_pixels.saturating_mul(filter.get_number_of_operations(n_in, n_out, n_tensor));
    let max_threads = if options.no_multi_threading {
        1
    } else {
        get_number_of_threads()
    };
    let mut n_threads = threads_for_operations(max_threads, operations);
    let mut chunk = line_length;
    let mut buffer_length = line_length;
    if scan_1d {
        n_threads = n_threads.min(line_length.max(1));
        chunk = line_length.div_ceil(n_threads).max(1);
        n_threads = line_length.div_ceil(chunk).max(1);
        buffer_length = if any_buffer {
            chunk.min(MAX_BUFFER_SIZE)
        } else {
            chunk
        };
    } else {
        n_threads = n_threads.min(n_lines.max(1));
    }
    debug!(
        "scan: {} inputs, {} outputs, sizes {sizes:?}, dimension {dimension}, {n_threads} threads",
        n_in, n_out
    );

    let plan = LinePlan {
        ins: &ins,
        outs: &outs,
        in_buffer_types,
        out_buffer_types,
        in_use_buffer,
        out_use_buffer,
        look_up_tables,
        dimension,
        buffer_length,
        n_tensor_elements: n_tensor,
        tensor_to_spatial,
    };
    filter.set_number_of_threads(n_threads);
    let filter: &dyn ScanLineFilter = &*filter;

    if scan_1d {
        let strides: Vec<isize> = ins.iter().chain(&outs).map(|i| i.strides()[0]).collect();
        run_workers(n_threads, |thread, stop: &StopFlag| {
            let mut staging = plan.staging()?;
            let end = ((thread + 1) * chunk).min(line_length);
            let mut start = thread * chunk;
            let mut offsets = vec![0isize; strides.len()];
            while start < end {
                if stop.is_set() {
                    break;
                }
                let length = buffer_length.min(end - start);
                for (o, &s) in offsets.iter_mut().zip(&strides) {
                    *o = start as isize * s;
                }
                plan.process_line(filter, &mut staging, &offsets, &[start], length, thread)?;
                start += length;
            }
            Ok(())
        })?;
    } else {
        let ranges = split_evenly(n_lines, n_threads);
        let strides: Vec<Vec<isize>> = ins
            .iter()
            .chain(&outs)
            .map(|i| i.strides().to_vec())
            .collect();
        run_workers(ranges.len(), |thread, stop: &StopFlag| {
            let range = ranges[thread].clone();
            let mut staging = plan.staging()?;
            let mut walker = LineWalker::new(&sizes, strides.clone(), dimension);
            walker.seek(range.start);
            for _ in range {
                if stop.is_set() {
                    break;
                }
                plan.process_line(
                    filter,
                    &mut staging,
                    walker.offsets(),
                    walker.coordinates(),
                    line_length,
                    thread,
                )?;
                walker.next_line();
            }
            Ok(())
        })?;
    }

    for (ii, (out, target)) in outputs.iter_mut().zip(targets).enumerate() {
        if let Target::Temporary(temp) = target {
            let mut view = temp;
            view.expand_singleton_dimensions(&true_sizes)?;
            if tensor_to_spatial && true_t_size > 1 && view.is_scalar() {
                view.expand_singleton_tensor(true_t_size)?;
            }
            if out.is_forged() && inputs.iter().any(|i| out.is_overlapping_view(i)) {
                out.strip()?;
            }
            out.reforge(
                &true_sizes,
                view.tensor_elements(),
                out_image_types[ii],
                AcceptDataTypeChange::DoAllow,
            )?;
            out.copy_from(&view)?;
        }
        if tensor_to_spatial
            && !out_tensor.is_scalar()
            && out.tensor_elements() == out_tensor.elements()
        {
            out.reshape_tensor_like(&out_tensor)?;
        }
        out.set_pixel_size(pixel_size.clone());
        if let Some(cs) = &color_spaces[ii] {
            out.set_color_space(cs.clone());
        }
    }
    Ok(())
}

/// Scans a single input image, with an optional mask, without outputs.
///
/// The mask must be binary and scalar, and singleton-expandable to the input. The filter
/// finds it as the second input buffer.
pub fn scan_single_input(
    input: &Image,
    mask: Option<&Image>,
    buffer_type: DataType,
    filter: &mut dyn ScanLineFilter,
    options: ScanOptions,
) -> Result<(), ImageError> {
    match mask {
        None => scan(&[input], &mut [], &[buffer_type], &[], &[], &[], filter, options),
        Some(mask) => {
            mask.check_is_mask(input.sizes(), true)?;
            let mut mask = mask.clone();
            mask.expand_singleton_dimensions(input.sizes())?;
            scan(
                &[input, &mask],
                &mut [],
                &[buffer_type, DataType::Bin],
                &[],
                &[],
                &[],
                filter,
                options,
            )
        }
    }
}

/// Scans a single output image without inputs. The output keeps its sizes and is forged
/// with `data_type` and `n_tensor_elements` tensor elements.
pub fn scan_single_output(
    output: &mut Image,
    data_type: DataType,
    n_tensor_elements: usize,
    filter: &mut dyn ScanLineFilter,
    options: ScanOptions,
) -> Result<(), ImageError> {
    scan(
        &[],
        &mut [output],
        &[],
        &[data_type],
        &[data_type],
        &[n_tensor_elements],
        filter,
        options,
    )
}

/// Scans one input into one output.
#[allow(clippy::too_many_arguments)]
pub fn scan_monadic(
    input: &Image,
    output: &mut Image,
    buffer_type: DataType,
    out_image_type: DataType,
    n_tensor_elements: usize,
    filter: &mut dyn ScanLineFilter,
    options: ScanOptions,
) -> Result<(), ImageError> {
    scan(
        &[input],
        &mut [output],
        &[buffer_type],
        &[buffer_type],
        &[out_image_type],
        &[n_tensor_elements],
        filter,
        options,
    )
}

/// Scans two inputs into one output, element by element.
///
/// The tensors must have the same number of elements, or one of the images must be scalar.
/// The tensor elements are processed as a spatial dimension, the output takes the tensor
/// shape of the non-scalar input.
pub fn scan_dyadic(
    in1: &Image,
    in2: &Image,
    output: &mut Image,
    buffer_type: DataType,
    out_image_type: DataType,
    filter: &mut dyn ScanLineFilter,
    options: ScanOptions,
) -> Result<(), ImageError> {
    let n_tensor_elements = match (in1.tensor_elements(), in2.tensor_elements()) {
        (1, n) | (n, 1) => n,
        (n1, n2) if n1 == n2 => n1,
        (n1, n2) => return Err(ImageError::NTensorElementsDontMatch(n1, n2)),
    };
    scan(
        &[in1, in2],
        &mut [output],
        &[buffer_type, buffer_type],
        &[buffer_type],
        &[out_image_type],
        &[n_tensor_elements],
        filter,
        options.with_tensor_as_spatial_dim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        monadic::{new_dyadic_scan_line_filter, new_monadic_scan_line_filter},
        threads::PerThread,
    };
    use tessera_image::Bin;

    fn ramp(sizes: Vec<usize>) -> Result<Image, ImageError> {
        let n: usize = sizes.iter().product();
        Image::from_vec(sizes, 1, (0..n).map(|v| v as f32).collect())
    }

    #[test]
    fn test_monadic_with_conversion() -> Result<(), ImageError> {
        let input = Image::from_vec(vec![2, 2], 1, vec![10u8, 100, 127, 200])?;
        let mut out = Image::default();
        let mut double = new_monadic_scan_line_filter(|v: f32| v * 2.0, 1);
        scan_monadic(
            &input,
            &mut out,
            DataType::SFloat,
            DataType::UInt8,
            1,
            &mut double,
            ScanOptions::default(),
        )?;
        assert_eq!(out.data_type(), DataType::UInt8);
        assert_eq!(out.samples::<u8>()?, vec![20, 200, 254, 255]);
        Ok(())
    }

    #[test]
    fn test_dyadic_singleton_expansion() -> Result<(), ImageError> {
        let a = ramp(vec![3, 2])?;
        let b = Image::from_vec(vec![3, 1], 1, vec![100.0f32, 200.0, 300.0])?;
        let mut out = Image::default();
        let mut add = new_dyadic_scan_line_filter(|x: f32, y: f32| x + y, 1);
        scan_dyadic(
            &a,
            &b,
            &mut out,
            DataType::SFloat,
            DataType::SFloat,
            &mut add,
            ScanOptions::default(),
        )?;
        assert_eq!(out.sizes(), &[3, 2]);
        assert_eq!(
            out.samples::<f32>()?,
            vec![100.0, 201.0, 302.0, 103.0, 204.0, 305.0]
        );
        Ok(())
    }

    #[test]
    fn test_broadcast_dimension_computed_once() -> Result<(), ImageError> {
        let mut a = Image::from_vec(vec![3, 1], 1, vec![1.0f32, 2.0, 3.0])?;
        a.expand_singleton_dimensions(&[3, 4])?;
        let b = Image::from_sample(10.0f32)?;
        let mut out = Image::default();
        let mut mul = new_dyadic_scan_line_filter(|x: f32, y: f32| x * y, 1);
        scan_dyadic(
            &a,
            &b,
            &mut out,
            DataType::SFloat,
            DataType::SFloat,
            &mut mul,
            ScanOptions::default(),
        )?;
        assert_eq!(out.sizes(), &[3, 4]);
        assert!(!out.is_singleton_expanded());
        let expected: Vec<f32> = (0..4).flat_map(|_| [10.0, 20.0, 30.0]).collect();
        assert_eq!(out.samples::<f32>()?, expected);
        Ok(())
    }

    #[test]
    fn test_tensor_as_spatial() -> Result<(), ImageError> {
        let mut a = Image::from_vec(vec![2], 2, vec![1i32, 2, 3, 4])?;
        a.reshape_tensor(1, 2)?;
        let b = Image::from_vec(vec![2], 1, vec![10i32, 20])?;
        let mut out = Image::default();
        let mut sub = new_dyadic_scan_line_filter(|x: i32, y: i32| x - y, 1);
        scan_dyadic(
            &a,
            &b,
            &mut out,
            DataType::SInt32,
            DataType::SInt32,
            &mut sub,
            ScanOptions::default(),
        )?;
        assert_eq!(out.tensor_elements(), 2);
        assert_eq!(out.tensor().rows(), 1);
        assert_eq!(out.samples::<i32>()?, vec![-9, -8, -17, -16]);
        assert!(scan_dyadic(
            &a,
            &Image::from_vec(vec![2], 3, vec![0i32; 6])?,
            &mut out,
            DataType::SInt32,
            DataType::SInt32,
            &mut sub,
            ScanOptions::default(),
        )
        .is_err());
        Ok(())
    }

    #[test]
    fn test_in_place() -> Result<(), ImageError> {
        let input = ramp(vec![4, 3])?;
        let mut out = input.clone();
        let mut negate = new_monadic_scan_line_filter(|v: f32| -v, 1);
        scan_monadic(
            &input,
            &mut out,
            DataType::SFloat,
            DataType::SFloat,
            1,
            &mut negate,
            ScanOptions::default(),
        )?;
        assert!(out.is_identical_view(&input));
        assert_eq!(input.samples::<f32>()?[5], -5.0);

        let mut copy = input.clone();
        scan_monadic(
            &input,
            &mut copy,
            DataType::SFloat,
            DataType::SFloat,
            1,
            &mut negate,
            ScanOptions::default().with_not_in_place(),
        )?;
        assert!(!copy.is_overlapping_view(&input));
        assert_eq!(copy.samples::<f32>()?[5], 5.0);
        Ok(())
    }

    struct Coordinates;

    impl ScanLineFilter for Coordinates {
        fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
            let mut out = params.out_buffer[0].typed_mut::<u32>()?;
            let mut coords = params.position.to_vec();
            for i in 0..params.buffer_length {
                coords[params.dimension] = params.position[params.dimension] + i;
                out.set(i, (coords[0] + 10 * coords[1] + 100 * coords[2]) as u32);
            }
            Ok(())
        }
    }

    #[test]
    fn test_need_coordinates() -> Result<(), ImageError> {
        let mut out = Image::raw(vec![3, 4, 2], 1, DataType::UInt32)?;
        let options = ScanOptions::default()
            .with_need_coordinates()
            .with_processing_dimension(1);
        scan_single_output(&mut out, DataType::UInt32, 1, &mut Coordinates, options)?;
        assert_eq!(out.sample::<u32>(&[2, 3, 1], 0)?, 132);
        assert_eq!(out.sample::<u32>(&[1, 0, 0], 0)?, 1);
        let mut out = Image::raw(vec![3, 4, 2], 1, DataType::UInt32)?;
        let options = ScanOptions::default().with_processing_dimension(3);
        assert_eq!(
            scan_single_output(&mut out, DataType::UInt32, 1, &mut Coordinates, options),
            Err(ImageError::IllegalDimension(3, 3))
        );
        Ok(())
    }

    #[derive(Default)]
    struct MaskedSum {
        sums: PerThread<f64>,
    }

    impl ScanLineFilter for MaskedSum {
        fn set_number_of_threads(&mut self, threads: usize) {
            self.sums.reset(threads);
        }

        fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
            let input = params.in_buffer[0].typed::<f64>()?;
            let mut sum = self.sums.lock(params.thread)?;
            match params.in_buffer.get(1) {
                Some(mask) => {
                    let mask = mask.typed::<Bin>()?;
                    for i in 0..params.buffer_length {
                        if mask.get(i).is_set() {
                            *sum += input.get(i);
                        }
                    }
                }
                None => *sum += input.iter().sum::<f64>(),
            }
            Ok(())
        }
    }

    #[test]
    fn test_single_input_with_mask() -> Result<(), ImageError> {
        let _ = env_logger::builder().is_test(true).try_init();
        let input = ramp(vec![200, 300])?;
        let mut total = MaskedSum::default();
        scan_single_input(&input, None, DataType::DFloat, &mut total, ScanOptions::default())?;
        let sum: f64 = std::mem::take(&mut total.sums).into_inner().iter().sum();
        assert_eq!(sum, (59_999.0 * 60_000.0) / 2.0);

        let even_columns: Vec<Bin> = (0..200).map(|x| Bin::new(x % 2 == 0)).collect();
        let mask = Image::from_vec(vec![200, 1], 1, even_columns)?;
        scan_single_input(
            &input,
            Some(&mask),
            DataType::DFloat,
            &mut total,
            ScanOptions::default(),
        )?;
        let masked: f64 = std::mem::take(&mut total.sums).into_inner().iter().sum();
        let expected: f64 = (0..60_000)
            .filter(|v| v % 2 == 0)
            .map(|v| v as f64)
            .sum();
        assert_eq!(masked, expected);
        Ok(())
    }

    #[test]
    fn test_read_only_scan_visits_broadcast_pixels() -> Result<(), ImageError> {
        let mut input = ramp(vec![5])?;
        input.expand_singleton_dimensions(&[5, 3])?;
        let mut total = MaskedSum::default();
        scan_single_input(&input, None, DataType::DFloat, &mut total, ScanOptions::default())?;
        let sum: f64 = total.sums.into_inner().iter().sum();
        assert_eq!(sum, 3.0 * 10.0);
        Ok(())
    }

    struct FailOnLine(usize);

    impl ScanLineFilter for FailOnLine {
        fn get_number_of_operations(&self, _: usize, _: usize, _: usize) -> usize {
            N_OPS_TO_FORCE_THREADS
        }

        fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
            if params.position[1] == self.0 {
                return Err(ImageError::InvalidParameter("bad line".to_string()));
            }
            Ok(())
        }
    }

    const N_OPS_TO_FORCE_THREADS: usize = 1_000_000;

    #[test]
    fn test_filter_error_propagates() -> Result<(), ImageError> {
        let input = ramp(vec![16, 64])?;
        let res = scan_single_input(
            &input,
            None,
            DataType::SFloat,
            &mut FailOnLine(40),
            ScanOptions::default()
                .with_need_coordinates()
                .with_processing_dimension(0),
        );
        assert_eq!(
            res,
            Err(ImageError::InvalidParameter("bad line".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_array_lengths_checked() -> Result<(), ImageError> {
        let input = ramp(vec![4])?;
        let mut out = Image::default();
        let mut negate = new_monadic_scan_line_filter(|v: f32| -v, 1);
        let res = scan(
            &[&input],
            &mut [&mut out],
            &[DataType::SFloat],
            &[DataType::SFloat],
            &[],
            &[1],
            &mut negate,
            ScanOptions::default(),
        );
        assert_eq!(res, Err(ImageError::ArrayParameterWrongLength(0, 1)));
        Ok(())
    }
}
