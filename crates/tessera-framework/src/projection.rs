//! The Projection framework: reduces a subset of the dimensions of an image to singletons.
//!
//! For every output pixel the projection function sees a view of the input spanning the
//! reduced dimensions, and the matching view of the mask. It writes one sample.

use log::debug;
use num_complex::Complex64;

use tessera_image::{
    iterators::{split_evenly, CoordinatesCounter},
    AcceptDataTypeChange, DataType, Image, ImageError, Sample, SampleValue,
};

use crate::threads::{get_number_of_threads, run_workers, threads_for_operations, StopFlag};

/// One output sample of a projection, cast to the output type when set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleSlot {
    value: SampleValue,
}

impl SampleSlot {
    /// A zero sample of type `data_type`.
    pub fn new(data_type: DataType) -> Self {
        Self {
            value: SampleValue::UInt8(0).cast(data_type),
        }
    }

    /// The type of the sample.
    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    /// The current value.
    pub fn value(&self) -> SampleValue {
        self.value
    }

    /// Stores `v`, cast to the slot type.
    pub fn set<T: Sample>(&mut self, v: T) {
        self.set_value(v.into_value());
    }

    /// Stores a type-erased value, cast to the slot type.
    pub fn set_value(&mut self, v: SampleValue) {
        self.value = v.cast(self.value.data_type());
    }

    /// Stores a real value.
    pub fn set_f64(&mut self, v: f64) {
        self.set_value(SampleValue::DFloat(v));
    }

    /// Stores a complex value.
    pub fn set_complex(&mut self, v: Complex64) {
        self.set_value(SampleValue::DComplex(v));
    }
}

/// A projection function for [`projection`].
pub trait ProjectionFunction: Sync {
    /// Called once before the first projection with the number of workers.
    fn set_number_of_threads(&mut self, _threads: usize) {}

    /// Estimated cost, in clock cycles, of one projection over `n_input` pixels.
    fn get_number_of_operations(&self, n_input: usize) -> usize {
        n_input
    }

    /// Reduces `input`, restricted to the pixels set in `mask` if given, to a single sample.
    ///
    /// `input` is scalar. Its dimensions may have been merged, squeezed or reordered, unless
    /// the projection runs with `keep_dimension_order`.
    fn project(
        &self,
        input: &Image,
        mask: Option<&Image>,
        out: &mut SampleSlot,
        thread: usize,
    ) -> Result<(), ImageError>;
}

/// Options for [`projection`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Run on the calling thread only.
    pub no_multi_threading: bool,
    /// Hand the projection function views with all dimensions in their original order and
    /// direction. Needed by projections that report coordinates.
    pub keep_dimension_order: bool,
}

fn write_sample(output: &Image, offset: isize, slot: &SampleSlot) -> Result<(), ImageError> {
    let ptr = output.pointer(offset)?;
    // SAFETY: the offset addresses a pixel of the forged output.
    unsafe { slot.value().write_to(ptr, output.data_type()) };
    Ok(())
}

/// Applies `function` to every fibre of `input` along the dimensions where `process` is set.
///
/// An empty `process` reduces all dimensions. `out` is forged with the input sizes, reduced
/// dimensions set to 1, the input tensor and `out_image_type`. Tensor elements are projected
/// independently.
#[allow(clippy::too_many_arguments)]
pub fn projection(
    input: &Image,
    mask: Option<&Image>,
    out: &mut Image,
    out_image_type: DataType,
    process: &[bool],
    function: &mut dyn ProjectionFunction,
    options: ProjectionOptions,
) -> Result<(), ImageError> {
    if !input.is_forged() {
        return Err(ImageError::NotForged);
    }
    let in_sizes = input.sizes().to_vec();
    let n_dims = in_sizes.len();
    let mut process = if process.is_empty() {
        vec![true; n_dims]
    } else if process.len() != n_dims {
        return Err(ImageError::ArrayParameterWrongLength(process.len(), n_dims));
    } else {
        process.to_vec()
    };

    let mut input_view = input.clone();
    let pixel_size = input.pixel_size().clone();
    let color_space = input.color_space().to_string();
    let out_tensor = input.tensor().clone();
    let n_tensor = out_tensor.elements();

    let mut mask_view = match mask {
        Some(m) => {
            m.check_is_mask(&in_sizes, true)?;
            let mut m = m.clone();
            m.expand_singleton_dimensions(&in_sizes)?;
            if n_tensor > 1 {
                m.expand_singleton_tensor(n_tensor)?;
            }
            Some(m)
        }
        None => None,
    };

    let mut out_sizes = in_sizes.clone();
    let mut proc_sizes = in_sizes.clone();
    for d in 0..n_dims {
        if in_sizes[d] == 1 {
            process[d] = true;
        }
        if process[d] {
            out_sizes[d] = 1;
        } else {
            proc_sizes[d] = 1;
        }
    }

    if out.is_forged()
        && (out.is_overlapping_view(input) || mask.is_some_and(|m| out.is_overlapping_view(m)))
    {
        out.strip()?;
    }
    out.reforge(&out_sizes, n_tensor, out_image_type, AcceptDataTypeChange::DoAllow)?;
    out.reshape_tensor_like(&out_tensor)?;
    out.set_pixel_size(pixel_size);
    out.set_color_space(color_space);
    let mut output = out.clone();

    if n_tensor > 1 {
        input_view.tensor_to_spatial(Some(0))?;
        if let Some(m) = mask_view.as_mut() {
            m.tensor_to_spatial(Some(0))?;
        }
        output.tensor_to_spatial(Some(0))?;
        process.insert(0, false);
        out_sizes = output.sizes().to_vec();
        proc_sizes.insert(0, 1);
    }

    if process.iter().all(|&p| p) {
        function.set_number_of_threads(1);
        let mut slot = SampleSlot::new(out_image_type);
        function.project(&input_view, mask_view.as_ref(), &mut slot, 0)?;
        return write_sample(&output, 0, &slot);
    }

    // views spanning the processed dimensions, anchored at output pixel 0
    let mut temp_in = input_view.clone();
    // SAFETY: the view addresses a subset of the pixels of the input.
    unsafe { temp_in.set_sizes_unchecked(proc_sizes.clone()) };
    let mut temp_mask = mask_view.clone();
    if let Some(m) = temp_mask.as_mut() {
        // SAFETY: as above, for the mask.
        unsafe { m.set_sizes_unchecked(proc_sizes.clone()) };
    }
    match temp_mask.as_mut() {
        _ if options.keep_dimension_order => {}
        Some(m) if m.strides() == temp_in.strides() => {
            temp_in.flatten_as_much_as_possible()?;
            m.flatten_as_much_as_possible()?;
        }
        Some(m) => {
            temp_in.squeeze()?;
            m.squeeze()?;
        }
        None => temp_in.flatten_as_much_as_possible()?,
    }

    // loop only over the dimensions that remain in the output
    let keep: Vec<usize> = (0..out_sizes.len()).filter(|&d| out_sizes[d] > 1).collect();
    let loop_sizes: Vec<usize> = keep.iter().map(|&d| out_sizes[d]).collect();
    let in_strides: Vec<isize> = keep.iter().map(|&d| input_view.strides()[d]).collect();
    let mask_strides: Vec<isize> = match &mask_view {
        Some(m) => keep.iter().map(|&d| m.strides()[d]).collect(),
        None => vec![0; keep.len()],
    };
    let out_strides: Vec<isize> = keep.iter().map(|&d| output.strides()[d]).collect();

    let n_loop: usize = loop_sizes.iter().product();
    let max_threads = if options.no_multi_threading {
        1
    } else {
        get_number_of_threads().min(n_loop)
    };
    let operations =
        n_loop.saturating_mul(function.get_number_of_operations(temp_in.number_of_pixels()));
    let n_threads = threads_for_operations(max_threads, operations);
    let ranges = split_evenly(n_loop, n_threads);
    debug!(
        "projection: {} output pixels over {} input pixels each, {} threads",
        n_loop,
        temp_in.number_of_pixels(),
        ranges.len()
    );
    function.set_number_of_threads(ranges.len());
    let function: &dyn ProjectionFunction = &*function;

    run_workers(ranges.len(), |thread, stop: &StopFlag| {
        let range = ranges[thread].clone();
        let mut counter = CoordinatesCounter::new(&loop_sizes, None);
        counter.seek(range.start);
        let mut local_in = temp_in.clone();
        let mut local_mask = temp_mask.clone();
        let (mut in_at, mut mask_at) = (0isize, 0isize);
        let mut slot = SampleSlot::new(out_image_type);
        for _ in range {
            if stop.is_set() {
                break;
            }
            let coords = counter.coordinates();
            let offset = |strides: &[isize]| -> isize {
                coords.iter().zip(strides).map(|(&c, &s)| c as isize * s).sum()
            };
            let (in_offset, mask_offset) = (offset(&in_strides), offset(&mask_strides));
            // SAFETY: the shifted views address the fibre of the current output pixel.
            unsafe {
                local_in.shift_origin_unchecked(in_offset - in_at);
                if let Some(m) = local_mask.as_mut() {
                    m.shift_origin_unchecked(mask_offset - mask_at);
                }
            }
            (in_at, mask_at) = (in_offset, mask_offset);
            function.project(&local_in, local_mask.as_ref(), &mut slot, thread)?;
            write_sample(&output, offset(&out_strides), &slot)?;
            counter.advance();
        }
        Ok(())
    })
}
