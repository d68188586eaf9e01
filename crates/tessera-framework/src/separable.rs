//! The Separable framework: applies a line filter along each processed dimension in turn.
//!
//! Each pass reads the result of the previous pass, so an n-dimensional separable filter is
//! written as a 1-D line filter. Input lines can be staged in a buffer with `border` extra
//! samples at either end, filled according to a [`BoundaryCondition`].

use log::debug;

use tessera_image::{
    copy_buffer,
    iterators::{split_evenly, LineWalker},
    AcceptDataTypeChange, DataSegment, DataType, Image, ImageError, SampleBuffer, Tensor,
};

use crate::{
    boundary::{
        array_use_parameter, boundary_array_use_parameter, expand_buffer, BoundaryCondition,
    },
    line::LineBuffer,
    threads::{get_number_of_threads, run_workers, threads_for_operations, StopFlag},
};

/// A line as seen by a [`SeparableLineFilter`]; `border` is set for staged input lines.
pub type SeparableBuffer = LineBuffer;

/// Options for [`separable`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeparableOptions {
    /// Run on the calling thread only.
    pub no_multi_threading: bool,
    /// Filter each tensor element as a separate scalar image.
    pub as_scalar_image: bool,
    /// Stage tensors that are not stored as a full column-major matrix through a look-up
    /// table, so the filter always sees a full matrix.
    pub expand_tensor_in_buffer: bool,
    /// Always stage input lines in a contiguous buffer.
    pub use_input_buffer: bool,
    /// Always write output lines to a contiguous buffer.
    pub use_output_buffer: bool,
    /// The filter copes with the input and output buffers pointing at the same samples.
    pub can_work_in_place: bool,
}

impl SeparableOptions {
    /// All options off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `no_multi_threading`.
    pub fn with_no_multi_threading(mut self) -> Self {
        self.no_multi_threading = true;
        self
    }

    /// Sets `as_scalar_image`.
    pub fn with_as_scalar_image(mut self) -> Self {
        self.as_scalar_image = true;
        self
    }

    /// Sets `expand_tensor_in_buffer`.
    pub fn with_expand_tensor_in_buffer(mut self) -> Self {
        self.expand_tensor_in_buffer = true;
        self
    }

    /// Sets `use_input_buffer`.
    pub fn with_use_input_buffer(mut self) -> Self {
        self.use_input_buffer = true;
        self
    }

    /// Sets `use_output_buffer`.
    pub fn with_use_output_buffer(mut self) -> Self {
        self.use_output_buffer = true;
        self
    }

    /// Sets `can_work_in_place`.
    pub fn with_can_work_in_place(mut self) -> Self {
        self.can_work_in_place = true;
        self
    }
}

/// What a [`SeparableLineFilter`] gets for every line.
pub struct SeparableLineFilterParameters<'a> {
    /// The input line. When staged, `border` samples are readable beyond both ends.
    pub in_buffer: &'a SeparableBuffer,
    /// The output line, of the same length.
    pub out_buffer: &'a mut SeparableBuffer,
    /// The dimension the line runs along.
    pub dimension: usize,
    /// Index of the current pass, in `0..n_passes`.
    pub pass: usize,
    /// Number of passes, one per processed dimension.
    pub n_passes: usize,
    /// Coordinates of the first pixel on the line.
    pub position: &'a [usize],
    /// True if the tensor was turned into the last spatial dimension.
    pub tensor_to_spatial: bool,
    /// The worker processing the line.
    pub thread: usize,
}

/// A line filter for [`separable`].
pub trait SeparableLineFilter: Sync {
    /// Called once before the first pass with the number of workers.
    fn set_number_of_threads(&mut self, _threads: usize) {}

    /// Estimated cost, in clock cycles, of processing one line.
    ///
    /// The default assumes a kernel of `2 * border + 1` multiply-adds per sample.
    fn get_number_of_operations(
        &self,
        line_length: usize,
        n_tensor_elements: usize,
        border: usize,
        _dimension: usize,
    ) -> usize {
        line_length * n_tensor_elements * 2 * (2 * border + 1)
    }

    /// Processes one line.
    fn filter(&self, params: &mut SeparableLineFilterParameters<'_>) -> Result<(), ImageError>;
}

/// One pass: a line filter along `dimension` from `input` into `output`.
struct Pass<'a> {
    input: &'a Image,
    output: &'a Image,
    buffer_type: DataType,
    dimension: usize,
    pass: usize,
    n_passes: usize,
    border: usize,
    boundary_condition: BoundaryCondition,
    look_up_table: Option<&'a [isize]>,
    in_use_buffer: bool,
    out_use_buffer: bool,
    tensor_to_spatial: bool,
}

/// A worker's staging buffers for one pass.
struct PassStaging {
    _segments: Vec<DataSegment>,
    in_line: LineBuffer,
    out_line: LineBuffer,
}

fn staged(
    segments: &mut Vec<DataSegment>,
    data_type: DataType,
    length: usize,
    border: usize,
    tensor_length: usize,
) -> Result<LineBuffer, ImageError> {
    let sample = data_type.size_of();
    let segment =
        DataSegment::allocate((length + 2 * border).max(1) * tensor_length.max(1) * sample)?;
    // SAFETY: the segment holds `border` pixels before the origin.
    let ptr = unsafe { segment.as_ptr().add(border * tensor_length * sample) };
    segments.push(segment);
    Ok(LineBuffer {
        ptr,
        data_type,
        length,
        border,
        stride: tensor_length as isize,
        tensor_stride: 1,
        tensor_length,
    })
}

fn direct(img: &Image, dim: usize) -> LineBuffer {
    LineBuffer {
        ptr: std::ptr::null_mut(),
        data_type: img.data_type(),
        length: img.sizes()[dim],
        border: 0,
        stride: img.strides()[dim],
        tensor_stride: img.tensor_stride(),
        tensor_length: img.tensor_elements(),
    }
}

impl Pass<'_> {
    fn staging(&self) -> Result<PassStaging, ImageError> {
        let dim = self.dimension;
        let length = self.input.sizes()[dim];
        let mut segments = Vec::new();
        let in_line = if self.in_use_buffer {
            let tensor_length = match self.look_up_table {
                Some(lut) => lut.len(),
                None => self.input.tensor_elements(),
            };
            staged(&mut segments, self.buffer_type, length, self.border, tensor_length)?
        } else {
            direct(self.input, dim)
        };
        let out_line = if self.out_use_buffer {
            staged(&mut segments, self.buffer_type, length, 0, self.output.tensor_elements())?
        } else {
            direct(self.output, dim)
        };
        Ok(PassStaging {
            _segments: segments,
            in_line,
            out_line,
        })
    }

    fn process_line(
        &self,
        filter: &dyn SeparableLineFilter,
        staging: &mut PassStaging,
        offsets: &[isize],
        position: &[usize],
        thread: usize,
    ) -> Result<(), ImageError> {
        let dim = self.dimension;
        let length = self.input.sizes()[dim];
        let in_ptr = self.input.pointer(offsets[0])?;
        let out_ptr = self.output.pointer(offsets[1])?;
        if self.in_use_buffer {
            let line = &mut staging.in_line;
            let src = SampleBuffer {
                ptr: in_ptr,
                data_type: self.input.data_type(),
                stride: self.input.strides()[dim],
                tensor_stride: self.input.tensor_stride(),
            };
            let dst = SampleBuffer {
                ptr: line.ptr,
                data_type: line.data_type,
                stride: line.stride,
                tensor_stride: 1,
            };
            // SAFETY: the source is a line of a forged image, the staging buffer was
            // allocated for `length` pixels plus the border.
            unsafe {
                copy_buffer(
                    src,
                    dst,
                    length,
                    self.input.tensor_elements(),
                    self.look_up_table,
                )
            };
            expand_buffer(line, self.boundary_condition)?;
        } else {
            staging.in_line.ptr = in_ptr;
        }
        if !self.out_use_buffer {
            staging.out_line.ptr = out_ptr;
        }
        let mut params = SeparableLineFilterParameters {
            in_buffer: &staging.in_line,
            out_buffer: &mut staging.out_line,
            dimension: dim,
            pass: self.pass,
            n_passes: self.n_passes,
            position,
            tensor_to_spatial: self.tensor_to_spatial,
            thread,
        };
        filter.filter(&mut params)?;
        if self.out_use_buffer {
            let line = &staging.out_line;
            let src = SampleBuffer {
                ptr: line.ptr,
                data_type: line.data_type,
                stride: line.stride,
                tensor_stride: 1,
            };
            let dst = SampleBuffer {
                ptr: out_ptr,
                data_type: self.output.data_type(),
                stride: self.output.strides()[dim],
                tensor_stride: self.output.tensor_stride(),
            };
            // SAFETY: as above, in the other direction.
            unsafe { copy_buffer(src, dst, length, self.output.tensor_elements(), None) };
        }
        Ok(())
    }

    fn run(&self, filter: &dyn SeparableLineFilter, n_threads: usize) -> Result<(), ImageError> {
        let sizes = self.input.sizes();
        let n_lines = sizes.iter().product::<usize>() / sizes[self.dimension].max(1);
        let ranges = split_evenly(n_lines, n_threads.min(n_lines).max(1));
        let strides = vec![
            self.input.strides().to_vec(),
            self.output.strides().to_vec(),
        ];
        run_workers(ranges.len(), |thread, stop: &StopFlag| {
            let range = ranges[thread].clone();
            let mut staging = self.staging()?;
            let mut walker = LineWalker::new(sizes, strides.clone(), self.dimension);
            walker.seek(range.start);
            for _ in range {
                if stop.is_set() {
                    break;
                }
                let (offsets, position) = (walker.offsets(), walker.coordinates());
                self.process_line(filter, &mut staging, offsets, position, thread)?;
                walker.next_line();
            }
            Ok(())
        })
    }
}

/// Applies `filter` along every dimension where `process` is true, one dimension at a time.
///
/// * `buffer_type` is the sample type the filter sees, for input and output lines alike.
/// * `out_image_type` is the sample type the output is forged with.
/// * `process` selects the dimensions, empty meaning all of them. Dimensions of size 1 are
///   never processed.
/// * `border` and `boundary_conditions` are given per dimension, as a single value for all
///   dimensions or empty for the defaults (no border, [`BoundaryCondition::SymmetricMirror`]).
///
/// Dimensions are processed in order of increasing input stride. When the output type
/// differs from `buffer_type`, the passes before the last one go through an intermediate
/// image of `buffer_type`. An output that shares memory with the input is stripped first.
#[allow(clippy::too_many_arguments)]
pub fn separable(
    input: &Image,
    output: &mut Image,
    buffer_type: DataType,
    out_image_type: DataType,
    process: &[bool],
    border: &[usize],
    boundary_conditions: &[BoundaryCondition],
    filter: &mut dyn SeparableLineFilter,
    options: SeparableOptions,
) -> Result<(), ImageError> {
    if !input.is_forged() {
        return Err(ImageError::NotForged);
    }
    let sizes = input.sizes().to_vec();
    let n_dims = sizes.len();
    let mut process = match process.len() {
        0 => vec![true; n_dims],
        n if n == n_dims => process.to_vec(),
        n => return Err(ImageError::ArrayParameterWrongLength(n, n_dims)),
    };
    let mut border = array_use_parameter(border, n_dims, 0)?;
    let mut boundary_conditions = if border.iter().any(|&b| b > 0) {
        boundary_array_use_parameter(boundary_conditions, n_dims)?
    } else {
        vec![BoundaryCondition::default(); n_dims]
    };

    let mut input = input.clone();
    let pixel_size = input.pixel_size().clone();
    let mut color_space = input.color_space().to_string();
    if output.is_forged() && output.is_overlapping_view(&input) {
        output.strip()?;
    }
    for (p, &s) in process.iter_mut().zip(&sizes) {
        if s == 1 {
            *p = false;
        }
    }

    let mut out_tensor = input.tensor().clone();
    let mut look_up_table = None;
    let mut tensor_to_spatial = false;
    if options.as_scalar_image {
        if !input.is_scalar() {
            input.tensor_to_spatial(None)?;
            process.push(false);
            border.push(0);
            boundary_conditions.push(BoundaryCondition::default());
            tensor_to_spatial = true;
        }
    } else if options.expand_tensor_in_buffer && !input.tensor().has_normal_order() {
        look_up_table = Some(input.tensor().look_up_table());
        out_tensor = Tensor::matrix(input.tensor().rows(), input.tensor().columns())?;
        color_space.clear();
    }

    output.reforge(
        &sizes,
        out_tensor.elements(),
        out_image_type,
        AcceptDataTypeChange::DoAllow,
    )?;
    output.reshape_tensor_like(&out_tensor)?;
    output.set_pixel_size(pixel_size);
    if !color_space.is_empty() {
        output.set_color_space(color_space);
    }
    let mut out_view = output.clone();
    if tensor_to_spatial {
        out_view.tensor_to_spatial(None)?;
    }

    let mut order: Vec<usize> = (0..process.len()).filter(|&d| process[d]).collect();
    if order.is_empty() {
        debug!("separable: no dimension to process, copying");
        if look_up_table.is_some() {
            input.expand_tensor()?;
        }
        return out_view.copy_from(&input);
    }
    order.sort_by_key(|&d| input.strides()[d].unsigned_abs());

    let intermediate = if out_view.data_type() != buffer_type && order.len() > 1 {
        Some(Image::new(
            out_view.sizes().to_vec(),
            out_view.tensor_elements(),
            buffer_type,
        )?)
    } else {
        None
    };

    let max_threads = if options.no_multi_threading {
        1
    } else {
        get_number_of_threads()
    };
    let n_pixels: usize = input.sizes().iter().product();
    let mut operations = 0usize;
    let mut max_lines = 1;
    for &d in &order {
        let line_length = input.sizes()[d];
        let n_lines = n_pixels / line_length;
        max_lines = max_lines.max(n_lines);
        if n_lines > 1 {
            let per_line =
                filter.get_number_of_operations(line_length, input.tensor_elements(), border[d], d);
            operations = operations.saturating_add(n_lines.saturating_mul(per_line));
        }
    }
    let n_threads = threads_for_operations(max_threads, operations).min(max_lines);
    debug!(
        "separable: sizes {:?}, order {order:?}, {n_threads} threads, intermediate: {}",
        input.sizes(),
        intermediate.is_some()
    );
    filter.set_number_of_threads(n_threads);
    let filter: &dyn SeparableLineFilter = &*filter;

    let n_passes = order.len();
    let mut previous: Option<&Image> = None;
    for (pass, &dim) in order.iter().enumerate() {
        let in_img = previous.unwrap_or(&input);
        let out_img = match &intermediate {
            Some(temp) if pass + 1 < n_passes => temp,
            _ => &out_view,
        };
        let lut = if pass == 0 {
            look_up_table.as_deref()
        } else {
            None
        };
        let mut in_use_buffer = in_img.data_type() != buffer_type
            || lut.is_some()
            || border[dim] > 0
            || options.use_input_buffer;
        let out_use_buffer = out_img.data_type() != buffer_type || options.use_output_buffer;
        if !in_use_buffer && !out_use_buffer && in_img.origin_ptr()? == out_img.origin_ptr()? {
            in_use_buffer = !options.can_work_in_place;
        }
        Pass {
            input: in_img,
            output: out_img,
            buffer_type,
            dimension: dim,
            pass,
            n_passes,
            border: border[dim],
            boundary_condition: boundary_conditions[dim],
            look_up_table: lut,
            in_use_buffer,
            out_use_buffer,
            tensor_to_spatial,
        }
        .run(filter, n_threads)?;
        previous = Some(out_img);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threads::PerThread;

    /// out[i] = in[i - 1] + in[i] + in[i + 1]
    struct BoxSum;

    impl SeparableLineFilter for BoxSum {
        fn filter(&self, params: &mut SeparableLineFilterParameters<'_>) -> Result<(), ImageError> {
            let input = params.in_buffer.typed::<f64>()?;
            let mut output = params.out_buffer.typed_mut::<f64>()?;
            for i in 0..output.len() as isize {
                for t in 0..output.tensor_length() {
                    let v = input.get_t(i - 1, t) + input.get_t(i, t) + input.get_t(i + 1, t);
                    output.set_t(i, t, v);
                }
            }
            Ok(())
        }
    }

    fn samples_f64(img: &Image) -> Result<Vec<f64>, ImageError> {
        img.samples::<f64>()
    }

    #[test]
    fn test_box_sum_2d() -> Result<(), ImageError> {
        let input = Image::from_vec(vec![3, 2], 1, vec![1u8, 2, 3, 4, 5, 6])?;
        let mut output = Image::default();
        separable(
            &input,
            &mut output,
            DataType::DFloat,
            DataType::DFloat,
            &[],
            &[1],
            &[BoundaryCondition::AddZeros],
            &mut BoxSum,
            SeparableOptions::new(),
        )?;
        assert_eq!(output.sizes(), &[3, 2]);
        assert_eq!(output.data_type(), DataType::DFloat);
        // rows [1 2 3] [4 5 6] give [3 6 5] [9 15 11], then summed over the two rows
        assert_eq!(samples_f64(&output)?, vec![12.0, 21.0, 16.0, 12.0, 21.0, 16.0]);
        Ok(())
    }

    #[test]
    fn test_process_and_boundary() -> Result<(), ImageError> {
        let input = Image::from_vec(vec![3, 2], 1, vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        let mut output = Image::default();
        separable(
            &input,
            &mut output,
            DataType::DFloat,
            DataType::DFloat,
            &[true, false],
            &[1, 0],
            &[BoundaryCondition::ZeroOrderExtrapolate],
            &mut BoxSum,
            SeparableOptions::new(),
        )?;
        assert_eq!(samples_f64(&output)?, vec![4.0, 6.0, 8.0, 13.0, 15.0, 17.0]);

        let res = separable(
            &input,
            &mut output,
            DataType::DFloat,
            DataType::DFloat,
            &[true, false, true],
            &[],
            &[],
            &mut BoxSum,
            SeparableOptions::new(),
        );
        assert_eq!(res, Err(ImageError::ArrayParameterWrongLength(3, 2)));
        Ok(())
    }

    #[test]
    fn test_intermediate_and_output_type() -> Result<(), ImageError> {
        // three passes, the output type differs from the buffer type
        let input = Image::from_vec(vec![2, 2, 2], 1, vec![10u8; 8])?;
        let mut output = Image::default();
        separable(
            &input,
            &mut output,
            DataType::DFloat,
            DataType::UInt8,
            &[],
            &[1],
            &[BoundaryCondition::AddZeros],
            &mut BoxSum,
            SeparableOptions::new(),
        )?;
        assert_eq!(output.data_type(), DataType::UInt8);
        // 20 per pass along a line of two, 80 after three passes
        assert!(output.samples::<u8>()?.into_iter().all(|v| v == 80));
        Ok(())
    }

    #[test]
    fn test_in_place() -> Result<(), ImageError> {
        let mut image = Image::from_vec(vec![4], 1, vec![1.0f64, 2.0, 3.0, 4.0])?;
        let input = image.clone();
        separable(
            &input,
            &mut image,
            DataType::DFloat,
            DataType::DFloat,
            &[],
            &[1],
            &[BoundaryCondition::Periodic],
            &mut BoxSum,
            SeparableOptions::new(),
        )?;
        assert_eq!(samples_f64(&image)?, vec![7.0, 6.0, 9.0, 8.0]);
        // the input's samples are untouched
        assert_eq!(samples_f64(&input)?, vec![1.0, 2.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn test_as_scalar_image() -> Result<(), ImageError> {
        let input = Image::from_vec(vec![3], 2, vec![1.0f64, 10.0, 2.0, 20.0, 3.0, 30.0])?;
        let mut output = Image::default();
        let mut filter = BoxSum;
        separable(
            &input,
            &mut output,
            DataType::DFloat,
            DataType::DFloat,
            &[],
            &[1],
            &[BoundaryCondition::AddZeros],
            &mut filter,
            SeparableOptions::new().with_as_scalar_image(),
        )?;
        assert_eq!(output.tensor_elements(), 2);
        assert_eq!(
            samples_f64(&output)?,
            vec![3.0, 30.0, 6.0, 60.0, 5.0, 50.0]
        );
        Ok(())
    }

    #[test]
    fn test_nothing_to_process_expands_tensor() -> Result<(), ImageError> {
        let mut input = Image::from_vec(vec![1, 1], 2, vec![3.0f64, 5.0])?;
        input.reshape_tensor_as_diagonal()?;
        let mut output = Image::default();
        separable(
            &input,
            &mut output,
            DataType::DFloat,
            DataType::DFloat,
            &[],
            &[],
            &[],
            &mut BoxSum,
            SeparableOptions::new().with_expand_tensor_in_buffer(),
        )?;
        assert_eq!(output.tensor_elements(), 4);
        assert_eq!(samples_f64(&output)?, vec![3.0, 0.0, 0.0, 5.0]);
        Ok(())
    }

    struct CountLines {
        lines: PerThread<usize>,
        passes: PerThread<Vec<usize>>,
    }

    impl SeparableLineFilter for CountLines {
        fn set_number_of_threads(&mut self, threads: usize) {
            self.lines.reset(threads);
            self.passes.reset(threads);
        }

        fn get_number_of_operations(&self, _: usize, _: usize, _: usize, _: usize) -> usize {
            1_000_000
        }

        fn filter(&self, params: &mut SeparableLineFilterParameters<'_>) -> Result<(), ImageError> {
            *self.lines.lock(params.thread)? += 1;
            let mut passes = self.passes.lock(params.thread)?;
            if !passes.contains(&params.dimension) {
                passes.push(params.dimension);
            }
            let input = params.in_buffer.typed::<f32>()?;
            let mut output = params.out_buffer.typed_mut::<f32>()?;
            for i in 0..output.len() {
                output.set(i, input.get(i) + 1.0);
            }
            Ok(())
        }
    }

    #[test]
    fn test_threads_and_order() -> Result<(), ImageError> {
        let _ = env_logger::builder().is_test(true).try_init();
        let input = Image::new(vec![40, 30], 1, DataType::SFloat)?;
        let mut output = Image::default();
        let mut filter = CountLines {
            lines: PerThread::default(),
            passes: PerThread::default(),
        };
        separable(
            &input,
            &mut output,
            DataType::SFloat,
            DataType::SFloat,
            &[],
            &[],
            &[],
            &mut filter,
            SeparableOptions::new(),
        )?;
        assert_eq!(filter.lines.into_inner().iter().sum::<usize>(), 30 + 40);
        let seen: Vec<usize> = filter.passes.into_inner().into_iter().flatten().collect();
        assert!(seen.contains(&0) && seen.contains(&1));
        assert!(output.samples::<f32>()?.into_iter().all(|v| v == 2.0));
        Ok(())
    }
}
