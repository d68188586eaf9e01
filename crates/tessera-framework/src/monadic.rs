//! Line filters that apply a scalar function to every sample.

use std::marker::PhantomData;

use tessera_image::{ImageError, Sample};

use crate::scan::{ScanLineFilter, ScanLineFilterParameters};

/// Applies `Fn(T) -> T` to every sample of a line.
pub struct MonadicScanLineFilter<T, F> {
    func: F,
    cost: usize,
    _marker: PhantomData<fn(T) -> T>,
}

/// A [`MonadicScanLineFilter`] for `func`, costing `cost` cycles per sample.
pub fn new_monadic_scan_line_filter<T, F>(func: F, cost: usize) -> MonadicScanLineFilter<T, F>
where
    T: Sample,
    F: Fn(T) -> T + Sync,
{
    MonadicScanLineFilter {
        func,
        cost,
        _marker: PhantomData,
    }
}

impl<T, F> ScanLineFilter for MonadicScanLineFilter<T, F>
where
    T: Sample,
    F: Fn(T) -> T + Sync,
{
    fn get_number_of_operations(&self, _: usize, _: usize, n_tensor_elements: usize) -> usize {
        self.cost * n_tensor_elements
    }

    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        let input = params.in_buffer[0].typed::<T>()?;
        let mut output = params.out_buffer[0].typed_mut::<T>()?;
        let n_t = output.tensor_length();
        let broadcast_tensor = input.tensor_length() == 1;
        for i in 0..params.buffer_length as isize {
            for t in 0..n_t {
                let v = input.get_t(i, if broadcast_tensor { 0 } else { t });
                output.set_t(i, t, (self.func)(v));
            }
        }
        Ok(())
    }
}

/// Applies `Fn(T, T) -> T` to pairs of samples of two input lines.
pub struct DyadicScanLineFilter<T, F> {
    func: F,
    cost: usize,
    _marker: PhantomData<fn(T, T) -> T>,
}

/// A [`DyadicScanLineFilter`] for `func`, costing `cost` cycles per sample.
pub fn new_dyadic_scan_line_filter<T, F>(func: F, cost: usize) -> DyadicScanLineFilter<T, F>
where
    T: Sample,
    F: Fn(T, T) -> T + Sync,
{
    DyadicScanLineFilter {
        func,
        cost,
        _marker: PhantomData,
    }
}

impl<T, F> ScanLineFilter for DyadicScanLineFilter<T, F>
where
    T: Sample,
    F: Fn(T, T) -> T + Sync,
{
    fn get_number_of_operations(&self, _: usize, _: usize, n_tensor_elements: usize) -> usize {
        self.cost * n_tensor_elements
    }

    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        let lhs = params.in_buffer[0].typed::<T>()?;
        let rhs = params.in_buffer[1].typed::<T>()?;
        let mut output = params.out_buffer[0].typed_mut::<T>()?;
        for i in 0..params.buffer_length as isize {
            for t in 0..output.tensor_length() {
                let a = lhs.get_t(i, t.min(lhs.tensor_length() - 1));
                let b = rhs.get_t(i, t.min(rhs.tensor_length() - 1));
                output.set_t(i, t, (self.func)(a, b));
            }
        }
        Ok(())
    }
}

/// Applies `Fn(&[T]) -> T` to the samples of any number of input lines.
pub struct VariadicScanLineFilter<T, F> {
    func: F,
    cost: usize,
    _marker: PhantomData<fn(&[T]) -> T>,
}

/// A [`VariadicScanLineFilter`] for `func`, costing `cost` cycles per sample.
pub fn new_variadic_scan_line_filter<T, F>(func: F, cost: usize) -> VariadicScanLineFilter<T, F>
where
    T: Sample,
    F: Fn(&[T]) -> T + Sync,
{
    VariadicScanLineFilter {
        func,
        cost,
        _marker: PhantomData,
    }
}

impl<T, F> ScanLineFilter for VariadicScanLineFilter<T, F>
where
    T: Sample,
    F: Fn(&[T]) -> T + Sync,
{
    fn get_number_of_operations(&self, n_in: usize, _: usize, n_tensor_elements: usize) -> usize {
        self.cost * n_in.max(1) * n_tensor_elements
    }

    fn filter(&self, params: &mut ScanLineFilterParameters<'_>) -> Result<(), ImageError> {
        let inputs = params
            .in_buffer
            .iter()
            .map(|b| b.typed::<T>())
            .collect::<Result<Vec<_>, _>>()?;
        let mut output = params.out_buffer[0].typed_mut::<T>()?;
        let mut values = vec![T::default(); inputs.len()];
        for i in 0..params.buffer_length as isize {
            for t in 0..output.tensor_length() {
                for (v, input) in values.iter_mut().zip(&inputs) {
                    *v = input.get_t(i, t.min(input.tensor_length() - 1));
                }
                output.set_t(i, t, (self.func)(&values));
            }
        }
        Ok(())
    }
}
