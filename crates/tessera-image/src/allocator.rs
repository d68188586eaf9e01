use std::alloc;
use std::alloc::Layout;

use thiserror::Error;

/// Alignment of every buffer handed out by [`CpuAllocator`].
pub const DEFAULT_ALIGNMENT: usize = 16;

/// An error type for image allocator operations.
#[derive(Debug, Error, PartialEq)]
pub enum ImageAllocatorError {
    /// The requested size and alignment do not form a valid layout.
    #[error("Invalid image layout {0}")]
    LayoutError(core::alloc::LayoutError),

    /// The system allocator returned a null pointer.
    #[error("Null pointer")]
    NullPointer,
}

/// A trait for allocating and deallocating memory for image data segments.
///
/// # Safety
///
/// The image allocator must be thread-safe.
pub trait ImageAllocator: Send + Sync {
    /// Allocates zero-initialised memory with the given layout.
    fn alloc_zeroed(&self, layout: Layout) -> Result<*mut u8, ImageAllocatorError>;

    /// Deallocates memory previously returned by `alloc_zeroed` with the same layout.
    fn dealloc(&self, ptr: *mut u8, layout: Layout);
}

/// An image allocator that uses the system allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuAllocator;

impl CpuAllocator {
    /// Builds the layout for `bytes` bytes at the default alignment.
    ///
    /// Zero-byte requests are rounded up to one byte so that every segment owns a real allocation.
    pub fn layout(bytes: usize) -> Result<Layout, ImageAllocatorError> {
        Layout::from_size_align(bytes.max(1), DEFAULT_ALIGNMENT)
            .map_err(ImageAllocatorError::LayoutError)
    }
}

impl ImageAllocator for CpuAllocator {
    /// Allocates zero-initialised memory for an image.
    ///
    /// # Arguments
    ///
    /// * `layout` - The layout of the data segment.
    ///
    /// # Returns
    ///
    /// A non-null pointer to the allocated memory if successful, otherwise an error.
    fn alloc_zeroed(&self, layout: Layout) -> Result<*mut u8, ImageAllocatorError> {
        // SAFETY: `layout` has a non-zero size, see `CpuAllocator::layout`.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            Err(ImageAllocatorError::NullPointer)?
        }
        Ok(ptr)
    }

    #[allow(clippy::not_unsafe_ptr_arg_deref)]
    fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if !ptr.is_null() {
            unsafe { alloc::dealloc(ptr, layout) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_allocator() -> Result<(), ImageAllocatorError> {
        let allocator = CpuAllocator;
        let layout = CpuAllocator::layout(1024)?;
        let ptr = allocator.alloc_zeroed(layout)?;
        assert_eq!(ptr as usize % DEFAULT_ALIGNMENT, 0);
        // SAFETY: the allocation is 1024 bytes long.
        let last = unsafe { *ptr.add(1023) };
        assert_eq!(last, 0);
        allocator.dealloc(ptr, layout);
        Ok(())
    }

    #[test]
    fn test_zero_sized_layout() -> Result<(), ImageAllocatorError> {
        let layout = CpuAllocator::layout(0)?;
        assert_eq!(layout.size(), 1);
        Ok(())
    }
}
