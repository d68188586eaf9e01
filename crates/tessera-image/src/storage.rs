//! Reference-counted data segments backing forged images.

use std::{alloc::Layout, fmt, ptr::NonNull, sync::Arc};

use crate::{
    allocator::{CpuAllocator, ImageAllocator, ImageAllocatorError},
    data_type::DataType,
    error::ImageError,
    sample::Sample,
    tensor::Tensor,
};

static NEXT_SEGMENT_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

/// Callback invoked when an external data segment is released.
pub type ReleaseFn = Box<dyn FnOnce() + Send + Sync>;

enum Backing {
    /// Memory obtained from an [`ImageAllocator`].
    Allocated {
        allocator: Arc<dyn ImageAllocator>,
        layout: Layout,
    },
    /// Memory owned by someone else, with an optional release callback.
    External { release: Option<ReleaseFn> },
}

struct SegmentImpl {
    ptr: NonNull<u8>,
    len: usize,
    id: u64,
    backing: Backing,
}

impl Drop for SegmentImpl {
    fn drop(&mut self) {
        match &mut self.backing {
            Backing::Allocated { allocator, layout } => {
                allocator.dealloc(self.ptr.as_ptr(), *layout);
            }
            Backing::External { release } => {
                if let Some(release) = release.take() {
                    release();
                }
            }
        }
    }
}

/// A shared handle to one block of sample memory.
///
/// Cloning a segment is cheap: it increments a reference count. The memory is released
/// when the last handle is dropped. Images that share a segment are views of each other.
#[derive(Clone)]
pub struct DataSegment {
    inner: Arc<SegmentImpl>,
}

// SAFETY: the segment is a plain block of bytes. Reading and writing it is done through raw
// pointers by the image that owns the handle, and concurrent writes are partitioned by the
// processing frameworks so that no two threads write the same sample.
unsafe impl Send for DataSegment {}

// SAFETY: see the `Send` impl above; the handle itself only exposes the pointer value.
unsafe impl Sync for DataSegment {}

impl DataSegment {
    /// Allocates a zero-initialised segment of `bytes` bytes with the default allocator.
    pub fn allocate(bytes: usize) -> Result<Self, ImageError> {
        Self::allocate_with(Arc::new(CpuAllocator), bytes)
    }

    /// Allocates a zero-initialised segment of `bytes` bytes with the given allocator.
    pub fn allocate_with(
        allocator: Arc<dyn ImageAllocator>,
        bytes: usize,
    ) -> Result<Self, ImageError> {
        let layout = CpuAllocator::layout(bytes)?;
        let ptr = allocator.alloc_zeroed(layout)?;
        let ptr = NonNull::new(ptr).ok_or(ImageAllocatorError::NullPointer)?;
        Ok(Self::from_parts(
            ptr,
            bytes,
            Backing::Allocated { allocator, layout },
        ))
    }

    /// Creates a segment holding a copy of the samples in `data`.
    pub fn from_vec<T: Sample>(data: Vec<T>) -> Result<Self, ImageError> {
        let bytes = std::mem::size_of_val(data.as_slice());
        let segment = Self::allocate(bytes)?;
        // SAFETY: the new segment is at least `bytes` long and does not overlap `data`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr() as *const u8,
                segment.as_ptr(),
                bytes,
            );
        }
        Ok(segment)
    }

    /// Wraps externally owned memory.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` is valid for reads and writes of `len` bytes, suitably
    /// aligned for the sample type that will be stored, and that it stays valid until
    /// `release` is called (or forever, if `release` is `None`).
    pub unsafe fn from_external(
        ptr: *mut u8,
        len: usize,
        release: Option<ReleaseFn>,
    ) -> Result<Self, ImageError> {
        let ptr = NonNull::new(ptr).ok_or(ImageAllocatorError::NullPointer)?;
        Ok(Self::from_parts(ptr, len, Backing::External { release }))
    }

    fn from_parts(ptr: NonNull<u8>, len: usize, backing: Backing) -> Self {
        let id = NEXT_SEGMENT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Self {
            inner: Arc::new(SegmentImpl {
                ptr,
                len,
                id,
                backing,
            }),
        }
    }

    /// Pointer to the first byte of the segment.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.inner.ptr.as_ptr()
    }

    /// Length of the segment in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// True if the segment has no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// A number unique to this allocation, never reused within the process.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// True if more than one handle refers to this segment.
    #[inline]
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }

    /// True if the memory is owned by someone else.
    pub fn is_external(&self) -> bool {
        matches!(self.inner.backing, Backing::External { .. })
    }

    /// True if both handles refer to the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &DataSegment) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for DataSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSegment")
            .field("ptr", &self.inner.ptr)
            .field("len", &self.inner.len)
            .field("id", &self.inner.id)
            .field("external", &self.is_external())
            .field("shared", &self.is_shared())
            .finish()
    }
}

/// The memory block an [`ExternalInterface`] hands to an image being forged.
#[derive(Debug)]
pub struct ExternalAllocation {
    /// The data segment.
    pub segment: DataSegment,
    /// Byte offset of the sample at coordinates `(0, 0, ...)` within the segment.
    pub origin: usize,
}

/// A hook that lets a host environment provide the memory of forged images.
///
/// `allocate` receives the properties of the image being forged and may change the strides
/// and the tensor stride to match the layout it uses. Returning `Ok(None)` declines the
/// request, and the image is then allocated in the usual way.
pub trait ExternalInterface: Send + Sync {
    /// Provides the data segment for an image.
    fn allocate(
        &self,
        data_type: DataType,
        sizes: &[usize],
        strides: &mut Vec<isize>,
        tensor: &Tensor,
        tensor_stride: &mut isize,
    ) -> Result<Option<ExternalAllocation>, ImageError>;
}
