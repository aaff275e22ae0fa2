use smallvec::{SmallVec, smallvec};
use std::sync::{Arc, Mutex, PoisonError};

use crate::{format::MediaFormat, metrics::Metrics};

/// Consumer-owned memory exposed as writable planes.
///
/// Hosts implement this for whatever buffer type their camera consumer hands over
/// (preview byte arrays, image plane sets, hardware buffers). Views are only borrowed
/// for the duration of a single write.
pub trait PlaneTarget {
    /// Borrow every destination plane, in wire order.
    fn planes_mut(&mut self) -> SmallVec<[PlaneMut<'_>; 3]>;
}

/// Metadata associated with a frame.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::{ColorSpace, FourCc, FrameMeta, MediaFormat, Resolution};
///
/// let res = Resolution::new(640, 480).unwrap();
/// let fmt = MediaFormat::new(FourCc::new(*b"RGBA"), res, ColorSpace::Srgb);
/// let meta = FrameMeta::new(fmt, 123);
/// assert_eq!(meta.sequence, 123);
/// ```
#[derive(Debug, Clone)]
pub struct FrameMeta {
    /// Format describing layout and resolution.
    pub format: MediaFormat,
    /// Monotonic synthesis sequence number.
    pub sequence: u64,
}

impl FrameMeta {
    /// Create metadata with the given format and sequence number.
    pub fn new(format: MediaFormat, sequence: u64) -> Self {
        Self { format, sequence }
    }
}

/// Handle to a pooled buffer.
///
/// When dropped, the buffer is returned to the originating pool so later frames
/// can reuse memory without reallocations.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_capacity(2, 1024);
/// let mut lease = pool.lease();
/// lease.resize(16);
/// assert_eq!(lease.len(), 16);
/// ```
pub struct BufferLease {
    pool: Arc<PoolInner>,
    buf: Option<Vec<u8>>,
}

impl BufferLease {
    /// Borrow as an immutable slice.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }

    /// Borrow as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }

    /// Current length of the buffer.
    pub fn len(&self) -> usize {
        self.buf.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ensure the buffer capacity fits `len` bytes and set its length.
    pub fn resize(&mut self, len: usize) {
        if let Some(buf) = self.buf.as_mut() {
            buf.resize(len, 0);
        }
    }

    /// Replace the leased backing buffer with an owned `Vec<u8>`.
    ///
    /// Encoders that already produced a `Vec<u8>` hand it off without another copy.
    pub fn replace_owned(&mut self, buf: Vec<u8>) {
        if let Some(old) = self.buf.take() {
            self.pool.recycle(old);
        }
        self.buf = Some(buf);
    }

    fn take(mut self) -> Vec<u8> {
        self.buf.take().unwrap_or_default()
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.recycle(buf);
        }
    }
}

/// Simple buffer pool that hands out reusable owned buffers.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_limits(4, 1 << 20, 8);
/// let _lease = pool.lease();
/// ```
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
    metrics: Arc<Metrics>,
}

impl BufferPool {
    /// Create a pool with `capacity` preallocated buffers of `chunk_size` bytes.
    pub fn with_capacity(capacity: usize, chunk_size: usize) -> Self {
        Self::with_limits(capacity, chunk_size, capacity)
    }

    /// Create a pool with `capacity` preallocated buffers and a maximum retained free list.
    pub fn with_limits(capacity: usize, chunk_size: usize, max_free: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(Vec::with_capacity(chunk_size));
        }
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                chunk_size,
                max_free,
            }),
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Acquire a buffer, allocating if the pool is empty.
    pub fn lease(&self) -> BufferLease {
        let buf = self
            .inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .inspect(|_| {
                self.metrics.hit();
            })
            .unwrap_or_else(|| {
                self.metrics.miss();
                self.metrics.alloc();
                Vec::with_capacity(self.inner.chunk_size)
            });
        BufferLease {
            pool: self.inner.clone(),
            buf: Some(buf),
        }
    }

    /// Access metrics counters for this pool.
    pub fn metrics(&self) -> BufferPoolMetrics {
        BufferPoolMetrics(self.metrics.clone())
    }
}

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    chunk_size: usize,
    max_free: usize,
}

impl PoolInner {
    fn recycle(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_free {
            free.push(buf);
        }
    }
}

/// Observability for buffer pool behavior.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_capacity(1, 128);
/// let metrics = pool.metrics();
/// let _ = metrics.hits();
/// ```
#[derive(Clone)]
pub struct BufferPoolMetrics(Arc<Metrics>);

impl BufferPoolMetrics {
    pub fn hits(&self) -> u64 {
        self.0.hits()
    }

    pub fn misses(&self) -> u64 {
        self.0.misses()
    }

    pub fn allocations(&self) -> u64 {
        self.0.allocations()
    }
}

/// Grow `buf` to exactly `len` bytes without aborting on allocation failure.
///
/// Returns `false` when the allocator refuses the reservation; `buf` is left empty in
/// that case.
pub fn try_resize(buf: &mut Vec<u8>, len: usize) -> bool {
    if buf.capacity() < len {
        buf.clear();
        if buf.try_reserve_exact(len).is_err() {
            return false;
        }
    }
    buf.resize(len, 0);
    true
}

/// Plane view over a buffer.
///
/// Accessed via `FrameLease::planes`.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> Plane<'a> {
    /// Access the raw bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Stride in bytes for this plane.
    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Mutable destination plane: borrowed consumer memory plus its geometry.
///
/// `row_stride` is the byte distance between rows, `pixel_stride` the byte distance
/// between consecutive elements of a row. Capacity is the slice length.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::PlaneMut;
///
/// let mut chroma = vec![0u8; 8];
/// let plane = PlaneMut::new(&mut chroma, 4, 2);
/// assert_eq!(plane.capacity(), 8);
/// assert_eq!(plane.pixel_stride(), 2);
/// ```
#[derive(Debug)]
pub struct PlaneMut<'a> {
    data: &'a mut [u8],
    row_stride: usize,
    pixel_stride: usize,
}

impl<'a> PlaneMut<'a> {
    /// Wrap consumer memory.
    pub fn new(data: &'a mut [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Mutable access to plane bytes.
    pub fn data(&mut self) -> &mut [u8] {
        self.data
    }

    /// Read access to plane bytes.
    pub fn bytes(&self) -> &[u8] {
        self.data
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.row_stride
    }

    /// Distance in bytes between consecutive elements in a row.
    pub fn pixel_stride(&self) -> usize {
        self.pixel_stride
    }

    /// Declared capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Give up the geometry and keep the borrowed bytes.
    pub fn into_data(self) -> &'a mut [u8] {
        self.data
    }

    /// Reborrow with a shorter lifetime.
    pub fn reborrow(&mut self) -> PlaneMut<'_> {
        PlaneMut {
            data: &mut *self.data,
            row_stride: self.row_stride,
            pixel_stride: self.pixel_stride,
        }
    }

    /// Split into two planes at `mid`, both inheriting this plane's geometry.
    pub fn split_at(self, mid: usize) -> (PlaneMut<'a>, PlaneMut<'a>) {
        let mid = mid.min(self.data.len());
        let (head, tail) = self.data.split_at_mut(mid);
        (
            PlaneMut::new(head, self.row_stride, self.pixel_stride),
            PlaneMut::new(tail, self.row_stride, self.pixel_stride),
        )
    }
}

impl PlaneTarget for [PlaneMut<'_>] {
    fn planes_mut(&mut self) -> SmallVec<[PlaneMut<'_>; 3]> {
        self.iter_mut().map(PlaneMut::reborrow).collect()
    }
}

/// Plane layout information stored with a frame.
///
/// # Example
/// ```rust
/// use std::num::NonZeroU32;
/// use fauxcam_core::prelude::plane_layout_from_dims;
///
/// let layout = plane_layout_from_dims(
///     NonZeroU32::new(4).unwrap(),
///     NonZeroU32::new(4).unwrap(),
///     3,
/// );
/// assert_eq!(layout.stride, 12);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PlaneLayout {
    /// Byte offset into the owning buffer.
    pub offset: usize,
    /// Length of the plane in bytes.
    pub len: usize,
    /// Row stride in bytes.
    pub stride: usize,
    /// Element stride in bytes.
    pub pixel_stride: usize,
}

/// Owned frame holding one or more planes plus metadata.
///
/// # Example
/// ```rust
/// use fauxcam_core::prelude::*;
///
/// let pool = BufferPool::with_capacity(1, 256);
/// let res = Resolution::new(4, 4).unwrap();
/// let fmt = MediaFormat::new(FourCc::new(*b"RGBA"), res, ColorSpace::Srgb);
/// let layout = plane_layout_from_dims(res.width, res.height, 4);
/// let frame = FrameLease::single_plane(FrameMeta::new(fmt, 0), pool.lease(), layout);
/// assert_eq!(frame.planes().len(), 1);
/// ```
pub struct FrameLease {
    meta: FrameMeta,
    buffers: SmallVec<[BufferLease; 3]>,
    layouts: SmallVec<[PlaneLayout; 3]>,
}

impl FrameLease {
    /// Construct a single-plane frame using the provided buffer.
    pub fn single_plane(meta: FrameMeta, mut buffer: BufferLease, layout: PlaneLayout) -> Self {
        let needed = layout.offset + layout.len;
        if buffer.len() < needed {
            buffer.resize(needed);
        }
        Self {
            meta,
            layouts: smallvec![layout],
            buffers: smallvec![buffer],
        }
    }

    /// Construct a multi-plane frame from a list of buffers and layouts.
    pub fn multi_plane(
        meta: FrameMeta,
        buffers: SmallVec<[BufferLease; 3]>,
        layouts: SmallVec<[PlaneLayout; 3]>,
    ) -> Self {
        debug_assert_eq!(buffers.len(), layouts.len());
        Self {
            meta,
            buffers,
            layouts,
        }
    }

    /// Metadata describing this frame.
    pub fn meta(&self) -> &FrameMeta {
        &self.meta
    }

    /// Iterate planes as borrowed slices.
    pub fn planes(&self) -> SmallVec<[Plane<'_>; 3]> {
        self.layouts
            .iter()
            .zip(self.buffers.iter())
            .map(|(layout, buf)| {
                let slice = buf
                    .as_slice()
                    .get(layout.offset..layout.offset + layout.len)
                    .unwrap_or(&[]);
                Plane {
                    data: slice,
                    stride: layout.stride,
                }
            })
            .collect()
    }

    /// Return a copy of plane layouts.
    pub fn layouts(&self) -> SmallVec<[PlaneLayout; 3]> {
        self.layouts.clone()
    }

    /// Convert into owned buffers and metadata.
    pub fn into_parts(self) -> (FrameMeta, SmallVec<[Vec<u8>; 3]>) {
        let buffers = self.buffers.into_iter().map(|lease| lease.take()).collect();
        (self.meta, buffers)
    }
}

impl PlaneTarget for FrameLease {
    fn planes_mut(&mut self) -> SmallVec<[PlaneMut<'_>; 3]> {
        self.layouts
            .iter()
            .zip(self.buffers.iter_mut())
            .map(|(layout, buf)| {
                let end = layout.offset + layout.len;
                if buf.len() < end {
                    buf.resize(end);
                }
                let slice = buf
                    .as_mut_slice()
                    .get_mut(layout.offset..end)
                    .unwrap_or(&mut []);
                PlaneMut::new(slice, layout.stride, layout.pixel_stride)
            })
            .collect()
    }
}

/// Helper for building tightly packed geometry consistently.
///
/// # Example
/// ```rust
/// use std::num::NonZeroU32;
/// use fauxcam_core::prelude::plane_layout_from_dims;
///
/// let layout = plane_layout_from_dims(
///     NonZeroU32::new(2).unwrap(),
///     NonZeroU32::new(3).unwrap(),
///     4,
/// );
/// assert_eq!(layout.len, 24);
/// ```
pub fn plane_layout_from_dims(
    width: std::num::NonZeroU32,
    height: std::num::NonZeroU32,
    bytes_per_pixel: usize,
) -> PlaneLayout {
    let stride = width.get() as usize * bytes_per_pixel;
    let len = stride * height.get() as usize;
    PlaneLayout {
        offset: 0,
        len,
        stride,
        pixel_stride: bytes_per_pixel,
    }
}

/// Layout for an opaque byte stream (compressed payloads).
pub fn plane_layout_for_bytes(len: usize) -> PlaneLayout {
    PlaneLayout {
        offset: 0,
        len,
        stride: len,
        pixel_stride: 1,
    }
}
