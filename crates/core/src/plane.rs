//! Stride-aware writes of encoded frames into consumer planes.
//!
//! Padding between rows or between elements belongs to the consumer (a shared chroma
//! buffer interleaves U and V with `pixel_stride = 2`), so the writer only ever touches
//! element bytes and skips everything in between. Writes stop at a plane's capacity and
//! report truncation instead of failing.

use smallvec::SmallVec;

use crate::buffer::PlaneMut;
use crate::format::{Resolution, WireFormat, chroma_dims};

/// Errors raised before any destination byte is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaneError {
    /// The request carried no destination planes.
    #[error("no destination planes")]
    NoPlanes,
    /// The format cannot be laid out over this many planes.
    #[error("{format} cannot be written into {planes} plane(s)")]
    PlaneCount { format: WireFormat, planes: usize },
    /// Encoded source buffer is smaller than its declared geometry.
    #[error("encoded data too short: need {required} bytes, have {actual}")]
    SourceTooShort { required: usize, actual: usize },
    /// The source buffer does not hold a planar 4:2:0 frame.
    #[error("{0} is not a planar 4:2:0 format")]
    NotYuv(WireFormat),
    /// Destination strides address more bytes than fit in `usize`.
    #[error("destination stride {row_stride}/{pixel_stride} overflows the address space")]
    StrideOverflow { row_stride: usize, pixel_stride: usize },
}

/// Outcome for one destination plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneWrite {
    /// Every element landed.
    Complete { bytes: usize },
    /// Capacity ran out; `bytes` of `required` payload bytes were written.
    Truncated { bytes: usize, required: usize },
}

impl PlaneWrite {
    /// Payload bytes written (padding excluded).
    pub fn bytes(&self) -> usize {
        match *self {
            PlaneWrite::Complete { bytes } | PlaneWrite::Truncated { bytes, .. } => bytes,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, PlaneWrite::Truncated { .. })
    }

    /// Combine two writes that targeted regions of the same destination plane.
    pub fn merge(self, other: PlaneWrite) -> PlaneWrite {
        let bytes = self.bytes() + other.bytes();
        let required = self.required() + other.required();
        if self.is_truncated() || other.is_truncated() {
            PlaneWrite::Truncated { bytes, required }
        } else {
            PlaneWrite::Complete { bytes }
        }
    }

    fn required(&self) -> usize {
        match *self {
            PlaneWrite::Complete { bytes } => bytes,
            PlaneWrite::Truncated { required, .. } => required,
        }
    }
}

/// Per-plane results of a frame write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub planes: SmallVec<[PlaneWrite; 3]>,
}

impl WriteReport {
    /// Total payload bytes written across planes.
    pub fn bytes_written(&self) -> usize {
        self.planes.iter().map(PlaneWrite::bytes).sum()
    }

    /// True when any plane was truncated.
    pub fn is_degraded(&self) -> bool {
        self.planes.iter().any(PlaneWrite::is_truncated)
    }
}

/// Read-side geometry of one plane inside an encoded buffer.
#[derive(Debug, Clone, Copy)]
pub struct PlaneSource<'a> {
    pub data: &'a [u8],
    pub offset: usize,
    pub row_stride: usize,
    pub pixel_stride: usize,
    /// Bytes per element (a pixel for packed formats, a sample or sample pair for YUV).
    pub elem_size: usize,
    pub cols: usize,
    pub rows: usize,
}

impl<'a> PlaneSource<'a> {
    /// Tightly packed plane starting at `offset`.
    pub fn packed(data: &'a [u8], offset: usize, cols: usize, rows: usize, elem_size: usize) -> Self {
        Self {
            data,
            offset,
            row_stride: cols * elem_size,
            pixel_stride: elem_size,
            elem_size,
            cols,
            rows,
        }
    }

    fn payload_len(&self) -> usize {
        self.cols * self.rows * self.elem_size
    }

    fn required_len(&self) -> usize {
        if self.cols == 0 || self.rows == 0 {
            return self.offset;
        }
        self.offset
            + (self.rows - 1) * self.row_stride
            + (self.cols - 1) * self.pixel_stride
            + self.elem_size
    }

    fn is_tight(&self) -> bool {
        self.pixel_stride == self.elem_size && self.row_stride == self.cols * self.elem_size
    }
}

/// Copy one source plane into one destination plane.
///
/// The destination strides are widened to at least the element size and row span, so a
/// zero or undersized stride behaves like a tightly packed plane.
pub fn copy_plane(src: &PlaneSource<'_>, dst: &mut PlaneMut<'_>) -> Result<PlaneWrite, PlaneError> {
    let required_src = src.required_len();
    if src.data.len() < required_src {
        return Err(PlaneError::SourceTooShort {
            required: required_src,
            actual: src.data.len(),
        });
    }
    let required = src.payload_len();
    if required == 0 {
        return Ok(PlaneWrite::Complete { bytes: 0 });
    }

    let elem = src.elem_size;
    let px = dst.pixel_stride().max(elem);
    let overflow = PlaneError::StrideOverflow {
        row_stride: dst.stride(),
        pixel_stride: dst.pixel_stride(),
    };
    let row_span = (src.cols - 1)
        .checked_mul(px)
        .and_then(|span| span.checked_add(elem))
        .ok_or(overflow.clone())?;
    let row = dst.stride().max(row_span);
    // Every destination offset below stays within this extent.
    (src.rows - 1)
        .checked_mul(row)
        .and_then(|last| last.checked_add(row_span))
        .ok_or(overflow)?;
    let cap = dst.capacity();
    let out = dst.data();

    if src.is_tight() && px == elem && row == row_span {
        let n = required.min(cap);
        out[..n].copy_from_slice(&src.data[src.offset..src.offset + n]);
        return Ok(finish(n, required));
    }

    let mut written = 0usize;
    if px == elem && src.pixel_stride == elem {
        for r in 0..src.rows {
            let d = r * row;
            if d >= cap {
                break;
            }
            let n = row_span.min(cap - d);
            let s = src.offset + r * src.row_stride;
            out[d..d + n].copy_from_slice(&src.data[s..s + n]);
            written += n;
            if n < row_span {
                break;
            }
        }
        return Ok(finish(written, required));
    }

    'rows: for r in 0..src.rows {
        let d_row = r * row;
        let s_row = src.offset + r * src.row_stride;
        for c in 0..src.cols {
            let d = d_row + c * px;
            if d + elem > cap {
                break 'rows;
            }
            let s = s_row + c * src.pixel_stride;
            out[d..d + elem].copy_from_slice(&src.data[s..s + elem]);
            written += elem;
        }
    }
    Ok(finish(written, required))
}

fn finish(bytes: usize, required: usize) -> PlaneWrite {
    if bytes < required {
        log::warn!("plane truncated: wrote {bytes} of {required} bytes");
        PlaneWrite::Truncated { bytes, required }
    } else {
        PlaneWrite::Complete { bytes }
    }
}

/// Write a packed (single plane) frame. Only the first destination plane is used.
pub fn write_packed(
    bytes: &[u8],
    res: Resolution,
    format: WireFormat,
    planes: &mut [PlaneMut<'_>],
) -> Result<WriteReport, PlaneError> {
    let Some(bpp) = format.bytes_per_pixel() else {
        return Err(PlaneError::PlaneCount {
            format,
            planes: planes.len(),
        });
    };
    let dst = match planes {
        [] => return Err(PlaneError::NoPlanes),
        [dst] => dst,
        _ => {
            return Err(PlaneError::PlaneCount {
                format,
                planes: planes.len(),
            });
        }
    };
    let src = PlaneSource::packed(bytes, 0, res.w(), res.h(), bpp);
    let written = copy_plane(&src, dst)?;
    Ok(WriteReport {
        planes: smallvec::smallvec![written],
    })
}

/// Write an opaque byte stream (compressed stills) into the first plane.
pub fn write_stream(bytes: &[u8], planes: &mut [PlaneMut<'_>]) -> Result<WriteReport, PlaneError> {
    let Some(dst) = planes.first_mut() else {
        return Err(PlaneError::NoPlanes);
    };
    let src = PlaneSource::packed(bytes, 0, bytes.len(), 1, 1);
    let mut flat = PlaneMut::new(dst.data(), 0, 1);
    let written = copy_plane(&src, &mut flat)?;
    Ok(WriteReport {
        planes: smallvec::smallvec![written],
    })
}

/// Encoded 4:2:0 frame in either NV21 or three-plane layout.
#[derive(Debug, Clone, Copy)]
pub struct YuvSource<'a> {
    data: &'a [u8],
    res: Resolution,
    format: WireFormat,
}

impl<'a> YuvSource<'a> {
    /// Wrap an encoded buffer, validating its length against the format.
    pub fn new(data: &'a [u8], res: Resolution, format: WireFormat) -> Result<Self, PlaneError> {
        if !format.is_yuv() {
            return Err(PlaneError::NotYuv(format));
        }
        let required = format.frame_len(res).unwrap_or(0);
        if data.len() < required {
            return Err(PlaneError::SourceTooShort {
                required,
                actual: data.len(),
            });
        }
        Ok(Self { data, res, format })
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    fn luma(&self) -> PlaneSource<'a> {
        PlaneSource::packed(self.data, 0, self.res.w(), self.res.h(), 1)
    }

    fn chroma(&self, v: bool) -> PlaneSource<'a> {
        let (cw, ch) = chroma_dims(self.res);
        let base = self.res.pixels();
        match self.format {
            WireFormat::Nv21 => PlaneSource {
                data: self.data,
                offset: base + usize::from(!v),
                row_stride: cw * 2,
                pixel_stride: 2,
                elem_size: 1,
                cols: cw,
                rows: ch,
            },
            _ => {
                let quarter = self.res.pixels() / 4;
                let offset = if v { base + quarter } else { base };
                PlaneSource::packed(self.data, offset, cw, ch, 1)
            }
        }
    }

    /// V/U pairs as two-byte elements; only NV21 stores them that way.
    fn interleaved_vu(&self) -> Option<PlaneSource<'a>> {
        let (cw, ch) = chroma_dims(self.res);
        (self.format == WireFormat::Nv21)
            .then(|| PlaneSource::packed(self.data, self.res.pixels(), cw, ch, 2))
    }
}

/// Write a 4:2:0 frame into one, two or three destination planes.
///
/// - one plane: the source's own layout, with the plane's row stride applied to luma
///   and chroma rows alike;
/// - two planes: luma, then interleaved V/U;
/// - three planes: luma, U, V, each with independent row and pixel strides.
pub fn write_yuv420(src: &YuvSource<'_>, planes: &mut [PlaneMut<'_>]) -> Result<WriteReport, PlaneError> {
    let mut report = WriteReport::default();
    match planes {
        [] => return Err(PlaneError::NoPlanes),
        [single] => {
            report.planes.push(write_single_plane(src, single)?);
        }
        [y, vu] => {
            report.planes.push(copy_plane(&src.luma(), y)?);
            report.planes.push(write_interleaved_vu(src, vu.reborrow())?);
        }
        [y, u, v, ..] => {
            report.planes.push(copy_plane(&src.luma(), y)?);
            report.planes.push(copy_plane(&src.chroma(false), u)?);
            report.planes.push(copy_plane(&src.chroma(true), v)?);
        }
    }
    Ok(report)
}

fn write_single_plane(src: &YuvSource<'_>, plane: &mut PlaneMut<'_>) -> Result<PlaneWrite, PlaneError> {
    let width = src.res.w();
    let row = plane.stride().max(width);
    let luma_region = row * src.res.h();
    let (mut luma, chroma) = PlaneMut::new(plane.data(), row, 1).split_at(luma_region);
    let written = copy_plane(&src.luma(), &mut luma)?;
    match src.format {
        WireFormat::Nv21 => {
            let chroma = PlaneMut::new(chroma.into_data(), row, 2);
            Ok(written.merge(write_interleaved_vu(src, chroma)?))
        }
        _ => {
            let (_, ch) = chroma_dims(src.res);
            let chroma_row = row / 2;
            let (mut u, mut v) =
                PlaneMut::new(chroma.into_data(), chroma_row, 1).split_at(chroma_row * ch);
            let written = written.merge(copy_plane(&src.chroma(false), &mut u)?);
            Ok(written.merge(copy_plane(&src.chroma(true), &mut v)?))
        }
    }
}

fn write_interleaved_vu(src: &YuvSource<'_>, mut plane: PlaneMut<'_>) -> Result<PlaneWrite, PlaneError> {
    let px = plane.pixel_stride().max(2);
    if px == 2
        && let Some(pairs) = src.interleaved_vu()
    {
        return copy_plane(&pairs, &mut plane);
    }
    // V owns slot 0 of every element and U slot 1; each pass skips the other's bytes.
    // Both passes share the row pitch of a whole V/U pair.
    let (cw, _) = chroma_dims(src.res);
    let pair_span = cw.saturating_sub(1).saturating_mul(px).saturating_add(2);
    let row = plane.stride().max(pair_span);
    let data = plane.data();
    let v = copy_plane(&src.chroma(true), &mut PlaneMut::new(&mut *data, row, px))?;
    let u_data = data.get_mut(1..).unwrap_or(&mut []);
    let u = copy_plane(&src.chroma(false), &mut PlaneMut::new(u_data, row, px))?;
    Ok(v.merge(u))
}
