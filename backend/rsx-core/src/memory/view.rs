use crate::memory::block::Segment;
use std::slice;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("access at offset {offset:#X} with length {length:#X} is outside of view of length {view_len:#X}")]
    OutOfBounds { offset: u32, length: usize, view_len: u32 },
}

#[derive(Debug, Clone)]
enum ViewRepr {
    Simple(Segment),
    Composite(Box<[Segment]>),
}

/// A resolved RSX address range (a "super pointer").
///
/// A simple view is a single span of one backing block and is accessed in place. A composite view
/// stitches several blocks together in increasing address order; contiguous access to it goes
/// through a temporary buffer.
///
/// Views keep their backing blocks alive for as long as they exist.
#[derive(Debug, Clone)]
pub struct View {
    repr: ViewRepr,
    len: u32,
}

impl View {
    pub(crate) fn simple(segment: Segment) -> Self {
        let len = segment.len();
        Self { repr: ViewRepr::Simple(segment), len }
    }

    pub(crate) fn composite(mut segments: Vec<Segment>) -> Self {
        debug_assert!(!segments.is_empty());

        if segments.len() == 1 {
            return Self::simple(segments.remove(0));
        }

        let len = segments.iter().map(Segment::len).sum();
        Self { repr: ViewRepr::Composite(segments.into_boxed_slice()), len }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn is_simple(&self) -> bool {
        matches!(self.repr, ViewRepr::Simple(_))
    }

    /// RSX address of the first byte in the view.
    #[inline]
    #[must_use]
    pub fn address(&self) -> u32 {
        self.segments()[0].address()
    }

    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        match &self.repr {
            ViewRepr::Simple(segment) => slice::from_ref(segment),
            ViewRepr::Composite(segments) => segments,
        }
    }

    /// Whether both views cover exactly the same bytes of the same backing blocks.
    #[must_use]
    pub fn same_memory(&self, other: &View) -> bool {
        self.len == other.len
            && self.segments().len() == other.segments().len()
            && self.segments().iter().zip(other.segments()).all(|(a, b)| a.same_span(b))
    }

    /// A view of `length` bytes starting `offset` bytes into this view, or `None` if that span is
    /// empty or not entirely inside this view.
    #[must_use]
    pub fn subview(&self, offset: u32, length: u32) -> Option<View> {
        if length == 0 || u64::from(offset) + u64::from(length) > u64::from(self.len) {
            return None;
        }

        let end = offset + length;
        let mut segments = Vec::new();
        let mut segment_start = 0;
        for segment in self.segments() {
            let segment_end = segment_start + segment.len();
            if segment_end > offset && segment_start < end {
                let from = offset.max(segment_start);
                let to = end.min(segment_end);
                segments.push(segment.slice(from - segment_start, to - from)?);
            }

            if segment_end >= end {
                break;
            }
            segment_start = segment_end;
        }

        Some(View::composite(segments))
    }

    #[inline]
    #[must_use]
    pub fn truncated(&self, length: u32) -> Option<View> {
        if length == self.len {
            return Some(self.clone());
        }

        self.subview(0, length)
    }

    /// Copy bytes out of the view starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend past the end of the view.
    pub fn read(&self, offset: u32, dst: &mut [u8]) -> Result<(), ViewError> {
        self.check_bounds(offset, dst.len())?;

        self.for_each_overlap(offset, dst.len(), |segment, segment_offset, dst_offset, len| {
            segment.with_bytes(|bytes| {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&bytes[segment_offset..segment_offset + len]);
            });
        });

        Ok(())
    }

    /// Copy bytes into the view starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write would extend past the end of the view.
    pub fn write(&self, offset: u32, src: &[u8]) -> Result<(), ViewError> {
        self.check_bounds(offset, src.len())?;

        self.for_each_overlap(offset, src.len(), |segment, segment_offset, src_offset, len| {
            segment.with_bytes_mut(|bytes| {
                bytes[segment_offset..segment_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            });
        });

        Ok(())
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len as usize);
        for segment in self.segments() {
            segment.with_bytes(|segment_bytes| bytes.extend_from_slice(segment_bytes));
        }
        bytes
    }

    /// Run `f` over the view's bytes as one contiguous slice.
    ///
    /// Simple views are borrowed in place. Composite views are gathered into a temporary buffer.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        match &self.repr {
            ViewRepr::Simple(segment) => segment.with_bytes(f),
            ViewRepr::Composite(_) => f(&self.to_vec()),
        }
    }

    /// Run `f` over the view's bytes as one contiguous mutable slice.
    ///
    /// Simple views are borrowed in place. Composite views are gathered into a temporary buffer
    /// which is scattered back to the backing blocks after `f` returns.
    ///
    /// `f` must not access other views of the same backing blocks; doing so deadlocks.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        match &self.repr {
            ViewRepr::Simple(segment) => segment.with_bytes_mut(f),
            ViewRepr::Composite(segments) => {
                let mut bytes = self.to_vec();
                let result = f(&mut bytes);

                let mut offset = 0;
                for segment in segments {
                    let len = segment.len() as usize;
                    segment.with_bytes_mut(|segment_bytes| {
                        segment_bytes.copy_from_slice(&bytes[offset..offset + len]);
                    });
                    offset += len;
                }

                result
            }
        }
    }

    fn check_bounds(&self, offset: u32, length: usize) -> Result<(), ViewError> {
        if u64::from(offset) + length as u64 > u64::from(self.len) {
            return Err(ViewError::OutOfBounds { offset, length, view_len: self.len });
        }

        Ok(())
    }

    // Calls f(segment, offset into segment, offset into caller buffer, length) for every segment
    // overlapping [offset, offset + length)
    fn for_each_overlap(
        &self,
        offset: u32,
        length: usize,
        mut f: impl FnMut(&Segment, usize, usize, usize),
    ) {
        let start = offset as usize;
        let end = start + length;

        let mut segment_start = 0;
        for segment in self.segments() {
            let segment_end = segment_start + segment.len() as usize;
            if segment_end > start && segment_start < end {
                let from = start.max(segment_start);
                let to = end.min(segment_end);
                f(segment, from - segment_start, from - start, to - from);
            }

            if segment_end >= end {
                break;
            }
            segment_start = segment_end;
        }
    }
}
