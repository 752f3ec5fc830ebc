// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;

/// An offset + size pair describing a byte range of the source file.
///
/// The container determines which byte ranges it needs to satisfy a stream
/// request and describes them as a `&[SourceSlice]`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SourceSlice {
    /// Offset into the source file.
    pub offset: u64,
    /// Size of the slice.
    pub size: usize,
}

/// The interface through which container data is read.
///
/// MSF containers scatter each stream across pages; the container code asks
/// a `Source` to view a series of [`SourceSlice`] ranges, which the `Source`
/// provides as one contiguous `&[u8]`. Views need not outlive their parent,
/// which admits memory-mapped implementations.
///
/// There is a blanket implementation for `std::io::Read + std::io::Seek +
/// std::fmt::Debug`, so a `std::fs::File` (or an in-memory `Cursor`) can be
/// used directly. That implementation seeks and copies each requested range
/// into an owned buffer.
///
/// Requested offsets are always aligned to the container's page size, and
/// requested sizes are multiples of it, except for the final slice of a
/// stream, which may be shorter.
pub trait Source<'s>: fmt::Debug {
    /// Provides a contiguous view of the source composed of the requested
    /// ranges.
    ///
    /// A `SourceView`'s `as_slice()` cannot fail, so `view()` is the time to
    /// raise I/O errors.
    fn view(
        &mut self,
        slices: &[SourceSlice],
    ) -> Result<Box<dyn SourceView<'s> + Send + Sync>, io::Error>;
}

/// An owned, droppable, read-only view of the source file which can be
/// referenced as a byte slice.
pub trait SourceView<'s>: fmt::Debug {
    /// Returns a view of the raw data.
    fn as_slice(&self) -> &[u8];
}

#[derive(Clone)]
struct ReadView {
    bytes: Vec<u8>,
}

impl fmt::Debug for ReadView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadView({} bytes)", self.bytes.len())
    }
}

impl SourceView<'_> for ReadView {
    fn as_slice(&self) -> &[u8] {
        self.bytes.as_slice()
    }
}

impl<'s, T> Source<'s> for T
where
    T: io::Read + io::Seek + fmt::Debug + 's,
{
    fn view(
        &mut self,
        slices: &[SourceSlice],
    ) -> Result<Box<dyn SourceView<'s> + Send + Sync>, io::Error> {
        let len = slices.iter().fold(0, |acc, s| acc + s.size);

        let mut view = ReadView {
            bytes: vec![0; len],
        };

        let mut pos = 0;
        for slice in slices {
            self.seek(io::SeekFrom::Start(slice.offset))?;
            self.read_exact(&mut view.bytes[pos..pos + slice.size])?;
            pos += slice.size;
        }

        Ok(Box::new(view))
    }
}
