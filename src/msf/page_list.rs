// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::msf::PageNumber;
use crate::source::SourceSlice;

/// An ordered list of pages, usually (but not necessarily) sequential,
/// presented to a `Source` as a slice of `SourceSlice`s.
///
/// Sequential pages are coalesced into a single slice so that a stream
/// occupying contiguous pages costs one read.
#[derive(Debug)]
pub struct PageList {
    page_size: usize,
    slices: Vec<SourceSlice>,
    last_page: Option<PageNumber>,
    sealed: bool,
}

impl PageList {
    /// Create an empty `PageList` for a given page size.
    pub fn new(page_size: usize) -> Self {
        PageList {
            page_size,
            slices: Vec::new(),
            last_page: None,
            sealed: false,
        }
    }

    /// Append a page. A page immediately following the previously pushed
    /// page extends the last slice instead of starting a new one.
    pub fn push(&mut self, page: PageNumber) {
        assert!(!self.sealed);

        let extends_last = self.last_page.map_or(false, |last| last + 1 == page);
        if extends_last {
            // last_page implies at least one slice exists
            self.slices.last_mut().unwrap().size += self.page_size;
        } else {
            self.slices.push(SourceSlice {
                offset: u64::from(page) * self.page_size as u64,
                size: self.page_size,
            });
        }

        self.last_page = Some(page);
    }

    /// Restrict the list to its first `bytes` bytes, discarding or shrinking
    /// trailing slices. Streams rarely end on a page boundary, so this is how
    /// the final partial page is expressed. After truncation the list is
    /// sealed; `push()` may not be called again.
    pub fn truncate(&mut self, mut bytes: usize) {
        let mut kept = 0;
        for slice in self.slices.iter_mut() {
            if bytes == 0 {
                break;
            }
            if slice.size > bytes {
                slice.size = bytes;
            }
            bytes -= slice.size;
            kept += 1;
        }

        self.slices.truncate(kept);
        self.sealed = true;
    }

    /// Total number of bytes described by this list.
    pub fn len(&self) -> usize {
        self.slices.iter().map(|s| s.size).sum()
    }

    /// The byte ranges to request from a `Source`.
    pub fn source_slices(&self) -> &[SourceSlice] {
        self.slices.as_slice()
    }
}
