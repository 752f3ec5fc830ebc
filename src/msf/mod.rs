// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The MSF (Multi-Stream File) container.
//!
//! An MSF file is a sequence of fixed-size pages. Page zero holds the
//! superblock; the stream directory lists every stream's size and the pages
//! it occupies. The directory itself is reached through two levels of
//! indirection: the superblock names the pages holding the directory's page
//! list, which in turn names the pages holding the directory.

use std::io;
use std::ops::Deref;

use tracing::trace;

use crate::common::*;
use crate::source::*;

mod page_list;
use self::page_list::PageList;

pub(crate) type PageNumber = u32;

/// The MSF 7.00 magic, which every supported container begins with.
const MAGIC: &[u8] = b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\x00\x00\x00";

/// The MSF 2.00 magic. Recognized so it can be rejected by name.
const SMALL_MAGIC: &[u8] = b"Microsoft C/C++ program database 2.00\r\n\x1a\x4a\x47";

/// Sentinel stream size meaning "stream does not exist".
const STREAM_ABSENT: u32 = u32::max_value();

#[derive(Debug, Copy, Clone)]
struct Layout {
    page_size: usize,
    page_count: PageNumber,
}

impl Layout {
    fn pages_to_store(&self, bytes: usize) -> usize {
        (bytes + self.page_size - 1) / self.page_size
    }

    fn validate_page(&self, page: u32) -> Result<PageNumber> {
        // page zero is the superblock and can never belong to a stream
        if page == 0 || page >= self.page_count {
            Err(ContainerError::PageOutOfRange(page).into())
        } else {
            Ok(page)
        }
    }
}

/// The superblock as stored at the start of page zero.
#[derive(Debug, Copy, Clone)]
struct Superblock {
    page_size: u32,
    free_page_map: u32,
    page_count: u32,
    directory_size: u32,
}

impl Superblock {
    fn parse(buf: &mut ParseBuffer<'_>) -> Result<Self> {
        let magic = buf.take(MAGIC.len())?;
        if magic != MAGIC {
            // the 2.00 magic is longer; its first 32 bytes identify it
            if magic == &SMALL_MAGIC[..MAGIC.len()] {
                return Err(ContainerError::UnsupportedFormat("MSF 2.00").into());
            }
            return Err(ContainerError::BadMagic.into());
        }

        let header = Superblock {
            page_size: buf.parse_u32()?,
            free_page_map: buf.parse_u32()?,
            page_count: buf.parse_u32()?,
            directory_size: buf.parse_u32()?,
        };
        let _reserved = buf.parse_u32()?;

        if header.page_size.count_ones() != 1
            || header.page_size < 0x200
            || header.page_size > 0x1_0000
        {
            return Err(ContainerError::InvalidPageSize(header.page_size).into());
        }

        // the free page map always lives in page 1 or 2
        if header.free_page_map != 1 && header.free_page_map != 2 {
            return Err(ContainerError::BadFreePageMap(header.free_page_map).into());
        }

        Ok(header)
    }
}

/// The stream directory at its various stages of access.
#[derive(Debug)]
enum Directory<'s> {
    /// The superblock tells us the directory's size and the pages holding
    /// its page list.
    Unmapped {
        size: usize,
        map_location: PageList,
    },

    /// The page list has been read, so the directory's own pages are known.
    Located { location: PageList },

    /// The directory has been viewed and can be parsed.
    Mapped {
        view: Box<dyn SourceView<'s> + Send + Sync>,
    },
}

fn view<'s>(
    source: &mut dyn Source<'s>,
    pages: &PageList,
) -> Result<Box<dyn SourceView<'s> + Send + Sync>> {
    let view = source.view(pages.source_slices()).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Container(ContainerError::Truncated)
        } else {
            Error::Container(ContainerError::Io(e))
        }
    })?;

    // a Source that returns the wrong number of bytes is an implementation
    // bug, not a file corruption
    assert_eq!(view.as_slice().len(), pages.len());

    Ok(view)
}

/// An open MSF container.
///
/// Opening validates the superblock; streams are located lazily on first
/// request, and the stream directory is read at most once.
#[derive(Debug)]
pub struct Container<'s, S> {
    layout: Layout,
    source: S,
    directory: Directory<'s>,
}

impl<'s, S: Source<'s>> Container<'s, S> {
    /// Open a container, validating its superblock.
    pub fn open(mut source: S) -> Result<Self> {
        // the superblock must fit in the first page; page size is unknown
        // until it is parsed, so read the smallest size we accept
        let mut header_location = PageList::new(0x200);
        header_location.push(0);
        let header_view = view(&mut source, &header_location)?;

        let mut buf = ParseBuffer::from(header_view.as_slice());
        let superblock = Superblock::parse(&mut buf)?;

        let layout = Layout {
            page_size: superblock.page_size as usize,
            page_count: superblock.page_count,
        };

        trace!(
            page_size = layout.page_size,
            page_count = layout.page_count,
            directory_size = superblock.directory_size,
            "opened MSF container"
        );

        // how many pages hold the directory, and how many pages hold that
        // list of page numbers
        let directory_pages = layout.pages_to_store(superblock.directory_size as usize);
        let map_pages = layout.pages_to_store(directory_pages * 4);

        // the map's page numbers immediately follow the superblock, but the
        // first page we viewed may be shorter than a real page; re-view page
        // zero at full size if the map doesn't fit in what we have
        let mut map_location = PageList::new(layout.page_size);
        if buf.len() < map_pages * 4 {
            let mut full_page = PageList::new(layout.page_size);
            full_page.push(0);
            let full_view = view(&mut source, &full_page)?;
            let mut full_buf = ParseBuffer::from(full_view.as_slice());
            let _ = full_buf.take(buf.pos())?;
            for _ in 0..map_pages {
                let n = full_buf.parse_u32()?;
                map_location.push(layout.validate_page(n)?);
            }
        } else {
            for _ in 0..map_pages {
                let n = buf.parse_u32()?;
                map_location.push(layout.validate_page(n)?);
            }
        }
        map_location.truncate(directory_pages * 4);

        Ok(Container {
            layout,
            source,
            directory: Directory::Unmapped {
                size: superblock.directory_size as usize,
                map_location,
            },
        })
    }

    fn locate_directory(&mut self) -> Result<()> {
        if let Directory::Unmapped {
            size,
            ref map_location,
        } = self.directory
        {
            let map_view = view(&mut self.source, map_location)?;

            let mut location = PageList::new(self.layout.page_size);
            let mut buf = ParseBuffer::from(map_view.as_slice());
            while !buf.is_empty() {
                let n = buf.parse_u32()?;
                location.push(self.layout.validate_page(n)?);
            }
            location.truncate(size);

            self.directory = Directory::Located { location };
        }

        Ok(())
    }

    fn map_directory(&mut self) -> Result<()> {
        self.locate_directory()?;

        if let Directory::Located { ref location } = self.directory {
            let view = view(&mut self.source, location)?;
            self.directory = Directory::Mapped { view };
        }

        Ok(())
    }

    /// Find the pages belonging to a stream.
    ///
    /// The directory is laid out as a stream count, then each stream's byte
    /// size, then each stream's page numbers back to back.
    fn stream_pages(&mut self, stream: u32) -> Result<PageList> {
        self.map_directory()?;

        let layout = self.layout;
        let directory_view = match self.directory {
            Directory::Mapped { ref view } => view,
            // map_directory just put us in the Mapped state
            _ => unreachable!(),
        };

        let mut buf = ParseBuffer::from(directory_view.as_slice());

        let stream_count = buf.parse_u32()?;
        if stream >= stream_count {
            return Err(ContainerError::StreamNotFound(stream).into());
        }

        // sum the page counts of the streams before ours to find where our
        // page numbers start
        let mut pages_to_skip = 0;
        for _ in 0..stream {
            let bytes = buf.parse_u32()?;
            if bytes != STREAM_ABSENT {
                pages_to_skip += layout.pages_to_store(bytes as usize);
            }
        }

        let stream_size = buf.parse_u32()?;
        if stream_size == STREAM_ABSENT {
            return Err(ContainerError::StreamNotFound(stream).into());
        }

        // skip the remaining sizes and the preceding streams' page numbers
        let _ = buf.take((stream_count - stream - 1) as usize * 4)?;
        let _ = buf.take(pages_to_skip * 4)?;

        let mut pages = PageList::new(layout.page_size);
        for _ in 0..layout.pages_to_store(stream_size as usize) {
            let n = buf.parse_u32()?;
            pages.push(layout.validate_page(n)?);
        }
        pages.truncate(stream_size as usize);

        Ok(pages)
    }

    /// Access a stream by number, optionally restricted to a byte limit.
    pub fn stream(&mut self, stream: u32, limit: Option<usize>) -> Result<Stream<'s>> {
        let mut pages = self.stream_pages(stream)?;

        if let Some(limit) = limit {
            pages.truncate(limit);
        }

        let view = view(&mut self.source, &pages)?;
        Ok(Stream { view })
    }
}

/// A single stream read out of the container.
#[derive(Debug)]
pub struct Stream<'s> {
    view: Box<dyn SourceView<'s> + Send + Sync>,
}

impl<'s> Stream<'s> {
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.view.as_slice()
    }
}

impl Deref for Stream<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pages_to_store() {
        let layout = Layout {
            page_size: 4096,
            page_count: 16,
        };
        assert_eq!(layout.pages_to_store(0), 0);
        assert_eq!(layout.pages_to_store(1), 1);
        assert_eq!(layout.pages_to_store(4095), 1);
        assert_eq!(layout.pages_to_store(4096), 1);
        assert_eq!(layout.pages_to_store(4097), 2);
    }

    #[test]
    fn test_validate_page() {
        let layout = Layout {
            page_size: 4096,
            page_count: 16,
        };
        assert!(matches!(
            layout.validate_page(0),
            Err(Error::Container(ContainerError::PageOutOfRange(0)))
        ));
        assert!(matches!(layout.validate_page(1), Ok(1)));
        assert!(matches!(layout.validate_page(15), Ok(15)));
        assert!(matches!(
            layout.validate_page(16),
            Err(Error::Container(ContainerError::PageOutOfRange(16)))
        ));
    }

    #[test]
    fn test_tiny_file_is_truncated() {
        let tiny = Cursor::new(b"\x7fELF");
        match Container::open(tiny) {
            Err(Error::Container(ContainerError::Truncated)) => (),
            other => panic!("expected Truncated, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_bad_magic() {
        let data = vec![0xaau8; 4096];
        match Container::open(Cursor::new(data)) {
            Err(Error::Container(ContainerError::BadMagic)) => (),
            other => panic!("expected BadMagic, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_small_msf_is_unsupported() {
        let mut data = vec![0u8; 4096];
        data[..SMALL_MAGIC.len()].copy_from_slice(SMALL_MAGIC);
        match Container::open(Cursor::new(data)) {
            Err(Error::Container(ContainerError::UnsupportedFormat("MSF 2.00"))) => (),
            other => panic!("expected UnsupportedFormat, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_page_size() {
        let mut data = vec![0u8; 4096];
        data[..MAGIC.len()].copy_from_slice(MAGIC);
        // page_size = 1000: not a power of two
        data[32..36].copy_from_slice(&1000u32.to_le_bytes());
        match Container::open(Cursor::new(data)) {
            Err(Error::Container(ContainerError::InvalidPageSize(1000))) => (),
            other => panic!("expected InvalidPageSize, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_bad_free_page_map() {
        let mut data = vec![0u8; 4096];
        data[..MAGIC.len()].copy_from_slice(MAGIC);
        data[32..36].copy_from_slice(&4096u32.to_le_bytes());
        data[36..40].copy_from_slice(&7u32.to_le_bytes());
        match Container::open(Cursor::new(data)) {
            Err(Error::Container(ContainerError::BadFreePageMap(7))) => (),
            other => panic!("expected BadFreePageMap, got {:?}", other.map(|_| ())),
        }
    }
}
