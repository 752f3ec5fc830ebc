// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::common::*;

// OFFCB in the reference implementation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Slice {
    pub offset: i32,
    pub size: u32,
}

/// The 56-byte header at the front of the type stream.
///
/// HDR:
///   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/PDB/dbi/tpi.h#L45
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Header {
    pub version: u32,
    pub header_size: u32,
    pub minimum_index: u32,
    pub maximum_index: u32,
    pub gprec_size: u32,
    pub hash_stream: StreamIndex,
    pub hash_pad_stream: StreamIndex,
    pub hash_key_size: u32,
    pub hash_bucket_count: u32,
    pub hash_values: Slice,
    pub index_offsets: Slice,
    pub hash_adjustments: Slice,
}

impl Header {
    pub(crate) fn empty() -> Self {
        let empty_slice = Slice { offset: 0, size: 0 };

        Self {
            version: 0,
            header_size: 0,
            minimum_index: 0,
            maximum_index: 0,
            gprec_size: 0,
            hash_stream: StreamIndex(0xffff),
            hash_pad_stream: StreamIndex(0xffff),
            hash_key_size: 0,
            hash_bucket_count: 0,
            hash_values: empty_slice,
            index_offsets: empty_slice,
            hash_adjustments: empty_slice,
        }
    }

    pub(crate) fn parse(buf: &mut ParseBuffer<'_>) -> Result<Self> {
        debug_assert!(buf.pos() == 0);

        // an entirely missing stream acts as an empty shell that resolves no
        // types
        if buf.is_empty() {
            return Ok(Self::empty());
        }

        let header = Self {
            version: buf.parse()?,
            header_size: buf.parse()?,
            minimum_index: buf.parse()?,
            maximum_index: buf.parse()?,
            gprec_size: buf.parse()?,
            hash_stream: buf.parse()?,
            hash_pad_stream: buf.parse()?,
            hash_key_size: buf.parse()?,
            hash_bucket_count: buf.parse()?,
            hash_values: Slice {
                offset: buf.parse()?,
                size: buf.parse()?,
            },
            index_offsets: Slice {
                offset: buf.parse()?,
                size: buf.parse()?,
            },
            hash_adjustments: Slice {
                offset: buf.parse()?,
                size: buf.parse()?,
            },
        };

        let bytes_read = buf.pos() as u32;
        if header.header_size < bytes_read {
            return Err(DecodeError::InvalidStreamHeader("header size is impossibly small").into());
        }
        if header.header_size > 1024 {
            return Err(
                DecodeError::InvalidStreamHeader("header size is unreasonably large").into(),
            );
        }

        // skip whatever else the header claims for itself
        buf.take((header.header_size - bytes_read) as usize)?;

        if header.minimum_index < 4096 {
            return Err(DecodeError::InvalidStreamHeader("minimum type index is < 4096").into());
        }
        if header.maximum_index < header.minimum_index {
            return Err(
                DecodeError::InvalidStreamHeader("maximum type index is < minimum type index")
                    .into(),
            );
        }

        Ok(header)
    }
}
