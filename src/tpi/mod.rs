// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The TPI stream: length-prefixed, tag-discriminated type records.

use std::fmt;
use std::result;

use fallible_iterator::FallibleIterator;

use crate::common::*;

pub(crate) mod constants;
pub(crate) mod data;
mod header;
pub(crate) mod primitive;

use self::data::parse_type_data;
use self::header::Header;

pub use self::data::{
    ArgumentList, ArrayType, CallingConvention, ClassKind, ClassType, EnumerateType,
    EnumerationType, FieldAttributes, FieldList, FunctionAttributes, MemberFunctionType,
    MemberType, MethodList, MethodListEntry, MethodType, ModifierType, PointerAttributes,
    PointerType, ProcedureType, TypeData, TypeProperties,
};
pub use self::primitive::{Indirection, PrimitiveKind, PrimitiveType};

/// Zero-copy access to the decoded type stream.
///
/// The stream is a 56-byte header followed by a dense run of records in
/// ascending `TypeIndex` order, starting at the header's minimum index.
/// Records refer to each other by `TypeIndex`; iteration is the only access
/// the on-disk layout supports directly.
#[derive(Debug)]
pub struct TypeStream<'t> {
    bytes: &'t [u8],
    header: Header,
}

impl<'t> TypeStream<'t> {
    /// Parse the stream header and prepare for record iteration.
    pub fn parse(bytes: &'t [u8]) -> Result<Self> {
        let mut buf = ParseBuffer::from(bytes);
        let header = Header::parse(&mut buf)?;
        Ok(TypeStream { bytes, header })
    }

    /// The first `TypeIndex` described by this stream.
    pub fn first_index(&self) -> TypeIndex {
        TypeIndex(self.header.minimum_index)
    }

    /// One past the last `TypeIndex` the header declares.
    pub fn end_index(&self) -> TypeIndex {
        TypeIndex(self.header.maximum_index)
    }

    /// The number of records the header declares.
    ///
    /// Primitive types are synthesized, not stored, so the number of
    /// distinct reachable types is higher than this.
    pub fn len(&self) -> usize {
        (self.header.maximum_index - self.header.minimum_index) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the records in stream order.
    pub fn iter(&self) -> RawTypeIter<'t> {
        let mut buf = ParseBuffer::from(self.bytes);
        // this cannot fail; the header was parsed out of the same bytes
        buf.take(self.header.header_size as usize)
            .expect("dropping type stream header");

        RawTypeIter {
            buf,
            index: self.first_index(),
        }
    }
}

/// A single undecoded record from the type stream.
///
/// `RawType` borrows from the stream and has only been length-delimited; it
/// may not be well formed.
#[derive(Copy, Clone, PartialEq)]
pub struct RawType<'t> {
    index: TypeIndex,
    offset: usize,
    data: &'t [u8],
}

impl<'t> RawType<'t> {
    /// This record's `TypeIndex`.
    pub fn index(&self) -> TypeIndex {
        self.index
    }

    /// Byte offset of this record's length prefix within the stream.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The record's payload, excluding the length prefix.
    pub fn data(&self) -> &'t [u8] {
        self.data
    }

    /// The record's leaf tag.
    #[inline]
    pub fn raw_kind(&self) -> u16 {
        debug_assert!(self.data.len() >= 2);
        u16::from(self.data[0]) | (u16::from(self.data[1]) << 8)
    }

    /// Decode this record's payload.
    ///
    /// Returns `DecodeError::UnknownKind` for tags this crate does not
    /// model and `DecodeError::UnexpectedEof` for malformed records.
    pub fn parse(&self) -> Result<TypeData<'t>> {
        let mut buf = ParseBuffer::from(self.data);
        parse_type_data(&mut buf)
    }
}

impl fmt::Debug for RawType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawType{{ index: {}, kind: 0x{:04x} [{} bytes] }}",
            self.index,
            self.raw_kind(),
            self.data.len()
        )
    }
}

/// Iterates a type stream, producing [`RawType`]s in ascending index order.
#[derive(Debug)]
pub struct RawTypeIter<'t> {
    buf: ParseBuffer<'t>,
    index: TypeIndex,
}

impl<'t> RawTypeIter<'t> {
    /// The stream offset of the next record's length prefix.
    pub fn position(&self) -> usize {
        self.buf.pos()
    }
}

impl<'t> FallibleIterator for RawTypeIter<'t> {
    type Item = RawType<'t>;
    type Error = Error;

    fn next(&mut self) -> result::Result<Option<Self::Item>, Self::Error> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let offset = self.buf.pos();
        let length = self.buf.parse_u16()? as usize;
        if length < 2 {
            return Err(DecodeError::RecordTooShort.into());
        }

        let remaining = self.buf.len();
        if length > remaining {
            return Err(DecodeError::TruncatedRecord {
                offset,
                declared: length,
                remaining,
            }
            .into());
        }

        let data = self.buf.take(length)?;
        let index = self.index;
        self.index = TypeIndex(index.0 + 1);

        Ok(Some(RawType {
            index,
            offset,
            data,
        }))
    }
}
