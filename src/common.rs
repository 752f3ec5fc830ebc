// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::result;

use scroll::ctx::TryFromCtx;
use scroll::{Endian, Pread, LE};
use thiserror::Error;

use crate::tpi::constants::*;

/// An error raised while reading the MSF container itself.
///
/// Container errors are fatal: without an intact superblock and stream
/// directory, no stream contents can be trusted.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// An I/O error occurred while reading from the data source.
    #[error("I/O error while reading the container: {0}")]
    Io(#[from] io::Error),

    /// The input does not begin with the MSF 7.00 magic.
    #[error("the input data was not recognized as an MSF (PDB) file")]
    BadMagic,

    /// The superblock specifies a page size outside the supported range.
    #[error("the superblock specifies an invalid page size ({0} bytes)")]
    InvalidPageSize(u32),

    /// The superblock places the free page map somewhere other than page 1 or 2.
    #[error("the superblock places the free page map at page {0}")]
    BadFreePageMap(u32),

    /// A page number is beyond the page count declared by the superblock.
    #[error("page reference {0} is out of range")]
    PageOutOfRange(u32),

    /// The source ended before the requested pages could be read.
    #[error("the container ends before the requested data")]
    Truncated,

    /// The requested stream is not stored in this container.
    #[error("stream {0} is not stored in this container")]
    StreamNotFound(u32),

    /// The data is a recognizable container format that this crate does not read.
    #[error("unsupported container format: {0}")]
    UnsupportedFormat(&'static str),
}

/// An error raised while decoding a single record or stream header.
///
/// Most decode errors are recoverable: the record in question is skipped or
/// preserved opaquely and a [`Diagnostic`] is kept.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Unexpectedly reached end of input.
    #[error("unexpectedly reached end of input")]
    UnexpectedEof,

    /// A record's declared length extends past the end of the stream.
    #[error("record at offset {offset} declares {declared} bytes but only {remaining} remain")]
    TruncatedRecord {
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    /// A record's length value was impossibly small.
    #[error("a record's length value is impossibly small")]
    RecordTooShort,

    /// Variable-length numeric parsing encountered an unexpected prefix.
    #[error("unexpected numeric leaf prefix 0x{0:04x}")]
    BadNumericLeaf(u16),

    /// A record carries a tag this crate does not decode.
    #[error("records of kind 0x{0:04x} are not decoded")]
    UnknownKind(u16),

    /// A stream header failed validation.
    #[error("invalid stream header: {0}")]
    InvalidStreamHeader(&'static str),

    /// A record's fixed-layout portion failed to parse.
    #[error("malformed record data: {0}")]
    Malformed(String),
}

/// An error raised while resolving cross-references between type records.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A record references a type index that is not present in this container.
    #[error("record {referrer} references {target}, which is not present in this container")]
    DanglingReference {
        referrer: TypeIndex,
        target: TypeIndex,
    },
}

/// An error raised while resolving one symbol against the type graph.
///
/// Symbol errors never abort a build; the offending symbol is skipped and a
/// [`Diagnostic`] is kept.
#[derive(Debug, Error)]
pub enum SymbolError {
    /// A symbol declares a type index that did not resolve.
    #[error("symbol references unresolved type {0}")]
    UnresolvedType(TypeIndex),
}

/// An error that occurred while reading or querying a PDB.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Symbol(#[from] SymbolError),

    /// The operation is not valid in the reader's current lifecycle state.
    #[error("operation is invalid on {0} reader")]
    InvalidState(&'static str),

    /// Type not found.
    #[error("type {0} not found")]
    TypeNotFound(TypeIndex),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Container(ContainerError::Io(e))
    }
}

impl From<scroll::Error> for Error {
    fn from(e: scroll::Error) -> Self {
        match e {
            scroll::Error::BadOffset(_) | scroll::Error::TooBig { .. } => {
                Error::Decode(DecodeError::UnexpectedEof)
            }
            other => Error::Decode(DecodeError::Malformed(other.to_string())),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// `TypeIndex` refers to a type record within one container's type stream.
///
/// Indices below `0x1000` denote primitive types synthesized by the format
/// itself; indices at or above the stream's minimum denote decoded records.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TypeIndex(pub u32);

impl TypeIndex {
    /// Whether this index denotes a primitive type rather than a stream record.
    #[inline]
    pub fn is_primitive(self) -> bool {
        self.0 < 0x1000
    }
}

impl From<u32> for TypeIndex {
    fn from(i: u32) -> Self {
        TypeIndex(i)
    }
}

impl From<TypeIndex> for u32 {
    fn from(i: TypeIndex) -> Self {
        i.0
    }
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeIndex({})", self)
    }
}

impl<'b> TryFromCtx<'b, Endian> for TypeIndex {
    type Error = scroll::Error;

    fn try_from_ctx(this: &'b [u8], le: Endian) -> result::Result<(Self, usize), Self::Error> {
        u32::try_from_ctx(this, le).map(|(i, s)| (TypeIndex(i), s))
    }
}

/// A stream index as stored in headers, where `0xffff` means "no stream".
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StreamIndex(pub u16);

impl StreamIndex {
    /// Returns the stream number, or `None` for the absent sentinel.
    #[inline]
    pub fn get(self) -> Option<u32> {
        if self.0 == 0xffff {
            None
        } else {
            Some(u32::from(self.0))
        }
    }
}

impl fmt::Display for StreamIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(n) => write!(f, "{}", n),
            None => write!(f, "none"),
        }
    }
}

impl fmt::Debug for StreamIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamIndex({})", self)
    }
}

impl<'b> TryFromCtx<'b, Endian> for StreamIndex {
    type Error = scroll::Error;

    fn try_from_ctx(this: &'b [u8], le: Endian) -> result::Result<(Self, usize), Self::Error> {
        u16::try_from_ctx(this, le).map(|(i, s)| (StreamIndex(i), s))
    }
}

/// A non-fatal problem observed while loading a container.
///
/// Diagnostics accumulate during a load and are exposed by the reader after
/// a successful load. They never abort the load by themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The type stream ended in the middle of a record. Every record decoded
    /// before this offset remains available.
    TruncatedTypeRecord { offset: usize },

    /// A type record of a known kind failed to decode and was preserved as
    /// an opaque record.
    MalformedTypeRecord { index: TypeIndex, kind: u16 },

    /// A type record references an index beyond the records that survived
    /// decoding. The referring record is kept; the reference dangles.
    MissingTypeReference { index: TypeIndex, target: TypeIndex },

    /// The symbol stream ended in the middle of a record.
    TruncatedSymbolRecord { offset: usize },

    /// A symbol record of an unknown kind was skipped.
    UnknownSymbolKind { offset: usize, kind: u16 },

    /// A symbol was skipped because its declared type index did not resolve.
    UnresolvedSymbolType { name: String, type_index: TypeIndex },
}

/// Provides little-endian access to a `&[u8]`.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct ParseBuffer<'b>(&'b [u8], usize);

macro_rules! def_parse {
    ( $( ($n:ident, $t:ty) ),* $(,)* ) => {
        $(#[doc(hidden)]
          #[inline]
          pub fn $n(&mut self) -> Result<$t> {
              self.parse()
          })*
    }
}

macro_rules! def_peek {
    ( $( ($n:ident, $t:ty) ),* $(,)* ) => {
        $(#[doc(hidden)]
          #[inline]
          pub fn $n(&mut self) -> Result<$t> {
              Ok(self.0.pread_with(self.1, LE)?)
          })*
    }
}

impl<'b> ParseBuffer<'b> {
    /// Return the remaining length of the buffer.
    #[doc(hidden)]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len() - self.1
    }

    #[doc(hidden)]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the position within the parent slice.
    #[doc(hidden)]
    #[inline]
    pub fn pos(&self) -> usize {
        self.1
    }

    pub fn parse<T>(&mut self) -> Result<T>
    where
        T: TryFromCtx<'b, Endian, Error = scroll::Error>,
    {
        let slice: &'b [u8] = self.0;
        Ok(slice.gread_with(&mut self.1, LE)?)
    }

    def_parse!(
        (parse_u8, u8),
        (parse_u16, u16),
        (parse_i16, i16),
        (parse_u32, u32),
        (parse_i32, i32),
        (parse_u64, u64),
        (parse_i64, i64),
    );

    def_peek!((peek_u8, u8), (peek_u16, u16),);

    /// Parse a NUL-terminated string from the input.
    #[doc(hidden)]
    #[inline]
    pub fn parse_cstring(&mut self) -> Result<RawString<'b>> {
        let input = &self.0[self.1..];
        match input.iter().position(|ch| *ch == 0) {
            Some(idx) => {
                self.1 += idx + 1;
                Ok(RawString::from(&input[..idx]))
            }
            None => Err(DecodeError::UnexpectedEof.into()),
        }
    }

    /// Take `n` bytes from the input.
    #[doc(hidden)]
    #[inline]
    pub fn take(&mut self, n: usize) -> Result<&'b [u8]> {
        let input = &self.0[self.1..];
        if input.len() >= n {
            self.1 += n;
            Ok(&input[..n])
        } else {
            Err(DecodeError::UnexpectedEof.into())
        }
    }

    /// Parse a variable-length numeric leaf.
    ///
    /// Values below `LF_NUMERIC` are encoded directly in the leading `u16`;
    /// larger or signed values follow a typed prefix.
    pub fn parse_variant(&mut self) -> Result<Variant> {
        let leaf = self.parse_u16()?;
        if leaf < LF_NUMERIC {
            return Ok(Variant::U16(leaf));
        }

        match leaf {
            LF_CHAR => Ok(Variant::I8(self.parse_u8()? as i8)),
            LF_SHORT => Ok(Variant::I16(self.parse_i16()?)),
            LF_LONG => Ok(Variant::I32(self.parse_i32()?)),
            LF_QUADWORD => Ok(Variant::I64(self.parse_i64()?)),
            LF_USHORT => Ok(Variant::U16(self.parse_u16()?)),
            LF_ULONG => Ok(Variant::U32(self.parse_u32()?)),
            LF_UQUADWORD => Ok(Variant::U64(self.parse_u64()?)),
            _ => Err(DecodeError::BadNumericLeaf(leaf).into()),
        }
    }
}

impl<'b> From<&'b [u8]> for ParseBuffer<'b> {
    fn from(buf: &'b [u8]) -> Self {
        ParseBuffer(buf, 0)
    }
}

/// A variable-width numeric value as stored in a numeric leaf.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Variant {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
}

impl Variant {
    /// Widen the stored value to a signed 64-bit integer.
    ///
    /// Unsigned values above `i64::MAX` wrap; enumerator and constant values
    /// in practice never reach that range.
    pub fn to_i64(self) -> i64 {
        match self {
            Variant::U8(v) => i64::from(v),
            Variant::U16(v) => i64::from(v),
            Variant::U32(v) => i64::from(v),
            Variant::U64(v) => v as i64,
            Variant::I8(v) => i64::from(v),
            Variant::I16(v) => i64::from(v),
            Variant::I32(v) => i64::from(v),
            Variant::I64(v) => v,
        }
    }
}

/// `RawString` refers to a `&[u8]` that physically resides somewhere inside
/// a PDB data structure.
///
/// A `RawString` may not be valid UTF-8.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawString<'b>(&'b [u8]);

impl<'b> fmt::Debug for RawString<'b> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawString::from({:?})", self.to_string())
    }
}

impl<'b> fmt::Display for RawString<'b> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

impl<'b> RawString<'b> {
    /// Return the raw bytes of this string, as found in the PDB file.
    #[inline]
    pub fn as_bytes(&self) -> &'b [u8] {
        self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a UTF-8 `Cow<str>`, substituting replacement characters as
    /// needed. PDB strings are almost always printable 7-bit ASCII, so this
    /// rarely copies.
    #[inline]
    pub fn to_string(&self) -> Cow<'b, str> {
        String::from_utf8_lossy(self.0)
    }
}

impl<'b> From<RawString<'b>> for &'b [u8] {
    fn from(str: RawString<'b>) -> Self {
        str.as_bytes()
    }
}

impl<'b> From<&'b str> for RawString<'b> {
    fn from(buf: &'b str) -> Self {
        RawString(buf.as_bytes())
    }
}

impl<'b> From<&'b [u8]> for RawString<'b> {
    fn from(buf: &'b [u8]) -> Self {
        RawString(buf)
    }
}
