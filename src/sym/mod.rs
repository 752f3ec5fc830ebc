// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The global symbol records stream: length-prefixed, kind-discriminated
//! symbol records.
//!
//! Unlike the type stream, the symbol records stream has no header; records
//! start at offset zero and symbols refer to each other by byte offset.

use std::fmt;
use std::result;

use fallible_iterator::FallibleIterator;

use crate::common::*;

pub(crate) mod constants;

use self::constants::*;

/// The raw kind discriminator of a [`Symbol`].
pub type SymbolKind = u16;

/// A single undecoded record from the symbol records stream.
#[derive(Copy, Clone, PartialEq)]
pub struct Symbol<'t> {
    offset: usize,
    data: &'t [u8],
}

impl<'t> Symbol<'t> {
    /// Byte offset of this record's length prefix within the stream.
    ///
    /// Reference symbols (`S_PROCREF` and friends) identify their targets by
    /// this offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The record's kind.
    #[inline]
    pub fn raw_kind(&self) -> SymbolKind {
        debug_assert!(self.data.len() >= 2);
        u16::from(self.data[0]) | (u16::from(self.data[1]) << 8)
    }

    /// The record's payload, excluding the length prefix.
    #[inline]
    pub fn raw_bytes(&self) -> &'t [u8] {
        self.data
    }

    /// Decode this record's payload.
    ///
    /// Returns `DecodeError::UnknownKind` for kinds this crate does not
    /// model.
    pub fn parse(&self) -> Result<SymbolData<'t>> {
        let mut buf = ParseBuffer::from(self.data);
        let kind = buf.parse_u16()?;
        parse_symbol_data(kind, &mut buf)
    }

    /// Whether this symbol opens a scope that a later `S_END` closes.
    pub fn starts_scope(&self) -> bool {
        matches!(self.raw_kind(), S_GPROC32 | S_LPROC32)
    }

    /// Whether this symbol closes a scope.
    pub fn ends_scope(&self) -> bool {
        self.raw_kind() == S_END
    }
}

impl fmt::Debug for Symbol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Symbol{{ kind: 0x{:04x} [{} bytes] }}",
            self.raw_kind(),
            self.data.len()
        )
    }
}

/// Information parsed from a [`Symbol`] record.
///
/// Decoding reference:
///   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/cvdump/dumpsym7.cpp#L264
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SymbolData<'t> {
    /// End of a scope, such as a procedure.
    ScopeEnd,
    /// A constant value.
    Constant(ConstantSymbol<'t>),
    /// A user defined type alias.
    UserDefinedType(UserDefinedTypeSymbol<'t>),
    /// Static data, such as a global variable.
    Data(DataSymbol<'t>),
    /// A public symbol with a mangled name.
    Public(PublicSymbol<'t>),
    /// A procedure, such as a function or method.
    Procedure(ProcedureSymbol<'t>),
    /// Reference to a [`ProcedureSymbol`].
    ProcedureReference(ProcedureReferenceSymbol<'t>),
    /// Reference to a [`DataSymbol`].
    DataReference(DataReferenceSymbol<'t>),
    /// An exported symbol.
    Export(ExportSymbol<'t>),
}

impl<'t> SymbolData<'t> {
    /// Returns the name of this symbol if it has one.
    pub fn name(&self) -> Option<RawString<'t>> {
        match self {
            SymbolData::ScopeEnd => None,
            SymbolData::Constant(data) => Some(data.name),
            SymbolData::UserDefinedType(data) => Some(data.name),
            SymbolData::Data(data) => Some(data.name),
            SymbolData::Public(data) => Some(data.name),
            SymbolData::Procedure(data) => Some(data.name),
            SymbolData::ProcedureReference(data) => data.name,
            SymbolData::DataReference(data) => data.name,
            SymbolData::Export(data) => Some(data.name),
        }
    }
}

fn parse_symbol_data<'t>(kind: SymbolKind, buf: &mut ParseBuffer<'t>) -> Result<SymbolData<'t>> {
    match kind {
        S_END => Ok(SymbolData::ScopeEnd),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L3266-L3272
        S_CONSTANT => Ok(SymbolData::Constant(ConstantSymbol {
            type_index: buf.parse()?,
            value: buf.parse_variant()?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L3299-L3303
        S_UDT => Ok(SymbolData::UserDefinedType(UserDefinedTypeSymbol {
            type_index: buf.parse()?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L3453-L3459
        S_LDATA32 | S_GDATA32 => Ok(SymbolData::Data(DataSymbol {
            global: kind == S_GDATA32,
            type_index: buf.parse()?,
            offset: buf.parse_u32()?,
            segment: buf.parse_u16()?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L3696-L3701
        S_PUB32 => {
            let flags = buf.parse_u32()?;
            Ok(SymbolData::Public(PublicSymbol {
                code: flags & CVPSF_CODE != 0,
                function: flags & CVPSF_FUNCTION != 0,
                offset: buf.parse_u32()?,
                segment: buf.parse_u16()?,
                name: buf.parse_cstring()?,
            }))
        }

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L3502-L3525
        S_LPROC32 | S_GPROC32 => Ok(SymbolData::Procedure(ProcedureSymbol {
            global: kind == S_GPROC32,
            parent: buf.parse_u32()?,
            end: buf.parse_u32()?,
            next: buf.parse_u32()?,
            len: buf.parse_u32()?,
            dbg_start_offset: buf.parse_u32()?,
            dbg_end_offset: buf.parse_u32()?,
            type_index: buf.parse()?,
            offset: buf.parse_u32()?,
            segment: buf.parse_u16()?,
            flags: buf.parse_u8()?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L3622-L3627
        S_PROCREF | S_LPROCREF => Ok(SymbolData::ProcedureReference(ProcedureReferenceSymbol {
            global: kind == S_PROCREF,
            sum_name: buf.parse_u32()?,
            symbol_offset: buf.parse_u32()?,
            module: buf.parse_u16()?,
            name: if buf.is_empty() {
                None
            } else {
                Some(buf.parse_cstring()?)
            },
        })),

        S_DATAREF => Ok(SymbolData::DataReference(DataReferenceSymbol {
            sum_name: buf.parse_u32()?,
            symbol_offset: buf.parse_u32()?,
            module: buf.parse_u16()?,
            name: if buf.is_empty() {
                None
            } else {
                Some(buf.parse_cstring()?)
            },
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L4356-L4367
        S_EXPORT => {
            let ordinal = buf.parse_u16()?;
            let flags = buf.parse_u16()?;
            Ok(SymbolData::Export(ExportSymbol {
                ordinal,
                constant: flags & 0x01 != 0,
                data: flags & 0x02 != 0,
                forwarder: flags & 0x10 != 0,
                name: buf.parse_cstring()?,
            }))
        }

        other => Err(DecodeError::UnknownKind(other).into()),
    }
}

/// A constant value.
///
/// Symbol kind `S_CONSTANT`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConstantSymbol<'t> {
    /// Identifier of the constant's type.
    pub type_index: TypeIndex,
    /// The value of this constant.
    pub value: Variant,
    /// Display name, `::`-separated for scoped constants.
    pub name: RawString<'t>,
}

/// A user defined type alias.
///
/// Symbol kind `S_UDT`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UserDefinedTypeSymbol<'t> {
    /// Identifier of the aliased type.
    pub type_index: TypeIndex,
    /// Name of the alias.
    pub name: RawString<'t>,
}

/// Static data, such as a global variable.
///
/// Symbol kinds `S_LDATA32` and `S_GDATA32`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DataSymbol<'t> {
    /// Whether the data is visible outside its module.
    pub global: bool,
    /// Identifier of the data's type.
    pub type_index: TypeIndex,
    /// Offset within the segment.
    pub offset: u32,
    pub segment: u16,
    pub name: RawString<'t>,
}

/// A public symbol with a mangled name.
///
/// Symbol kind `S_PUB32`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PublicSymbol<'t> {
    /// The symbol refers to executable code.
    pub code: bool,
    /// The symbol is a function.
    pub function: bool,
    /// Offset within the segment.
    pub offset: u32,
    pub segment: u16,
    /// Mangled name of the symbol.
    pub name: RawString<'t>,
}

/// A procedure.
///
/// Symbol kinds `S_LPROC32` and `S_GPROC32`. Opens a scope closed by a
/// matching `S_END`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProcedureSymbol<'t> {
    /// Whether the procedure is visible outside its module.
    pub global: bool,
    /// Stream offset of the lexical parent scope, zero for top level.
    pub parent: u32,
    /// Stream offset of the closing `S_END`.
    pub end: u32,
    /// Stream offset of the next procedure at this level.
    pub next: u32,
    /// Length of the procedure's code in bytes.
    pub len: u32,
    /// Offset where debugging becomes meaningful, relative to `offset`.
    pub dbg_start_offset: u32,
    /// Offset where debugging stops being meaningful.
    pub dbg_end_offset: u32,
    /// Identifier of the procedure's signature type.
    pub type_index: TypeIndex,
    /// Offset within the segment.
    pub offset: u32,
    pub segment: u16,
    pub flags: u8,
    pub name: RawString<'t>,
}

/// Reference to a procedure in a module's symbol stream.
///
/// Symbol kinds `S_PROCREF` and `S_LPROCREF`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProcedureReferenceSymbol<'t> {
    pub global: bool,
    /// Checksum of the referenced name.
    pub sum_name: u32,
    /// Byte offset of the referenced record in its symbol stream.
    pub symbol_offset: u32,
    /// Index of the module holding the record.
    pub module: u16,
    pub name: Option<RawString<'t>>,
}

/// Reference to a data symbol in a module's symbol stream.
///
/// Symbol kind `S_DATAREF`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DataReferenceSymbol<'t> {
    pub sum_name: u32,
    pub symbol_offset: u32,
    pub module: u16,
    pub name: Option<RawString<'t>>,
}

/// An exported symbol.
///
/// Symbol kind `S_EXPORT`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExportSymbol<'t> {
    pub ordinal: u16,
    pub constant: bool,
    pub data: bool,
    pub forwarder: bool,
    pub name: RawString<'t>,
}

/// The symbol records stream.
#[derive(Debug, Copy, Clone)]
pub struct SymbolStream<'t> {
    bytes: &'t [u8],
}

impl<'t> SymbolStream<'t> {
    pub fn new(bytes: &'t [u8]) -> Self {
        SymbolStream { bytes }
    }

    /// Iterate the records in stream order.
    pub fn iter(&self) -> SymbolIter<'t> {
        SymbolIter {
            buf: ParseBuffer::from(self.bytes),
        }
    }
}

/// Iterates the symbol records stream, skipping alignment filler.
#[derive(Debug)]
pub struct SymbolIter<'t> {
    buf: ParseBuffer<'t>,
}

impl<'t> SymbolIter<'t> {
    /// The stream offset of the next record's length prefix.
    pub fn position(&self) -> usize {
        self.buf.pos()
    }
}

impl<'t> FallibleIterator for SymbolIter<'t> {
    type Item = Symbol<'t>;
    type Error = Error;

    fn next(&mut self) -> result::Result<Option<Self::Item>, Self::Error> {
        while !self.buf.is_empty() {
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
            let symbol = Symbol { offset, data };

            // alignment and skip records carry no information
            if matches!(symbol.raw_kind(), S_ALIGN | S_SKIP) {
                continue;
            }

            return Ok(Some(symbol));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut body = kind.to_le_bytes().to_vec();
        body.extend_from_slice(payload);
        while (body.len() + 2) % 4 != 0 {
            body.push(0);
        }
        bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }

    #[test]
    fn test_parse_constant() {
        // WHAT_IS_SIX_TIMES_SEVEN = 42, type T_UINT4
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x75u32.to_le_bytes());
        payload.extend_from_slice(&42u16.to_le_bytes());
        payload.extend_from_slice(b"WHAT_IS_SIX_TIMES_SEVEN\x00");

        let bytes = record(S_CONSTANT, &payload);
        let stream = SymbolStream::new(&bytes);
        let symbol = stream.iter().next().expect("next").expect("symbol");
        assert_eq!(symbol.raw_kind(), S_CONSTANT);

        match symbol.parse().expect("parse") {
            SymbolData::Constant(constant) => {
                assert_eq!(constant.type_index, TypeIndex(0x75));
                assert_eq!(constant.value, Variant::U16(42));
                assert_eq!(constant.name, RawString::from("WHAT_IS_SIX_TIMES_SEVEN"));
            }
            other => panic!("expected constant, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_public() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&3u32.to_le_bytes()); // code | function
        payload.extend_from_slice(&0x1040u32.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(b"?exported@@YAHXZ\x00");

        let bytes = record(S_PUB32, &payload);
        let stream = SymbolStream::new(&bytes);
        let symbol = stream.iter().next().expect("next").expect("symbol");

        match symbol.parse().expect("parse") {
            SymbolData::Public(public) => {
                assert!(public.code);
                assert!(public.function);
                assert_eq!(public.offset, 0x1040);
                assert_eq!(public.segment, 1);
                assert_eq!(public.name, RawString::from("?exported@@YAHXZ"));
            }
            other => panic!("expected public, got {:?}", other),
        }
    }

    #[test]
    fn test_procedure_scope() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0u32.to_le_bytes()); // parent
        payload.extend_from_slice(&80u32.to_le_bytes()); // end
        payload.extend_from_slice(&0u32.to_le_bytes()); // next
        payload.extend_from_slice(&32u32.to_le_bytes()); // len
        payload.extend_from_slice(&4u32.to_le_bytes()); // dbg start
        payload.extend_from_slice(&28u32.to_le_bytes()); // dbg end
        payload.extend_from_slice(&0x1003u32.to_le_bytes()); // type
        payload.extend_from_slice(&0x2000u32.to_le_bytes()); // offset
        payload.extend_from_slice(&1u16.to_le_bytes()); // segment
        payload.push(0); // flags
        payload.extend_from_slice(b"compute\x00");

        let mut bytes = record(S_GPROC32, &payload);
        bytes.extend_from_slice(&record(S_END, &[]));

        let stream = SymbolStream::new(&bytes);
        let mut iter = stream.iter();

        let symbol = iter.next().expect("next").expect("proc");
        assert!(symbol.starts_scope());
        match symbol.parse().expect("parse") {
            SymbolData::Procedure(proc) => {
                assert!(proc.global);
                assert_eq!(proc.type_index, TypeIndex(0x1003));
                assert_eq!(proc.name, RawString::from("compute"));
            }
            other => panic!("expected procedure, got {:?}", other),
        }

        let end = iter.next().expect("next").expect("end");
        assert!(end.ends_scope());
        assert_eq!(end.parse().expect("parse"), SymbolData::ScopeEnd);
        assert!(iter.next().expect("next").is_none());
    }

    #[test]
    fn test_parse_export() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&7u16.to_le_bytes()); // ordinal
        payload.extend_from_slice(&0x02u16.to_le_bytes()); // data
        payload.extend_from_slice(b"ExportedTable\x00");

        let bytes = record(S_EXPORT, &payload);
        let stream = SymbolStream::new(&bytes);
        let symbol = stream.iter().next().expect("next").expect("symbol");

        match symbol.parse().expect("parse") {
            SymbolData::Export(export) => {
                assert_eq!(export.ordinal, 7);
                assert!(export.data);
                assert!(!export.constant);
                assert!(!export.forwarder);
                assert_eq!(export.name, RawString::from("ExportedTable"));
            }
            other => panic!("expected export, got {:?}", other),
        }
    }

    #[test]
    fn test_skips_alignment_records() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x74u32.to_le_bytes());
        payload.extend_from_slice(b"int32\x00");

        let mut bytes = record(S_ALIGN, &[0, 0]);
        bytes.extend_from_slice(&record(S_UDT, &payload));

        let stream = SymbolStream::new(&bytes);
        let mut iter = stream.iter();
        let symbol = iter.next().expect("next").expect("symbol");
        assert_eq!(symbol.raw_kind(), S_UDT);
    }

    #[test]
    fn test_truncated_record() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x74u32.to_le_bytes());
        payload.extend_from_slice(b"int32\x00");
        let mut bytes = record(S_UDT, &payload);
        bytes.truncate(bytes.len() - 4);

        let stream = SymbolStream::new(&bytes);
        match stream.iter().next() {
            Err(Error::Decode(DecodeError::TruncatedRecord { .. })) => (),
            other => panic!("expected truncation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_kind() {
        let bytes = record(0x1160, &[0, 0, 0, 0]);
        let stream = SymbolStream::new(&bytes);
        let symbol = stream.iter().next().expect("next").expect("symbol");
        match symbol.parse() {
            Err(Error::Decode(DecodeError::UnknownKind(0x1160))) => (),
            other => panic!("expected unknown kind, got {:?}", other),
        }
    }
}
