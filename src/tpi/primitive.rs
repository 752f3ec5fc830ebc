// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::common::*;

// References for primitive types:
//
// cvinfo.h provides an enumeration:
//   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L328-L750
//
// A primitive type index packs two orthogonal facts: the lowest octet names
// the underlying scalar kind, and bits 0x700 name the indirection applied to
// it. `PrimitiveType` models those two fields instead of exploding the
// matrix the way the reference implementations do.

/// A primitive type like `void`, `unsigned char` or `long long *`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrimitiveType {
    pub kind: PrimitiveKind,

    /// What kind of indirection was applied to the underlying type.
    pub indirection: Indirection,
}

impl PrimitiveType {
    /// The width of the underlying scalar in bits, if it has one.
    ///
    /// `Void` and `NoType` have no width. Indirection does not change the
    /// reported width; it describes the pointer, not the pointee.
    pub fn bit_width(&self) -> Option<u32> {
        self.kind.bit_width()
    }

    /// Whether the underlying scalar is a signed integer or character type.
    pub fn is_signed(&self) -> bool {
        self.kind.is_signed()
    }

    /// Whether the underlying scalar is a floating-point type.
    pub fn is_floating_point(&self) -> bool {
        self.kind.is_floating_point()
    }
}

/// The scalar kinds a primitive type index can denote.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// Uncharacterized type, used by symbols that carry no type.
    NoType,

    Void,

    /// Signed character (platform `char` compiled as signed).
    Char,

    /// Unsigned character.
    UChar,

    /// "Really a char".
    RChar,

    /// Wide character, 16 bits.
    WChar,

    /// "Really a 16-bit char" (`char16_t`).
    RChar16,

    /// "Really a 32-bit char" (`char32_t`).
    RChar32,

    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    I128,
    U128,

    /// 16-bit floating point.
    F16,
    F32,
    /// 32-bit partial precision floating point.
    F32PP,
    F48,
    F64,
    F80,
    F128,

    Bool8,
    Bool16,
    Bool32,
    Bool64,

    HRESULT,
}

impl PrimitiveKind {
    pub fn bit_width(self) -> Option<u32> {
        match self {
            PrimitiveKind::NoType | PrimitiveKind::Void => None,

            PrimitiveKind::Char
            | PrimitiveKind::UChar
            | PrimitiveKind::RChar
            | PrimitiveKind::I8
            | PrimitiveKind::U8
            | PrimitiveKind::Bool8 => Some(8),

            PrimitiveKind::WChar
            | PrimitiveKind::RChar16
            | PrimitiveKind::I16
            | PrimitiveKind::U16
            | PrimitiveKind::F16
            | PrimitiveKind::Bool16 => Some(16),

            PrimitiveKind::RChar32
            | PrimitiveKind::I32
            | PrimitiveKind::U32
            | PrimitiveKind::F32
            | PrimitiveKind::F32PP
            | PrimitiveKind::Bool32
            | PrimitiveKind::HRESULT => Some(32),

            PrimitiveKind::F48 => Some(48),

            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 | PrimitiveKind::Bool64 => {
                Some(64)
            }

            PrimitiveKind::F80 => Some(80),

            PrimitiveKind::I128 | PrimitiveKind::U128 | PrimitiveKind::F128 => Some(128),
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Char
                | PrimitiveKind::RChar
                | PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
        )
    }

    pub fn is_floating_point(self) -> bool {
        matches!(
            self,
            PrimitiveKind::F16
                | PrimitiveKind::F32
                | PrimitiveKind::F32PP
                | PrimitiveKind::F48
                | PrimitiveKind::F64
                | PrimitiveKind::F80
                | PrimitiveKind::F128
        )
    }
}

/// The indirection applied to a primitive type, encoded in bits `0x700` of
/// its type index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Indirection {
    None,

    /// 16-bit ("near") pointer.
    Pointer16,

    /// 16:16 far pointer.
    FarPointer1616,

    /// 16:16 huge pointer.
    HugePointer1616,

    /// 32-bit pointer.
    Pointer32,

    /// 48-bit 16:32 pointer.
    Pointer1632,

    /// 64-bit pointer.
    Pointer64,
}

/// Decode a primitive type index.
///
/// Primitives live below `0x1000`; this must never be called for stream
/// record indices.
pub(crate) fn primitive_type(index: TypeIndex) -> Result<PrimitiveType> {
    assert!(index.is_primitive());

    let indirection = match index.0 & 0xf00 {
        0x000 => Indirection::None,
        0x100 => Indirection::Pointer16,
        0x200 => Indirection::FarPointer1616,
        0x300 => Indirection::HugePointer1616,
        0x400 => Indirection::Pointer32,
        0x500 => Indirection::Pointer1632,
        0x600 => Indirection::Pointer64,
        _ => return Err(Error::TypeNotFound(index)),
    };

    let kind = match index.0 & 0xff {
        0x00 => PrimitiveKind::NoType,
        0x03 => PrimitiveKind::Void,
        0x08 => PrimitiveKind::HRESULT,

        0x10 => PrimitiveKind::Char,
        0x20 => PrimitiveKind::UChar,
        0x68 => PrimitiveKind::I8,
        0x69 => PrimitiveKind::U8,

        0x70 => PrimitiveKind::RChar,
        0x71 => PrimitiveKind::WChar,
        0x7a => PrimitiveKind::RChar16,
        0x7b => PrimitiveKind::RChar32,

        0x11 | 0x72 => PrimitiveKind::I16,
        0x21 | 0x73 => PrimitiveKind::U16,

        0x12 | 0x74 => PrimitiveKind::I32,
        0x22 | 0x75 => PrimitiveKind::U32,

        0x13 | 0x76 => PrimitiveKind::I64,
        0x23 | 0x77 => PrimitiveKind::U64,

        0x14 | 0x78 => PrimitiveKind::I128,
        0x24 | 0x79 => PrimitiveKind::U128,

        0x46 => PrimitiveKind::F16,
        0x40 => PrimitiveKind::F32,
        0x45 => PrimitiveKind::F32PP,
        0x44 => PrimitiveKind::F48,
        0x41 => PrimitiveKind::F64,
        0x42 => PrimitiveKind::F80,
        0x43 => PrimitiveKind::F128,

        0x30 => PrimitiveKind::Bool8,
        0x31 => PrimitiveKind::Bool16,
        0x32 => PrimitiveKind::Bool32,
        0x33 => PrimitiveKind::Bool64,

        _ => return Err(Error::TypeNotFound(index)),
    };

    Ok(PrimitiveType { kind, indirection })
}
