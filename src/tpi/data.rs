// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Borrowed views of individual type records.
//!
//! `TypeData` parses a single record's payload without following any of its
//! cross-references; strings borrow from the stream. Resolution into owned,
//! cross-linked records happens in [`crate::graph`].

use crate::common::*;
use crate::tpi::constants::*;
use crate::tpi::primitive::PrimitiveType;

/// The decoded payload of a single type record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeData<'t> {
    Primitive(PrimitiveType),
    Class(ClassType<'t>),
    Member(MemberType<'t>),
    StaticMember(StaticMemberType<'t>),
    Nested(NestedType<'t>),
    BaseClass(BaseClassType),
    VirtualBaseClass(VirtualBaseClassType),
    VirtualFunctionTablePointer(VirtualFunctionTablePointerType),
    Method(MethodType<'t>),
    OverloadedMethod(OverloadedMethodType<'t>),
    MemberFunction(MemberFunctionType),
    Procedure(ProcedureType),
    Pointer(PointerType),
    Modifier(ModifierType),
    Enumeration(EnumerationType<'t>),
    Enumerate(EnumerateType<'t>),
    Array(ArrayType),
    FieldList(FieldList<'t>),
    ArgumentList(ArgumentList),
    MethodList(MethodList),
}

impl<'t> TypeData<'t> {
    /// Return the name of this record, if it has one.
    pub fn name(&self) -> Option<RawString<'t>> {
        let name = match *self {
            TypeData::Class(ClassType { ref name, .. })
            | TypeData::Member(MemberType { ref name, .. })
            | TypeData::StaticMember(StaticMemberType { ref name, .. })
            | TypeData::Nested(NestedType { ref name, .. })
            | TypeData::Method(MethodType { ref name, .. })
            | TypeData::OverloadedMethod(OverloadedMethodType { ref name, .. })
            | TypeData::Enumeration(EnumerationType { ref name, .. })
            | TypeData::Enumerate(EnumerateType { ref name, .. }) => name,
            _ => return None,
        };

        Some(*name)
    }
}

/// Parse one type record's payload, starting at its leaf tag.
///
/// Records of kinds this crate does not model yield
/// `DecodeError::UnknownKind`, which callers preserve opaquely.
pub(crate) fn parse_type_data<'t>(buf: &mut ParseBuffer<'t>) -> Result<TypeData<'t>> {
    let leaf = buf.parse_u16()?;

    match leaf {
        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1631-L1642
        LF_CLASS | LF_STRUCTURE | LF_INTERFACE => Ok(TypeData::Class(ClassType {
            kind: match leaf {
                LF_CLASS => ClassKind::Class,
                LF_STRUCTURE => ClassKind::Struct,
                LF_INTERFACE => ClassKind::Interface,
                _ => unreachable!(),
            },
            count: buf.parse_u16()?,
            properties: TypeProperties(buf.parse_u16()?),
            fields: parse_optional_index(buf)?,
            derived_from: parse_optional_index(buf)?,
            vtable_shape: parse_optional_index(buf)?,
            size: parse_unsigned(buf)?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2580-L2586
        LF_MEMBER => Ok(TypeData::Member(MemberType {
            attributes: FieldAttributes(buf.parse_u16()?),
            field_type: buf.parse()?,
            offset: parse_unsigned(buf)?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2599-L2604
        LF_STMEMBER => Ok(TypeData::StaticMember(StaticMemberType {
            attributes: FieldAttributes(buf.parse_u16()?),
            field_type: buf.parse()?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2699-L2714
        LF_NESTTYPE => {
            // the first u16 is padding here
            buf.parse_u16()?;
            Ok(TypeData::Nested(NestedType {
                nested_type: buf.parse()?,
                name: buf.parse_cstring()?,
            }))
        }

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2499-L2505
        LF_BCLASS => Ok(TypeData::BaseClass(BaseClassType {
            attributes: FieldAttributes(buf.parse_u16()?),
            base_class: buf.parse()?,
            offset: parse_unsigned(buf)?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2521-L2528
        LF_VBCLASS | LF_IVBCLASS => Ok(TypeData::VirtualBaseClass(VirtualBaseClassType {
            direct: leaf == LF_VBCLASS,
            attributes: FieldAttributes(buf.parse_u16()?),
            base_class: buf.parse()?,
            base_pointer: buf.parse()?,
            base_pointer_offset: parse_unsigned(buf)?,
            virtual_base_offset: parse_unsigned(buf)?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2615-L2619
        LF_VFUNCTAB => {
            // padding, always zero
            buf.parse_u16()?;
            Ok(TypeData::VirtualFunctionTablePointer(
                VirtualFunctionTablePointerType {
                    table: buf.parse()?,
                },
            ))
        }

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2671-L2678
        LF_ONEMETHOD => {
            let attributes = FieldAttributes(buf.parse_u16()?);
            Ok(TypeData::Method(MethodType {
                attributes,
                method_type: buf.parse()?,
                vtable_offset: if attributes.is_intro_virtual() {
                    // yes, this field is variable length
                    Some(buf.parse_u32()?)
                } else {
                    None
                },
                name: buf.parse_cstring()?,
            }))
        }

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2650-L2655
        LF_METHOD => Ok(TypeData::OverloadedMethod(OverloadedMethodType {
            count: buf.parse_u16()?,
            method_list: buf.parse()?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1801-L1811
        LF_MFUNCTION => Ok(TypeData::MemberFunction(MemberFunctionType {
            return_type: buf.parse()?,
            class_type: buf.parse()?,
            this_pointer_type: parse_optional_index(buf)?,
            attributes: FunctionAttributes(buf.parse_u16()?),
            parameter_count: buf.parse_u16()?,
            argument_list: buf.parse()?,
            this_adjustment: buf.parse_u32()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1775-L1782
        LF_PROCEDURE => Ok(TypeData::Procedure(ProcedureType {
            return_type: parse_optional_index(buf)?,
            attributes: FunctionAttributes(buf.parse_u16()?),
            parameter_count: buf.parse_u16()?,
            argument_list: buf.parse()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1469-L1506
        LF_POINTER => Ok(TypeData::Pointer(PointerType {
            underlying_type: buf.parse()?,
            attributes: PointerAttributes(buf.parse_u32()?),
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1460-L1464
        LF_MODIFIER => {
            let underlying_type = buf.parse()?;
            let flags = buf.parse_u16()?;
            Ok(TypeData::Modifier(ModifierType {
                underlying_type,
                constant: (flags & 0x01) != 0,
                volatile: (flags & 0x02) != 0,
                unaligned: (flags & 0x04) != 0,
            }))
        }

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1752-L1759
        LF_ENUM => Ok(TypeData::Enumeration(EnumerationType {
            count: buf.parse_u16()?,
            properties: TypeProperties(buf.parse_u16()?),
            underlying_type: buf.parse()?,
            fields: buf.parse()?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2683-L2688
        LF_ENUMERATE => Ok(TypeData::Enumerate(EnumerateType {
            attributes: FieldAttributes(buf.parse_u16()?),
            value: buf.parse_variant()?,
            name: buf.parse_cstring()?,
        })),

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1564-L1579
        LF_ARRAY => {
            let element_type = buf.parse()?;
            let indexing_type = buf.parse()?;

            // dimensions are byte sizes, with higher dimensions aggregating
            // the lower ones; a trailing NUL (an empty name) ends the list
            let mut dimensions = Vec::new();
            loop {
                dimensions.push(parse_unsigned(buf)?);

                if buf.is_empty() {
                    return Err(DecodeError::UnexpectedEof.into());
                }
                if buf.peek_u8()? == 0x00 {
                    buf.parse_u8()?;
                    break;
                }
            }

            parse_padding(buf)?;

            Ok(TypeData::Array(ArrayType {
                element_type,
                indexing_type,
                dimensions,
            }))
        }

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2112-L2115
        LF_FIELDLIST => {
            let mut fields = Vec::new();
            let mut continuation = None;

            while !buf.is_empty() {
                if buf.peek_u16()? == LF_INDEX {
                    // continuation record: the list resumes in another
                    // field list
                    buf.parse_u16()?;
                    buf.parse_u16()?; // padding
                    continuation = Some(buf.parse()?);
                } else {
                    fields.push(parse_type_data(buf)?);
                }

                parse_padding(buf)?;
            }

            Ok(TypeData::FieldList(FieldList {
                fields,
                continuation,
            }))
        }

        LF_ARGLIST => {
            let count = buf.parse_u32()?;
            let mut arguments = Vec::with_capacity(count as usize);
            for _ in 0..count {
                arguments.push(buf.parse()?);
            }
            Ok(TypeData::ArgumentList(ArgumentList { arguments }))
        }

        // https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2131-L2136
        LF_METHODLIST => {
            let mut methods = Vec::new();

            while !buf.is_empty() {
                let attributes = FieldAttributes(buf.parse_u16()?);
                buf.parse_u16()?; // padding

                methods.push(MethodListEntry {
                    attributes,
                    method_type: buf.parse()?,
                    vtable_offset: if attributes.is_intro_virtual() {
                        Some(buf.parse_u32()?)
                    } else {
                        None
                    },
                });
            }

            Ok(TypeData::MethodList(MethodList { methods }))
        }

        _ => Err(DecodeError::UnknownKind(leaf).into()),
    }
}

#[inline]
fn parse_optional_index(buf: &mut ParseBuffer<'_>) -> Result<Option<TypeIndex>> {
    let index: TypeIndex = buf.parse()?;
    if index.0 == 0 || index.0 == u32::from(u16::max_value()) {
        Ok(None)
    } else {
        Ok(Some(index))
    }
}

#[inline]
pub(crate) fn parse_padding(buf: &mut ParseBuffer<'_>) -> Result<()> {
    while !buf.is_empty() && buf.peek_u8()? >= LF_PAD0 {
        let padding = buf.parse_u8()?;
        if padding > LF_PAD0 {
            // low four bits count the padding bytes, including this one
            buf.take((padding & 0x0f) as usize - 1)?;
        }
    }
    Ok(())
}

// https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/pdbdump/pdbdump.cpp#L2417-L2456
fn parse_unsigned(buf: &mut ParseBuffer<'_>) -> Result<u64> {
    let leaf = buf.parse_u16()?;
    if leaf < LF_NUMERIC {
        return Ok(u64::from(leaf));
    }

    match leaf {
        LF_CHAR => Ok(u64::from(buf.parse_u8()?)),
        LF_USHORT => Ok(u64::from(buf.parse_u16()?)),
        LF_ULONG => Ok(u64::from(buf.parse_u32()?)),
        LF_UQUADWORD => Ok(buf.parse_u64()?),
        _ => Err(DecodeError::BadNumericLeaf(leaf).into()),
    }
}

// CV_prop_t:
//   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1120-L1142
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypeProperties(pub(crate) u16);

impl TypeProperties {
    /// Whether the type has constructors or destructors.
    pub fn constructors(self) -> bool {
        self.0 & 0x0002 != 0
    }

    /// Whether the type has overloaded operators.
    pub fn overloaded_operators(self) -> bool {
        self.0 & 0x0004 != 0
    }

    /// Whether this record is a forward reference: an incomplete placeholder
    /// that a later, complete record with the same name replaces. Necessary
    /// for self-referential types, but ordinary declaration/definition
    /// idioms produce them too.
    pub fn forward_reference(self) -> bool {
        self.0 & 0x0080 != 0
    }

    /// Whether the type is scoped inside another definition.
    pub fn scoped_definition(self) -> bool {
        self.0 & 0x0100 != 0
    }
}

// CV_fldattr_t:
//   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1090-L1095
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldAttributes(pub(crate) u16);

impl FieldAttributes {
    #[inline]
    pub fn access(self) -> u8 {
        (self.0 & 0x0003) as u8
    }

    #[inline]
    fn method_properties(self) -> u8 {
        ((self.0 & 0x001c) >> 2) as u8
    }

    #[inline]
    pub fn is_static(self) -> bool {
        self.method_properties() == 0x02
    }

    #[inline]
    pub fn is_virtual(self) -> bool {
        self.method_properties() == 0x01
    }

    #[inline]
    pub fn is_intro_virtual(self) -> bool {
        matches!(self.method_properties(), 0x04 | 0x06)
    }
}

// CV_call_t and CV_funcattr_t are always found back to back; treat them as
// one u16.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FunctionAttributes(pub(crate) u16);

impl FunctionAttributes {
    pub fn calling_convention(self) -> CallingConvention {
        CallingConvention::from((self.0 & 0xff) as u8)
    }

    pub fn is_constructor(self) -> bool {
        (self.0 & 0x0200) != 0
    }
}

/// The calling convention of a procedure or member function.
///
/// CV_call_e:
///   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L230-L268
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallingConvention {
    /// Near C call, caller pops the stack.
    NearC,
    /// Near fastcall.
    NearFast,
    /// Near standard call, callee pops the stack.
    NearStd,
    /// This call, `this` passed in a register.
    ThisCall,
    /// CLR call.
    ClrCall,
    /// Near vectorcall.
    NearVector,
    /// Any convention not otherwise modeled, preserved by ordinal.
    Other(u8),
}

impl From<u8> for CallingConvention {
    fn from(raw: u8) -> Self {
        match raw {
            0x00 => CallingConvention::NearC,
            0x04 => CallingConvention::NearFast,
            0x07 => CallingConvention::NearStd,
            0x0b => CallingConvention::ThisCall,
            0x16 => CallingConvention::ClrCall,
            0x18 => CallingConvention::NearVector,
            other => CallingConvention::Other(other),
        }
    }
}

// lfPointerAttr:
//   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L1469-L1506
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PointerAttributes(pub(crate) u32);

impl PointerAttributes {
    /// The CV_ptrtype_e ordinal.
    pub fn pointer_type(self) -> u8 {
        (self.0 & 0x1f) as u8
    }

    /// Whether this pointer is `const`.
    pub fn is_const(self) -> bool {
        (self.0 >> 10) & 1 != 0
    }

    /// Whether this is a C++ reference (l-value or r-value) rather than a
    /// pointer.
    pub fn is_reference(self) -> bool {
        matches!((self.0 >> 5) & 0x07, 0x01 | 0x04)
    }

    /// The size of the pointer in bytes.
    pub fn size(self) -> u8 {
        let size = ((self.0 >> 13) & 0x3f) as u8;
        if size != 0 {
            return size;
        }
        match self.pointer_type() {
            0x0a => 4,
            0x0c => 8,
            _ => 0,
        }
    }
}

/// `LF_CLASS`, `LF_STRUCTURE` or `LF_INTERFACE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassType<'t> {
    pub kind: ClassKind,

    /// Number of elements in the class.
    pub count: u16,
    pub properties: TypeProperties,

    /// The field list describing this class's members, absent for forward
    /// references.
    pub fields: Option<TypeIndex>,
    pub derived_from: Option<TypeIndex>,
    pub vtable_shape: Option<TypeIndex>,

    /// Size of an instance in bytes.
    pub size: u64,

    pub name: RawString<'t>,
}

/// Distinguishes the class-like record kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Struct,
    Interface,
}

/// `LF_MEMBER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberType<'t> {
    pub attributes: FieldAttributes,
    pub field_type: TypeIndex,
    /// Byte offset of the field within the containing type.
    pub offset: u64,
    pub name: RawString<'t>,
}

/// `LF_STMEMBER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMemberType<'t> {
    pub attributes: FieldAttributes,
    pub field_type: TypeIndex,
    pub name: RawString<'t>,
}

/// `LF_NESTTYPE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedType<'t> {
    pub nested_type: TypeIndex,
    pub name: RawString<'t>,
}

/// `LF_BCLASS`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BaseClassType {
    pub attributes: FieldAttributes,
    pub base_class: TypeIndex,
    /// Byte offset of the base within the derived class.
    pub offset: u64,
}

/// `LF_VBCLASS` or `LF_IVBCLASS`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VirtualBaseClassType {
    pub direct: bool,
    pub attributes: FieldAttributes,
    pub base_class: TypeIndex,
    pub base_pointer: TypeIndex,
    pub base_pointer_offset: u64,
    pub virtual_base_offset: u64,
}

/// `LF_VFUNCTAB`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VirtualFunctionTablePointerType {
    pub table: TypeIndex,
}

/// `LF_ONEMETHOD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodType<'t> {
    pub attributes: FieldAttributes,
    pub method_type: TypeIndex,
    pub vtable_offset: Option<u32>,
    pub name: RawString<'t>,
}

/// `LF_METHOD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadedMethodType<'t> {
    pub count: u16,
    pub method_list: TypeIndex,
    pub name: RawString<'t>,
}

/// `LF_MFUNCTION`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemberFunctionType {
    pub return_type: TypeIndex,
    pub class_type: TypeIndex,
    pub this_pointer_type: Option<TypeIndex>,
    pub attributes: FunctionAttributes,
    pub parameter_count: u16,
    pub argument_list: TypeIndex,
    pub this_adjustment: u32,
}

/// `LF_PROCEDURE`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProcedureType {
    /// Absent for constructors.
    pub return_type: Option<TypeIndex>,
    pub attributes: FunctionAttributes,
    pub parameter_count: u16,
    pub argument_list: TypeIndex,
}

/// `LF_POINTER`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PointerType {
    pub underlying_type: TypeIndex,
    pub attributes: PointerAttributes,
}

/// `LF_MODIFIER`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModifierType {
    pub underlying_type: TypeIndex,
    pub constant: bool,
    pub volatile: bool,
    pub unaligned: bool,
}

/// `LF_ENUM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationType<'t> {
    pub count: u16,
    pub properties: TypeProperties,
    pub underlying_type: TypeIndex,
    pub fields: TypeIndex,
    pub name: RawString<'t>,
}

/// `LF_ENUMERATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateType<'t> {
    pub attributes: FieldAttributes,
    pub value: Variant,
    pub name: RawString<'t>,
}

/// `LF_ARRAY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub element_type: TypeIndex,
    pub indexing_type: TypeIndex,

    /// Dimensions as stored: byte sizes, not element counts, with each
    /// higher dimension aggregating the lower ones. A `float[4][4]` is
    /// `[16, 64]`.
    pub dimensions: Vec<u64>,
}

/// `LF_FIELDLIST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList<'t> {
    pub fields: Vec<TypeData<'t>>,

    /// When members don't all fit in one record, the list continues in
    /// another field list.
    pub continuation: Option<TypeIndex>,
}

/// `LF_ARGLIST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentList {
    pub arguments: Vec<TypeIndex>,
}

/// `LF_METHODLIST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodList {
    pub methods: Vec<MethodListEntry>,
}

/// An entry in a `MethodList`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MethodListEntry {
    pub attributes: FieldAttributes,
    pub method_type: TypeIndex,
    pub vtable_offset: Option<u32>,
}
