// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Resolution of raw type records into an owned, addressable type graph.
//!
//! Resolution runs in two passes. The first pass walks the type stream and
//! indexes every raw record by its `TypeIndex`; the second materializes each
//! record into an owned [`TypeRecord`], keeping every cross-reference as a
//! `TypeIndex` rather than chasing it. Storing indices instead of nested
//! records is what lets self-referential and mutually-referential types
//! terminate.
//!
//! Forward references are resolved by name after materialization: a complete
//! record with the same name as a provisional one wins, and the provisional
//! index redirects to it.

use std::collections::BTreeMap;

use fallible_iterator::FallibleIterator;
use tracing::{debug, warn};

use crate::common::*;
use crate::tpi::data::{self, TypeData};
use crate::tpi::primitive::primitive_type;
use crate::tpi::{CallingConvention, ClassKind, PrimitiveType, RawType, TypeStream};

/// The broad classification of a [`TypeRecord`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive,
    Pointer,
    Modifier,
    Enum,
    Class,
    Array,
    FunctionSignature,
    FieldList,
    ArgumentList,
    MethodList,
    Opaque,
}

/// An owned, materialized type record.
///
/// All cross-references are `TypeIndex` values; resolve them through
/// [`TypeGraph::type_by_index`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRecord {
    Primitive(PrimitiveType),
    Pointer(PointerRecord),
    Modifier(ModifierRecord),
    Enum(EnumRecord),
    Class(ClassRecord),
    Array(ArrayRecord),
    FunctionSignature(FunctionSignatureRecord),
    FieldList(FieldListRecord),
    ArgumentList(ArgumentListRecord),
    MethodList(MethodListRecord),
    Opaque(OpaqueRecord),
}

impl TypeRecord {
    pub fn kind(&self) -> TypeKind {
        match self {
            TypeRecord::Primitive(_) => TypeKind::Primitive,
            TypeRecord::Pointer(_) => TypeKind::Pointer,
            TypeRecord::Modifier(_) => TypeKind::Modifier,
            TypeRecord::Enum(_) => TypeKind::Enum,
            TypeRecord::Class(_) => TypeKind::Class,
            TypeRecord::Array(_) => TypeKind::Array,
            TypeRecord::FunctionSignature(_) => TypeKind::FunctionSignature,
            TypeRecord::FieldList(_) => TypeKind::FieldList,
            TypeRecord::ArgumentList(_) => TypeKind::ArgumentList,
            TypeRecord::MethodList(_) => TypeKind::MethodList,
            TypeRecord::Opaque(_) => TypeKind::Opaque,
        }
    }

    /// The record's display name, if it has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRecord::Enum(e) => Some(&e.name),
            TypeRecord::Class(c) => Some(&c.name),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PointerRecord {
    pub underlying: TypeIndex,
    pub is_const: bool,
    pub is_reference: bool,
    /// Pointer size in bytes, zero when the record doesn't say.
    pub size: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModifierRecord {
    pub underlying: TypeIndex,
    pub constant: bool,
    pub volatile: bool,
    pub unaligned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumRecord {
    pub name: String,
    pub underlying: TypeIndex,
    pub enumerators: Vec<Enumerator>,
    /// Set on forward references, which declare the enum without its
    /// enumerators.
    pub provisional: bool,
}

/// A named constant inside an enum.
///
/// The value is stored sign-extended to 64 bits regardless of the enum's
/// underlying type; [`TypeGraph::enum_value`] applies the underlying width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub kind: ClassKind,
    pub name: String,
    /// Size of an instance in bytes.
    pub size: u64,
    pub fields: Vec<MemberField>,
    pub static_fields: Vec<StaticField>,
    pub methods: Vec<MemberFunction>,
    pub bases: Vec<BaseClass>,
    /// Set on forward references, which declare the type without its
    /// members.
    pub provisional: bool,
}

impl ClassRecord {
    /// Find a field by name. When several fields share a name, the first in
    /// declaration order wins.
    pub fn field_by_name(&self, name: &str) -> Option<&MemberField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All fields at the given byte offset, in declaration order.
    pub fn fields_at_offset(&self, offset: u64) -> impl Iterator<Item = &MemberField> {
        self.fields.iter().filter(move |f| f.offset == offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberField {
    pub name: String,
    pub field_type: TypeIndex,
    /// Byte offset within the containing type.
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticField {
    pub name: String,
    pub field_type: TypeIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFunction {
    pub name: String,
    /// Index of the function signature record.
    pub signature: TypeIndex,
    pub is_constructor: bool,
    pub is_operator: bool,
    pub calling_convention: CallingConvention,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BaseClass {
    pub base: TypeIndex,
    /// Byte offset of the base within the derived class.
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayRecord {
    pub element: TypeIndex,
    pub indexing: TypeIndex,
    /// Dimensions as stored: cumulative byte sizes, outermost last.
    pub dimensions: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignatureRecord {
    /// Absent for constructors.
    pub return_type: Option<TypeIndex>,
    /// The class a member function belongs to; absent for free functions.
    pub class_type: Option<TypeIndex>,
    pub arguments: Vec<TypeIndex>,
    pub calling_convention: CallingConvention,
    pub is_constructor: bool,
}

/// A field list, kept structurally; classes and enums consume its contents
/// during materialization.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldListRecord {
    pub count: usize,
    pub continuation: Option<TypeIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentListRecord {
    pub arguments: Vec<TypeIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodListRecord {
    pub methods: Vec<MethodListItem>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MethodListItem {
    pub signature: TypeIndex,
    pub vtable_offset: Option<u32>,
}

/// A record whose tag this crate does not model, preserved rather than
/// dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OpaqueRecord {
    pub raw_kind: u16,
    /// Stream offset of the record's length prefix.
    pub offset: usize,
    /// Payload length in bytes.
    pub len: usize,
}

/// An enumerator value adjusted to its enum's underlying type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue<'g> {
    pub name: &'g str,
    pub value: i64,
    /// Width of the underlying type in bits.
    pub width: u32,
    pub signed: bool,
}

/// The resolved type graph of one PDB.
///
/// Stream records live in a dense table indexed by `TypeIndex`; primitive
/// types, which the stream never stores, are synthesized up front.
#[derive(Debug, Clone)]
pub struct TypeGraph {
    first: u32,
    records: Vec<Option<TypeRecord>>,
    primitives: BTreeMap<u32, TypeRecord>,
    names: BTreeMap<String, TypeIndex>,
    redirects: BTreeMap<u32, TypeIndex>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeGraph {
    /// Resolve a raw type stream into a graph.
    ///
    /// Corruption below the record level is fatal; corruption within records
    /// degrades to diagnostics and partial results.
    pub fn resolve(bytes: &[u8]) -> Result<Self> {
        let stream = TypeStream::parse(bytes)?;
        let first = stream.first_index().0;
        let end = stream.end_index().0;

        let mut diagnostics = Vec::new();
        let mut raws = Vec::with_capacity(stream.len().min(0x10000));

        let mut iter = stream.iter();
        loop {
            match iter.next() {
                Ok(Some(raw)) => {
                    if raw.index().0 >= end {
                        // more records than the header declares; the tail is
                        // unaddressable, so stop
                        warn!(
                            index = raw.index().0,
                            "type stream holds more records than its header declares"
                        );
                        break;
                    }
                    raws.push(raw);
                }
                Ok(None) => break,
                Err(Error::Decode(DecodeError::TruncatedRecord { offset, .. })) => {
                    warn!(offset, "type stream ends mid-record");
                    diagnostics.push(Diagnostic::TruncatedTypeRecord { offset });
                    break;
                }
                Err(Error::Decode(DecodeError::RecordTooShort)) => {
                    // framing is lost from here on
                    let offset = iter.position();
                    warn!(offset, "type record shorter than its own tag");
                    diagnostics.push(Diagnostic::TruncatedTypeRecord { offset });
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        let mut resolver = Resolver {
            raws,
            first,
            end,
            diagnostics,
        };

        let mut records = Vec::with_capacity(resolver.raws.len());
        for slot in 0..resolver.raws.len() {
            let raw = resolver.raws[slot];
            records.push(Some(resolver.materialize(raw)?));
        }

        let (names, redirects) = link_names(first, &records);

        debug!(
            records = records.len(),
            names = names.len(),
            redirects = redirects.len(),
            "resolved type graph"
        );

        Ok(TypeGraph {
            first,
            records,
            primitives: synthesize_primitives(),
            names,
            redirects,
            diagnostics: resolver.diagnostics,
        })
    }

    /// An empty graph, for containers without a type stream.
    pub(crate) fn empty() -> Self {
        TypeGraph {
            first: 0x1000,
            records: Vec::new(),
            primitives: synthesize_primitives(),
            names: BTreeMap::new(),
            redirects: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// The number of materialized stream records, excluding primitives.
    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-fatal problems encountered during resolution.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Follow a forward reference to its complete definition.
    ///
    /// Indices that are not provisional, or whose definition never appeared,
    /// map to themselves.
    pub fn definition_of(&self, index: TypeIndex) -> TypeIndex {
        self.redirects.get(&index.0).copied().unwrap_or(index)
    }

    /// Look up a record by index, following forward references.
    pub fn type_by_index(&self, index: TypeIndex) -> Option<&TypeRecord> {
        let index = self.definition_of(index);
        if index.is_primitive() {
            return self.primitives.get(&index.0);
        }

        let slot = index.0.checked_sub(self.first)? as usize;
        self.records.get(slot)?.as_ref()
    }

    /// Look up a named type. Complete definitions shadow forward
    /// references; otherwise the lowest index with the name wins.
    pub fn type_by_name(&self, name: &str) -> Option<(TypeIndex, &TypeRecord)> {
        let index = *self.names.get(name)?;
        Some((index, self.type_by_index(index)?))
    }

    /// Iterate every record: synthesized primitives first, then stream
    /// records in index order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeIndex, &TypeRecord)> {
        let first = self.first;
        let primitives = self
            .primitives
            .iter()
            .map(|(&index, record)| (TypeIndex(index), record));
        let records = self
            .records
            .iter()
            .enumerate()
            .filter_map(move |(slot, record)| {
                record.as_ref().map(|r| (TypeIndex(first + slot as u32), r))
            });
        primitives.chain(records)
    }

    /// Look up an enumerator by name and adjust its stored 64-bit value to
    /// the enum's underlying type: masked to the underlying width, then
    /// sign-extended only if the underlying type is signed.
    pub fn enum_value(&self, enum_index: TypeIndex, name: &str) -> Option<EnumValue<'_>> {
        let record = match self.type_by_index(enum_index)? {
            TypeRecord::Enum(e) => e,
            _ => return None,
        };
        let enumerator = record.enumerators.iter().find(|e| e.name == name)?;

        let (width, signed) = self.scalar_shape(record.underlying);
        let value = if width >= 64 {
            enumerator.value
        } else {
            let mask = (1u64 << width) - 1;
            let raw = (enumerator.value as u64) & mask;
            if signed && raw & (1 << (width - 1)) != 0 {
                (raw | !mask) as i64
            } else {
                raw as i64
            }
        };

        Some(EnumValue {
            name: &enumerator.name,
            value,
            width,
            signed,
        })
    }

    /// Width and signedness of a scalar type, peeling modifiers.
    fn scalar_shape(&self, mut index: TypeIndex) -> (u32, bool) {
        for _ in 0..8 {
            match self.type_by_index(index) {
                Some(TypeRecord::Primitive(p)) => {
                    return (p.bit_width().unwrap_or(64), p.is_signed())
                }
                Some(TypeRecord::Modifier(m)) => index = m.underlying,
                Some(TypeRecord::Enum(e)) => index = e.underlying,
                _ => break,
            }
        }
        (64, true)
    }
}

/// Scratch state for the materialization pass.
struct Resolver<'t> {
    raws: Vec<RawType<'t>>,
    first: u32,
    end: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> Resolver<'t> {
    fn raw(&self, index: TypeIndex) -> Option<RawType<'t>> {
        let slot = index.0.checked_sub(self.first)? as usize;
        self.raws.get(slot).copied()
    }

    /// Check a cross-reference. Out-of-range references are fatal;
    /// references into the truncated-away tail degrade to a diagnostic.
    fn check_reference(&mut self, referrer: TypeIndex, target: TypeIndex) -> Result<()> {
        if target.is_primitive() {
            return if primitive_type(target).is_ok() {
                Ok(())
            } else {
                Err(ResolveError::DanglingReference { referrer, target }.into())
            };
        }
        if target.0 < self.first || target.0 >= self.end {
            return Err(ResolveError::DanglingReference { referrer, target }.into());
        }
        if self.raw(target).is_none() {
            warn!(
                referrer = referrer.0,
                target = target.0,
                "type reference into the truncated tail of the stream"
            );
            self.diagnostics.push(Diagnostic::MissingTypeReference {
                index: referrer,
                target,
            });
        }
        Ok(())
    }

    fn materialize(&mut self, raw: RawType<'t>) -> Result<TypeRecord> {
        let index = raw.index();
        let data = match raw.parse() {
            Ok(data) => data,
            Err(Error::Decode(DecodeError::UnknownKind(_))) => {
                return Ok(self.opaque(raw));
            }
            Err(Error::Decode(_)) => {
                warn!(
                    index = index.0,
                    kind = raw.raw_kind(),
                    "malformed type record"
                );
                self.diagnostics.push(Diagnostic::MalformedTypeRecord {
                    index,
                    kind: raw.raw_kind(),
                });
                return Ok(self.opaque(raw));
            }
            Err(err) => return Err(err),
        };

        match data {
            TypeData::Pointer(p) => {
                self.check_reference(index, p.underlying_type)?;
                Ok(TypeRecord::Pointer(PointerRecord {
                    underlying: p.underlying_type,
                    is_const: p.attributes.is_const(),
                    is_reference: p.attributes.is_reference(),
                    size: p.attributes.size(),
                }))
            }

            TypeData::Modifier(m) => {
                self.check_reference(index, m.underlying_type)?;
                Ok(TypeRecord::Modifier(ModifierRecord {
                    underlying: m.underlying_type,
                    constant: m.constant,
                    volatile: m.volatile,
                    unaligned: m.unaligned,
                }))
            }

            TypeData::Enumeration(e) => self.materialize_enum(index, e),

            TypeData::Class(c) => self.materialize_class(index, c),

            TypeData::Array(a) => {
                self.check_reference(index, a.element_type)?;
                self.check_reference(index, a.indexing_type)?;
                Ok(TypeRecord::Array(ArrayRecord {
                    element: a.element_type,
                    indexing: a.indexing_type,
                    dimensions: a.dimensions,
                }))
            }

            TypeData::Procedure(p) => {
                if let Some(return_type) = p.return_type {
                    self.check_reference(index, return_type)?;
                }
                let arguments = self.argument_list(index, p.argument_list)?;
                Ok(TypeRecord::FunctionSignature(FunctionSignatureRecord {
                    return_type: p.return_type,
                    class_type: None,
                    arguments,
                    calling_convention: p.attributes.calling_convention(),
                    is_constructor: p.attributes.is_constructor(),
                }))
            }

            TypeData::MemberFunction(f) => {
                self.check_reference(index, f.return_type)?;
                self.check_reference(index, f.class_type)?;
                let arguments = self.argument_list(index, f.argument_list)?;
                let is_constructor = f.attributes.is_constructor();
                Ok(TypeRecord::FunctionSignature(FunctionSignatureRecord {
                    return_type: if is_constructor {
                        None
                    } else {
                        Some(f.return_type)
                    },
                    class_type: Some(f.class_type),
                    arguments,
                    calling_convention: f.attributes.calling_convention(),
                    is_constructor,
                }))
            }

            TypeData::FieldList(list) => {
                if let Some(continuation) = list.continuation {
                    self.check_reference(index, continuation)?;
                }
                Ok(TypeRecord::FieldList(FieldListRecord {
                    count: list.fields.len(),
                    continuation: list.continuation,
                }))
            }

            TypeData::ArgumentList(list) => {
                for &argument in &list.arguments {
                    self.check_reference(index, argument)?;
                }
                Ok(TypeRecord::ArgumentList(ArgumentListRecord {
                    arguments: list.arguments,
                }))
            }

            TypeData::MethodList(list) => Ok(TypeRecord::MethodList(MethodListRecord {
                methods: list
                    .methods
                    .iter()
                    .map(|m| MethodListItem {
                        signature: m.method_type,
                        vtable_offset: m.vtable_offset,
                    })
                    .collect(),
            })),

            // member leaves only occur inside field lists
            _ => Ok(self.opaque(raw)),
        }
    }

    fn opaque(&self, raw: RawType<'t>) -> TypeRecord {
        TypeRecord::Opaque(OpaqueRecord {
            raw_kind: raw.raw_kind(),
            offset: raw.offset(),
            len: raw.data().len(),
        })
    }

    fn materialize_enum(&mut self, index: TypeIndex, e: data::EnumerationType<'_>) -> Result<TypeRecord> {
        self.check_reference(index, e.underlying_type)?;

        let provisional = e.properties.forward_reference();
        let mut enumerators = Vec::new();
        if !provisional {
            self.walk_field_lists(index, e.fields, &mut |_, field| {
                if let TypeData::Enumerate(variant) = field {
                    enumerators.push(Enumerator {
                        name: variant.name.to_string().into_owned(),
                        value: variant.value.to_i64(),
                    });
                }
                Ok(())
            })?;
        }

        Ok(TypeRecord::Enum(EnumRecord {
            name: e.name.to_string().into_owned(),
            underlying: e.underlying_type,
            enumerators,
            provisional,
        }))
    }

    fn materialize_class(&mut self, index: TypeIndex, c: data::ClassType<'_>) -> Result<TypeRecord> {
        let provisional = c.properties.forward_reference();

        let mut fields = Vec::new();
        let mut static_fields = Vec::new();
        let mut methods = Vec::new();
        let mut bases = Vec::new();

        if let Some(list) = c.fields {
            let mut pending_methods = Vec::new();
            self.walk_field_lists(index, list, &mut |this, field| {
                match field {
                    TypeData::Member(m) => {
                        this.check_reference(index, m.field_type)?;
                        fields.push(MemberField {
                            name: m.name.to_string().into_owned(),
                            field_type: m.field_type,
                            offset: m.offset,
                        });
                    }
                    TypeData::StaticMember(m) => {
                        this.check_reference(index, m.field_type)?;
                        static_fields.push(StaticField {
                            name: m.name.to_string().into_owned(),
                            field_type: m.field_type,
                        });
                    }
                    TypeData::Method(m) => {
                        this.check_reference(index, m.method_type)?;
                        pending_methods.push((m.name.to_string().into_owned(), m.method_type));
                    }
                    TypeData::OverloadedMethod(m) => {
                        this.check_reference(index, m.method_list)?;
                        let name = m.name.to_string().into_owned();
                        for entry in this.method_list(index, m.method_list)? {
                            pending_methods.push((name.clone(), entry));
                        }
                    }
                    TypeData::BaseClass(b) => {
                        this.check_reference(index, b.base_class)?;
                        bases.push(BaseClass {
                            base: b.base_class,
                            offset: b.offset,
                        });
                    }
                    TypeData::VirtualBaseClass(b) => {
                        this.check_reference(index, b.base_class)?;
                        bases.push(BaseClass {
                            base: b.base_class,
                            offset: b.base_pointer_offset,
                        });
                    }
                    // vtable pointers and nested types are not modeled
                    _ => (),
                }
                Ok(())
            })?;

            for (name, signature) in pending_methods {
                let attributes = self.function_attributes(signature);
                methods.push(MemberFunction {
                    is_constructor: attributes.map_or(false, |a| a.is_constructor()),
                    is_operator: name.starts_with("operator"),
                    calling_convention: attributes
                        .map_or(CallingConvention::NearC, |a| a.calling_convention()),
                    name,
                    signature,
                });
            }
        }

        Ok(TypeRecord::Class(ClassRecord {
            kind: c.kind,
            name: c.name.to_string().into_owned(),
            size: c.size,
            fields,
            static_fields,
            methods,
            bases,
            provisional,
        }))
    }

    /// Walk a field list and its continuation chain, invoking the callback
    /// for every member leaf in declaration order.
    fn walk_field_lists(
        &mut self,
        referrer: TypeIndex,
        list: TypeIndex,
        visit: &mut dyn FnMut(&mut Self, TypeData<'t>) -> Result<()>,
    ) -> Result<()> {
        let mut next = Some(list);
        // a continuation chain can't be longer than the stream itself
        let mut budget = self.raws.len() + 1;

        while let Some(list) = next {
            if budget == 0 {
                return Err(ResolveError::DanglingReference {
                    referrer,
                    target: list,
                }
                .into());
            }
            budget -= 1;

            self.check_reference(referrer, list)?;
            let raw = match self.raw(list) {
                Some(raw) => raw,
                None => return Ok(()), // truncated away; already diagnosed
            };

            match raw.parse() {
                Ok(TypeData::FieldList(parsed)) => {
                    next = parsed.continuation;
                    for field in parsed.fields {
                        visit(self, field)?;
                    }
                }
                Ok(_) => {
                    return Err(ResolveError::DanglingReference {
                        referrer,
                        target: list,
                    }
                    .into())
                }
                Err(Error::Decode(_)) => {
                    warn!(index = list.0, "malformed field list");
                    self.diagnostics.push(Diagnostic::MalformedTypeRecord {
                        index: list,
                        kind: raw.raw_kind(),
                    });
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// Resolve an argument list reference into its argument indices.
    fn argument_list(&mut self, referrer: TypeIndex, list: TypeIndex) -> Result<Vec<TypeIndex>> {
        self.check_reference(referrer, list)?;
        let raw = match self.raw(list) {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };

        match raw.parse() {
            Ok(TypeData::ArgumentList(parsed)) => {
                for &argument in &parsed.arguments {
                    self.check_reference(list, argument)?;
                }
                Ok(parsed.arguments)
            }
            _ => Err(ResolveError::DanglingReference {
                referrer,
                target: list,
            }
            .into()),
        }
    }

    /// Resolve a method list reference into its signature indices.
    fn method_list(&mut self, referrer: TypeIndex, list: TypeIndex) -> Result<Vec<TypeIndex>> {
        let raw = match self.raw(list) {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };

        match raw.parse() {
            Ok(TypeData::MethodList(parsed)) => {
                let mut signatures = Vec::with_capacity(parsed.methods.len());
                for entry in &parsed.methods {
                    self.check_reference(list, entry.method_type)?;
                    signatures.push(entry.method_type);
                }
                Ok(signatures)
            }
            _ => Err(ResolveError::DanglingReference {
                referrer,
                target: list,
            }
            .into()),
        }
    }

    /// Peek at a member function record's attributes without materializing
    /// it.
    fn function_attributes(&self, signature: TypeIndex) -> Option<data::FunctionAttributes> {
        match self.raw(signature)?.parse().ok()? {
            TypeData::MemberFunction(f) => Some(f.attributes),
            TypeData::Procedure(p) => Some(p.attributes),
            _ => None,
        }
    }
}

/// Build the name table and forward-reference redirects.
///
/// Complete records shadow provisional ones of the same name; among records
/// of equal standing, the lowest index wins.
fn link_names(
    first: u32,
    records: &[Option<TypeRecord>],
) -> (BTreeMap<String, TypeIndex>, BTreeMap<u32, TypeIndex>) {
    let mut complete = BTreeMap::new();
    let mut provisional = Vec::new();

    for (slot, record) in records.iter().enumerate() {
        let index = TypeIndex(first + slot as u32);
        let (name, is_provisional) = match record {
            Some(TypeRecord::Enum(e)) => (&e.name, e.provisional),
            Some(TypeRecord::Class(c)) => (&c.name, c.provisional),
            _ => continue,
        };
        if name.is_empty() {
            continue;
        }

        if is_provisional {
            provisional.push((name.clone(), index));
        } else {
            complete.entry(name.clone()).or_insert(index);
        }
    }

    let mut names = complete.clone();
    let mut redirects = BTreeMap::new();

    for (name, index) in provisional {
        match complete.get(&name) {
            Some(&definition) => {
                redirects.insert(index.0, definition);
            }
            None => {
                names.entry(name).or_insert(index);
            }
        }
    }

    (names, redirects)
}

/// The primitive table, synthesized once per graph.
///
/// Stored in index order so iteration over primitives is deterministic.
fn synthesize_primitives() -> BTreeMap<u32, TypeRecord> {
    const KINDS: &[u32] = &[
        0x00, 0x03, 0x08, 0x10, 0x11, 0x12, 0x13, 0x14, 0x20, 0x21, 0x22, 0x23, 0x24, 0x30, 0x31,
        0x32, 0x33, 0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x68, 0x69, 0x70, 0x71, 0x72, 0x73,
        0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x7b,
    ];

    let mut table = BTreeMap::new();
    for indirection in (0x000..=0x600).step_by(0x100) {
        for &kind in KINDS {
            let index = TypeIndex(indirection | kind);
            if let Ok(primitive) = primitive_type(index) {
                table.insert(index.0, TypeRecord::Primitive(primitive));
            }
        }
    }
    table
}
