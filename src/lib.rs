// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `pdbgraph` crate reads the type and symbol information stored in
//! Microsoft PDB (Program Database) files. It parses the MSF container,
//! decodes the TPI and symbol records streams, resolves type
//! cross-references into an addressable graph, and builds a queryable
//! symbol table.
//!
//! # Example
//!
//! ```no_run
//! # fn test() -> pdbgraph::Result<()> {
//! let file = std::fs::File::open("fixtures/exports.pdb")?;
//! let reader = pdbgraph::PdbReader::open(file)?;
//!
//! if let Some(symbol) = reader.symbol_by_name("foo::bar::CONSTANT_INSIDE_NAMESPACE")? {
//!     println!("{} = {:?}", symbol.display_name(), symbol.value);
//! }
//!
//! for (index, record) in reader.types_of_kind(pdbgraph::TypeKind::Enum)? {
//!     println!("{}: {:?}", index, record.name());
//! }
//! # Ok(())
//! # }
//! ```

// modules
mod common;
mod dbi;
mod graph;
mod msf;
mod pdbi;
mod reader;
mod source;
mod sym;
mod symtab;
mod tpi;

// exports
pub use crate::common::{
    ContainerError, DecodeError, Diagnostic, Error, RawString, ResolveError, Result, StreamIndex,
    SymbolError, TypeIndex, Variant,
};
pub use crate::dbi::{DebugInformation, HeaderVersion, MachineType};
pub use crate::graph::{
    ArgumentListRecord, ArrayRecord, BaseClass, ClassRecord, EnumRecord, EnumValue, Enumerator,
    FieldListRecord, FunctionSignatureRecord, MemberField, MemberFunction, MethodListItem,
    MethodListRecord, ModifierRecord, OpaqueRecord, PointerRecord, StaticField, TypeGraph,
    TypeKind, TypeRecord,
};
pub use crate::msf::{Container, Stream};
pub use crate::pdbi::PdbInformation;
pub use crate::reader::PdbReader;
pub use crate::source::*;
pub use crate::sym::*;
pub use crate::symtab::{GlobalSymbol, StorageKind, SymbolTable, SymbolValue};
pub use crate::tpi::*;

// re-export FallibleIterator for convenience
#[doc(no_inline)]
pub use fallible_iterator::FallibleIterator;
