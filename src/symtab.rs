// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The global symbol table: symbol records resolved against the type graph.
//!
//! Building the table walks the symbol records stream once. Records nested
//! inside procedure scopes are locals and don't appear in the table. A
//! symbol whose declared type doesn't resolve is recorded as a diagnostic
//! and skipped; nothing short of stream corruption aborts the build.

use std::collections::BTreeMap;
use std::result;

use fallible_iterator::FallibleIterator;
use tracing::{debug, warn};

use crate::common::*;
use crate::graph::TypeGraph;
use crate::sym::{SymbolData, SymbolStream};

/// How a symbol's value is stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// An exported or global function.
    Function,
    /// Exported or global data.
    Data,
    /// A compile-time constant.
    Constant,
}

/// The value a symbol carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SymbolValue {
    /// A constant's value, sign-extended to 64 bits.
    Constant(i64),
    /// A segment-relative address.
    Address { segment: u16, offset: u32 },
}

/// One entry of the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSymbol {
    /// The symbol's base name, without its scope.
    pub name: String,
    /// Enclosing scopes, outermost first. Empty for unscoped and mangled
    /// names.
    pub scope: Vec<String>,
    /// The symbol's type; `TypeIndex(0)` for typeless symbols such as
    /// publics.
    pub type_index: TypeIndex,
    pub storage: StorageKind,
    pub value: SymbolValue,
}

impl GlobalSymbol {
    /// The `::`-joined display name the symbol was declared with.
    pub fn display_name(&self) -> String {
        if self.scope.is_empty() {
            return self.name.clone();
        }
        let mut display = self.scope.join("::");
        display.push_str("::");
        display.push_str(&self.name);
        display
    }

    /// Resolve a classified symbol against the type graph.
    fn resolve(
        display_name: &str,
        type_index: TypeIndex,
        storage: StorageKind,
        value: SymbolValue,
        graph: &TypeGraph,
    ) -> result::Result<Self, SymbolError> {
        if graph.type_by_index(type_index).is_none() {
            return Err(SymbolError::UnresolvedType(type_index));
        }

        let (scope, name) = scope_path(display_name);
        Ok(GlobalSymbol {
            name,
            scope,
            type_index,
            storage,
            value,
        })
    }
}

/// The resolved global symbol table of one PDB.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<GlobalSymbol>,
    by_name: BTreeMap<String, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl SymbolTable {
    /// Build the table from the raw symbol records stream.
    pub fn build(bytes: &[u8], graph: &TypeGraph) -> Result<Self> {
        let mut table = SymbolTable {
            symbols: Vec::new(),
            by_name: BTreeMap::new(),
            diagnostics: Vec::new(),
        };

        let stream = SymbolStream::new(bytes);
        let mut iter = stream.iter();
        let mut scope_depth = 0usize;

        loop {
            let symbol = match iter.next() {
                Ok(Some(symbol)) => symbol,
                Ok(None) => break,
                Err(Error::Decode(DecodeError::TruncatedRecord { offset, .. })) => {
                    warn!(offset, "symbol records stream ends mid-record");
                    table
                        .diagnostics
                        .push(Diagnostic::TruncatedSymbolRecord { offset });
                    break;
                }
                Err(Error::Decode(DecodeError::RecordTooShort)) => {
                    let offset = iter.position();
                    warn!(offset, "symbol record shorter than its own kind");
                    table
                        .diagnostics
                        .push(Diagnostic::TruncatedSymbolRecord { offset });
                    break;
                }
                Err(err) => return Err(err),
            };

            if symbol.ends_scope() {
                scope_depth = scope_depth.saturating_sub(1);
                continue;
            }
            let starts_scope = symbol.starts_scope();
            if scope_depth > 0 {
                // a local inside some procedure
                if starts_scope {
                    scope_depth += 1;
                }
                continue;
            }
            if starts_scope {
                scope_depth += 1;
            }

            let data = match symbol.parse() {
                Ok(data) => data,
                Err(Error::Decode(DecodeError::UnknownKind(kind))) => {
                    debug!(
                        offset = symbol.offset(),
                        kind, "skipping unmodeled symbol record"
                    );
                    table.diagnostics.push(Diagnostic::UnknownSymbolKind {
                        offset: symbol.offset(),
                        kind,
                    });
                    continue;
                }
                Err(Error::Decode(_)) => {
                    warn!(offset = symbol.offset(), "malformed symbol record");
                    table.diagnostics.push(Diagnostic::TruncatedSymbolRecord {
                        offset: symbol.offset(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            let (display_name, type_index, storage, value) = match data {
                SymbolData::Constant(constant) => (
                    constant.name.to_string().into_owned(),
                    constant.type_index,
                    StorageKind::Constant,
                    SymbolValue::Constant(constant.value.to_i64()),
                ),
                SymbolData::Data(data) => (
                    data.name.to_string().into_owned(),
                    data.type_index,
                    StorageKind::Data,
                    SymbolValue::Address {
                        segment: data.segment,
                        offset: data.offset,
                    },
                ),
                SymbolData::Public(public) => (
                    public.name.to_string().into_owned(),
                    TypeIndex(0),
                    if public.function || public.code {
                        StorageKind::Function
                    } else {
                        StorageKind::Data
                    },
                    SymbolValue::Address {
                        segment: public.segment,
                        offset: public.offset,
                    },
                ),
                SymbolData::Procedure(proc) => (
                    proc.name.to_string().into_owned(),
                    proc.type_index,
                    StorageKind::Function,
                    SymbolValue::Address {
                        segment: proc.segment,
                        offset: proc.offset,
                    },
                ),
                // references, UDTs and scope ends declare no storage, and
                // exports carry an ordinal rather than an address; none of
                // them enter the table
                _ => continue,
            };

            let symbol =
                match GlobalSymbol::resolve(&display_name, type_index, storage, value, graph) {
                    Ok(symbol) => symbol,
                    Err(err) => {
                        warn!(name = display_name.as_str(), error = %err, "skipping symbol");
                        table.diagnostics.push(Diagnostic::UnresolvedSymbolType {
                            name: display_name,
                            type_index,
                        });
                        continue;
                    }
                };

            let slot = table.symbols.len();
            table.symbols.push(symbol);
            table.by_name.entry(display_name).or_insert(slot);
        }

        debug!(
            symbols = table.symbols.len(),
            diagnostics = table.diagnostics.len(),
            "built symbol table"
        );
        Ok(table)
    }

    /// An empty table, for containers without a symbol records stream.
    pub(crate) fn empty() -> Self {
        SymbolTable {
            symbols: Vec::new(),
            by_name: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Non-fatal problems encountered during the build.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Look up a symbol by its `::`-joined display name. When several
    /// symbols share a name, the first in stream order wins.
    pub fn symbol_by_name(&self, name: &str) -> Option<&GlobalSymbol> {
        self.symbols.get(*self.by_name.get(name)?)
    }

    /// Iterate the table in stream order.
    pub fn iter(&self) -> impl Iterator<Item = &GlobalSymbol> {
        self.symbols.iter()
    }
}

/// Split a display name into its scope path and base name.
///
/// Mangled names (leading `?`) and malformed encodings (empty path
/// components) degrade to an empty scope.
pub(crate) fn scope_path(display: &str) -> (Vec<String>, String) {
    if display.is_empty() || display.starts_with('?') {
        return (Vec::new(), display.to_string());
    }

    let mut parts: Vec<&str> = display.split("::").collect();
    if parts.len() < 2 || parts.iter().any(|part| part.is_empty()) {
        return (Vec::new(), display.to_string());
    }

    let name = parts.pop().map(String::from).unwrap_or_default();
    (parts.into_iter().map(String::from).collect(), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sym::constants::*;

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

    fn constant(name: &str, type_index: u32, value_leaf: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&type_index.to_le_bytes());
        payload.extend_from_slice(value_leaf);
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        record(S_CONSTANT, &payload)
    }

    #[test]
    fn test_scope_path() {
        assert_eq!(
            scope_path("foo::bar::BAZ"),
            (vec!["foo".to_string(), "bar".to_string()], "BAZ".to_string())
        );
        assert_eq!(scope_path("plain"), (Vec::new(), "plain".to_string()));
        assert_eq!(
            scope_path("?mangled@@3HA"),
            (Vec::new(), "?mangled@@3HA".to_string())
        );
        // degenerate encodings keep the name intact
        assert_eq!(scope_path("::x"), (Vec::new(), "::x".to_string()));
        assert_eq!(scope_path("a::::b"), (Vec::new(), "a::::b".to_string()));
    }

    #[test]
    fn test_scoped_negative_constant() {
        // LF_SHORT, -333
        let mut value = 0x8001u16.to_le_bytes().to_vec();
        value.extend_from_slice(&(-333i16).to_le_bytes());
        let bytes = constant("foo::bar::CONSTANT_INSIDE_NAMESPACE", 0x13, &value);

        let graph = TypeGraph::empty();
        let table = SymbolTable::build(&bytes, &graph).expect("build");

        let symbol = table
            .symbol_by_name("foo::bar::CONSTANT_INSIDE_NAMESPACE")
            .expect("symbol");
        assert_eq!(symbol.name, "CONSTANT_INSIDE_NAMESPACE");
        assert_eq!(symbol.scope, vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(symbol.type_index, TypeIndex(0x13));
        assert_eq!(symbol.storage, StorageKind::Constant);
        assert_eq!(symbol.value, SymbolValue::Constant(-333));
    }

    #[test]
    fn test_mangled_public_has_empty_scope() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&3u32.to_le_bytes());
        payload.extend_from_slice(&0x1040u32.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(b"?exported@ns@@YAHXZ\x00");
        let bytes = record(S_PUB32, &payload);

        let graph = TypeGraph::empty();
        let table = SymbolTable::build(&bytes, &graph).expect("build");

        let symbol = table.symbol_by_name("?exported@ns@@YAHXZ").expect("symbol");
        assert!(symbol.scope.is_empty());
        assert_eq!(symbol.storage, StorageKind::Function);
        assert_eq!(symbol.type_index, TypeIndex(0));
    }

    #[test]
    fn test_unresolved_type_is_skipped() {
        let value = 7u16.to_le_bytes();
        let bytes = constant("ORPHAN", 0x1234, &value);

        let graph = TypeGraph::empty();
        let table = SymbolTable::build(&bytes, &graph).expect("build");

        assert!(table.symbol_by_name("ORPHAN").is_none());
        assert!(table.diagnostics().iter().any(|d| matches!(
            d,
            Diagnostic::UnresolvedSymbolType { name, .. } if name == "ORPHAN"
        )));
    }

    #[test]
    fn test_locals_inside_procedures_are_skipped() {
        let mut proc_payload = Vec::new();
        proc_payload.extend_from_slice(&[0u8; 24]); // parent..dbg_end
        proc_payload.extend_from_slice(&0u32.to_le_bytes()); // type: NoType
        proc_payload.extend_from_slice(&0x2000u32.to_le_bytes());
        proc_payload.extend_from_slice(&1u16.to_le_bytes());
        proc_payload.push(0);
        proc_payload.extend_from_slice(b"outer\x00");

        let mut bytes = record(S_GPROC32, &proc_payload);
        // a constant nested in the procedure's scope
        bytes.extend_from_slice(&constant("LOCAL", 0x74, &1u16.to_le_bytes()));
        bytes.extend_from_slice(&record(S_END, &[]));
        // and one after the scope closes
        bytes.extend_from_slice(&constant("GLOBAL", 0x74, &2u16.to_le_bytes()));

        let graph = TypeGraph::empty();
        let table = SymbolTable::build(&bytes, &graph).expect("build");

        assert!(table.symbol_by_name("outer").is_some());
        assert!(table.symbol_by_name("LOCAL").is_none());
        assert!(table.symbol_by_name("GLOBAL").is_some());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_exports_stay_out_of_the_table() {
        // ordinal 7, data flag; exports have no address to tabulate
        let mut payload = Vec::new();
        payload.extend_from_slice(&7u16.to_le_bytes());
        payload.extend_from_slice(&0x02u16.to_le_bytes());
        payload.extend_from_slice(b"ExportedTable\x00");
        let mut bytes = record(S_EXPORT, &payload);
        bytes.extend_from_slice(&constant("KEPT", 0x74, &1u16.to_le_bytes()));

        let graph = TypeGraph::empty();
        let table = SymbolTable::build(&bytes, &graph).expect("build");

        assert!(table.symbol_by_name("ExportedTable").is_none());
        assert!(table.symbol_by_name("KEPT").is_some());
        assert_eq!(table.len(), 1);
        assert!(table.diagnostics().is_empty());
    }

    #[test]
    fn test_first_symbol_wins_name_lookup() {
        let mut bytes = constant("DUP", 0x74, &1u16.to_le_bytes());
        bytes.extend_from_slice(&constant("DUP", 0x74, &2u16.to_le_bytes()));

        let graph = TypeGraph::empty();
        let table = SymbolTable::build(&bytes, &graph).expect("build");

        assert_eq!(table.len(), 2);
        let symbol = table.symbol_by_name("DUP").expect("symbol");
        assert_eq!(symbol.value, SymbolValue::Constant(1));
    }

    #[test]
    fn test_truncated_stream_keeps_earlier_symbols() {
        let mut bytes = constant("FIRST", 0x74, &1u16.to_le_bytes());
        bytes.extend_from_slice(&constant("SECOND", 0x74, &2u16.to_le_bytes()));
        bytes.truncate(bytes.len() - 4);

        let graph = TypeGraph::empty();
        let table = SymbolTable::build(&bytes, &graph).expect("build");

        assert!(table.symbol_by_name("FIRST").is_some());
        assert!(table.symbol_by_name("SECOND").is_none());
        assert!(table
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::TruncatedSymbolRecord { .. })));
    }
}
