// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The query façade.
//!
//! [`PdbReader`] has exactly three states: unopened, loaded and closed.
//! Loading materializes everything the queries need into an immutable,
//! `Sync` model and releases the source; queries outside the loaded state
//! fail with `Error::InvalidState`.

use tracing::debug;

use crate::common::*;
use crate::dbi::{DebugInformation, MachineType};
use crate::graph::{EnumValue, TypeGraph, TypeKind, TypeRecord};
use crate::msf::Container;
use crate::pdbi::PdbInformation;
use crate::source::Source;
use crate::symtab::{GlobalSymbol, SymbolTable};

/// Some streams have a fixed stream index.
/// http://llvm.org/docs/PDB/index.html
const PDB_STREAM: u32 = 1;
const TPI_STREAM: u32 = 2;
const DBI_STREAM: u32 = 3;

/// Everything a loaded reader can be asked about.
///
/// Immutable once built; queries borrow from it freely.
#[derive(Debug)]
struct Model {
    info: PdbInformation,
    machine_type: MachineType,
    graph: TypeGraph,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl Model {
    fn load<'s, S: Source<'s>>(source: S) -> Result<Self> {
        let mut container = Container::open(source)?;

        let info = PdbInformation::parse(container.stream(PDB_STREAM, None)?.as_slice())?;

        let graph = TypeGraph::resolve(container.stream(TPI_STREAM, None)?.as_slice())?;

        let dbi = DebugInformation::parse(container.stream(DBI_STREAM, Some(1024))?.as_slice())?;
        let symbols = match dbi.symbol_records_stream() {
            Some(stream) => {
                SymbolTable::build(container.stream(stream, None)?.as_slice(), &graph)?
            }
            None => SymbolTable::empty(),
        };

        let mut diagnostics = Vec::new();
        diagnostics.extend_from_slice(graph.diagnostics());
        diagnostics.extend_from_slice(symbols.diagnostics());

        debug!(
            types = graph.len(),
            symbols = symbols.len(),
            diagnostics = diagnostics.len(),
            "loaded PDB model"
        );

        Ok(Model {
            info,
            machine_type: dbi.machine_type(),
            graph,
            symbols,
            diagnostics,
        })
    }
}

#[derive(Debug)]
enum State {
    Unopened,
    Loaded(Box<Model>),
    Closed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Unopened => "an unopened",
            State::Loaded(_) => "a loaded",
            State::Closed => "a closed",
        }
    }
}

/// Read-only access to the types and symbols of one PDB file.
///
/// Lookups distinguish two failure modes: a reader in the wrong state is an
/// error, a name or index that simply isn't there is `Ok(None)`.
#[derive(Debug)]
pub struct PdbReader {
    state: State,
}

impl Default for PdbReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PdbReader {
    /// Create an unopened reader.
    pub fn new() -> Self {
        PdbReader {
            state: State::Unopened,
        }
    }

    /// Create a reader and load a source into it.
    pub fn open<'s, S: Source<'s>>(source: S) -> Result<Self> {
        let mut reader = Self::new();
        reader.load(source)?;
        Ok(reader)
    }

    /// Load a source, moving the reader into the loaded state.
    ///
    /// Valid only on an unopened reader. On failure the reader stays
    /// unopened and may be retried with another source.
    pub fn load<'s, S: Source<'s>>(&mut self, source: S) -> Result<()> {
        match self.state {
            State::Unopened => {
                self.state = State::Loaded(Box::new(Model::load(source)?));
                Ok(())
            }
            ref state => Err(Error::InvalidState(state.name())),
        }
    }

    /// Drop the loaded model, moving the reader into the closed state.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            State::Loaded(_) => {
                self.state = State::Closed;
                Ok(())
            }
            ref state => Err(Error::InvalidState(state.name())),
        }
    }

    fn model(&self) -> Result<&Model> {
        match self.state {
            State::Loaded(ref model) => Ok(model),
            ref state => Err(Error::InvalidState(state.name())),
        }
    }

    /// The version, signature, age and GUID identifying this PDB.
    pub fn pdb_information(&self) -> Result<&PdbInformation> {
        Ok(&self.model()?.info)
    }

    /// The target's machine type.
    pub fn machine_type(&self) -> Result<MachineType> {
        Ok(self.model()?.machine_type)
    }

    /// Non-fatal problems encountered while loading.
    pub fn diagnostics(&self) -> Result<&[Diagnostic]> {
        Ok(&self.model()?.diagnostics)
    }

    /// Look up a type record by index, following forward references.
    pub fn type_by_index(&self, index: TypeIndex) -> Result<Option<&TypeRecord>> {
        Ok(self.model()?.graph.type_by_index(index))
    }

    /// Look up a type by name.
    pub fn type_by_name(&self, name: &str) -> Result<Option<(TypeIndex, &TypeRecord)>> {
        Ok(self.model()?.graph.type_by_name(name))
    }

    /// Iterate all types of one kind, in index order.
    ///
    /// The iterator is fresh on every call and restartable.
    pub fn types_of_kind(
        &self,
        kind: TypeKind,
    ) -> Result<impl Iterator<Item = (TypeIndex, &TypeRecord)>> {
        Ok(self
            .model()?
            .graph
            .iter()
            .filter(move |(_, record)| record.kind() == kind))
    }

    /// Look up an enumerator's value, adjusted to the enum's underlying
    /// type.
    pub fn enum_value(&self, enum_index: TypeIndex, name: &str) -> Result<Option<EnumValue<'_>>> {
        Ok(self.model()?.graph.enum_value(enum_index, name))
    }

    /// Look up a symbol by its `::`-joined display name.
    pub fn symbol_by_name(&self, name: &str) -> Result<Option<&GlobalSymbol>> {
        Ok(self.model()?.symbols.symbol_by_name(name))
    }

    /// Iterate the symbol table in stream order.
    ///
    /// The iterator is fresh on every call and restartable.
    pub fn symbols(&self) -> Result<impl Iterator<Item = &GlobalSymbol>> {
        Ok(self.model()?.symbols.iter())
    }

    /// The resolved type graph.
    pub fn type_graph(&self) -> Result<&TypeGraph> {
        Ok(&self.model()?.graph)
    }

    /// The resolved symbol table.
    pub fn symbol_table(&self) -> Result<&SymbolTable> {
        Ok(&self.model()?.symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_on_unopened_reader() {
        let reader = PdbReader::new();
        match reader.type_by_name("Zebra") {
            Err(Error::InvalidState(state)) => assert_eq!(state, "an unopened"),
            other => panic!("expected invalid state, got {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            reader.symbol_by_name("anything"),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            reader.pdb_information(),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_close_requires_loaded() {
        let mut reader = PdbReader::new();
        assert!(matches!(reader.close(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_load_on_closed_reader() {
        let mut reader = PdbReader::new();
        // force the closed state without a successful load
        reader.state = State::Closed;
        match reader.load(std::io::Cursor::new(Vec::new())) {
            Err(Error::InvalidState(state)) => assert_eq!(state, "a closed"),
            other => panic!("expected invalid state, got {:?}", other),
        }
        assert!(matches!(
            reader.symbols().map(|_| ()),
            Err(Error::InvalidState(_))
        ));
    }
}
