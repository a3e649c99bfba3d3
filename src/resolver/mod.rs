mod lookup;

use std::{collections::HashSet, path::PathBuf};

use log::{debug, info, trace};

use crate::{
    catalog::Catalog,
    companion,
    metadata::MetadataReader,
    model::{ModuleDescriptor, ModuleName},
};

pub use lookup::{Lookup, Resolution};

use lookup::Sources;

/// Modules needed by an entry module, plus the debug symbols found next to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    pub modules: Vec<ModuleDescriptor>,
    pub symbols: Vec<PathBuf>,
}

impl Closure {
    /// Module paths in discovery order, followed by symbol paths.
    pub fn paths(&self) -> impl Iterator<Item = &std::path::Path> {
        self.modules
            .iter()
            .map(|module| module.path())
            .chain(self.symbols.iter().map(PathBuf::as_path))
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.modules
            .into_iter()
            .map(ModuleDescriptor::into_path)
            .chain(self.symbols)
            .collect()
    }
}

/// Per run bookkeeping. Every name passes the visited check exactly once.
#[derive(Default)]
struct ResolutionState {
    visited: HashSet<ModuleName>,
    pending: Vec<ModuleName>,
    resolved: Vec<ModuleDescriptor>,
}

impl ResolutionState {
    fn next_unvisited(&mut self) -> Option<ModuleName> {
        while let Some(name) = self.pending.pop() {
            if self.visited.insert(name.clone()) {
                return Some(name);
            }
            trace!("{name} already visited");
        }
        None
    }
}

/// Walks module references starting at an entry module, preferring platform
/// modules over application modules.
pub struct ClosureResolver<'a, R> {
    reader: R,
    sources: Sources<'a>,
}

impl<'a, R: MetadataReader> ClosureResolver<'a, R> {
    pub fn new(
        reader: R,
        entry: &'a ModuleDescriptor,
        platform: &'a Catalog,
        application: &'a Catalog,
    ) -> Self {
        ClosureResolver {
            reader,
            sources: Sources {
                entry,
                platform,
                application,
            },
        }
    }

    /// Resolves the closure of the entry module, entry first, then depth first.
    pub fn resolve(&self) -> Vec<ModuleDescriptor> {
        let mut state = ResolutionState::default();
        state.pending.push(self.sources.entry.name().clone());

        while let Some(name) = state.next_unvisited() {
            match self.sources.resolve(&name) {
                Resolution::Resolved(module, lookup) => {
                    debug!("Resolved {} from {:?} catalog", module, lookup);
                    let references = self.references(module);
                    state.resolved.push(module.clone());
                    // Pushed in reverse so the first declared reference is processed first.
                    state.pending.extend(references.into_iter().rev());
                }
                Resolution::Unresolved => {
                    debug!("Skipping unresolved reference {name}");
                }
            }
        }

        info!(
            "Resolved {} modules for {}",
            state.resolved.len(),
            self.sources.entry.name()
        );
        state.resolved
    }

    /// Resolves the closure and looks for companion symbol files with `symbols_extension`.
    pub fn resolve_with_symbols(&self, symbols_extension: &str) -> Closure {
        let modules = self.resolve();
        let symbols = companion::find_companions(&modules, symbols_extension);
        Closure { modules, symbols }
    }

    fn references(&self, module: &ModuleDescriptor) -> Vec<ModuleName> {
        match self.reader.read_references(module.path()) {
            Ok(references) => {
                trace!("{} references {:?}", module.name(), references);
                references
            }
            Err(err) => {
                debug!(
                    "Treating {} as having no references: {err}",
                    module.path().display()
                );
                vec![]
            }
        }
    }
}
