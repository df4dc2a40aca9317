//! Module resolution for one program instance.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use tracing::trace;

use crate::error::ProgramError;
use crate::vm::{Interp, Module, Namespace, Unwind, Value, enum_module, math_module, random_module};

use super::Bundle;

/// Name of the capability module.
pub const CAPABILITY_MODULE: &str = "robot";

/// Directed importer to imported graph.
#[derive(Debug, Default)]
pub struct ImportGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl ImportGraph {
    /// Record that `from` imports `to`.
    pub fn add(&mut self, from: &str, to: &str) {
        self.edges.entry(from.to_string()).or_default().insert(to.to_string());
    }

    /// The first cycle found, as the path that closes it.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut path = Vec::new();
        self.edges
            .keys()
            .find(|start| self.visit(start, &mut path))
            .map(|_| path.iter().map(|v| (*v).to_string()).collect())
    }

    fn visit<'a>(&'a self, vertex: &'a str, path: &mut Vec<&'a str>) -> bool {
        path.push(vertex);
        for next in self.edges.get(vertex).into_iter().flatten() {
            if path.contains(&next.as_str()) || self.visit(next, path) {
                return true;
            }
        }
        path.pop();
        false
    }
}

/// Resolves `import_name` for one instance and caches what it produced.
#[derive(Debug)]
pub struct Imports {
    bundle: Arc<Bundle>,
    seed: u64,
    capabilities: Value,
    graph: RefCell<ImportGraph>,
    cache: RefCell<HashMap<String, Value>>,
}

impl Imports {
    /// Resolver over `bundle`. `seed` seeds this instance's `random`.
    #[must_use]
    pub fn new(bundle: Arc<Bundle>, seed: u64, capabilities: Value) -> Self {
        Self {
            bundle,
            seed,
            capabilities,
            graph: RefCell::new(ImportGraph::default()),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Import `name` on behalf of bundle module `importer`.
    ///
    /// # Errors
    ///
    /// `ImportError` for relative, unknown, or cyclic imports; anything the
    /// imported module raises while it runs.
    pub fn import(&self, interp: &mut Interp, importer: &str, name: &str) -> Result<Value, Unwind> {
        if name.is_empty() {
            return Err(ProgramError::import("No relative imports (yet).").into());
        }
        let Some(code) = self.bundle.get(name) else {
            return self.library(name);
        };

        {
            let mut graph = self.graph.borrow_mut();
            graph.add(importer, name);
            if let Some(cycle) = graph.find_cycle() {
                return Err(ProgramError::import(format!(
                    "Infinite loop in imports: {}",
                    cycle.join(", ")
                ))
                .into());
            }
        }
        if let Some(module) = self.cached(name) {
            return Ok(module);
        }

        trace!(importer, module = name, "running bundle module");
        let ns = Rc::new(Namespace::new());
        interp.exec(code, &ns)?;
        let module = Value::Module(Rc::new(Module {
            name: name.to_string(),
            ns,
        }));
        self.cache.borrow_mut().insert(name.to_string(), module.clone());
        Ok(module)
    }

    fn cached(&self, name: &str) -> Option<Value> {
        self.cache.borrow().get(name).cloned()
    }

    fn library(&self, name: &str) -> Result<Value, Unwind> {
        if let Some(module) = self.cached(name) {
            return Ok(module);
        }
        let module = match name {
            "math" => math_module(),
            "random" => random_module(self.seed),
            "enum" => enum_module(),
            CAPABILITY_MODULE => self.capabilities.clone(),
            _ => {
                return Err(ProgramError::import(format!("Module \"{name}\" does not exist.")).into());
            }
        };
        self.cache.borrow_mut().insert(name.to_string(), module.clone());
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acyclic_graph() {
        let mut graph = ImportGraph::default();
        graph.add("bot", "nav");
        graph.add("bot", "util");
        graph.add("nav", "util");
        assert_eq!(graph.find_cycle(), None);
    }

    #[test]
    fn test_cycle_reports_path() {
        let mut graph = ImportGraph::default();
        graph.add("bot", "a");
        graph.add("a", "b");
        graph.add("b", "a");
        assert_eq!(graph.find_cycle().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let mut graph = ImportGraph::default();
        graph.add("bot", "bot");
        assert_eq!(graph.find_cycle().unwrap(), ["bot"]);
    }
}
