//! Dotted-name function registry.
//!
//! Functions are declared through [`Namespace`] values and indexed by a
//! [`RegistryBuilder`] at startup. [`RegistryBuilder::build`] freezes the
//! index into a [`Registry`], which has no mutating methods and is shared
//! across dispatches without locking.

use crate::callable::Callable;
use crate::error::{RpcError, RpcResult};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// A group of callables under a common dotted path.
#[derive(Clone, Default)]
pub struct Namespace {
    path: Vec<String>,
    functions: Vec<(String, Callable)>,
    children: Vec<Namespace>,
}

impl Namespace {
    /// Namespace at `path`, e.g. `"one.two"`. Segments are validated on registration.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.split('.').map(str::to_string).collect(),
            ..Default::default()
        }
    }

    /// Namespace with no path; its functions register under their bare names.
    pub fn root() -> Self {
        Self::default()
    }

    /// Bind `name` (a single segment) to `callable`.
    pub fn function(mut self, name: &str, callable: Callable) -> Self {
        self.functions.push((name.to_string(), callable));
        self
    }

    /// Nest `child` below this namespace's path.
    pub fn nested(mut self, child: Namespace) -> Self {
        self.children.push(child);
        self
    }

    fn collect(&self, prefix: &[String], out: &mut Vec<(String, Callable)>) -> RpcResult<()> {
        let mut path = prefix.to_vec();
        path.extend(self.path.iter().cloned());

        for segment in &self.path {
            if !is_valid_segment(segment) {
                return Err(RpcError::InvalidName(self.path.join(".")));
            }
        }

        for (name, callable) in &self.functions {
            let mut full = path.clone();
            full.push(name.clone());
            let dotted = full.join(".");
            if !is_valid_segment(name) {
                return Err(RpcError::InvalidName(dotted));
            }
            out.push((dotted, callable.clone()));
        }

        for child in &self.children {
            child.collect(&path, out)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("path", &self.path.join("."))
            .field(
                "functions",
                &self.functions.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("children", &self.children)
            .finish()
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('.') && !segment.chars().any(char::is_whitespace)
}

/// Collects namespaces before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, Callable>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every binding in `namespace` by its fully-qualified dotted name.
    ///
    /// Registration is all-or-nothing: on a duplicate or invalid name nothing
    /// from `namespace` is added.
    pub fn register(&mut self, namespace: Namespace) -> RpcResult<&mut Self> {
        let mut staged = Vec::new();
        namespace.collect(&[], &mut staged)?;

        let mut seen = std::collections::HashSet::new();
        for (name, _) in &staged {
            if self.entries.contains_key(name) || !seen.insert(name.as_str()) {
                return Err(RpcError::DuplicateFunction(name.clone()));
            }
        }

        for (name, callable) in staged {
            debug!(function = %name, "Registered function");
            self.entries.insert(name, callable);
        }
        Ok(self)
    }

    /// Freeze the index.
    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }
}

/// Immutable name → callable index.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<String, Callable>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Exact-match lookup; no prefix or wildcard resolution.
    pub fn find(&self, name: &str) -> RpcResult<&Callable> {
        self.entries
            .get(name)
            .ok_or_else(|| RpcError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}
