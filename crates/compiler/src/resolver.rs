//! Module resolution interface.
//!
//! The checker never touches the filesystem: when it meets a `use`
//! directive it asks a [`ModuleResolver`] for the module's environment.
//! The core supplies no default resolver; embedders (the command
//! dispatcher, the read-eval loop, tests) decide where modules come from.

use crate::types::Type;
use std::collections::HashMap;

/// The bindings a module exports: the same name → type mapping used for
/// lexical scopes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleEnv {
    bindings: HashMap<String, Type>,
}

impl ModuleEnv {
    pub fn new() -> Self {
        ModuleEnv::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        self.bindings.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Type)> {
        self.bindings.iter()
    }
}

/// Capability the type checker consumes to resolve `use` paths.
pub trait ModuleResolver {
    /// Resolve a `/`-separated path to a module environment, or report that
    /// no such module exists.
    fn resolve(&self, path: &[String]) -> Option<ModuleEnv>;
}

/// A resolver over a fixed table of modules, keyed by joined path.
///
/// Useful for embedders with a prebuilt module set and for tests.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    modules: HashMap<String, ModuleEnv>,
}

impl MapResolver {
    pub fn new() -> Self {
        MapResolver::default()
    }

    /// Register a module under a `/`-joined path such as `"std/math"`.
    pub fn with_module(mut self, path: impl Into<String>, env: ModuleEnv) -> Self {
        self.modules.insert(path.into(), env);
        self
    }
}

impl ModuleResolver for MapResolver {
    fn resolve(&self, path: &[String]) -> Option<ModuleEnv> {
        self.modules.get(&path.join("/")).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_resolver() {
        let mut env = ModuleEnv::new();
        env.insert("abs", Type::func(vec![Type::int()], Type::int()));
        let resolver = MapResolver::new().with_module("std/math", env);

        let path = vec!["std".to_string(), "math".to_string()];
        let resolved = resolver.resolve(&path).unwrap();
        assert!(resolved.get("abs").is_some());
        assert_eq!(resolved.iter().count(), 1);
        assert!(resolver.resolve(&["nope".to_string()]).is_none());
    }
}
