//! Compiler configuration.
//!
//! A builder-style bundle of the knobs embedders can turn without touching
//! the core: currently the module resolver consulted by `use` directives.
//! File-based project manifests are an embedder concern and are
//! deliberately not handled here.
//!
//! # Example
//!
//! ```rust,ignore
//! use emberc::{CompilerConfig, MapResolver, ModuleEnv};
//!
//! let config = CompilerConfig::new()
//!     .with_resolver(Box::new(MapResolver::new().with_module("std/math", math_env)));
//! let chunk = emberc::compile_source_with("fn main() Int { 2 + 3 }", "demo.em", config)?;
//! ```

use crate::resolver::ModuleResolver;

/// Configuration consumed by the [`crate::compile_source_with`] pipeline.
#[derive(Default)]
pub struct CompilerConfig {
    /// Module resolver consulted by `use` directives. Without one, every
    /// `use` reports an unknown module.
    pub resolver: Option<Box<dyn ModuleResolver>>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ModuleResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}
