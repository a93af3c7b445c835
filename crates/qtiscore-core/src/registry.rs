//! Tag name to operator lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::operators;
use crate::resolve::{CONTAINERS, CUSTOM_OPERATOR};
use crate::traits::{Calculator, Executor};

/// Executors and calculators keyed by the QTI tag they handle.
///
/// Built once per engine and shared read-only between workers.
#[derive(Default, Clone)]
pub struct OperatorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
    calculators: HashMap<String, Arc<dyn Calculator>>,
}

impl OperatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the standard operator vocabulary.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        operators::register_standard(&mut registry);
        registry
    }

    pub fn register_executor<E: Executor + 'static>(&mut self, executor: E) -> &mut Self {
        self.executors
            .insert(executor.name().to_string(), Arc::new(executor));
        self
    }

    pub fn register_calculator<C: Calculator + 'static>(&mut self, calculator: C) -> &mut Self {
        self.calculators
            .insert(calculator.name().to_string(), Arc::new(calculator));
        self
    }

    pub fn executor(&self, tag: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(tag).cloned()
    }

    pub fn calculator(&self, tag: &str) -> Option<Arc<dyn Calculator>> {
        self.calculators.get(tag).cloned()
    }

    /// Whether `tag` is handled by an operator or by value resolution.
    pub fn is_known(&self, tag: &str) -> bool {
        self.executors.contains_key(tag)
            || self.calculators.contains_key(tag)
            || tag == CUSTOM_OPERATOR
            || CONTAINERS.contains(&tag)
            || matches!(tag, "baseValue" | "variable" | "correct" | "testVariables")
    }

    /// Registered tag names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .executors
            .keys()
            .chain(self.calculators.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
