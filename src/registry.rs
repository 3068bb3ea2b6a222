//! Schema-keyed engine registry
//!
//! Replaces window-scoped manager singletons with an explicit registry
//! constructed per page and passed to consumers. Each schema's entry
//! walks the lifecycle `Created -> Active -> Disposed`; operations
//! against a disposed entry are rejected rather than silently touching
//! stale DOM.

use crate::error::EngineError;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Active,
    Disposed,
}

/// Tracks the lifecycle of every schema-keyed engine on the page
#[derive(Default)]
pub struct EngineRegistry {
    entries: BTreeMap<String, LifecycleState>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema; re-registering an active schema is an error,
    /// re-registering a disposed one restarts its lifecycle.
    pub fn register(&mut self, schema: &str) -> Result<(), EngineError> {
        match self.entries.get(schema) {
            Some(LifecycleState::Created) | Some(LifecycleState::Active) => {
                Err(EngineError::InvalidSelection(format!(
                    "schema '{}' is already registered",
                    schema
                )))
            }
            _ => {
                self.entries
                    .insert(schema.to_string(), LifecycleState::Created);
                Ok(())
            }
        }
    }

    /// Created -> Active, on first successful instance load
    pub fn activate(&mut self, schema: &str) -> Result<(), EngineError> {
        match self.entries.get_mut(schema) {
            Some(state @ LifecycleState::Created) => {
                *state = LifecycleState::Active;
                Ok(())
            }
            Some(LifecycleState::Active) => Ok(()),
            Some(LifecycleState::Disposed) => Err(EngineError::Disposed),
            None => Err(EngineError::InvalidSelection(format!(
                "schema '{}' is not registered",
                schema
            ))),
        }
    }

    /// Any state -> Disposed; idempotent
    pub fn dispose(&mut self, schema: &str) {
        if let Some(state) = self.entries.get_mut(schema) {
            *state = LifecycleState::Disposed;
        }
    }

    pub fn state(&self, schema: &str) -> Option<LifecycleState> {
        self.entries.get(schema).copied()
    }

    /// Guard used by every engine operation
    pub fn ensure_usable(&self, schema: &str) -> Result<(), EngineError> {
        match self.state(schema) {
            Some(LifecycleState::Disposed) => Err(EngineError::Disposed),
            Some(_) => Ok(()),
            None => Err(EngineError::InvalidSelection(format!(
                "schema '{}' is not registered",
                schema
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_created_active_disposed() {
        let mut registry = EngineRegistry::new();
        registry.register("ner").unwrap();
        assert_eq!(registry.state("ner"), Some(LifecycleState::Created));

        registry.activate("ner").unwrap();
        assert_eq!(registry.state("ner"), Some(LifecycleState::Active));

        registry.dispose("ner");
        assert_eq!(registry.state("ner"), Some(LifecycleState::Disposed));
        assert!(matches!(
            registry.ensure_usable("ner"),
            Err(EngineError::Disposed)
        ));
    }

    #[test]
    fn test_double_register_rejected_while_live() {
        let mut registry = EngineRegistry::new();
        registry.register("ner").unwrap();
        assert!(registry.register("ner").is_err());

        // A disposed schema may be registered again
        registry.dispose("ner");
        assert!(registry.register("ner").is_ok());
        assert_eq!(registry.state("ner"), Some(LifecycleState::Created));
    }

    #[test]
    fn test_activate_requires_registration() {
        let mut registry = EngineRegistry::new();
        assert!(registry.activate("ghost").is_err());
        registry.register("ner").unwrap();
        registry.activate("ner").unwrap();
        // Activation is idempotent
        registry.activate("ner").unwrap();
    }

    #[test]
    fn test_dispose_unknown_schema_is_noop() {
        let mut registry = EngineRegistry::new();
        registry.dispose("ghost");
        assert_eq!(registry.state("ghost"), None);
    }
}
