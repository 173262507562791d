//! Entity plugins.
//!
//! The pipelines never know what they export or import. Entities implement
//! [`RowSource`] and/or [`RowSink`] and are registered by name; jobs refer
//! to them by that name.

mod record_table;

pub use record_table::RecordTable;

use crate::io::traits::{RowSink, RowSource};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of entity plugins by name.
#[derive(Default, Clone)]
pub struct EntityRegistry {
    sources: HashMap<String, Arc<dyn RowSource>>,
    sinks: HashMap<String, Arc<dyn RowSink>>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity usable for both export and import.
    #[must_use]
    pub fn with_entity<E>(mut self, name: impl Into<String>, entity: Arc<E>) -> Self
    where
        E: RowSource + RowSink + 'static,
    {
        let name = name.into();
        self.sources
            .insert(name.clone(), Arc::clone(&entity) as Arc<dyn RowSource>);
        self.sinks.insert(name, entity as Arc<dyn RowSink>);
        self
    }

    /// Registers an export-only entity.
    pub fn register_source(&mut self, name: impl Into<String>, source: Arc<dyn RowSource>) {
        self.sources.insert(name.into(), source);
    }

    /// Registers an import-only entity.
    pub fn register_sink(&mut self, name: impl Into<String>, sink: Arc<dyn RowSink>) {
        self.sinks.insert(name.into(), sink);
    }

    /// Looks up the export side of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] if no source is registered.
    pub fn source(&self, name: &str) -> Result<Arc<dyn RowSource>> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Looks up the import side of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] if no sink is registered.
    pub fn sink(&self, name: &str) -> Result<Arc<dyn RowSink>> {
        self.sinks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Returns every registered entity name, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .keys()
            .chain(self.sinks.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("entities", &self.names())
            .finish()
    }
}
