//! Worker registry
//!
//! One ordered mapping from worker name to its training bundle. Built once
//! at trainer construction from the model's worker list; the key-set
//! invariant (optimizers = schedulers = savers = attached workers) holds by
//! construction instead of across three separate dictionaries.

use crate::checkpoint::Saver;
use crate::model::TaskKind;
use crate::optim::{Optimizer, PolyLR};
use crate::{Error, Result};

/// Everything the trainer keeps per worker
pub struct WorkerSlot {
    pub kind: TaskKind,
    pub optimizer: Box<dyn Optimizer>,
    pub scheduler: PolyLR,
    pub saver: Saver,
}

/// Ordered worker-name -> slot mapping
#[derive(Default)]
pub struct WorkerRegistry {
    slots: Vec<(String, WorkerSlot)>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker's slot, preserving insertion order
    ///
    /// # Errors
    /// Duplicate names are a fatal configuration error; they would alias
    /// optimizer state across two workers.
    pub fn insert(&mut self, name: impl Into<String>, slot: WorkerSlot) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(Error::Config(format!("duplicate worker name '{name}'")));
        }
        self.slots.push((name, slot));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WorkerSlot> {
        self.slots.iter().find(|(n, _)| n == name).map(|(_, slot)| slot)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut WorkerSlot> {
        self.slots.iter_mut().find(|(n, _)| n == name).map(|(_, slot)| slot)
    }

    /// Slots in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkerSlot)> {
        self.slots.iter().map(|(n, slot)| (n.as_str(), slot))
    }

    /// Mutable slots in insertion order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut WorkerSlot)> {
        self.slots.iter_mut().map(|(n, slot)| (n.as_str(), slot))
    }

    /// Registered names in insertion order
    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::SGD;
    use tempfile::TempDir;

    fn slot(dir: &std::path::Path, name: &str) -> WorkerSlot {
        WorkerSlot {
            kind: TaskKind::Classification,
            optimizer: Box::new(SGD::new(0.01, 0.0)),
            scheduler: PolyLR::new(name, 0.01, 2, 10).unwrap(),
            saver: Saver::new(dir, format!("M-{name}-"), 3).unwrap(),
        }
    }

    #[test]
    fn test_registry_preserves_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut registry = WorkerRegistry::new();
        for name in ["mi", "spc", "chunk"] {
            registry.insert(name, slot(dir.path(), name)).unwrap();
        }
        assert_eq!(registry.names(), vec!["mi", "spc", "chunk"]);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let dir = TempDir::new().unwrap();
        let mut registry = WorkerRegistry::new();
        registry.insert("mi", slot(dir.path(), "mi")).unwrap();
        assert!(registry.insert("mi", slot(dir.path(), "mi")).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let dir = TempDir::new().unwrap();
        let mut registry = WorkerRegistry::new();
        registry.insert("spc", slot(dir.path(), "spc")).unwrap();

        assert!(registry.get("spc").is_some());
        assert!(registry.get_mut("spc").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }
}
