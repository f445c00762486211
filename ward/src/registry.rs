//! Name-keyed registry of areas.
//!
//! Areas are shared as `Arc<BoundedArea>`; the registry only hands out
//! clones, so lookups never hold a map shard while a caller blocks in
//! `enter`.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::area::{AreaStatus, BoundedArea};
use crate::error::RegistryError;

#[derive(Default)]
pub struct AreaRegistry {
    areas: DashMap<String, Arc<BoundedArea>>,
}

impl AreaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an area under its name. Names are unique.
    pub fn insert(&self, area: BoundedArea) -> Result<Arc<BoundedArea>, RegistryError> {
        match self.areas.entry(area.name().to_string()) {
            Entry::Occupied(existing) => Err(RegistryError::Duplicate(existing.key().clone())),
            Entry::Vacant(slot) => {
                let area = Arc::new(area);
                tracing::debug!(
                    area = %area.name(),
                    capacity = area.capacity(),
                    "Registered area"
                );
                slot.insert(Arc::clone(&area));
                Ok(area)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<BoundedArea>> {
        self.areas.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.areas.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<BoundedArea>> {
        self.areas.remove(name).map(|(_, area)| area)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.areas.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Status of every area, sorted by name.
    pub fn statuses(&self) -> Vec<AreaStatus> {
        let mut areas: Vec<Arc<BoundedArea>> =
            self.areas.iter().map(|e| Arc::clone(e.value())).collect();
        areas.sort();
        areas.iter().map(|area| area.status()).collect()
    }

    /// Look up a route of names, failing on the first unknown one.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<BoundedArea>>, RegistryError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name)
                    .ok_or_else(|| RegistryError::Unknown(name.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::display::Position;

    fn area(name: &str, capacity: usize) -> BoundedArea {
        BoundedArea::new(name, Duration::ZERO, capacity, Position::default())
    }

    #[test]
    fn insert_and_get() {
        let registry = AreaRegistry::new();
        assert!(registry.is_empty());

        let triage = registry.insert(area("Triage", 2)).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("Triage"));

        let found = registry.get("Triage").unwrap();
        assert!(Arc::ptr_eq(&triage, &found));
        assert!(registry.get("Radiology").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = AreaRegistry::new();
        registry.insert(area("Triage", 2)).unwrap();

        let err = registry.insert(area("Triage", 9)).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("Triage".to_string()));
        assert_eq!(registry.get("Triage").unwrap().capacity(), 2);
    }

    #[test]
    fn remove_returns_the_area() {
        let registry = AreaRegistry::new();
        registry.insert(area("Triage", 2)).unwrap();

        assert_eq!(registry.remove("Triage").unwrap().name(), "Triage");
        assert!(registry.remove("Triage").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn names_and_statuses_are_sorted() {
        let registry = AreaRegistry::new();
        registry.insert(area("Triage", 2)).unwrap();
        registry.insert(area("Consultation", 1)).unwrap();
        registry.insert(area("Radiology", 1)).unwrap();
        registry.get("Radiology").unwrap().enter("p1");

        assert_eq!(registry.names(), vec!["Consultation", "Radiology", "Triage"]);

        let statuses = registry.statuses();
        let names: Vec<_> = statuses.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Consultation", "Radiology", "Triage"]);
        assert_eq!(statuses[1].patients, 1);
    }

    #[test]
    fn resolve_builds_routes() {
        let registry = AreaRegistry::new();
        registry.insert(area("Triage", 2)).unwrap();
        registry.insert(area("Radiology", 1)).unwrap();

        let route = registry.resolve(&["Triage", "Radiology", "Triage"]).unwrap();
        let names: Vec<_> = route.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["Triage", "Radiology", "Triage"]);

        let err = registry.resolve(&["Triage", "Morgue"]).unwrap_err();
        assert_eq!(err, RegistryError::Unknown("Morgue".to_string()));
    }
}
