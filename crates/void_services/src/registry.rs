//! Service registry
//!
//! Typed, shared services that plugins publish for each other. One instance
//! per type; lookups hand out `Arc` clones.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};

struct ServiceEntry {
    service: Arc<dyn Any + Send + Sync>,
    name: &'static str,
    /// Registration order
    order: usize,
}

/// Registry of services keyed by type
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, ServiceEntry>,
    next_order: usize,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service. Fails when one of the same type exists.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: T) -> ServiceResult<Arc<T>> {
        self.register_shared(Arc::new(service))
    }

    /// Register an already shared service
    pub fn register_shared<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> ServiceResult<Arc<T>> {
        let name = std::any::type_name::<T>();
        if self.services.contains_key(&TypeId::of::<T>()) {
            return Err(ServiceError::AlreadyExists(name.to_string()));
        }

        self.services.insert(
            TypeId::of::<T>(),
            ServiceEntry {
                service: service.clone(),
                name,
                order: self.next_order,
            },
        );
        self.next_order += 1;
        log::debug!("Registered service {}", name);
        Ok(service)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.service.clone().downcast::<T>().ok())
    }

    /// Like [`get`](Self::get) but a missing service is an error
    pub fn require<T: Send + Sync + 'static>(&self) -> ServiceResult<Arc<T>> {
        self.get::<T>()
            .ok_or_else(|| ServiceError::NotFound(std::any::type_name::<T>().to_string()))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        let entry = self.services.remove(&TypeId::of::<T>())?;
        log::debug!("Removed service {}", entry.name);
        entry.service.downcast::<T>().ok()
    }

    /// Type names in registration order
    pub fn service_names(&self) -> Vec<&'static str> {
        let mut entries: Vec<_> = self.services.values().collect();
        entries.sort_by_key(|entry| entry.order);
        entries.into_iter().map(|entry| entry.name).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Drop every service in reverse registration order
    pub fn clear(&mut self) {
        let mut entries: Vec<_> = self.services.drain().map(|(_, entry)| entry).collect();
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.order));
        drop(entries);
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_core::ErrorKind;

    #[derive(Debug)]
    struct Settings {
        volume: f32,
    }

    #[derive(Debug)]
    struct Clock;

    #[test]
    fn test_register_and_get() {
        let mut registry = ServiceRegistry::new();
        registry.register(Settings { volume: 0.5 }).unwrap();
        assert!(registry.contains::<Settings>());
        assert!(!registry.contains::<Clock>());
        assert_eq!(registry.get::<Settings>().unwrap().volume, 0.5);
        assert!(registry.get::<Clock>().is_none());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut registry = ServiceRegistry::new();
        registry.register(Clock).unwrap();
        let err = registry.register(Clock).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_require() {
        let mut registry = ServiceRegistry::new();
        let shared = registry.register(Settings { volume: 1.0 }).unwrap();
        let removed = registry.remove::<Settings>().unwrap();
        assert!(Arc::ptr_eq(&shared, &removed));
        assert!(registry.is_empty());
        assert_eq!(registry.require::<Settings>().unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_names_in_order() {
        let mut registry = ServiceRegistry::new();
        registry.register(Clock).unwrap();
        registry.register(Settings { volume: 0.0 }).unwrap();
        let names = registry.service_names();
        assert!(names[0].ends_with("Clock"));
        assert!(names[1].ends_with("Settings"));
        registry.clear();
        assert!(registry.is_empty());
    }
}
