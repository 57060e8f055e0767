//! Registry of known types by name

use dashmap::DashMap;
use std::sync::Arc;

use super::metadata::{TypeInfo, TypeKey};

/// Name and identity lookup for host types
///
/// Used by the by-name factory entry points. Registering a second type under
/// an existing name replaces the first.
pub struct TypeRegistry {
    /// Map of type name to type
    by_name: DashMap<Arc<str>, Arc<TypeInfo>>,
    /// Map of type key to type
    by_key: DashMap<TypeKey, Arc<TypeInfo>>,
}

impl TypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            by_key: DashMap::new(),
        }
    }

    /// Register a type under its own name
    pub fn register(&self, ty: &Arc<TypeInfo>) {
        self.by_name.insert(Arc::from(ty.name()), ty.clone());
        self.by_key.insert(ty.key(), ty.clone());
    }

    /// Look a type up by name
    pub fn get(&self, name: &str) -> Option<Arc<TypeInfo>> {
        self.by_name.get(name).map(|entry| entry.clone())
    }

    /// Look a type up by identity
    pub fn get_by_key(&self, key: TypeKey) -> Option<Arc<TypeInfo>> {
        self.by_key.get(&key).map(|entry| entry.clone())
    }

    /// Remove a type by name
    pub fn remove(&self, name: &str) -> Option<Arc<TypeInfo>> {
        let (_, ty) = self.by_name.remove(name)?;
        self.by_key.remove(&ty.key());
        Some(ty)
    }

    /// Get the number of registered types
    pub fn count(&self) -> usize {
        self.by_name.len()
    }

    /// Names of every registered type
    pub fn names(&self) -> Vec<String> {
        self.by_name.iter().map(|entry| entry.key().to_string()).collect()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
