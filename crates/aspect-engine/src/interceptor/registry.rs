//! Interceptor resolution
//!
//! Resolution walks three tiers in strict order and stops at the first hit:
//!
//! 1. the member itself (its marker, then a programmatic method binding)
//! 2. the member's declaring type (its marker, then a programmatic type binding)
//! 3. the global fallback
//!
//! The global fallback can be set exactly once. Programmatic bindings are
//! append-only; every write publishes a fresh table through an atomic swap,
//! so readers never lock and always see a complete snapshot.
//!
//! A binding made against a generic definition (or one of its members)
//! applies to every instantiation of it. A binding on one exact
//! instantiation takes precedence within the same tier.

use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::Interceptor;
use crate::error::ProxyError;
use crate::reflect::{MethodInfo, MethodKey, TypeKey};

/// Target of a programmatic binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKey {
    /// A single method
    Method(MethodKey),
    /// Every method declared by a type
    Type(TypeKey),
}

/// Which tier produced an interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Bound to the member
    Member,
    /// Bound to the declaring type
    Type,
    /// Global fallback
    Global,
}

/// Outcome of a resolution
#[derive(Clone)]
pub struct Resolution {
    /// Interceptor to run
    pub interceptor: Arc<dyn Interceptor>,
    /// Tier it came from
    pub tier: Tier,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("interceptor", &self.interceptor.type_name())
            .field("tier", &self.tier)
            .finish()
    }
}

type BindingTable = FxHashMap<BindingKey, Arc<dyn Interceptor>>;

/// Thread-safe interceptor bindings with a set-once global fallback
pub struct InterceptorRegistry {
    global: OnceCell<Arc<dyn Interceptor>>,
    bindings: ArcSwap<BindingTable>,
    write: Mutex<()>,
    resolutions: AtomicU64,
}

impl InterceptorRegistry {
    /// Create a registry without any interceptor
    pub fn new() -> Self {
        Self {
            global: OnceCell::new(),
            bindings: ArcSwap::from_pointee(FxHashMap::default()),
            write: Mutex::new(()),
            resolutions: AtomicU64::new(0),
        }
    }

    /// Set the global fallback; fails if one is already set
    pub fn register_global(&self, interceptor: Arc<dyn Interceptor>) -> Result<(), ProxyError> {
        let name = interceptor.type_name();
        self.global.set(interceptor).map_err(|_| {
            tracing::warn!(interceptor = name, "global interceptor already registered");
            ProxyError::ConfigurationConflict(format!(
                "a global interceptor is already registered; refusing '{}'",
                name
            ))
        })?;
        tracing::debug!(interceptor = name, "registered global interceptor");
        Ok(())
    }

    /// The global fallback, if set
    pub fn global(&self) -> Option<&Arc<dyn Interceptor>> {
        self.global.get()
    }

    /// Check if a global fallback is set
    pub fn has_global(&self) -> bool {
        self.global.get().is_some()
    }

    /// Bind an interceptor to one method
    ///
    /// Binding a member of a generic definition covers that member on every
    /// instantiation.
    pub fn bind_method(
        &self,
        method: MethodKey,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), ProxyError> {
        self.bind(BindingKey::Method(method), interceptor)
    }

    /// Bind an interceptor to every method a type declares
    ///
    /// Binding a generic definition covers every instantiation of it.
    pub fn bind_type(
        &self,
        ty: TypeKey,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), ProxyError> {
        self.bind(BindingKey::Type(ty), interceptor)
    }

    fn bind(&self, key: BindingKey, interceptor: Arc<dyn Interceptor>) -> Result<(), ProxyError> {
        let _guard = self.write.lock();

        let mut next = BindingTable::clone(&self.bindings.load());
        match next.entry(key) {
            Entry::Occupied(_) => {
                tracing::warn!(?key, "interceptor binding already exists");
                return Err(ProxyError::ConfigurationConflict(format!(
                    "an interceptor is already bound to {:?}",
                    key
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(interceptor);
            }
        }

        self.bindings.store(Arc::new(next));
        tracing::debug!(?key, "bound interceptor");
        Ok(())
    }

    /// Current binding table
    pub fn snapshot(&self) -> Arc<BindingTable> {
        self.bindings.load_full()
    }

    /// Resolve the interceptor for a call to `method`
    pub fn resolve(&self, method: &MethodInfo) -> Result<Resolution, ProxyError> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let resolution = self.lookup(method)?;
        tracing::trace!(
            method = method.name(),
            declaring = method.declaring_name(),
            tier = ?resolution.tier,
            "resolved interceptor"
        );
        Ok(resolution)
    }

    fn lookup(&self, method: &MethodInfo) -> Result<Resolution, ProxyError> {
        if let Some(marker) = &method.markers().interceptor {
            return Ok(Resolution {
                interceptor: marker.interceptor(),
                tier: Tier::Member,
            });
        }

        let table = self.snapshot();
        let bound = bound_to(
            &table,
            method.key(),
            method.definition_key(),
            BindingKey::Method,
        );
        if let Some(bound) = bound {
            return Ok(Resolution {
                interceptor: bound,
                tier: Tier::Member,
            });
        }

        if let Some(marker) = &method.declaring_markers().interceptor {
            return Ok(Resolution {
                interceptor: marker.interceptor(),
                tier: Tier::Type,
            });
        }
        let bound = bound_to(
            &table,
            method.declaring(),
            method.declaring_definition(),
            BindingKey::Type,
        );
        if let Some(bound) = bound {
            return Ok(Resolution {
                interceptor: bound,
                tier: Tier::Type,
            });
        }

        match self.global.get() {
            Some(global) => Ok(Resolution {
                interceptor: global.clone(),
                tier: Tier::Global,
            }),
            None => Err(ProxyError::ConfigurationConflict(format!(
                "no interceptor applies to '{}' and no global interceptor is registered",
                method.name()
            ))),
        }
    }

    /// Number of resolutions performed so far
    pub fn resolution_count(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }
}

/// Binding for `exact`, falling back to its generic `definition`
fn bound_to<K: Copy + PartialEq>(
    table: &BindingTable,
    exact: K,
    definition: K,
    key: fn(K) -> BindingKey,
) -> Option<Arc<dyn Interceptor>> {
    if exact == definition {
        return table.get(&key(exact)).cloned();
    }
    table
        .get(&key(exact))
        .or_else(|| table.get(&key(definition)))
        .cloned()
}

impl Default for InterceptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("global", &self.global.get().map(|g| g.type_name()))
            .field("bindings", &self.bindings.load().len())
            .field("resolutions", &self.resolution_count())
            .finish()
    }
}
