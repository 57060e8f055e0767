//! Service registration descriptors
//!
//! `ProxyOptions` turns (service, implementation, lifetime) triples into
//! descriptors a dependency-injection container can consume. The container
//! itself (scopes, instance caching) lives outside this crate; it only has to
//! honour the lifetime and call the descriptor's factory.
//!
//! Registration rules:
//! - an implementation marked `ignore_proxy` is registered as-is (try-add)
//! - an interface service also registers the implementation under itself
//!   (try-add), so the concrete type stays resolvable
//! - the service entry is then replaced by the proxy factory

use std::fmt;
use std::sync::Arc;

use aspect_engine::{ProxyFactory, ResolvedType, ServiceFactory, TypeInfo, TypeKey};

use crate::error::RuntimeError;

/// How long a container keeps an instance it created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// One instance per container
    Singleton,
    /// One instance per scope
    Scoped,
    /// A new instance per request
    Transient,
}

/// A container registration
#[derive(Clone)]
pub struct ServiceDescriptor {
    /// Type requested from the container
    pub service: Arc<TypeInfo>,
    /// Type the factory builds (the proxied implementation for proxies)
    pub implementation: Arc<TypeInfo>,
    /// Instance lifetime
    pub lifetime: ServiceLifetime,
    /// Builds a new instance from constructor arguments
    pub factory: ServiceFactory,
    /// Whether `factory` yields a proxy
    pub proxied: bool,
}

impl ServiceDescriptor {
    fn describe(
        service: &Arc<TypeInfo>,
        resolved: &ResolvedType,
        lifetime: ServiceLifetime,
    ) -> Self {
        Self {
            service: service.clone(),
            implementation: resolved.implementation().clone(),
            lifetime,
            factory: resolved.factory(),
            proxied: resolved.is_proxy(),
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service", &self.service.name())
            .field("implementation", &self.implementation.name())
            .field("lifetime", &self.lifetime)
            .field("proxied", &self.proxied)
            .finish()
    }
}

/// Ordered registration list, at most one descriptor per service type
#[derive(Debug, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `descriptor` unless its service is already registered
    ///
    /// Returns whether it was added.
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.position(descriptor.service.key()).is_some() {
            return false;
        }
        self.descriptors.push(descriptor);
        true
    }

    /// Add `descriptor`, replacing any registration for the same service
    pub fn replace(&mut self, descriptor: ServiceDescriptor) {
        match self.position(descriptor.service.key()) {
            Some(index) => self.descriptors[index] = descriptor,
            None => self.descriptors.push(descriptor),
        }
    }

    /// Registration for `service`
    pub fn get(&self, service: &TypeInfo) -> Option<&ServiceDescriptor> {
        self.position(service.key()).map(|i| &self.descriptors[i])
    }

    /// All registrations in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn position(&self, key: TypeKey) -> Option<usize> {
        self.descriptors.iter().position(|d| d.service.key() == key)
    }
}

/// Registers proxied services into a `ServiceCollection`
pub struct ProxyOptions<'a> {
    services: &'a mut ServiceCollection,
    factory: &'a ProxyFactory,
}

impl<'a> ProxyOptions<'a> {
    /// Register into `services`, synthesizing through `factory`
    pub fn new(services: &'a mut ServiceCollection, factory: &'a ProxyFactory) -> Self {
        Self { services, factory }
    }

    /// Register `service` implemented by `implementation` as a singleton
    pub fn add_singleton(
        &mut self,
        service: &Arc<TypeInfo>,
        implementation: &Arc<TypeInfo>,
    ) -> Result<(), RuntimeError> {
        self.add(service, implementation, ServiceLifetime::Singleton)
    }

    /// Register `implementation` under itself as a singleton
    pub fn add_singleton_self(
        &mut self,
        implementation: &Arc<TypeInfo>,
    ) -> Result<(), RuntimeError> {
        self.add(implementation, implementation, ServiceLifetime::Singleton)
    }

    /// Register `service` implemented by `implementation` per scope
    pub fn add_scoped(
        &mut self,
        service: &Arc<TypeInfo>,
        implementation: &Arc<TypeInfo>,
    ) -> Result<(), RuntimeError> {
        self.add(service, implementation, ServiceLifetime::Scoped)
    }

    /// Register `implementation` under itself per scope
    pub fn add_scoped_self(
        &mut self,
        implementation: &Arc<TypeInfo>,
    ) -> Result<(), RuntimeError> {
        self.add(implementation, implementation, ServiceLifetime::Scoped)
    }

    /// Register `service` implemented by `implementation` per request
    pub fn add_transient(
        &mut self,
        service: &Arc<TypeInfo>,
        implementation: &Arc<TypeInfo>,
    ) -> Result<(), RuntimeError> {
        self.add(service, implementation, ServiceLifetime::Transient)
    }

    /// Register `implementation` under itself per request
    pub fn add_transient_self(
        &mut self,
        implementation: &Arc<TypeInfo>,
    ) -> Result<(), RuntimeError> {
        self.add(implementation, implementation, ServiceLifetime::Transient)
    }

    /// Register `service` implemented by `implementation` with `lifetime`
    pub fn add(
        &mut self,
        service: &Arc<TypeInfo>,
        implementation: &Arc<TypeInfo>,
        lifetime: ServiceLifetime,
    ) -> Result<(), RuntimeError> {
        let resolved = self
            .factory
            .proxy_type_for(Some(service), Some(implementation))?;

        if !resolved.is_proxy() {
            let added = self
                .services
                .try_add(ServiceDescriptor::describe(service, &resolved, lifetime));
            tracing::debug!(
                service = service.name(),
                implementation = implementation.name(),
                added,
                "registered service without proxy"
            );
            return Ok(());
        }

        if service.is_interface() {
            let direct = ResolvedType::Bypass(implementation.clone());
            self.services
                .try_add(ServiceDescriptor::describe(implementation, &direct, lifetime));
        }

        tracing::debug!(
            service = service.name(),
            proxy = resolved.name(),
            ?lifetime,
            "registered proxied service"
        );
        self.services
            .replace(ServiceDescriptor::describe(service, &resolved, lifetime));
        Ok(())
    }
}
