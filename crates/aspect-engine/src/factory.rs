//! Proxy factory
//!
//! The entry point hosts talk to. A factory owns one interceptor registry,
//! one synthesis lock and the caches hanging off it, so two factories never
//! share synthesized types.

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::interceptor::{Interceptor, InterceptorRegistry};
use crate::proxy::ResolvedType;
use crate::reflect::{GenericBindings, MethodKey, TypeInfo, TypeKey, TypeRef, TypeRegistry};
use crate::synth::{
    check_contract, check_implementation, PacketSynthesizer, ProxySynthesizer, ProxyType,
    SynthesisLock, TypeCache, Validation,
};

/// Synthesizes and caches proxy types
pub struct ProxyFactory {
    config: ProxyConfig,
    registry: Arc<InterceptorRegistry>,
    packets: Arc<PacketSynthesizer>,
    synthesizer: ProxySynthesizer,
    proxies: TypeCache<(TypeKey, TypeKey), Arc<ProxyType>>,
    types: TypeRegistry,
}

impl ProxyFactory {
    /// Create a factory with default settings
    pub fn new() -> Self {
        Self::with_config(ProxyConfig::default())
    }

    /// Create a factory with `config`
    pub fn with_config(config: ProxyConfig) -> Self {
        let lock = Arc::new(SynthesisLock::new());
        let registry = Arc::new(InterceptorRegistry::new());
        let packets = Arc::new(PacketSynthesizer::new(lock.clone()));
        let synthesizer = ProxySynthesizer::new(registry.clone(), packets.clone(), &config);
        Self {
            config,
            registry,
            packets,
            synthesizer,
            proxies: TypeCache::new(lock),
            types: TypeRegistry::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Interceptor registry used by every proxy this factory synthesizes
    pub fn interceptors(&self) -> &Arc<InterceptorRegistry> {
        &self.registry
    }

    /// Host type registry used for by-name lookups
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Set the global fallback interceptor; fails if one is already set
    pub fn register_global_interceptor(
        &self,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), ProxyError> {
        self.registry.register_global(interceptor)
    }

    /// Bind an interceptor to one method
    ///
    /// A member of a generic definition is bound on every instantiation.
    pub fn bind_method(
        &self,
        method: MethodKey,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), ProxyError> {
        self.registry.bind_method(method, interceptor)
    }

    /// Bind an interceptor to every method a type declares
    ///
    /// A generic definition is bound on every instantiation.
    pub fn bind_type(
        &self,
        ty: TypeKey,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), ProxyError> {
        self.registry.bind_type(ty, interceptor)
    }

    /// Type handle standing in for `implementation` wherever `service` is expected
    ///
    /// Repeated requests for the same pair return the identical handle. An
    /// implementation carrying the opt-out marker comes back unchanged.
    pub fn proxy_type_for(
        &self,
        service: Option<&Arc<TypeInfo>>,
        implementation: Option<&Arc<TypeInfo>>,
    ) -> Result<ResolvedType, ProxyError> {
        let (service, implementation, validation) =
            check_implementation(service, implementation)?;
        if validation == Validation::Bypass {
            tracing::debug!(
                implementation = implementation.name(),
                "implementation opted out of proxying"
            );
            return Ok(ResolvedType::Bypass(implementation));
        }

        if !self.registry.has_global() {
            return Err(ProxyError::ConfigurationConflict(format!(
                "no global interceptor registered while requesting a proxy for '{}'",
                service.name()
            )));
        }
        check_contract(&service, &implementation)?;

        let key = (service.key(), implementation.key());
        let proxy = self.proxies.get_or_create(key, || {
            self.synthesizer.synthesize(&service, &implementation)
        })?;
        Ok(ResolvedType::Proxy(proxy))
    }

    /// [`proxy_type_for`](Self::proxy_type_for) with types looked up by name
    pub fn proxy_type_by_name(
        &self,
        service: &str,
        implementation: &str,
    ) -> Result<ResolvedType, ProxyError> {
        let lookup = |name: &str| {
            self.types
                .get(name)
                .ok_or_else(|| ProxyError::InvalidArgument(format!("unknown type '{}'", name)))
        };
        let service = lookup(service)?;
        let implementation = lookup(implementation)?;
        self.proxy_type_for(Some(&service), Some(&implementation))
    }

    /// Close an open generic proxy type over concrete implementation arguments
    ///
    /// `args` bind the implementation's generic parameters; the service is
    /// instantiated with whatever those make of the contract it implements.
    pub fn close_generic(
        &self,
        open: &ProxyType,
        args: &[TypeRef],
    ) -> Result<ResolvedType, ProxyError> {
        if !open.is_open() {
            return Err(ProxyError::synthesis(
                open.name(),
                "proxy type is already closed",
            ));
        }

        let implementation = open.implementation();
        let bindings = GenericBindings::bind(implementation.generic_params(), args)
            .map_err(|reason| ProxyError::synthesis(implementation.name(), reason))?;
        let closed_impl = implementation.instantiate(args)?;

        let service = open.service();
        let closed_service = if service.is_generic_definition() {
            service.instantiate(&open.contract_arguments(&bindings))?
        } else {
            service.clone()
        };

        tracing::debug!(
            proxy = open.name(),
            implementation = closed_impl.name(),
            "closing generic proxy type"
        );
        self.proxy_type_for(Some(&closed_service), Some(&closed_impl))
    }

    /// Number of proxy types synthesized so far
    pub fn proxy_type_count(&self) -> usize {
        self.proxies.len()
    }

    /// Number of call packet types synthesized so far
    pub fn packet_type_count(&self) -> usize {
        self.packets.len()
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("proxy_types", &self.proxies.len())
            .field("packet_types", &self.packets.len())
            .finish()
    }
}
