//! Process-wide proxy factory
//!
//! The factory is created on first use. `install_config` may replace the
//! defaults, but only before anything has touched the factory.

use std::path::Path;
use std::sync::Arc;

use aspect_engine::{Interceptor, ProxyConfig, ProxyError, ProxyFactory, ResolvedType, TypeInfo};
use once_cell::sync::OnceCell;

use crate::config::load_config;
use crate::error::RuntimeError;
use crate::options::{ProxyOptions, ServiceCollection};

static FACTORY: OnceCell<ProxyFactory> = OnceCell::new();

/// The process-wide factory, created with default settings if needed
pub fn factory() -> &'static ProxyFactory {
    FACTORY.get_or_init(|| {
        tracing::debug!("initializing process-wide proxy factory with defaults");
        ProxyFactory::new()
    })
}

/// Whether the process-wide factory exists yet
pub fn is_initialized() -> bool {
    FACTORY.get().is_some()
}

/// Create the process-wide factory with `config`
///
/// Fails with `ConfigurationConflict` once the factory exists.
pub fn install_config(config: ProxyConfig) -> Result<(), RuntimeError> {
    let namespace = config.namespace.clone();
    FACTORY
        .set(ProxyFactory::with_config(config))
        .map_err(|_| {
            tracing::warn!(
                namespace = %namespace,
                "process-wide proxy factory already initialized"
            );
            ProxyError::ConfigurationConflict(
                "process-wide proxy factory is already initialized".to_string(),
            )
        })?;
    tracing::debug!(namespace = %namespace, "installed proxy config");
    Ok(())
}

/// Load `path` and install it as the process-wide configuration
pub fn install_config_file(path: impl AsRef<Path>) -> Result<(), RuntimeError> {
    install_config(load_config(path)?)
}

/// Set the global fallback interceptor of the process-wide factory
pub fn register_global_interceptor(interceptor: Arc<dyn Interceptor>) -> Result<(), ProxyError> {
    factory().register_global_interceptor(interceptor)
}

/// Proxy type for a service/implementation pair, from the process-wide factory
pub fn proxy_type_for(
    service: Option<&Arc<TypeInfo>>,
    implementation: Option<&Arc<TypeInfo>>,
) -> Result<ResolvedType, ProxyError> {
    factory().proxy_type_for(service, implementation)
}

/// Install `interceptor` as the global fallback, then register services
///
/// `configure` receives options bound to the process-wide factory.
pub fn add_aspect_proxy<F>(
    services: &mut ServiceCollection,
    interceptor: Arc<dyn Interceptor>,
    configure: F,
) -> Result<(), RuntimeError>
where
    F: FnOnce(&mut ProxyOptions<'_>) -> Result<(), RuntimeError>,
{
    register_global_interceptor(interceptor)?;
    let mut options = ProxyOptions::new(services, factory());
    configure(&mut options)
}
