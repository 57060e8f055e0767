//! Aspect Runtime
//!
//! Hosts the engine for an application:
//! - a process-wide `ProxyFactory` with an init-once configuration
//! - `aspect.toml` loading
//! - service registration descriptors for dependency-injection containers
//!
//! # Example
//!
//! ```rust,ignore
//! use aspect_runtime::{add_aspect_proxy, ServiceCollection};
//!
//! let mut services = ServiceCollection::new();
//! add_aspect_proxy(&mut services, Arc::new(Logging), |options| {
//!     options.add_scoped(&calculator, &calc)?;
//!     options.add_singleton_self(&clock)
//! })?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod global;
pub mod options;

pub use config::{load_config, load_config_in, parse_config, CONFIG_FILE_NAME};
pub use error::RuntimeError;
pub use global::{
    add_aspect_proxy, factory, install_config, install_config_file, is_initialized,
    proxy_type_for, register_global_interceptor,
};
pub use options::{ProxyOptions, ServiceCollection, ServiceDescriptor, ServiceLifetime};
