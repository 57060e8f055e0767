//! Aspect Interception Engine
//!
//! Synthesizes proxy types that route calls on a service through
//! interceptors before (or instead of) running the implementation:
//! - **Reflection**: type, method and marker metadata (`reflect` module)
//! - **Call packets**: per-shape marshalling of arguments, by-reference
//!   slots and asynchronous results (`synth::packet`)
//! - **Proxy types**: forwarding members, mirrored constructors and the
//!   type cache (`synth`)
//! - **Interceptors**: the call contract and three-tier resolution
//!   (`interceptor` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use aspect_engine::{args, MethodBuilder, ProxyFactory, Returned, TypeBuilder};
//!
//! let contract = TypeBuilder::interface("Calculator")
//!     .declare(MethodBuilder::new("compute").param::<i32>("x").returns::<i32>())
//!     .build();
//! let implementation = TypeBuilder::<Calc>::class("Calc")
//!     .implements(&contract)
//!     .default_constructor()
//!     .method(
//!         MethodBuilder::new("compute").param::<i32>("x").returns::<i32>(),
//!         |_, args| Ok(Returned::Value(args[0].clone())),
//!     )
//!     .build();
//!
//! let factory = ProxyFactory::new();
//! factory.register_global_interceptor(Arc::new(Logging))?;
//! let proxy = factory.proxy_type_for(Some(&contract), Some(&implementation))?;
//! let calc = proxy.construct(&[])?;
//! let out = calc.invoke("compute", &mut args![5i32])?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod factory;
pub mod interceptor;
pub mod proxy;
pub mod reflect;
pub mod synth;
pub mod value;

pub use config::ProxyConfig;
pub use error::{CallError, CallResult, ProxyError, ShapeRule};
pub use factory::ProxyFactory;
pub use interceptor::{
    BindingKey, CallContext, Interceptor, InterceptorRegistry, PassThrough, Resolution, Tier,
};
pub use proxy::{DirectObject, ProxyObject, ResolvedType, ServiceFactory, ServiceObject};
pub use reflect::{
    object_type, GenericParam, InterceptorMarker, MethodBuilder, MethodInfo, MethodKey,
    ParameterInfo, PassMode, PropertyBuilder, TypeBuilder, TypeConstraint, TypeInfo, TypeKey,
    TypeRef, TypeRegistry,
};
pub use synth::{ProxyMode, ProxyType, ReturnPlan, Validation};
pub use value::{arg, AsyncKind, AsyncValue, Returned, Value, ValueCell};
