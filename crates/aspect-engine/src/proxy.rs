//! Service instances
//!
//! [`ResolvedType`] is what the factory hands out: either a synthesized proxy
//! type or, for opted-out implementations, the implementation type itself.
//! Both construct [`ServiceObject`]s, so hosts call members the same way
//! whether or not interception is in play.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{CallError, CallResult, ProxyError};
use crate::reflect::{ConstructorInfo, Instance, Target, TypeInfo, TypeRef};
use crate::synth::packet::{arguments_match, check_arguments, complete_arguments, write_back};
use crate::synth::ProxyType;
use crate::value::{Returned, Value};

/// A constructed service, proxied or not
pub trait ServiceObject: Send + Sync {
    /// Name of the instance's type
    fn type_name(&self) -> &str;

    /// Check if calls go through interception
    fn is_proxy(&self) -> bool;

    /// Implementation instance
    fn target(&self) -> &Target;

    /// Call a generic member with explicit type arguments
    fn call_generic(
        &self,
        name: &str,
        type_args: &[TypeRef],
        args: &mut [Value],
    ) -> CallResult<Returned>;

    /// Call a member
    ///
    /// By-reference arguments are written back into `args`.
    fn call(&self, name: &str, args: &mut [Value]) -> CallResult<Returned> {
        self.call_generic(name, &[], args)
    }

    /// Call a member and settle its result
    ///
    /// Asynchronous results are waited on and by-reference results read.
    fn invoke(&self, name: &str, args: &mut [Value]) -> CallResult<Value> {
        self.call(name, args)?.resolve()
    }
}

impl dyn ServiceObject + '_ {
    /// Implementation instance as a concrete type
    pub fn target_as<T: Any>(&self) -> Option<&T> {
        self.target().downcast_ref::<T>()
    }
}

/// Instance of a synthesized proxy type
pub struct ProxyObject {
    ty: Arc<ProxyType>,
    target: Instance,
    interceptor_type: Option<&'static str>,
}

impl ProxyObject {
    /// Proxy type of this instance
    pub fn proxy_type(&self) -> &Arc<ProxyType> {
        &self.ty
    }

    /// Type name of the interceptor that serviced construction
    pub fn interceptor_type(&self) -> Option<&'static str> {
        self.interceptor_type
    }

    /// Implementation instance as a concrete type
    pub fn target_as<T: Any>(&self) -> Option<&T> {
        self.target.downcast_ref::<T>()
    }
}

impl ServiceObject for ProxyObject {
    fn type_name(&self) -> &str {
        self.ty.name()
    }

    fn is_proxy(&self) -> bool {
        true
    }

    fn target(&self) -> &Target {
        &*self.target
    }

    fn call_generic(
        &self,
        name: &str,
        type_args: &[TypeRef],
        args: &mut [Value],
    ) -> CallResult<Returned> {
        self.ty.dispatch(&*self.target, name, type_args, args)
    }
}

impl fmt::Debug for ProxyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyObject")
            .field("type", &self.ty.name())
            .field("interceptor_type", &self.interceptor_type)
            .finish()
    }
}

/// Instance of an implementation type used without a proxy
pub struct DirectObject {
    ty: Arc<TypeInfo>,
    target: Instance,
}

impl DirectObject {
    /// Implementation type
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.ty
    }
}

impl ServiceObject for DirectObject {
    fn type_name(&self) -> &str {
        self.ty.name()
    }

    fn is_proxy(&self) -> bool {
        false
    }

    fn target(&self) -> &Target {
        &*self.target
    }

    fn call_generic(
        &self,
        name: &str,
        type_args: &[TypeRef],
        args: &mut [Value],
    ) -> CallResult<Returned> {
        let method = self
            .ty
            .methods_named(name)
            .filter(|m| m.is_public())
            .find(|m| {
                m.signature().generics.len() == type_args.len()
                    && arguments_match(&m.signature().params, args)
            })
            .ok_or_else(|| CallError::MissingMember {
                member: name.to_string(),
                type_name: self.ty.name().to_string(),
            })?;

        let params = &method.signature().params;
        let mut slots = complete_arguments(name, params, args)?;
        check_arguments(name, params, &slots)?;
        let returned = method.invoke_direct(&*self.target, &mut slots)?;
        write_back(params, &slots, args);
        Ok(returned)
    }
}

impl fmt::Debug for DirectObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectObject")
            .field("type", &self.ty.name())
            .finish()
    }
}

/// Closure constructing service instances, for registration with a container
pub type ServiceFactory =
    Arc<dyn Fn(&[Value]) -> CallResult<Arc<dyn ServiceObject>> + Send + Sync>;

/// Type handle returned by the factory
#[derive(Debug, Clone)]
pub enum ResolvedType {
    /// Synthesized proxy type
    Proxy(Arc<ProxyType>),
    /// Implementation opted out of proxying and is used as-is
    Bypass(Arc<TypeInfo>),
}

impl ResolvedType {
    /// Type name
    pub fn name(&self) -> &str {
        match self {
            ResolvedType::Proxy(proxy) => proxy.name(),
            ResolvedType::Bypass(ty) => ty.name(),
        }
    }

    /// Check for a synthesized proxy type
    pub fn is_proxy(&self) -> bool {
        matches!(self, ResolvedType::Proxy(_))
    }

    /// The proxy type, if one was synthesized
    pub fn as_proxy(&self) -> Option<&Arc<ProxyType>> {
        match self {
            ResolvedType::Proxy(proxy) => Some(proxy),
            ResolvedType::Bypass(_) => None,
        }
    }

    /// Implementation type instances are built from
    pub fn implementation(&self) -> &Arc<TypeInfo> {
        match self {
            ResolvedType::Proxy(proxy) => proxy.implementation(),
            ResolvedType::Bypass(ty) => ty,
        }
    }

    /// Check if both handles refer to the identical type
    pub fn same_type(&self, other: &ResolvedType) -> bool {
        match (self, other) {
            (ResolvedType::Proxy(a), ResolvedType::Proxy(b)) => Arc::ptr_eq(a, b),
            (ResolvedType::Bypass(a), ResolvedType::Bypass(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Construct an instance through the first public constructor accepting `args`
    pub fn construct(&self, args: &[Value]) -> CallResult<Box<dyn ServiceObject>> {
        match self {
            ResolvedType::Proxy(proxy) => {
                if proxy.is_open() {
                    return Err(ProxyError::synthesis(
                        proxy.name(),
                        "open generic proxy type must be closed before construction",
                    )
                    .into());
                }
                let target = construct_with(proxy.name(), proxy.constructors().iter(), args)?;
                tracing::trace!(proxy = proxy.name(), "constructed proxy instance");
                Ok(Box::new(ProxyObject {
                    ty: proxy.clone(),
                    target,
                    interceptor_type: proxy.interceptor_type(),
                }))
            }
            ResolvedType::Bypass(ty) => {
                let target = construct_with(ty.name(), ty.public_constructors(), args)?;
                Ok(Box::new(DirectObject {
                    ty: ty.clone(),
                    target,
                }))
            }
        }
    }

    /// Constructing closure for a container registration
    pub fn factory(&self) -> ServiceFactory {
        let resolved = self.clone();
        Arc::new(move |args: &[Value]| resolved.construct(args).map(Arc::from))
    }
}

fn construct_with<'a>(
    type_name: &str,
    mut constructors: impl Iterator<Item = &'a ConstructorInfo>,
    args: &[Value],
) -> CallResult<Instance> {
    let constructor = constructors
        .find(|c| arguments_match(c.params(), args))
        .ok_or_else(|| CallError::MissingMember {
            member: "constructor".to_string(),
            type_name: type_name.to_string(),
        })?;
    let slots = complete_arguments(type_name, constructor.params(), args)?;
    constructor.construct(&slots)
}
