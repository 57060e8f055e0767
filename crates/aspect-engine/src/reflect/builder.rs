//! Builders for type metadata
//!
//! Hosts describe their services and implementations with [`TypeBuilder`]:
//! constructors, methods, properties and markers, each method carrying the
//! Rust closure that runs it. Everything is frozen into an `Arc<TypeInfo>` by
//! [`TypeBuilder::build`].
//!
//! ```ignore
//! let calculator = TypeBuilder::<Calculator>::class("Calculator")
//!     .implements(&contract)
//!     .default_constructor()
//!     .method(
//!         MethodBuilder::new("compute").param::<i32>("x").returns::<i32>(),
//!         |calc, args| Ok(Returned::value(calc.compute(arg(args, 0)?))),
//!     )
//!     .build();
//! ```

use std::any::{self, Any};
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::generic::GenericParam;
use super::markers::{InterceptorMarker, Markers};
use super::metadata::{
    object_type, root_methods, ConstructorBody, ConstructorInfo, Instance, MethodBody, MethodInfo,
    MethodKey, Modifiers, Target, TypeInfo, TypeKey, TypeKind,
};
use super::signature::{MethodSignature, ParameterInfo, PassMode};
use super::types::TypeRef;
use crate::error::{CallError, CallResult};
use crate::value::{Returned, Value};

/// Signature and markers of a method under construction
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: Arc<str>,
    params: Vec<ParameterInfo>,
    return_type: TypeRef,
    generics: Vec<GenericParam>,
    is_public: bool,
    is_virtual: bool,
    markers: Markers,
}

impl MethodBuilder {
    /// Public, overridable, void method without parameters
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            params: Vec::new(),
            return_type: TypeRef::Void,
            generics: Vec::new(),
            is_public: true,
            is_virtual: true,
            markers: Markers::none(),
        }
    }

    /// Add a by-value parameter of Rust type `T`
    pub fn param<T: Any>(self, name: &str) -> Self {
        self.param_ty(name, TypeRef::of::<T>())
    }

    /// Add a by-value parameter of any shape
    pub fn param_ty(mut self, name: &str, ty: TypeRef) -> Self {
        self.params.push(ParameterInfo::new(name, ty));
        self
    }

    /// Add a by-reference parameter
    pub fn param_ref(mut self, name: &str, ty: TypeRef, mode: PassMode) -> Self {
        self.params.push(ParameterInfo::new(name, ty).with_mode(mode));
        self
    }

    /// Add a by-value parameter with a default
    pub fn optional<T: Any + Send + Sync>(mut self, name: &str, default: T) -> Self {
        self.params
            .push(ParameterInfo::new(name, TypeRef::of::<T>()).with_default(Value::new(default)));
        self
    }

    /// Add a parameter of any shape with a default
    pub fn optional_ty(mut self, name: &str, ty: TypeRef, default: Value) -> Self {
        self.params.push(ParameterInfo::new(name, ty).with_default(default));
        self
    }

    /// Return a `T`
    pub fn returns<T: Any>(self) -> Self {
        self.returns_ty(TypeRef::of::<T>())
    }

    /// Return a value of any shape
    pub fn returns_ty(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    /// Return an already-started task yielding a `T`
    pub fn returns_task<T: Any>(self) -> Self {
        self.returns_ty(TypeRef::task_of::<T>())
    }

    /// Declare a method-level generic parameter
    pub fn generic(mut self, param: GenericParam) -> Self {
        self.generics.push(param);
        self
    }

    /// Prevent overriding; inheritance proxies forward such members directly
    pub fn non_virtual(mut self) -> Self {
        self.is_virtual = false;
        self
    }

    /// Hide from callers
    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    /// Opt this member out of proxying
    pub fn ignore_proxy(mut self) -> Self {
        self.markers.ignore_proxy = true;
        self
    }

    /// Bind a dedicated interceptor to this member
    pub fn intercepted_by(mut self, marker: &Arc<InterceptorMarker>) -> Self {
        self.markers.interceptor = Some(marker.clone());
        self
    }

    fn into_info(
        self,
        declaring: TypeKey,
        declaring_name: &Arc<str>,
        body: Option<MethodBody>,
    ) -> MethodInfo {
        MethodInfo {
            key: MethodKey::next(),
            signature: MethodSignature {
                declaring,
                name: self.name,
                params: self.params,
                return_type: self.return_type,
                generics: self.generics,
            },
            declaring_name: declaring_name.clone(),
            definition: None,
            declaring_definition: None,
            declaring_markers: Markers::none(),
            is_public: self.is_public,
            is_virtual: self.is_virtual,
            from_root: false,
            property: None,
            markers: self.markers,
            body,
        }
    }
}

type Getter<T> = Box<dyn Fn(&T) -> CallResult<Value> + Send + Sync>;
type Setter<T> = Box<dyn Fn(&T, Value) -> CallResult<()> + Send + Sync>;

/// A property expanded into `get_<name>` / `set_<name>` accessors
pub struct PropertyBuilder<T = ()> {
    name: Arc<str>,
    ty: TypeRef,
    readable: bool,
    writable: bool,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
    markers: Markers,
    getter_markers: Markers,
    setter_markers: Markers,
}

impl<T: Any + Send + Sync> PropertyBuilder<T> {
    /// Property of the given shape without accessors
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            readable: false,
            writable: false,
            getter: None,
            setter: None,
            markers: Markers::none(),
            getter_markers: Markers::none(),
            setter_markers: Markers::none(),
        }
    }

    /// Declare a getter without a body (contracts)
    pub fn readable(mut self) -> Self {
        self.readable = true;
        self
    }

    /// Declare a setter without a body (contracts)
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Getter body
    pub fn getter<F>(mut self, get: F) -> Self
    where
        F: Fn(&T) -> CallResult<Value> + Send + Sync + 'static,
    {
        self.readable = true;
        self.getter = Some(Box::new(get));
        self
    }

    /// Setter body
    pub fn setter<F>(mut self, set: F) -> Self
    where
        F: Fn(&T, Value) -> CallResult<()> + Send + Sync + 'static,
    {
        self.writable = true;
        self.setter = Some(Box::new(set));
        self
    }

    /// Opt both accessors out of proxying
    pub fn ignore_proxy(mut self) -> Self {
        self.markers.ignore_proxy = true;
        self
    }

    /// Bind an interceptor to both accessors
    pub fn intercepted_by(mut self, marker: &Arc<InterceptorMarker>) -> Self {
        self.markers.interceptor = Some(marker.clone());
        self
    }

    /// Bind an interceptor to the getter only; wins over the property marker
    pub fn getter_intercepted_by(mut self, marker: &Arc<InterceptorMarker>) -> Self {
        self.getter_markers.interceptor = Some(marker.clone());
        self
    }

    /// Bind an interceptor to the setter only; wins over the property marker
    pub fn setter_intercepted_by(mut self, marker: &Arc<InterceptorMarker>) -> Self {
        self.setter_markers.interceptor = Some(marker.clone());
        self
    }

    fn into_accessors(self, declaring: TypeKey, declaring_name: &Arc<str>) -> Vec<MethodInfo> {
        let PropertyBuilder {
            name,
            ty,
            readable,
            writable,
            getter,
            setter,
            markers,
            mut getter_markers,
            mut setter_markers,
        } = self;

        let mut accessors = Vec::with_capacity(2);
        if readable {
            getter_markers.inherit_from(&markers);
            let body = getter.map(|get| {
                body_for::<T, _>(move |target, _| get(target).map(Returned::Value))
            });
            let mut info = MethodBuilder::new(&format!("get_{}", name))
                .returns_ty(ty.clone())
                .into_info(declaring, declaring_name, body);
            info.markers = getter_markers;
            info.property = Some(name.clone());
            accessors.push(info);
        }
        if writable {
            setter_markers.inherit_from(&markers);
            let body = setter.map(|set| {
                body_for::<T, _>(move |target, args: &mut [Value]| {
                    let value = args.first().cloned().unwrap_or_default();
                    set(target, value).map(|_| Returned::Unit)
                })
            });
            let mut info = MethodBuilder::new(&format!("set_{}", name))
                .param_ty("value", ty)
                .into_info(declaring, declaring_name, body);
            info.markers = setter_markers;
            info.property = Some(name);
            accessors.push(info);
        }
        accessors
    }
}

fn body_for<T, F>(body: F) -> MethodBody
where
    T: Any + Send + Sync,
    F: Fn(&T, &mut [Value]) -> CallResult<Returned> + Send + Sync + 'static,
{
    Arc::new(move |target: &Target, args: &mut [Value]| {
        let this = target
            .downcast_ref::<T>()
            .ok_or(CallError::TargetType {
                expected: any::type_name::<T>(),
            })?;
        body(this, args)
    })
}

/// Builds a [`TypeInfo`] for a class backed by Rust type `T`, or an interface
pub struct TypeBuilder<T = ()> {
    key: TypeKey,
    name: Arc<str>,
    kind: TypeKind,
    modifiers: Modifiers,
    enclosing: Option<Arc<TypeInfo>>,
    base: Option<Arc<TypeInfo>>,
    interfaces: Vec<Arc<TypeInfo>>,
    generic_params: Vec<GenericParam>,
    constructors: Vec<ConstructorInfo>,
    methods: Vec<MethodInfo>,
    markers: Markers,
    _marker: PhantomData<fn() -> T>,
}

impl TypeBuilder<()> {
    /// Start describing an interface
    pub fn interface(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    /// Inherit the members of a super-interface
    pub fn extends(mut self, parent: &Arc<TypeInfo>) -> Self {
        for method in parent.methods() {
            if !self.overrides(method) {
                self.methods.push((**method).clone());
            }
        }
        self.interfaces.push(parent.clone());
        self
    }
}

impl<T: Any + Send + Sync> TypeBuilder<T> {
    /// Start describing a class whose instances are `T`
    pub fn class(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    fn with_kind(name: &str, kind: TypeKind) -> Self {
        Self {
            key: TypeKey::next(),
            name: Arc::from(name),
            kind,
            modifiers: Modifiers::default(),
            enclosing: None,
            base: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            markers: Markers::none(),
            _marker: PhantomData,
        }
    }

    /// Identity the built type will carry
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Hide the type from other assemblies
    pub fn private(mut self) -> Self {
        self.modifiers.is_public = false;
        self
    }

    /// Forbid subclassing
    pub fn sealed(mut self) -> Self {
        self.modifiers.is_sealed = true;
        self
    }

    /// Forbid instantiation
    pub fn abstract_(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    /// Nest inside another type
    pub fn nested_in(mut self, outer: &Arc<TypeInfo>) -> Self {
        self.enclosing = Some(outer.clone());
        self
    }

    /// Opt every member out of proxying
    pub fn ignore_proxy(mut self) -> Self {
        self.markers.ignore_proxy = true;
        self
    }

    /// Bind an interceptor to every member of the type
    pub fn intercepted_by(mut self, marker: &Arc<InterceptorMarker>) -> Self {
        self.markers.interceptor = Some(marker.clone());
        self
    }

    /// Declare an implemented interface
    pub fn implements(mut self, iface: &Arc<TypeInfo>) -> Self {
        self.interfaces.push(iface.clone());
        self
    }

    /// Declare a generic parameter
    pub fn generic_param(mut self, param: GenericParam) -> Self {
        self.generic_params.push(param);
        self
    }

    /// Derive from `base`, reaching its state through `project`
    ///
    /// Inherited bodies run against the projected base part. Methods declared
    /// later with the same shape override the inherited ones.
    pub fn inherit<B>(mut self, base: &Arc<TypeInfo>, project: fn(&T) -> &B) -> Self
    where
        B: Any + Send + Sync,
    {
        for method in base.methods().iter().filter(|m| !m.from_root) {
            let mut inherited = (**method).clone();
            inherited.body = method.body.clone().map(|inner| {
                body_for::<T, _>(move |this, args| inner(project(this) as &Target, args))
            });
            self.methods.push(inherited);
        }
        self.base = Some(base.clone());
        self
    }

    /// Add a public constructor
    pub fn constructor<F>(self, params: Vec<ParameterInfo>, make: F) -> Self
    where
        F: Fn(&[Value]) -> CallResult<T> + Send + Sync + 'static,
    {
        self.push_constructor(params, true, make)
    }

    /// Add a private constructor
    pub fn private_constructor<F>(self, params: Vec<ParameterInfo>, make: F) -> Self
    where
        F: Fn(&[Value]) -> CallResult<T> + Send + Sync + 'static,
    {
        self.push_constructor(params, false, make)
    }

    /// Add a public parameterless constructor using `Default`
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Vec::new(), |_| Ok(T::default()))
    }

    fn push_constructor<F>(mut self, params: Vec<ParameterInfo>, is_public: bool, make: F) -> Self
    where
        F: Fn(&[Value]) -> CallResult<T> + Send + Sync + 'static,
    {
        let body: ConstructorBody =
            Arc::new(move |args: &[Value]| Ok(Box::new(make(args)?) as Instance));
        self.constructors.push(ConstructorInfo {
            params,
            is_public,
            body,
        });
        self
    }

    /// Add a method with a body
    pub fn method<F>(mut self, method: MethodBuilder, body: F) -> Self
    where
        F: Fn(&T, &mut [Value]) -> CallResult<Returned> + Send + Sync + 'static,
    {
        let info = method.into_info(self.key, &self.name, Some(body_for::<T, _>(body)));
        self.push_method(info);
        self
    }

    /// Declare a method without a body (interface members)
    pub fn declare(mut self, method: MethodBuilder) -> Self {
        let info = method.into_info(self.key, &self.name, None);
        self.push_method(info);
        self
    }

    /// Add a property
    pub fn property(mut self, property: PropertyBuilder<T>) -> Self {
        for info in property.into_accessors(self.key, &self.name) {
            self.push_method(info);
        }
        self
    }

    /// Add a read-only property backed by a getter
    pub fn property_get<F>(self, name: &str, ty: TypeRef, get: F) -> Self
    where
        F: Fn(&T) -> CallResult<Value> + Send + Sync + 'static,
    {
        self.property(PropertyBuilder::new(name, ty).getter(get))
    }

    fn overrides(&self, method: &MethodInfo) -> bool {
        let shape = method.signature.shape_key();
        self.methods
            .iter()
            .any(|m| m.signature.shape_key() == shape)
    }

    fn push_method(&mut self, info: MethodInfo) {
        let shape = info.signature.shape_key();
        match self
            .methods
            .iter_mut()
            .find(|m| m.signature.shape_key() == shape)
        {
            Some(slot) => *slot = info,
            None => self.methods.push(info),
        }
    }

    /// Freeze into a type description
    pub fn build(self) -> Arc<TypeInfo> {
        let TypeBuilder {
            key,
            name,
            kind,
            modifiers,
            enclosing,
            base,
            interfaces,
            generic_params,
            constructors,
            mut methods,
            markers,
            ..
        } = self;

        for method in methods.iter_mut().filter(|m| m.declaring() == key) {
            method.declaring_markers = markers.clone();
        }

        let mut methods: Vec<Arc<MethodInfo>> = methods.into_iter().map(Arc::new).collect();
        let base = match kind {
            TypeKind::Class => {
                methods.extend(root_methods(&name));
                Some(base.unwrap_or_else(|| object_type().clone()))
            }
            TypeKind::Interface => None,
        };

        Arc::new(TypeInfo {
            key,
            name,
            kind,
            modifiers,
            enclosing,
            base,
            interfaces,
            generic_params,
            generic_definition: None,
            generic_args: Vec::new(),
            methods,
            constructors,
            markers,
            instantiations: Mutex::new(FxHashMap::default()),
        })
    }
}
