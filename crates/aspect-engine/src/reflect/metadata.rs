//! Type and member metadata
//!
//! This is the reflection surface the engine consumes: identities, kinds,
//! modifiers, constructors, methods (own plus inherited) and markers. Type
//! descriptions are immutable once built; the only interior state is the
//! memo of generic instantiations, which keeps instantiation identity-stable.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::generic::{GenericBindings, GenericParam};
use super::markers::Markers;
use super::signature::{MethodSignature, ParameterInfo, ShapeKey};
use super::types::TypeRef;
use crate::error::{CallError, CallResult, ProxyError};
use crate::value::{Returned, Value};

static NEXT_TYPE_KEY: AtomicU64 = AtomicU64::new(1);
static NEXT_METHOD_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique type identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u64);

impl TypeKey {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        TypeKey(NEXT_TYPE_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Process-unique method identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey(u64);

impl MethodKey {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        MethodKey(NEXT_METHOD_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// An instance a method body runs against
pub type Target = dyn Any + Send + Sync;

/// An owned instance produced by a constructor
pub type Instance = Box<Target>;

/// Executable body of a method
pub type MethodBody = Arc<dyn Fn(&Target, &mut [Value]) -> CallResult<Returned> + Send + Sync>;

/// Executable body of a constructor
pub type ConstructorBody = Arc<dyn Fn(&[Value]) -> CallResult<Instance> + Send + Sync>;

/// Type kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Contract without state or constructors
    Interface,
    /// Concrete or abstract class
    Class,
}

/// Modifier flags for types
#[derive(Debug, Clone, Copy)]
pub struct Modifiers {
    /// Public visibility
    pub is_public: bool,
    /// Cannot be subclassed
    pub is_sealed: bool,
    /// Cannot be instantiated
    pub is_abstract: bool,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            is_public: true,
            is_sealed: false,
            is_abstract: false,
        }
    }
}

/// Method information for reflection
#[derive(Clone)]
pub struct MethodInfo {
    pub(crate) key: MethodKey,
    pub(crate) signature: MethodSignature,
    pub(crate) declaring_name: Arc<str>,
    pub(crate) definition: Option<MethodKey>,
    pub(crate) declaring_definition: Option<TypeKey>,
    pub(crate) declaring_markers: Markers,
    pub(crate) is_public: bool,
    pub(crate) is_virtual: bool,
    pub(crate) from_root: bool,
    pub(crate) property: Option<Arc<str>>,
    pub(crate) markers: Markers,
    pub(crate) body: Option<MethodBody>,
}

impl MethodInfo {
    /// Method identity
    pub fn key(&self) -> MethodKey {
        self.key
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Full signature
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Declaring type identity
    pub fn declaring(&self) -> TypeKey {
        self.signature.declaring
    }

    /// Identity of this method on the generic definition it was instantiated from
    ///
    /// Same as [`key`](Self::key) outside generic instantiations.
    pub fn definition_key(&self) -> MethodKey {
        self.definition.unwrap_or(self.key)
    }

    /// Generic definition of the declaring type, or the declaring type itself
    pub fn declaring_definition(&self) -> TypeKey {
        self.declaring_definition.unwrap_or(self.signature.declaring)
    }

    /// Declaring type name
    pub fn declaring_name(&self) -> &str {
        &self.declaring_name
    }

    /// Markers of the declaring type
    pub fn declaring_markers(&self) -> &Markers {
        &self.declaring_markers
    }

    /// Markers of the method itself
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Public visibility
    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Can be overridden
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Inherited from the universal root object type
    pub fn is_from_root(&self) -> bool {
        self.from_root
    }

    /// Property this method is an accessor of
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// Opted out of proxying on itself or its declaring type
    pub fn is_ignored(&self) -> bool {
        self.markers.ignore_proxy || self.declaring_markers.ignore_proxy
    }

    /// Check if the method has an executable body
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Run the body directly against `target`
    pub fn invoke_direct(&self, target: &Target, args: &mut [Value]) -> CallResult<Returned> {
        match &self.body {
            Some(body) => body(target, args),
            None => Err(CallError::MissingMember {
                member: self.name().to_string(),
                type_name: self.declaring_name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_name, self.signature)
    }
}

/// Constructor information for reflection
#[derive(Clone)]
pub struct ConstructorInfo {
    pub(crate) params: Vec<ParameterInfo>,
    pub(crate) is_public: bool,
    pub(crate) body: ConstructorBody,
}

impl ConstructorInfo {
    /// Parameters in order
    pub fn params(&self) -> &[ParameterInfo] {
        &self.params
    }

    /// Public visibility
    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Number of leading parameters without defaults
    pub fn required_count(&self) -> usize {
        self.params
            .iter()
            .rposition(|p| !p.has_default())
            .map_or(0, |i| i + 1)
    }

    /// Run the constructor
    pub fn construct(&self, args: &[Value]) -> CallResult<Instance> {
        (self.body)(args)
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("params", &self.params.len())
            .field("is_public", &self.is_public)
            .finish()
    }
}

/// Runtime type information
pub struct TypeInfo {
    pub(crate) key: TypeKey,
    pub(crate) name: Arc<str>,
    pub(crate) kind: TypeKind,
    pub(crate) modifiers: Modifiers,
    pub(crate) enclosing: Option<Arc<TypeInfo>>,
    pub(crate) base: Option<Arc<TypeInfo>>,
    pub(crate) interfaces: Vec<Arc<TypeInfo>>,
    pub(crate) generic_params: Vec<GenericParam>,
    pub(crate) generic_definition: Option<Arc<TypeInfo>>,
    pub(crate) generic_args: Vec<TypeRef>,
    pub(crate) methods: Vec<Arc<MethodInfo>>,
    pub(crate) constructors: Vec<ConstructorInfo>,
    pub(crate) markers: Markers,
    pub(crate) instantiations: Mutex<FxHashMap<Vec<TypeRef>, Arc<TypeInfo>>>,
}

impl TypeInfo {
    /// Type identity
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interface or class
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Check for an interface
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Modifier flags
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Cannot be subclassed
    pub fn is_sealed(&self) -> bool {
        self.modifiers.is_sealed
    }

    /// Cannot be instantiated (interfaces count as abstract)
    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract || self.is_interface()
    }

    /// Public, and nested only inside public types
    pub fn is_publicly_visible(&self) -> bool {
        self.modifiers.is_public
            && self
                .enclosing
                .as_ref()
                .map_or(true, |outer| outer.is_publicly_visible())
    }

    /// Enclosing type for nested types
    pub fn enclosing(&self) -> Option<&Arc<TypeInfo>> {
        self.enclosing.as_ref()
    }

    /// Base class
    pub fn base(&self) -> Option<&Arc<TypeInfo>> {
        self.base.as_ref()
    }

    /// Directly declared interfaces (extended interfaces for an interface)
    pub fn interfaces(&self) -> &[Arc<TypeInfo>] {
        &self.interfaces
    }

    /// Every interface this type implements, transitively
    pub fn all_interfaces(&self) -> Vec<Arc<TypeInfo>> {
        let mut out: Vec<Arc<TypeInfo>> = Vec::new();
        fn collect(ty: &TypeInfo, out: &mut Vec<Arc<TypeInfo>>) {
            for iface in &ty.interfaces {
                if !out.iter().any(|seen| seen.key == iface.key) {
                    out.push(iface.clone());
                    collect(iface, out);
                }
            }
            if let Some(base) = &ty.base {
                collect(base, out);
            }
        }
        collect(self, &mut out);
        out
    }

    /// Markers on the type
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Generic parameters of a generic definition
    pub fn generic_params(&self) -> &[GenericParam] {
        &self.generic_params
    }

    /// Generic arguments of an instantiation
    pub fn generic_args(&self) -> &[TypeRef] {
        &self.generic_args
    }

    /// Generic definition this type was instantiated from
    pub fn generic_definition(&self) -> Option<&Arc<TypeInfo>> {
        self.generic_definition.as_ref()
    }

    /// Identity of the generic definition, or of the type itself
    pub fn definition_key(&self) -> TypeKey {
        self.generic_definition
            .as_ref()
            .map_or(self.key, |def| def.key)
    }

    /// Check for an uninstantiated generic definition
    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty() && self.generic_definition.is_none()
    }

    /// Check if any generic parameter remains unbound
    pub fn is_open(&self) -> bool {
        self.is_generic_definition() || self.generic_args.iter().any(TypeRef::is_open)
    }

    /// Every visible method, own and inherited
    pub fn methods(&self) -> &[Arc<MethodInfo>] {
        &self.methods
    }

    /// Methods with a given name
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Arc<MethodInfo>> {
        self.methods.iter().filter(move |m| m.name() == name)
    }

    /// Method matching a normalized shape
    pub fn find_method(&self, shape: &ShapeKey) -> Option<&Arc<MethodInfo>> {
        self.methods
            .iter()
            .find(|m| m.signature.shape_key() == *shape)
    }

    /// All constructors
    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    /// Public constructors
    pub fn public_constructors(&self) -> impl Iterator<Item = &ConstructorInfo> {
        self.constructors.iter().filter(|c| c.is_public)
    }

    /// Check if `other` is this type, derives from it, or implements it
    pub fn is_assignable_from(&self, other: &TypeInfo) -> bool {
        if self.key == other.key {
            return true;
        }

        let mut base = other.base.as_ref();
        while let Some(b) = base {
            if b.key == self.key {
                return true;
            }
            base = b.base.as_ref();
        }

        other.all_interfaces().iter().any(|i| i.key == self.key)
    }

    /// Check if an open implementation structurally satisfies this open interface
    ///
    /// Holds when both are generic and the implementation implements some
    /// instantiation of this interface's definition.
    pub fn is_structurally_satisfied_by(&self, implementation: &TypeInfo) -> bool {
        self.is_interface()
            && self.is_generic_definition()
            && implementation.is_open()
            && implementation
                .all_interfaces()
                .iter()
                .any(|i| i.definition_key() == self.key)
    }

    /// Instantiate a generic definition with `args`
    ///
    /// Arguments may still mention outer generic parameters; such
    /// instantiations stay open. Instantiating twice with the same arguments
    /// yields the same type.
    pub fn instantiate(self: &Arc<Self>, args: &[TypeRef]) -> Result<Arc<TypeInfo>, ProxyError> {
        if !self.is_generic_definition() {
            return Err(ProxyError::synthesis(
                self.name(),
                "type is not a generic definition",
            ));
        }

        let mut memo = self.instantiations.lock();
        if let Some(existing) = memo.get(args) {
            return Ok(existing.clone());
        }

        let bindings = GenericBindings::bind_partial(&self.generic_params, args)
            .map_err(|reason| ProxyError::synthesis(self.name(), reason))?;
        let instance = Arc::new(self.instantiate_with(&bindings, args)?);
        memo.insert(args.to_vec(), instance.clone());
        Ok(instance)
    }

    fn instantiate_with(
        self: &Arc<Self>,
        bindings: &GenericBindings,
        args: &[TypeRef],
    ) -> Result<TypeInfo, ProxyError> {
        let key = TypeKey::next();
        let name: Arc<str> = Arc::from(display_instantiation(&self.name, args).as_str());

        let mut interfaces = Vec::with_capacity(self.interfaces.len());
        for iface in &self.interfaces {
            interfaces.push(substitute_type(iface, bindings)?);
        }
        let base = self
            .base
            .as_ref()
            .map(|b| substitute_type(b, bindings))
            .transpose()?;

        // inherited members follow their declaring type into the substituted base chain
        let mut declaring: FxHashMap<TypeKey, (TypeKey, Arc<str>)> = FxHashMap::default();
        declaring.insert(self.key, (key, name.clone()));
        let mut old_chain = self.base.as_ref();
        let mut new_chain = base.as_ref();
        while let (Some(old), Some(new)) = (old_chain, new_chain) {
            declaring.insert(old.key, (new.key, new.name.clone()));
            old_chain = old.base.as_ref();
            new_chain = new.base.as_ref();
        }

        let methods = self
            .methods
            .iter()
            .map(|m| {
                if m.from_root {
                    return m.clone();
                }
                let mut signature = m.signature.substitute(bindings);
                let mut declaring_name = m.declaring_name.clone();
                if let Some((new_key, new_name)) = declaring.get(&m.declaring()) {
                    signature.declaring = *new_key;
                    declaring_name = new_name.clone();
                }
                Arc::new(MethodInfo {
                    key: MethodKey::next(),
                    signature,
                    declaring_name,
                    definition: Some(m.definition_key()),
                    declaring_definition: Some(m.declaring_definition()),
                    ..(**m).clone()
                })
            })
            .collect();

        let constructors = self
            .constructors
            .iter()
            .map(|c| ConstructorInfo {
                params: c
                    .params
                    .iter()
                    .map(|p| ParameterInfo {
                        ty: bindings.apply(&p.ty),
                        ..p.clone()
                    })
                    .collect(),
                ..c.clone()
            })
            .collect();

        Ok(TypeInfo {
            key,
            name,
            kind: self.kind,
            modifiers: self.modifiers,
            enclosing: self.enclosing.clone(),
            base,
            interfaces,
            generic_params: Vec::new(),
            generic_definition: Some(self.clone()),
            generic_args: args.to_vec(),
            methods,
            constructors,
            markers: self.markers.clone(),
            instantiations: Mutex::new(FxHashMap::default()),
        })
    }
}

/// Re-instantiate an interface whose arguments mention outer parameters
fn substitute_type(
    ty: &Arc<TypeInfo>,
    bindings: &GenericBindings,
) -> Result<Arc<TypeInfo>, ProxyError> {
    match &ty.generic_definition {
        Some(def) if ty.generic_args.iter().any(TypeRef::is_open) => {
            let args: Vec<TypeRef> = ty.generic_args.iter().map(|a| bindings.apply(a)).collect();
            def.instantiate(&args)
        }
        _ => Ok(ty.clone()),
    }
}

fn display_instantiation(name: &str, args: &[TypeRef]) -> String {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    format!("{}<{}>", name, args.join(", "))
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("methods", &self.methods.len())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

// ============================================================================
// Universal root object type
// ============================================================================

struct RootObject {
    ty: Arc<TypeInfo>,
    to_string: MethodKey,
    hash_code: MethodKey,
}

static ROOT: Lazy<RootObject> = Lazy::new(|| {
    let key = TypeKey::next();
    let to_string = MethodKey::next();
    let hash_code = MethodKey::next();
    let name: Arc<str> = Arc::from("object");
    let methods = root_methods_with(key, to_string, hash_code, name.clone());
    RootObject {
        ty: Arc::new(TypeInfo {
            key,
            name,
            kind: TypeKind::Class,
            modifiers: Modifiers::default(),
            enclosing: None,
            base: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            generic_definition: None,
            generic_args: Vec::new(),
            methods,
            constructors: vec![ConstructorInfo {
                params: Vec::new(),
                is_public: true,
                body: Arc::new(|_: &[Value]| Ok(Box::new(()) as Instance)),
            }],
            markers: Markers::none(),
            instantiations: Mutex::new(FxHashMap::default()),
        }),
        to_string,
        hash_code,
    }
});

/// The universal root object type every class derives from
pub fn object_type() -> &'static Arc<TypeInfo> {
    &ROOT.ty
}

/// Root object members as seen from a class named `owner`
pub(crate) fn root_methods(owner: &Arc<str>) -> Vec<Arc<MethodInfo>> {
    root_methods_with(ROOT.ty.key, ROOT.to_string, ROOT.hash_code, owner.clone())
}

fn root_methods_with(
    root: TypeKey,
    to_string: MethodKey,
    hash_code: MethodKey,
    owner: Arc<str>,
) -> Vec<Arc<MethodInfo>> {
    let root_name: Arc<str> = Arc::from("object");
    let method = |key: MethodKey, name: &str, return_type: TypeRef, body: MethodBody| {
        Arc::new(MethodInfo {
            key,
            signature: MethodSignature {
                declaring: root,
                name: Arc::from(name),
                params: Vec::new(),
                return_type,
                generics: Vec::new(),
            },
            declaring_name: root_name.clone(),
            definition: None,
            declaring_definition: None,
            declaring_markers: Markers::none(),
            is_public: true,
            is_virtual: true,
            from_root: true,
            property: None,
            markers: Markers::none(),
            body: Some(body),
        })
    };

    vec![
        method(
            to_string,
            "to_string",
            TypeRef::of::<String>(),
            Arc::new(move |_: &Target, _: &mut [Value]| {
                Ok(Returned::value(owner.to_string()))
            }),
        ),
        method(
            hash_code,
            "hash_code",
            TypeRef::of::<u64>(),
            Arc::new(|target: &Target, _: &mut [Value]| {
                let addr = target as *const Target as *const () as usize;
                Ok(Returned::value(addr as u64))
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{GenericParam, MethodBuilder, TypeBuilder};

    #[test]
    fn test_keys_are_unique() {
        assert_ne!(TypeKey::next(), TypeKey::next());
        assert_ne!(MethodKey::next(), MethodKey::next());
    }

    #[test]
    fn test_root_object_methods() {
        let root = object_type();
        assert_eq!(root.name(), "object");
        assert!(root.methods().iter().all(|m| m.is_from_root()));
        assert_eq!(root.methods().len(), 2);
    }

    #[test]
    fn test_nested_visibility() {
        let outer = TypeBuilder::<()>::class("Outer").private().build();
        let inner = TypeBuilder::<()>::class("Inner").nested_in(&outer).build();
        assert!(!inner.is_publicly_visible());

        let public_outer = TypeBuilder::<()>::class("Outer").build();
        let inner = TypeBuilder::<()>::class("Inner").nested_in(&public_outer).build();
        assert!(inner.is_publicly_visible());
    }

    #[test]
    fn test_assignability_through_base_and_interfaces() {
        let contract = TypeBuilder::interface("Contract").build();
        let extended = TypeBuilder::interface("Extended").extends(&contract).build();
        let base = TypeBuilder::<()>::class("Base").implements(&extended).build();
        let derived = TypeBuilder::<()>::class("Derived")
            .inherit(&base, |d: &()| d)
            .build();

        assert!(contract.is_assignable_from(&derived));
        assert!(extended.is_assignable_from(&derived));
        assert!(base.is_assignable_from(&derived));
        assert!(!derived.is_assignable_from(&base));
        assert!(object_type().is_assignable_from(&derived));
    }

    #[test]
    fn test_instantiate_is_memoized() {
        let repo = TypeBuilder::interface("Repository")
            .generic_param(GenericParam::new("T"))
            .declare(
                MethodBuilder::new("get")
                    .param::<u32>("id")
                    .returns_ty(TypeRef::param("T")),
            )
            .build();

        let a = repo.instantiate(&[TypeRef::of::<String>()]).unwrap();
        let b = repo.instantiate(&[TypeRef::of::<String>()]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), format!("Repository<{}>", std::any::type_name::<String>()));
        assert!(!a.is_open());
        assert_eq!(a.definition_key(), repo.key());

        let get = a.methods_named("get").next().unwrap();
        assert_eq!(get.signature().return_type, TypeRef::of::<String>());
        assert_eq!(get.declaring(), a.key());

        let c = repo.instantiate(&[TypeRef::of::<u8>()]).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_instantiation_substitutes_generic_base() {
        let base = TypeBuilder::<()>::class("Base")
            .generic_param(GenericParam::new("U"))
            .method(
                MethodBuilder::new("peek").returns_ty(TypeRef::param("U")),
                |_, _| Ok(Returned::Unit),
            )
            .build();
        let open_base = base.instantiate(&[TypeRef::param("U")]).unwrap();
        let derived = TypeBuilder::<()>::class("Derived")
            .generic_param(GenericParam::new("U"))
            .inherit(&open_base, |d: &()| d)
            .build();

        let closed_base = base.instantiate(&[TypeRef::of::<u8>()]).unwrap();
        let closed = derived.instantiate(&[TypeRef::of::<u8>()]).unwrap();
        assert!(Arc::ptr_eq(closed.base().unwrap(), &closed_base));
        assert!(closed_base.is_assignable_from(&closed));
        assert!(!open_base.is_assignable_from(&closed));

        let peek = closed.methods_named("peek").next().unwrap();
        assert_eq!(peek.signature().return_type, TypeRef::of::<u8>());
        assert_eq!(peek.declaring(), closed_base.key());
        assert_eq!(peek.declaring_name(), closed_base.name());
        assert_eq!(peek.declaring_definition(), base.key());
        let open_peek = base.methods_named("peek").next().unwrap();
        assert_eq!(peek.definition_key(), open_peek.key());
    }

    #[test]
    fn test_instantiate_requires_definition() {
        let plain = TypeBuilder::interface("Plain").build();
        assert!(matches!(
            plain.instantiate(&[TypeRef::of::<u8>()]),
            Err(ProxyError::SynthesisFailure { .. })
        ));
    }

    #[test]
    fn test_structural_satisfaction() {
        let repo = TypeBuilder::interface("Repository")
            .generic_param(GenericParam::new("T"))
            .build();
        let open_iface = repo.instantiate(&[TypeRef::param("T")]).unwrap();
        let store = TypeBuilder::<()>::class("Store")
            .generic_param(GenericParam::new("T"))
            .implements(&open_iface)
            .build();

        assert!(!repo.is_assignable_from(&store));
        assert!(repo.is_structurally_satisfied_by(&store));

        let closed = store.instantiate(&[TypeRef::of::<i32>()]).unwrap();
        let closed_iface = repo.instantiate(&[TypeRef::of::<i32>()]).unwrap();
        assert!(closed_iface.is_assignable_from(&closed));
    }
}
