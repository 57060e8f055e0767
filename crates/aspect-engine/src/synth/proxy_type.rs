//! Proxy type synthesis
//!
//! A [`ProxyType`] is the synthesized stand-in for a (service, implementation)
//! pair. Each forwarding member carries a call path composed once here; at
//! call time it only marshals arguments, builds the call packet, resolves an
//! interceptor and rewraps the result.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::ProxyConfig;
use crate::error::{CallError, CallResult, ProxyError, ShapeRule};
use crate::interceptor::InterceptorRegistry;
use crate::reflect::{
    ConstructorInfo, GenericBindings, MethodInfo, MethodSignature, Target, TypeInfo, TypeRef,
};
use crate::value::{Returned, Value};

use super::packet::{
    arguments_match, check_arguments, complete_arguments, write_back, CallPacket,
    PacketSynthesizer, PacketType,
};

/// Base shape of a proxy type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Implements the service interface and holds the implementation
    Composition,
    /// Stands in for a subclass of the implementation
    Inheritance,
}

type Forward =
    Arc<dyn Fn(&Target, &mut [Value], &[TypeRef]) -> CallResult<Returned> + Send + Sync>;

/// One member of a proxy type
pub struct ForwardingMember {
    signature: MethodSignature,
    method: Arc<MethodInfo>,
    packet: Option<Arc<PacketType>>,
    forward: Forward,
}

impl ForwardingMember {
    /// Member name
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Signature callers see
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Implementation method the member forwards to
    pub fn method(&self) -> &Arc<MethodInfo> {
        &self.method
    }

    /// Check if calls go through an interceptor
    pub fn is_intercepted(&self) -> bool {
        self.packet.is_some()
    }

    /// Call packet type, for intercepted members
    pub fn packet_type(&self) -> Option<&Arc<PacketType>> {
        self.packet.as_ref()
    }

    fn accepts(&self, type_args: &[TypeRef], args: &[Value]) -> bool {
        self.signature.generics.len() == type_args.len()
            && arguments_match(&self.signature.params, args)
    }
}

impl fmt::Debug for ForwardingMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingMember")
            .field("signature", &self.signature.to_string())
            .field("intercepted", &self.is_intercepted())
            .finish()
    }
}

/// Synthesized proxy type
pub struct ProxyType {
    name: String,
    mode: ProxyMode,
    service: Arc<TypeInfo>,
    contract: Arc<TypeInfo>,
    implementation: Arc<TypeInfo>,
    members: Vec<ForwardingMember>,
    overloads: FxHashMap<Arc<str>, Vec<usize>>,
    constructors: Vec<ConstructorInfo>,
    interceptor_type: Option<&'static str>,
}

impl ProxyType {
    /// Generated name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base shape
    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    /// Service type as requested
    pub fn service(&self) -> &Arc<TypeInfo> {
        &self.service
    }

    /// Implementation type whose instances the proxy wraps
    pub fn implementation(&self) -> &Arc<TypeInfo> {
        &self.implementation
    }

    /// Forwarding members in declaration order
    pub fn members(&self) -> &[ForwardingMember] {
        &self.members
    }

    /// Overloads sharing a name
    pub fn members_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a ForwardingMember> {
        self.overloads
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.members[i])
    }

    /// Constructors mirrored from the implementation
    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    /// Type name of the global interceptor registered when this type was synthesized
    pub fn interceptor_type(&self) -> Option<&'static str> {
        self.interceptor_type
    }

    /// Check if generic parameters remain unbound
    ///
    /// Open proxy types describe a structural contract and cannot construct
    /// instances until closed.
    pub fn is_open(&self) -> bool {
        self.contract.is_open() || self.implementation.is_open()
    }

    /// Check if instances can stand in for `ty`
    pub fn is_assignable_to(&self, ty: &TypeInfo) -> bool {
        ty.is_assignable_from(&self.implementation) || ty.is_assignable_from(&self.contract)
    }

    /// Generic arguments the service contract takes from the implementation's
    /// parameters, with `bindings` applied
    pub(crate) fn contract_arguments(&self, bindings: &GenericBindings) -> Vec<TypeRef> {
        self.contract
            .generic_args()
            .iter()
            .map(|arg| bindings.apply(arg))
            .collect()
    }

    /// Dispatch a call to the member `name` accepting `args`
    pub(crate) fn dispatch(
        &self,
        target: &Target,
        name: &str,
        type_args: &[TypeRef],
        args: &mut [Value],
    ) -> CallResult<Returned> {
        let mut candidates = self.members_named(name).peekable();
        let first = candidates.peek().copied();

        match candidates.find(|m| m.accepts(type_args, args)) {
            Some(member) => (member.forward)(target, args, type_args),
            None => match (first, self.overloads.get(name).map(Vec::len)) {
                // a lone overload reports the precise mismatch
                (Some(only), Some(1)) => (only.forward)(target, args, type_args),
                _ => Err(CallError::MissingMember {
                    member: name.to_string(),
                    type_name: self.name.clone(),
                }),
            },
        }
    }
}

impl fmt::Debug for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyType")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("implementation", &self.implementation.name())
            .field("members", &self.members)
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

/// Builds proxy types for validated pairs
pub struct ProxySynthesizer {
    registry: Arc<InterceptorRegistry>,
    packets: Arc<PacketSynthesizer>,
    namespace: String,
    check_results: bool,
}

impl ProxySynthesizer {
    /// Create a synthesizer resolving through `registry`
    pub fn new(
        registry: Arc<InterceptorRegistry>,
        packets: Arc<PacketSynthesizer>,
        config: &ProxyConfig,
    ) -> Self {
        Self {
            registry,
            packets,
            namespace: config.namespace.clone(),
            check_results: config.check_result_types,
        }
    }

    /// Synthesize the proxy type for an already validated pair
    pub fn synthesize(
        &self,
        service: &Arc<TypeInfo>,
        implementation: &Arc<TypeInfo>,
    ) -> Result<Arc<ProxyType>, ProxyError> {
        let (mode, contract) = if service.is_interface() {
            (ProxyMode::Composition, effective_contract(service, implementation)?)
        } else {
            (ProxyMode::Inheritance, implementation.clone())
        };

        let mut members = Vec::new();
        match mode {
            ProxyMode::Composition => {
                for declared in contract.methods() {
                    let shape = declared.signature().shape_key();
                    let method = implementation
                        .find_method(&shape)
                        .filter(|m| m.is_public())
                        .ok_or_else(|| {
                            ProxyError::shape(
                                implementation.name(),
                                ShapeRule::MissingMember {
                                    member: declared.signature().to_string(),
                                },
                            )
                        })?;
                    let intercept = !method.is_ignored();
                    members.push(self.forward(service, declared.signature(), method, intercept)?);
                }
                for method in implementation.methods().iter().filter(|m| m.is_from_root()) {
                    members.push(self.forward(service, method.signature(), method, false)?);
                }
            }
            ProxyMode::Inheritance => {
                for method in implementation.methods().iter().filter(|m| m.is_public()) {
                    let intercept =
                        method.is_virtual() && !method.is_from_root() && !method.is_ignored();
                    members.push(self.forward(service, method.signature(), method, intercept)?);
                }
            }
        }

        let mut overloads: FxHashMap<Arc<str>, Vec<usize>> = FxHashMap::default();
        for (index, member) in members.iter().enumerate() {
            overloads
                .entry(member.signature.name.clone())
                .or_default()
                .push(index);
        }

        let proxy = ProxyType {
            name: format!("{}.{}Proxy", self.namespace, service.name()),
            mode,
            service: service.clone(),
            contract,
            implementation: implementation.clone(),
            members,
            overloads,
            constructors: implementation.public_constructors().cloned().collect(),
            interceptor_type: self.registry.global().map(|g| g.type_name()),
        };

        tracing::debug!(
            proxy = %proxy.name,
            mode = ?proxy.mode,
            members = proxy.members.len(),
            intercepted = proxy.members.iter().filter(|m| m.is_intercepted()).count(),
            "synthesized proxy type"
        );
        Ok(Arc::new(proxy))
    }

    fn forward(
        &self,
        service: &Arc<TypeInfo>,
        visible: &MethodSignature,
        method: &Arc<MethodInfo>,
        intercept: bool,
    ) -> Result<ForwardingMember, ProxyError> {
        let (packet, forward) = if intercept {
            let packet = self.packets.synthesize(method)?;
            let forward = self.intercepted(service, visible, packet.clone());
            (Some(packet), forward)
        } else {
            (None, direct(method.clone(), visible.clone()))
        };

        Ok(ForwardingMember {
            signature: visible.clone(),
            method: method.clone(),
            packet,
            forward,
        })
    }

    fn intercepted(
        &self,
        service: &Arc<TypeInfo>,
        visible: &MethodSignature,
        packet: Arc<PacketType>,
    ) -> Forward {
        let registry = self.registry.clone();
        let packets = self.packets.clone();
        let service = service.clone();
        let visible = visible.clone();
        let check_results = self.check_results;

        Arc::new(move |target: &Target, args: &mut [Value], types: &[TypeRef]| -> CallResult<_> {
            let closed;
            let packet: &PacketType = if packet.is_generic() {
                closed = packets.close(&packet, types)?;
                &closed
            } else if !types.is_empty() {
                let name: &str = &visible.name;
                return Err(ProxyError::synthesis(name, "method is not generic").into());
            } else {
                &packet
            };

            let method = packet.method();
            let signature = method.signature();
            let slots = complete_arguments(method.name(), &visible.params, args)?;
            check_arguments(method.name(), &signature.params, &slots)?;

            let resolution = registry.resolve(method)?;
            let mut call = CallPacket::new(packet, &service, target, slots, types)?;
            resolution.interceptor.invoke(&mut call)?;

            let (returned, slots) = call.finish(check_results)?;
            write_back(&signature.params, &slots, args);
            Ok(returned)
        })
    }
}

/// Forward straight to the implementation, without a call packet
fn direct(method: Arc<MethodInfo>, visible: MethodSignature) -> Forward {
    Arc::new(move |target: &Target, args: &mut [Value], _: &[TypeRef]| -> CallResult<_> {
        let mut slots = complete_arguments(method.name(), &visible.params, args)?;
        check_arguments(method.name(), &method.signature().params, &slots)?;
        let returned = method.invoke_direct(target, &mut slots)?;
        write_back(&visible.params, &slots, args);
        Ok(returned)
    })
}

/// The interface whose members the proxy exposes
///
/// For an open generic service this is the instantiation the implementation
/// actually implements, so member shapes line up with the implementation's.
fn effective_contract(
    service: &Arc<TypeInfo>,
    implementation: &TypeInfo,
) -> Result<Arc<TypeInfo>, ProxyError> {
    if !service.is_generic_definition() {
        return Ok(service.clone());
    }
    implementation
        .all_interfaces()
        .into_iter()
        .find(|iface| iface.definition_key() == service.key())
        .ok_or_else(|| {
            ProxyError::shape(
                implementation.name(),
                ShapeRule::NotAssignable {
                    service: service.name().to_string(),
                },
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::{CallContext, PassThrough};
    use crate::reflect::{GenericParam, MethodBuilder, TypeBuilder};
    use crate::synth::cache::SynthesisLock;
    use crate::value::arg;

    #[derive(Default)]
    struct Greeter;

    fn synthesizer(registry: Arc<InterceptorRegistry>) -> ProxySynthesizer {
        let packets = Arc::new(PacketSynthesizer::new(Arc::new(SynthesisLock::new())));
        ProxySynthesizer::new(registry, packets, &ProxyConfig::default())
    }

    fn contract() -> Arc<TypeInfo> {
        TypeBuilder::interface("Greeter")
            .declare(MethodBuilder::new("greet").param::<String>("name").returns::<String>())
            .declare(
                MethodBuilder::new("greet")
                    .param::<String>("name")
                    .param::<u32>("times")
                    .returns::<String>(),
            )
            .build()
    }

    fn greeter(contract: &Arc<TypeInfo>) -> Arc<TypeInfo> {
        TypeBuilder::<Greeter>::class("EnglishGreeter")
            .implements(contract)
            .default_constructor()
            .method(
                MethodBuilder::new("greet").param::<String>("name").returns::<String>(),
                |_, args| Ok(Returned::value(format!("hello {}", arg::<String>(args, 0)?))),
            )
            .method(
                MethodBuilder::new("greet")
                    .param::<String>("name")
                    .param::<u32>("times")
                    .returns::<String>(),
                |_, args| {
                    let name: String = arg(args, 0)?;
                    let times: u32 = arg(args, 1)?;
                    Ok(Returned::value(vec![name; times as usize].join(" ")))
                },
            )
            .method(MethodBuilder::new("extra"), |_, _| Ok(Returned::Unit))
            .build()
    }

    fn registry() -> Arc<InterceptorRegistry> {
        let registry = Arc::new(InterceptorRegistry::new());
        registry.register_global(Arc::new(PassThrough)).unwrap();
        registry
    }

    #[test]
    fn test_composition_exposes_contract_members() {
        let c = contract();
        let proxy = synthesizer(registry()).synthesize(&c, &greeter(&c)).unwrap();

        assert_eq!(proxy.mode(), ProxyMode::Composition);
        assert_eq!(proxy.name(), "aspect.Proxy.GreeterProxy");
        assert_eq!(proxy.members_named("greet").count(), 2);
        assert_eq!(proxy.members_named("extra").count(), 0);
        assert!(proxy
            .members_named("to_string")
            .all(|m| !m.is_intercepted()));
        assert!(proxy.interceptor_type().unwrap().ends_with("PassThrough"));
        assert!(proxy.is_assignable_to(&c));
    }

    #[test]
    fn test_overloads_dispatch_by_arguments() {
        let c = contract();
        let proxy = synthesizer(registry()).synthesize(&c, &greeter(&c)).unwrap();
        let target = Greeter;

        let mut one = vec![Value::new(String::from("ann"))];
        let out = proxy.dispatch(&target, "greet", &[], &mut one).unwrap();
        assert_eq!(out.into_value().unwrap().get::<String>().unwrap(), "hello ann");

        let mut two = vec![Value::new(String::from("bo")), Value::new(2u32)];
        let out = proxy.dispatch(&target, "greet", &[], &mut two).unwrap();
        assert_eq!(out.into_value().unwrap().get::<String>().unwrap(), "bo bo");

        let mut wrong = vec![Value::new(1u8)];
        assert!(matches!(
            proxy.dispatch(&target, "greet", &[], &mut wrong),
            Err(CallError::MissingMember { .. })
        ));
    }

    #[test]
    fn test_missing_interface_member() {
        let c = contract();
        let partial = TypeBuilder::<Greeter>::class("Partial")
            .implements(&c)
            .default_constructor()
            .build();
        let err = synthesizer(registry()).synthesize(&c, &partial).unwrap_err();
        assert!(matches!(
            err,
            ProxyError::UnsupportedShape {
                rule: ShapeRule::MissingMember { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_inheritance_skips_non_virtual_and_root_members() {
        let base = TypeBuilder::<Greeter>::class("Base")
            .default_constructor()
            .method(MethodBuilder::new("virtual_one"), |_, _| Ok(Returned::Unit))
            .method(MethodBuilder::new("fixed").non_virtual(), |_, _| Ok(Returned::Unit))
            .method(MethodBuilder::new("hidden").private(), |_, _| Ok(Returned::Unit))
            .build();
        let proxy = synthesizer(registry()).synthesize(&base, &base).unwrap();

        assert_eq!(proxy.mode(), ProxyMode::Inheritance);
        let intercepted: Vec<_> = proxy
            .members()
            .iter()
            .filter(|m| m.is_intercepted())
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(intercepted, vec!["virtual_one".to_string()]);
        assert_eq!(proxy.members_named("hidden").count(), 0);
        assert_eq!(proxy.constructors().len(), 1);
    }

    #[test]
    fn test_lone_overload_reports_precise_error() {
        let base = TypeBuilder::<Greeter>::class("Base")
            .default_constructor()
            .method(MethodBuilder::new("one").param::<u8>("x"), |_, _| Ok(Returned::Unit))
            .build();
        let proxy = synthesizer(registry()).synthesize(&base, &base).unwrap();
        assert!(matches!(
            proxy.dispatch(&Greeter, "one", &[], &mut []),
            Err(CallError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_interceptor_failure_propagates() {
        let registry = Arc::new(InterceptorRegistry::new());
        registry
            .register_global(Arc::new(|_: &mut dyn CallContext| -> CallResult<()> {
                Err(anyhow::anyhow!("denied").into())
            }))
            .unwrap();
        let c = contract();
        let proxy = synthesizer(registry).synthesize(&c, &greeter(&c)).unwrap();

        let mut args = vec![Value::new(String::from("x"))];
        let err = proxy.dispatch(&Greeter, "greet", &[], &mut args).unwrap_err();
        assert_eq!(err.to_string(), "denied");
    }

    #[test]
    fn test_open_generic_contract() {
        let repo = TypeBuilder::interface("Repository")
            .generic_param(GenericParam::new("T"))
            .declare(MethodBuilder::new("find").returns_ty(TypeRef::param("T")))
            .build();
        let open = repo.instantiate(&[TypeRef::param("U")]).unwrap();
        let store = TypeBuilder::<Greeter>::class("Store")
            .generic_param(GenericParam::new("U"))
            .implements(&open)
            .default_constructor()
            .method(
                MethodBuilder::new("find").returns_ty(TypeRef::param("U")),
                |_, _| Ok(Returned::Value(Value::null())),
            )
            .build();

        let proxy = synthesizer(registry()).synthesize(&repo, &store).unwrap();
        assert!(proxy.is_open());
        assert_eq!(proxy.name(), "aspect.Proxy.RepositoryProxy");

        let bindings =
            GenericBindings::bind(store.generic_params(), &[TypeRef::of::<u8>()]).unwrap();
        assert_eq!(proxy.contract_arguments(&bindings), vec![TypeRef::of::<u8>()]);
    }
}
