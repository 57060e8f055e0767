//! Call packet types
//!
//! A [`PacketType`] is synthesized once per method shape and captures
//! everything a call needs that does not change between calls: the
//! classified return plan, the pass mode of every slot, and a composed
//! `execute` closure that runs the original method, waits on asynchronous
//! results and writes by-reference outputs back into the argument slots.
//!
//! A [`CallPacket`] is the per-call value built from a packet type. It is
//! what interceptors see through [`CallContext`].

use std::fmt;
use std::sync::Arc;

use crate::error::{CallError, CallResult, ProxyError};
use crate::interceptor::CallContext;
use crate::reflect::{
    GenericBindings, GenericParam, MethodInfo, MethodKey, MethodSignature, ParameterInfo,
    PassMode, Target, TypeInfo, TypeKey, TypeRef,
};
use crate::value::{AsyncKind, AsyncValue, Returned, Value, ValueCell};

use super::cache::{SynthesisLock, TypeCache};

/// How a member's outcome reaches the result slot and goes back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnPlan {
    /// No result
    Void,
    /// Plain value of the given type
    Direct(TypeRef),
    /// Reference to storage of the given type
    ByRef(TypeRef),
    /// Asynchronous container, waited on inside the packet
    Async {
        /// Container kind the caller gets back
        kind: AsyncKind,
        /// Wrapped value type, `None` for value-less containers
        value: Option<TypeRef>,
    },
}

impl ReturnPlan {
    /// Classify a declared return type
    pub fn classify(return_type: &TypeRef) -> Self {
        if let Some(shape) = return_type.async_shape() {
            return ReturnPlan::Async {
                kind: shape.kind,
                value: shape.value,
            };
        }
        match return_type.resolved() {
            TypeRef::Void => ReturnPlan::Void,
            TypeRef::Ref(inner) => ReturnPlan::ByRef((**inner).clone()),
            other => ReturnPlan::Direct(other.clone()),
        }
    }

    /// Type held by the result slot
    pub fn slot_type(&self) -> Option<&TypeRef> {
        match self {
            ReturnPlan::Void => None,
            ReturnPlan::Direct(ty) | ReturnPlan::ByRef(ty) => Some(ty),
            ReturnPlan::Async { value, .. } => value.as_ref(),
        }
    }

    fn expected_shape(&self) -> String {
        match self {
            ReturnPlan::Void => "nothing".to_string(),
            ReturnPlan::Direct(ty) => ty.to_string(),
            ReturnPlan::ByRef(ty) => format!("&{}", ty),
            ReturnPlan::Async { kind, value: None } => kind.as_str().to_string(),
            ReturnPlan::Async {
                kind,
                value: Some(ty),
            } => format!("{}<{}>", kind.as_str(), ty),
        }
    }
}

/// Memoization key of a packet type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PacketKey {
    /// Declaring type of the method
    pub owner: TypeKey,
    /// The method
    pub method: MethodKey,
    /// Method-level generic arguments, empty unless closed
    pub generic_args: Vec<TypeRef>,
}

pub(crate) struct Executed {
    value: Value,
    cell: Option<ValueCell>,
}

impl Executed {
    fn value(value: Value) -> Self {
        Self { value, cell: None }
    }
}

type Execute = Arc<dyn Fn(&Target, &mut [Value]) -> CallResult<Executed> + Send + Sync>;
type Invoke = Arc<dyn Fn(&Target, &mut [Value]) -> CallResult<Returned> + Send + Sync>;

/// Synthesized per-shape call packet type
pub struct PacketType {
    key: PacketKey,
    method: Arc<MethodInfo>,
    parameter_types: Vec<TypeRef>,
    plan: ReturnPlan,
    write_back: Vec<usize>,
    execute: Execute,
}

impl PacketType {
    /// Memoization key
    pub fn key(&self) -> &PacketKey {
        &self.key
    }

    /// Original method
    pub fn method(&self) -> &Arc<MethodInfo> {
        &self.method
    }

    /// Declared parameter types
    pub fn parameter_types(&self) -> &[TypeRef] {
        &self.parameter_types
    }

    /// Declared return type
    pub fn return_type(&self) -> &TypeRef {
        &self.method.signature().return_type
    }

    /// Return plan
    pub fn plan(&self) -> &ReturnPlan {
        &self.plan
    }

    /// Slots written back after the original method runs
    pub fn write_back(&self) -> &[usize] {
        &self.write_back
    }

    /// Generic parameters still to be bound per call
    pub fn generic_params(&self) -> &[GenericParam] {
        &self.method.signature().generics
    }

    /// Check if calls must first close this packet type
    pub fn is_generic(&self) -> bool {
        !self.generic_params().is_empty()
    }

    /// Check if any part of the signature is still open
    pub fn is_open(&self) -> bool {
        self.method.signature().is_open()
    }
}

impl fmt::Debug for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketType")
            .field("method", &self.method)
            .field("plan", &self.plan)
            .field("write_back", &self.write_back)
            .field("generic_args", &self.key.generic_args)
            .finish()
    }
}

/// Wraps the body so the original method only sees what its pass modes allow
///
/// Output-only slots start out null, and only by-reference slots are copied
/// back into the caller's arguments afterwards.
fn invoker(method: Arc<MethodInfo>, modes: &[PassMode]) -> Invoke {
    if modes.is_empty() {
        return Arc::new(move |target: &Target, _: &mut [Value]| {
            method.invoke_direct(target, &mut [])
        });
    }

    let cleared: Arc<[usize]> = (0..modes.len()).filter(|&i| !modes[i].reads()).collect();
    let written: Arc<[usize]> = (0..modes.len()).filter(|&i| modes[i].writes()).collect();

    Arc::new(move |target: &Target, args: &mut [Value]| {
        let mut scratch = args.to_vec();
        for &i in cleared.iter() {
            scratch[i] = Value::null();
        }
        let returned = method.invoke_direct(target, &mut scratch)?;
        for &i in written.iter() {
            args[i] = std::mem::take(&mut scratch[i]);
        }
        Ok(returned)
    })
}

fn shape_error(member: &str, plan: &ReturnPlan, got: &Returned) -> CallError {
    CallError::ReturnShape {
        member: member.to_string(),
        expected: plan.expected_shape(),
        got: got.shape_name(),
    }
}

/// Compose the execute operation specialized for one return plan
fn compose_execute(method: &Arc<MethodInfo>, modes: &[PassMode], plan: &ReturnPlan) -> Execute {
    let run = invoker(method.clone(), modes);
    let member: Arc<str> = Arc::from(method.name());
    let plan = plan.clone();

    match plan {
        ReturnPlan::Void => Arc::new(move |target: &Target, args: &mut [Value]| {
            match run(target, args)? {
                Returned::Unit => Ok(Executed::value(Value::null())),
                Returned::Value(v) if v.is_null() => Ok(Executed::value(v)),
                other => Err(shape_error(&member, &plan, &other)),
            }
        }),
        ReturnPlan::Direct(_) => Arc::new(move |target: &Target, args: &mut [Value]| {
            match run(target, args)? {
                Returned::Value(v) => Ok(Executed::value(v)),
                Returned::Unit => Ok(Executed::value(Value::null())),
                other => Err(shape_error(&member, &plan, &other)),
            }
        }),
        ReturnPlan::ByRef(_) => Arc::new(move |target: &Target, args: &mut [Value]| {
            match run(target, args)? {
                Returned::Ref(cell) => Ok(Executed {
                    value: cell.get(),
                    cell: Some(cell),
                }),
                other => Err(shape_error(&member, &plan, &other)),
            }
        }),
        ReturnPlan::Async { .. } => Arc::new(move |target: &Target, args: &mut [Value]| {
            match run(target, args)? {
                Returned::Async(pending) => pending.wait().map(Executed::value),
                other => Err(shape_error(&member, &plan, &other)),
            }
        }),
    }
}

fn build_packet(key: PacketKey, method: Arc<MethodInfo>) -> Result<Arc<PacketType>, ProxyError> {
    if !method.has_body() {
        return Err(ProxyError::synthesis(
            method.name(),
            "method has no executable body",
        ));
    }

    let signature = method.signature();
    let modes: Vec<PassMode> = signature.params.iter().map(|p| p.mode).collect();
    let plan = ReturnPlan::classify(&signature.return_type);
    let write_back = (0..modes.len()).filter(|&i| modes[i].writes()).collect();
    let execute = compose_execute(&method, &modes, &plan);

    tracing::debug!(
        method = method.name(),
        declaring = method.declaring_name(),
        plan = ?plan,
        generic_args = key.generic_args.len(),
        "synthesized call packet type"
    );

    Ok(Arc::new(PacketType {
        key,
        parameter_types: signature.parameter_types(),
        method,
        plan,
        write_back,
        execute,
    }))
}

/// Synthesizes and memoizes packet types
pub struct PacketSynthesizer {
    cache: TypeCache<PacketKey, Arc<PacketType>>,
}

impl PacketSynthesizer {
    /// Create a synthesizer serialized by `lock`
    pub fn new(lock: Arc<SynthesisLock>) -> Self {
        Self {
            cache: TypeCache::new(lock),
        }
    }

    /// Packet type for `method`, generic methods staying open
    pub fn synthesize(&self, method: &Arc<MethodInfo>) -> Result<Arc<PacketType>, ProxyError> {
        let key = PacketKey {
            owner: method.declaring(),
            method: method.key(),
            generic_args: Vec::new(),
        };
        self.cache
            .get_or_create(key.clone(), || build_packet(key, method.clone()))
    }

    /// Closed packet type for one instantiation of a generic method
    pub fn close(
        &self,
        open: &PacketType,
        args: &[TypeRef],
    ) -> Result<Arc<PacketType>, ProxyError> {
        let method = &open.method;
        if !open.is_generic() {
            return Err(ProxyError::synthesis(
                method.name(),
                "method is not generic",
            ));
        }

        let key = PacketKey {
            generic_args: args.to_vec(),
            ..open.key.clone()
        };
        self.cache.get_or_create(key.clone(), || {
            let bindings = GenericBindings::bind(&method.signature().generics, args)
                .map_err(|reason| ProxyError::synthesis(method.name(), reason))?;
            let signature = MethodSignature {
                generics: Vec::new(),
                ..method.signature().substitute(&bindings)
            };

            if signature.is_open() {
                let mut unresolved = Vec::new();
                for ty in signature.parameter_types().iter().chain([&signature.return_type]) {
                    ty.open_params(&mut unresolved);
                }
                return Err(ProxyError::synthesis(
                    method.name(),
                    format!("unresolved generic parameter(s) {:?}", unresolved),
                ));
            }

            let closed = Arc::new(MethodInfo {
                signature,
                ..(**method).clone()
            });
            build_packet(key, closed)
        })
    }

    /// Number of packet types held
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if no packet type has been synthesized
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Number of packet types synthesized
    pub fn synthesis_count(&self) -> u64 {
        self.cache.synthesis_count()
    }
}

// ============================================================================
// Argument marshalling
// ============================================================================

/// Fill omitted trailing arguments from their defaults
pub(crate) fn complete_arguments(
    member: &str,
    params: &[ParameterInfo],
    args: &[Value],
) -> CallResult<Vec<Value>> {
    if !accepts_count(params, args.len()) {
        return Err(CallError::ArgumentCount {
            member: member.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }

    let mut slots = Vec::with_capacity(params.len());
    slots.extend_from_slice(args);
    for param in &params[args.len()..] {
        slots.push(param.default.clone().unwrap_or_default());
    }
    Ok(slots)
}

/// Check every readable slot against its declared type
pub(crate) fn check_arguments(
    member: &str,
    params: &[ParameterInfo],
    slots: &[Value],
) -> CallResult<()> {
    for (index, (param, value)) in params.iter().zip(slots).enumerate() {
        if param.mode == PassMode::Out {
            continue;
        }
        if !param.ty.accepts(value) {
            return Err(CallError::ArgumentType {
                member: member.to_string(),
                index,
                expected: param.ty.to_string(),
                got: value.type_name().to_string(),
            });
        }
    }
    Ok(())
}

/// Check if `args` could be passed to `params`
pub(crate) fn arguments_match(params: &[ParameterInfo], args: &[Value]) -> bool {
    accepts_count(params, args.len())
        && params
            .iter()
            .zip(args)
            .all(|(param, value)| param.mode == PassMode::Out || param.ty.accepts(value))
}

/// Copy by-reference slots back into the caller's arguments
pub(crate) fn write_back(params: &[ParameterInfo], slots: &[Value], caller: &mut [Value]) {
    for (index, param) in params.iter().enumerate() {
        if param.mode.writes() && index < caller.len() {
            caller[index] = slots[index].clone();
        }
    }
}

fn accepts_count(params: &[ParameterInfo], count: usize) -> bool {
    let required = params
        .iter()
        .rposition(|p| !p.has_default())
        .map_or(0, |i| i + 1);
    count >= required && count <= params.len()
}

// ============================================================================
// Call packets
// ============================================================================

/// One intercepted call in flight
pub struct CallPacket<'a> {
    packet: &'a PacketType,
    service: &'a TypeInfo,
    target: &'a Target,
    generic_args: &'a [TypeRef],
    arguments: Vec<Value>,
    result: Value,
    cell: Option<ValueCell>,
    invocations: usize,
}

impl<'a> CallPacket<'a> {
    /// Bind a packet type to a target and complete argument slots
    pub fn new(
        packet: &'a PacketType,
        service: &'a TypeInfo,
        target: &'a Target,
        arguments: Vec<Value>,
        generic_args: &'a [TypeRef],
    ) -> CallResult<Self> {
        if arguments.len() != packet.parameter_types.len() {
            return Err(CallError::ArgumentCount {
                member: packet.method.name().to_string(),
                expected: packet.parameter_types.len(),
                got: arguments.len(),
            });
        }

        Ok(Self {
            packet,
            service,
            target,
            generic_args,
            arguments,
            result: Value::null(),
            cell: None,
            invocations: 0,
        })
    }

    /// Packet type this call was built from
    pub fn packet_type(&self) -> &PacketType {
        self.packet
    }

    fn check_result(&self) -> CallResult<()> {
        let expected = match self.packet.plan.slot_type() {
            Some(ty) if !ty.is_open() => ty,
            _ => return Ok(()),
        };

        if matches!(expected.resolved(), TypeRef::Concrete(_)) && self.result.is_null() {
            return Err(CallError::MissingResult {
                member: self.packet.method.name().to_string(),
            });
        }
        if !expected.accepts(&self.result) {
            return Err(CallError::ResultType {
                member: self.packet.method.name().to_string(),
                expected: expected.to_string(),
                got: self.result.type_name().to_string(),
            });
        }
        Ok(())
    }

    /// Rewrap the result into the declared shape and hand back the slots
    pub fn finish(self, check_result: bool) -> CallResult<(Returned, Vec<Value>)> {
        if check_result {
            self.check_result()?;
        }

        let returned = match &self.packet.plan {
            ReturnPlan::Void => Returned::Unit,
            ReturnPlan::Direct(_) => Returned::Value(self.result),
            ReturnPlan::ByRef(_) => match self.cell {
                Some(cell) => {
                    cell.set(self.result);
                    Returned::Ref(cell)
                }
                None => Returned::Ref(ValueCell::new(self.result)),
            },
            ReturnPlan::Async { kind, .. } => {
                Returned::Async(AsyncValue::completed(*kind, self.result))
            }
        };
        Ok((returned, self.arguments))
    }
}

impl CallContext for CallPacket<'_> {
    fn method(&self) -> &MethodInfo {
        &self.packet.method
    }

    fn service_type(&self) -> &TypeInfo {
        self.service
    }

    fn parameter_types(&self) -> &[TypeRef] {
        &self.packet.parameter_types
    }

    fn return_type(&self) -> &TypeRef {
        self.packet.return_type()
    }

    fn generic_arguments(&self) -> &[TypeRef] {
        self.generic_args
    }

    fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    fn arguments_mut(&mut self) -> &mut [Value] {
        &mut self.arguments
    }

    fn target(&self) -> &Target {
        self.target
    }

    fn result(&self) -> &Value {
        &self.result
    }

    fn set_result(&mut self, value: Value) {
        self.result = value;
    }

    fn invoke(&mut self) -> CallResult<Value> {
        self.invocations += 1;
        tracing::trace!(
            method = self.packet.method.name(),
            invocation = self.invocations,
            "executing original method"
        );

        let executed = (self.packet.execute)(self.target, &mut self.arguments)?;
        self.result = executed.value.clone();
        if executed.cell.is_some() {
            self.cell = executed.cell;
        }
        Ok(executed.value)
    }

    fn invocations(&self) -> usize {
        self.invocations
    }
}
