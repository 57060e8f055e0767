//! Interceptors and the call context they receive
//!
//! An [`Interceptor`] gets one [`CallContext`] per intercepted call. It may
//! inspect and rewrite the arguments, run the original method any number of
//! times through [`CallContext::invoke`], and decide the result the caller
//! sees. Failures it returns propagate to the caller unchanged.

mod registry;

pub use registry::{BindingKey, InterceptorRegistry, Resolution, Tier};

use std::any::{self, Any};

use crate::error::CallResult;
use crate::reflect::{MethodInfo, Target, TypeInfo, TypeRef};
use crate::value::Value;

/// Per-call view handed to an interceptor
pub trait CallContext {
    /// Original method the call targets
    fn method(&self) -> &MethodInfo;

    /// Service type the proxy was synthesized for
    fn service_type(&self) -> &TypeInfo;

    /// Declared parameter types
    fn parameter_types(&self) -> &[TypeRef];

    /// Declared return type (async containers included)
    fn return_type(&self) -> &TypeRef;

    /// Method-level generic arguments of this call
    fn generic_arguments(&self) -> &[TypeRef];

    /// Current argument values
    fn arguments(&self) -> &[Value];

    /// Argument slots; the slice length always equals the parameter count
    fn arguments_mut(&mut self) -> &mut [Value];

    /// Instance the original method runs against
    fn target(&self) -> &Target;

    /// Current result (unwrapped for asynchronous members)
    fn result(&self) -> &Value;

    /// Replace the result the caller will see
    fn set_result(&mut self, value: Value);

    /// Run the original method with the current arguments
    ///
    /// Stores and returns the result, and writes by-reference outputs back
    /// into the argument slots. Each call runs the method again.
    fn invoke(&mut self) -> CallResult<Value>;

    /// How many times the original method has run for this call
    fn invocations(&self) -> usize;
}

impl dyn CallContext + '_ {
    /// Typed copy of argument `index`
    pub fn argument<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.arguments().get(index).and_then(Value::get::<T>)
    }

    /// Typed copy of the current result
    pub fn result_as<T: Any + Clone>(&self) -> Option<T> {
        self.result().get::<T>()
    }

    /// Name of the original method
    pub fn method_name(&self) -> &str {
        self.method().name()
    }
}

/// Cross-cutting behavior wrapped around intercepted calls
pub trait Interceptor: Send + Sync {
    /// Handle one intercepted call
    fn invoke(&self, call: &mut dyn CallContext) -> CallResult<()>;

    /// Diagnostic type name
    fn type_name(&self) -> &'static str {
        any::type_name::<Self>()
    }
}

impl<F> Interceptor for F
where
    F: Fn(&mut dyn CallContext) -> CallResult<()> + Send + Sync,
{
    fn invoke(&self, call: &mut dyn CallContext) -> CallResult<()> {
        self(call)
    }
}

/// Interceptor that runs the original method once and changes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl Interceptor for PassThrough {
    fn invoke(&self, call: &mut dyn CallContext) -> CallResult<()> {
        call.invoke().map(|_| ())
    }
}
