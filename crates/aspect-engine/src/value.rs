//! Boxed values flowing through call packets
//!
//! Every argument, result and by-reference slot is a [`Value`]: a nullable,
//! type-erased, cheaply clonable box. A value remembers the Rust type it was
//! created from so signatures can check slots without downcasting.
//!
//! Method bodies report their outcome as [`Returned`], which keeps the
//! asynchronous and by-reference shapes apart from plain values.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, Thread};

use futures::future::BoxFuture;
use futures::task::{waker, ArcWake};
use futures::FutureExt;
use parking_lot::RwLock;

use crate::error::{CallError, CallResult};

/// Identity of a concrete Rust type
#[derive(Clone, Copy)]
pub struct RustType {
    id: TypeId,
    name: &'static str,
}

impl RustType {
    /// Capture the identity of `T`
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Underlying type id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for RustType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RustType {}

impl std::hash::Hash for RustType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for RustType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for RustType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Clone)]
struct Boxed {
    data: Arc<dyn Any + Send + Sync>,
    ty: RustType,
}

/// A type-erased argument or result slot
#[derive(Clone, Default)]
pub struct Value(Option<Boxed>);

impl Value {
    /// Box a value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Boxed {
            data: Arc::new(value),
            ty: RustType::of::<T>(),
        }))
    }

    /// The empty slot
    pub const fn null() -> Self {
        Self(None)
    }

    /// Check if the slot is empty
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Rust type of the boxed value
    pub fn rust_type(&self) -> Option<RustType> {
        self.0.as_ref().map(|b| b.ty)
    }

    /// Check if the slot holds a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.rust_type().map_or(false, |t| t.id() == TypeId::of::<T>())
    }

    /// Borrow the boxed value as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|b| b.data.downcast_ref::<T>())
    }

    /// Clone the boxed value out as `T`
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// Name of the boxed type, or `null`
    pub fn type_name(&self) -> &'static str {
        self.rust_type().map_or("null", |t| t.name())
    }

    /// Check whether two slots point at the same allocation
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a.data, &b.data),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("null"),
            Some(b) => write!(f, "Value<{}>", b.ty.name()),
        }
    }
}

/// Build an argument vector from plain Rust values
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($arg:expr),+ $(,)?) => { ::std::vec![$($crate::Value::new($arg)),+] };
}

/// Read argument `index` as `T`
pub fn arg<T: Any + Clone>(args: &[Value], index: usize) -> CallResult<T> {
    let slot = args.get(index).ok_or_else(|| CallError::ArgumentCount {
        member: String::from("<body>"),
        expected: index + 1,
        got: args.len(),
    })?;
    slot.get::<T>().ok_or_else(|| CallError::ArgumentType {
        member: String::from("<body>"),
        index,
        expected: std::any::type_name::<T>().to_string(),
        got: slot.type_name().to_string(),
    })
}

/// A shared, lockable slot used for by-reference returns
#[derive(Clone, Default)]
pub struct ValueCell(Arc<RwLock<Value>>);

impl ValueCell {
    /// Create a cell holding `value`
    pub fn new(value: Value) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Current contents
    pub fn get(&self) -> Value {
        self.0.read().clone()
    }

    /// Replace the contents
    pub fn set(&self, value: Value) {
        *self.0.write() = value;
    }

    /// Check whether two cells alias the same storage
    pub fn ptr_eq(&self, other: &ValueCell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueCell({:?})", self.get())
    }
}

/// Asynchronous container shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncKind {
    /// Already-started task
    Task,
    /// Lazily-started task, runs when first polled
    Deferred,
}

impl AsyncKind {
    /// Display name of the container
    pub fn as_str(&self) -> &'static str {
        match self {
            AsyncKind::Task => "Task",
            AsyncKind::Deferred => "Deferred",
        }
    }
}

/// An asynchronous result of a declared kind
pub struct AsyncValue {
    kind: AsyncKind,
    future: BoxFuture<'static, CallResult<Value>>,
}

impl AsyncValue {
    /// Wrap a future producing a boxed value
    pub fn new<F>(kind: AsyncKind, future: F) -> Self
    where
        F: Future<Output = CallResult<Value>> + Send + 'static,
    {
        Self {
            kind,
            future: future.boxed(),
        }
    }

    /// An already-completed result
    pub fn completed(kind: AsyncKind, value: Value) -> Self {
        Self::new(kind, futures::future::ready(Ok(value)))
    }

    /// Declared container kind
    pub fn kind(&self) -> AsyncKind {
        self.kind
    }

    /// Block the current thread until the result is available
    ///
    /// Safe to nest: a body being waited on may itself wait on another
    /// asynchronous result.
    pub fn wait(mut self) -> CallResult<Value> {
        let waker = waker(Arc::new(ThreadWaker(thread::current())));
        let mut cx = Context::from_waker(&waker);
        loop {
            match self.future.as_mut().poll(&mut cx) {
                Poll::Ready(result) => return result,
                Poll::Pending => thread::park(),
            }
        }
    }
}

/// Unparks the waiting thread on wake
struct ThreadWaker(Thread);

impl ArcWake for ThreadWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}

impl Future for AsyncValue {
    type Output = CallResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl fmt::Debug for AsyncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AsyncValue<{}>", self.kind.as_str())
    }
}

/// Outcome of executing a method body or a forwarding member
#[derive(Debug)]
pub enum Returned {
    /// Nothing (void)
    Unit,
    /// A plain value
    Value(Value),
    /// A reference to storage
    Ref(ValueCell),
    /// An asynchronous container
    Async(AsyncValue),
}

impl Returned {
    /// Void outcome
    pub fn unit() -> Self {
        Returned::Unit
    }

    /// Plain value outcome
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Returned::Value(Value::new(value))
    }

    /// By-reference outcome
    pub fn reference(cell: ValueCell) -> Self {
        Returned::Ref(cell)
    }

    /// Already-started task yielding a `T`
    pub fn task<T, F>(future: F) -> Self
    where
        T: Any + Send + Sync,
        F: Future<Output = CallResult<T>> + Send + 'static,
    {
        Returned::Async(AsyncValue::new(
            AsyncKind::Task,
            future.map(|r| r.map(Value::new)),
        ))
    }

    /// Already-started task yielding nothing
    pub fn task_unit<F>(future: F) -> Self
    where
        F: Future<Output = CallResult<()>> + Send + 'static,
    {
        Returned::Async(AsyncValue::new(
            AsyncKind::Task,
            future.map(|r| r.map(|_| Value::null())),
        ))
    }

    /// Lazily-started task yielding a `T`
    pub fn deferred<T, F>(future: F) -> Self
    where
        T: Any + Send + Sync,
        F: Future<Output = CallResult<T>> + Send + 'static,
    {
        Returned::Async(AsyncValue::new(
            AsyncKind::Deferred,
            future.map(|r| r.map(Value::new)),
        ))
    }

    /// Shape name used in diagnostics
    pub fn shape_name(&self) -> &'static str {
        match self {
            Returned::Unit => "nothing",
            Returned::Value(_) => "a value",
            Returned::Ref(_) => "a reference",
            Returned::Async(_) => "an asynchronous result",
        }
    }

    /// Unwrap a plain value, treating `Unit` as null
    pub fn into_value(self) -> Option<Value> {
        match self {
            Returned::Unit => Some(Value::null()),
            Returned::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Unwrap an asynchronous result
    pub fn into_async(self) -> Option<AsyncValue> {
        match self {
            Returned::Async(a) => Some(a),
            _ => None,
        }
    }

    /// Unwrap a reference
    pub fn into_ref(self) -> Option<ValueCell> {
        match self {
            Returned::Ref(c) => Some(c),
            _ => None,
        }
    }

    /// Settle into a plain value, waiting on asynchronous results
    pub fn resolve(self) -> CallResult<Value> {
        match self {
            Returned::Unit => Ok(Value::null()),
            Returned::Value(v) => Ok(v),
            Returned::Ref(c) => Ok(c.get()),
            Returned::Async(a) => a.wait(),
        }
    }
}
