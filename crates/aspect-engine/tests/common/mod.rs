//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aspect_engine::{
    arg, CallContext, CallError, CallResult, Interceptor, MethodBuilder, PassMode, ProxyFactory,
    Returned, TypeBuilder, TypeInfo, TypeRef, Value,
};
use parking_lot::Mutex;

/// Failure raised by `Calc::divide`
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("division by zero")]
pub struct DivideByZero;

/// Calculator implementation counting how often its bodies run
#[derive(Default)]
pub struct Calc {
    pub calls: AtomicUsize,
}

impl Calc {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn compute() -> MethodBuilder {
    MethodBuilder::new("compute").param::<i32>("x").returns::<i32>()
}

fn divide() -> MethodBuilder {
    MethodBuilder::new("divide")
        .param::<i32>("a")
        .param::<i32>("b")
        .param_ref("remainder", TypeRef::of::<i32>(), PassMode::Out)
        .returns::<i32>()
}

fn scale() -> MethodBuilder {
    MethodBuilder::new("scale")
        .param::<i32>("x")
        .optional("factor", 10i32)
        .returns::<i32>()
}

fn reset() -> MethodBuilder {
    MethodBuilder::new("reset")
}

/// `Calculator` contract
pub fn calculator_contract() -> Arc<TypeInfo> {
    TypeBuilder::interface("Calculator")
        .declare(compute())
        .declare(divide())
        .declare(scale())
        .declare(reset())
        .build()
}

/// `Calc` builder implementing `contract`, ready for extra members or markers
pub fn calc_builder(contract: &Arc<TypeInfo>) -> TypeBuilder<Calc> {
    TypeBuilder::<Calc>::class("Calc")
        .implements(contract)
        .default_constructor()
        .method(compute(), |calc, args| {
            calc.hit();
            Ok(Returned::value(arg::<i32>(args, 0)?))
        })
        .method(divide(), |calc, args| {
            calc.hit();
            let a: i32 = arg(args, 0)?;
            let b: i32 = arg(args, 1)?;
            if b == 0 {
                return Err(CallError::raised(DivideByZero));
            }
            args[2] = Value::new(a % b);
            Ok(Returned::value(a / b))
        })
        .method(scale(), |calc, args| {
            calc.hit();
            Ok(Returned::value(arg::<i32>(args, 0)? * arg::<i32>(args, 1)?))
        })
        .method(reset(), |calc, _| {
            calc.calls.store(0, Ordering::SeqCst);
            Ok(Returned::Unit)
        })
}

/// `Calc` implementing `contract`
pub fn calc_type(contract: &Arc<TypeInfo>) -> Arc<TypeInfo> {
    calc_builder(contract).build()
}

/// Factory with `interceptor` as the global fallback
pub fn factory_with(interceptor: Arc<dyn Interceptor>) -> ProxyFactory {
    let factory = ProxyFactory::new();
    factory.register_global_interceptor(interceptor).unwrap();
    factory
}

/// Sets the result to twice the first argument without running the original
#[derive(Debug, Default)]
pub struct Doubling;

impl Interceptor for Doubling {
    fn invoke(&self, call: &mut dyn CallContext) -> CallResult<()> {
        let x = call.argument::<i32>(0).unwrap_or_default();
        call.set_result(Value::new(x * 2));
        Ok(())
    }
}

/// Runs the original once and records the member name
#[derive(Debug, Default)]
pub struct Recording {
    pub seen: Mutex<Vec<String>>,
}

impl Recording {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl Interceptor for Recording {
    fn invoke(&self, call: &mut dyn CallContext) -> CallResult<()> {
        self.seen.lock().push(call.method_name().to_string());
        call.invoke()?;
        Ok(())
    }
}

/// Sets every result to a fixed value
#[derive(Debug, Default)]
pub struct Fixed<const N: i32>;

impl<const N: i32> Interceptor for Fixed<N> {
    fn invoke(&self, call: &mut dyn CallContext) -> CallResult<()> {
        call.set_result(Value::new(N));
        Ok(())
    }
}
