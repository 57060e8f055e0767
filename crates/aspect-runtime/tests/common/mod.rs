//! Shared fixtures for runtime integration tests

#![allow(dead_code)]

use std::sync::Arc;

use aspect_engine::{
    arg, CallContext, CallResult, MethodBuilder, Returned, TypeBuilder, TypeInfo, Value,
};

#[derive(Default)]
pub struct Polite;

#[derive(Default)]
pub struct Clock;

fn greet() -> MethodBuilder {
    MethodBuilder::new("greet").param::<String>("name").returns::<String>()
}

/// `Greeter` contract
pub fn greeter_contract() -> Arc<TypeInfo> {
    TypeBuilder::interface("Greeter").declare(greet()).build()
}

/// `Polite` implementing `contract`
pub fn polite_type(contract: &Arc<TypeInfo>) -> Arc<TypeInfo> {
    TypeBuilder::<Polite>::class("Polite")
        .implements(contract)
        .default_constructor()
        .method(greet(), |_, args| {
            let name: String = arg(args, 0)?;
            Ok(Returned::value(format!("Hello, {}", name)))
        })
        .build()
}

/// `Clock`, opted out of proxying
pub fn clock_type() -> Arc<TypeInfo> {
    TypeBuilder::<Clock>::class("Clock")
        .ignore_proxy()
        .default_constructor()
        .method(MethodBuilder::new("now").returns::<u64>(), |_, _| {
            Ok(Returned::value(42u64))
        })
        .build()
}

/// Appends `!` to every string result
pub fn shout(call: &mut dyn CallContext) -> CallResult<()> {
    let value = call.invoke()?;
    if let Some(text) = value.get::<String>() {
        call.set_result(Value::new(format!("{}!", text)));
    }
    Ok(())
}
