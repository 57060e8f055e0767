//! Integration tests for intercepted calls through synthesized proxies

mod common;

use std::sync::Arc;

use aspect_engine::{
    args, arg, CallContext, CallError, CallResult, Interceptor, InterceptorMarker, MethodBuilder,
    PassThrough, PropertyBuilder, ProxyError, ProxyFactory, ProxyMode, ResolvedType, Returned,
    ServiceObject, ShapeRule, TypeBuilder, TypeRef, Value,
};
use common::{
    calc_builder, calc_type, calculator_contract, factory_with, Calc, DivideByZero, Doubling,
    Fixed, Recording,
};

fn calculator(factory: &ProxyFactory) -> Box<dyn ServiceObject> {
    let contract = calculator_contract();
    let resolved = factory
        .proxy_type_for(Some(&contract), Some(&calc_type(&contract)))
        .unwrap();
    resolved.construct(&[]).unwrap()
}

#[test]
fn test_result_replaced_without_running_original() {
    let factory = factory_with(Arc::new(Doubling));
    let calc = calculator(&factory);

    let out = calc.invoke("compute", &mut args![5i32]).unwrap();
    assert_eq!(out.get::<i32>(), Some(10));
    assert_eq!(calc.target_as::<Calc>().unwrap().calls(), 0);
}

#[test]
fn test_pass_through_matches_direct_call() {
    let factory = factory_with(Arc::new(PassThrough));
    let calc = calculator(&factory);

    let out = calc.invoke("compute", &mut args![7i32]).unwrap();
    assert_eq!(out.get::<i32>(), Some(7));
    assert_eq!(calc.target_as::<Calc>().unwrap().calls(), 1);

    let direct = Calc::default();
    let contract = calculator_contract();
    let imp = calc_type(&contract);
    let method = imp.methods_named("compute").next().unwrap();
    let expected = method
        .invoke_direct(&direct, &mut args![7i32])
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(expected.get::<i32>(), out.get::<i32>());
}

#[test]
fn test_each_call_resolves_once() {
    let factory = factory_with(Arc::new(PassThrough));
    let calc = calculator(&factory);
    let registry = factory.interceptors();

    let before = registry.resolution_count();
    calc.invoke("compute", &mut args![1i32]).unwrap();
    calc.invoke("scale", &mut args![1i32]).unwrap();
    calc.call("reset", &mut []).unwrap();
    assert_eq!(registry.resolution_count() - before, 3);

    // root object members never resolve an interceptor
    calc.invoke("to_string", &mut []).unwrap();
    assert_eq!(registry.resolution_count() - before, 3);
}

#[test]
fn test_member_marker_beats_type_marker_beats_global() {
    let factory = factory_with(Arc::new(Fixed::<3>));
    let on_type = InterceptorMarker::of::<Fixed<2>>("type-level");
    let on_member = InterceptorMarker::of::<Fixed<1>>("member-level");

    let contract = TypeBuilder::interface("Pair")
        .declare(MethodBuilder::new("first").returns::<i32>())
        .declare(MethodBuilder::new("second").returns::<i32>())
        .build();
    let marked = TypeBuilder::<Calc>::class("MarkedPair")
        .implements(&contract)
        .intercepted_by(&on_type)
        .default_constructor()
        .method(
            MethodBuilder::new("first")
                .returns::<i32>()
                .intercepted_by(&on_member),
            |_, _| Ok(Returned::value(0i32)),
        )
        .method(MethodBuilder::new("second").returns::<i32>(), |_, _| {
            Ok(Returned::value(0i32))
        })
        .build();
    let plain = TypeBuilder::<Calc>::class("PlainPair")
        .implements(&contract)
        .default_constructor()
        .method(MethodBuilder::new("first").returns::<i32>(), |_, _| {
            Ok(Returned::value(0i32))
        })
        .method(MethodBuilder::new("second").returns::<i32>(), |_, _| {
            Ok(Returned::value(0i32))
        })
        .build();

    let marked = factory
        .proxy_type_for(Some(&contract), Some(&marked))
        .unwrap()
        .construct(&[])
        .unwrap();
    assert_eq!(marked.invoke("first", &mut []).unwrap().get::<i32>(), Some(1));
    assert_eq!(marked.invoke("second", &mut []).unwrap().get::<i32>(), Some(2));

    let plain = factory
        .proxy_type_for(Some(&contract), Some(&plain))
        .unwrap()
        .construct(&[])
        .unwrap();
    assert_eq!(plain.invoke("first", &mut []).unwrap().get::<i32>(), Some(3));
}

#[test]
fn test_member_marker_instance_is_reused() {
    let factory = factory_with(Arc::new(PassThrough));
    let marker = InterceptorMarker::of::<Recording>("recording");
    let contract = calculator_contract();
    let imp = calc_builder(&contract)
        .method(
            MethodBuilder::new("compute")
                .param::<i32>("x")
                .returns::<i32>()
                .intercepted_by(&marker),
            |_, args| Ok(Returned::value(arg::<i32>(args, 0)? + 1)),
        )
        .build();
    let calc = factory
        .proxy_type_for(Some(&contract), Some(&imp))
        .unwrap()
        .construct(&[])
        .unwrap();

    assert!(!marker.is_instantiated());
    calc.invoke("compute", &mut args![1i32]).unwrap();
    let first = marker.interceptor();
    calc.invoke("compute", &mut args![2i32]).unwrap();
    assert!(Arc::ptr_eq(&first, &marker.interceptor()));
}

#[test]
fn test_programmatic_bindings() {
    let factory = factory_with(Arc::new(PassThrough));
    let contract = calculator_contract();
    let imp = calc_type(&contract);

    let compute = imp.methods_named("compute").next().unwrap().key();
    factory.bind_method(compute, Arc::new(Doubling)).unwrap();
    factory.bind_type(imp.key(), Arc::new(Fixed::<9>)).unwrap();

    let calc = factory
        .proxy_type_for(Some(&contract), Some(&imp))
        .unwrap()
        .construct(&[])
        .unwrap();
    assert_eq!(calc.invoke("compute", &mut args![4i32]).unwrap().get::<i32>(), Some(8));
    assert_eq!(calc.invoke("scale", &mut args![4i32]).unwrap().get::<i32>(), Some(9));
}

#[test]
fn test_out_parameter_written_by_original() {
    let factory = factory_with(Arc::new(PassThrough));
    let calc = calculator(&factory);

    let mut slots = vec![Value::new(17i32), Value::new(5i32), Value::null()];
    let quotient = calc.invoke("divide", &mut slots).unwrap();
    assert_eq!(quotient.get::<i32>(), Some(3));
    assert_eq!(slots[2].get::<i32>(), Some(2));
    assert_eq!(slots[0].get::<i32>(), Some(17));
}

#[test]
fn test_out_parameter_written_by_interceptor() {
    let rewrite = |call: &mut dyn CallContext| -> CallResult<()> {
        call.invoke()?;
        call.arguments_mut()[2] = Value::new(99i32);
        Ok(())
    };
    let factory = factory_with(Arc::new(rewrite));
    let calc = calculator(&factory);

    let mut slots = vec![Value::new(9i32), Value::new(2i32), Value::null()];
    calc.invoke("divide", &mut slots).unwrap();
    assert_eq!(slots[2].get::<i32>(), Some(99));
}

#[test]
fn test_rewritten_arguments_reach_original() {
    let bump = |call: &mut dyn CallContext| -> CallResult<()> {
        let x = call.argument::<i32>(0).unwrap_or_default();
        call.arguments_mut()[0] = Value::new(x + 100);
        call.invoke().map(|_| ())
    };
    let factory = factory_with(Arc::new(bump));
    let calc = calculator(&factory);

    let mut slots = args![1i32];
    let out = calc.invoke("compute", &mut slots).unwrap();
    assert_eq!(out.get::<i32>(), Some(101));
    // by-value arguments are never copied back
    assert_eq!(slots[0].get::<i32>(), Some(1));
}

#[test]
fn test_invoking_twice_reruns_original() {
    let twice = |call: &mut dyn CallContext| -> CallResult<()> {
        call.invoke()?;
        call.invoke()?;
        assert_eq!(call.invocations(), 2);
        Ok(())
    };
    let factory = factory_with(Arc::new(twice));
    let calc = calculator(&factory);

    calc.invoke("compute", &mut args![1i32]).unwrap();
    assert_eq!(calc.target_as::<Calc>().unwrap().calls(), 2);
}

#[test]
fn test_call_context_describes_member() {
    let inspect = |call: &mut dyn CallContext| -> CallResult<()> {
        assert_eq!(call.method_name(), "divide");
        assert_eq!(call.service_type().name(), "Calculator");
        assert_eq!(call.parameter_types().len(), 3);
        assert_eq!(call.arguments().len(), 3);
        assert_eq!(call.return_type(), &TypeRef::of::<i32>());
        assert!(call.generic_arguments().is_empty());
        assert!(call.target().downcast_ref::<Calc>().is_some());
        assert!(call.result().is_null());
        call.invoke().map(|_| ())
    };
    let factory = factory_with(Arc::new(inspect));
    let calc = calculator(&factory);
    calc.invoke("divide", &mut args![4i32, 2i32, 0i32]).unwrap();
}

#[test]
fn test_original_failure_propagates_unchanged() {
    let factory = factory_with(Arc::new(PassThrough));
    let calc = calculator(&factory);

    let err = calc
        .invoke("divide", &mut vec![Value::new(1i32), Value::new(0i32), Value::null()])
        .unwrap_err();
    let raised = err.as_raised().unwrap();
    assert_eq!(raised.downcast_ref::<DivideByZero>(), Some(&DivideByZero));
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn test_ignored_member_skips_registry() {
    let factory = factory_with(Arc::new(Doubling));
    let contract = calculator_contract();
    let imp = calc_builder(&contract)
        .method(
            MethodBuilder::new("compute")
                .param::<i32>("x")
                .returns::<i32>()
                .ignore_proxy(),
            |calc, args| {
                calc.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Returned::value(arg::<i32>(args, 0)?))
            },
        )
        .build();
    let resolved = factory.proxy_type_for(Some(&contract), Some(&imp)).unwrap();
    let proxy = resolved.as_proxy().unwrap();
    assert!(!proxy.members_named("compute").next().unwrap().is_intercepted());

    let calc = resolved.construct(&[]).unwrap();
    let before = factory.interceptors().resolution_count();
    let out = calc.invoke("compute", &mut args![5i32]).unwrap();
    assert_eq!(out.get::<i32>(), Some(5));
    assert_eq!(factory.interceptors().resolution_count(), before);
    assert_eq!(calc.target_as::<Calc>().unwrap().calls(), 1);
}

#[test]
fn test_ignored_type_is_returned_unchanged() {
    // no global interceptor needed for a bypass
    let factory = ProxyFactory::new();
    let contract = calculator_contract();
    let imp = calc_builder(&contract).ignore_proxy().build();

    let resolved = factory.proxy_type_for(Some(&contract), Some(&imp)).unwrap();
    match &resolved {
        ResolvedType::Bypass(ty) => assert!(Arc::ptr_eq(ty, &imp)),
        other => panic!("expected bypass, got {:?}", other),
    }

    let calc = resolved.construct(&[]).unwrap();
    assert!(!calc.is_proxy());
    assert_eq!(calc.invoke("compute", &mut args![5i32]).unwrap().get::<i32>(), Some(5));
    assert_eq!(factory.interceptors().resolution_count(), 0);
}

#[test]
fn test_default_arguments_are_filled() {
    let factory = factory_with(Arc::new(PassThrough));
    let calc = calculator(&factory);

    assert_eq!(calc.invoke("scale", &mut args![3i32]).unwrap().get::<i32>(), Some(30));
    assert_eq!(
        calc.invoke("scale", &mut args![3i32, 2i32]).unwrap().get::<i32>(),
        Some(6)
    );
    assert!(matches!(
        calc.invoke("scale", &mut []),
        Err(CallError::ArgumentCount { .. })
    ));
}

#[test]
fn test_interceptor_result_of_wrong_type_is_rejected() {
    let wrong = |call: &mut dyn CallContext| -> CallResult<()> {
        call.set_result(Value::new("not a number"));
        Ok(())
    };
    let factory = factory_with(Arc::new(wrong));
    let calc = calculator(&factory);
    assert!(matches!(
        calc.invoke("compute", &mut args![1i32]),
        Err(CallError::ResultType { .. })
    ));
}

#[test]
fn test_proxy_naming_and_diagnostics() {
    let factory = factory_with(Arc::new(Doubling));
    let contract = calculator_contract();
    let resolved = factory
        .proxy_type_for(Some(&contract), Some(&calc_type(&contract)))
        .unwrap();
    let proxy = resolved.as_proxy().unwrap();

    assert_eq!(proxy.name(), "aspect.Proxy.CalculatorProxy");
    assert_eq!(proxy.mode(), ProxyMode::Composition);
    assert!(proxy.is_assignable_to(&contract));
    assert!(proxy.interceptor_type().unwrap().ends_with("Doubling"));

    let calc = resolved.construct(&[]).unwrap();
    assert!(calc.is_proxy());
    assert_eq!(calc.type_name(), "aspect.Proxy.CalculatorProxy");
}

#[test]
fn test_not_assignable_is_rejected() {
    let factory = factory_with(Arc::new(PassThrough));
    let contract = calculator_contract();
    let other = TypeBuilder::interface("Other").build();
    let err = factory
        .proxy_type_for(Some(&other), Some(&calc_type(&contract)))
        .unwrap_err();
    assert!(matches!(
        err,
        ProxyError::UnsupportedShape {
            rule: ShapeRule::NotAssignable { .. },
            ..
        }
    ));
}

#[test]
fn test_null_arguments_are_rejected() {
    let factory = factory_with(Arc::new(PassThrough));
    let contract = calculator_contract();
    assert!(matches!(
        factory.proxy_type_for(None, Some(&contract)),
        Err(ProxyError::InvalidArgument(_))
    ));
}

#[test]
fn test_second_global_registration_fails() {
    let factory = factory_with(Arc::new(PassThrough));
    assert!(matches!(
        factory.register_global_interceptor(Arc::new(Doubling)),
        Err(ProxyError::ConfigurationConflict(_))
    ));
}

mod inheritance {
    use super::*;

    #[derive(Default)]
    struct Account {
        balance: parking_lot::Mutex<i64>,
    }

    fn account_type() -> Arc<aspect_engine::TypeInfo> {
        TypeBuilder::<Account>::class("Account")
            .default_constructor()
            .method(
                MethodBuilder::new("deposit").param::<i64>("amount").returns::<i64>(),
                |acc, args| {
                    let mut balance = acc.balance.lock();
                    *balance += arg::<i64>(args, 0)?;
                    Ok(Returned::value(*balance))
                },
            )
            .method(
                MethodBuilder::new("audit").returns::<i64>().non_virtual(),
                |acc, _| Ok(Returned::value(*acc.balance.lock())),
            )
            .build()
    }

    #[test]
    fn test_class_service_uses_inheritance() {
        let recorder = Arc::new(Recording::default());
        let factory = factory_with(recorder.clone());
        let account = account_type();

        let resolved = factory.proxy_type_for(Some(&account), Some(&account)).unwrap();
        let proxy = resolved.as_proxy().unwrap();
        assert_eq!(proxy.mode(), ProxyMode::Inheritance);
        assert!(proxy.is_assignable_to(&account));

        let acc = resolved.construct(&[]).unwrap();
        acc.invoke("deposit", &mut args![5i64]).unwrap();
        let audited = acc.invoke("audit", &mut []).unwrap();
        assert_eq!(audited.get::<i64>(), Some(5));

        // non-virtual members are forwarded without interception
        assert_eq!(recorder.seen(), vec!["deposit".to_string()]);
    }

    #[test]
    fn test_derived_implementation_of_base_service() {
        #[derive(Default)]
        struct Savings {
            base: Account,
        }

        let factory = factory_with(Arc::new(PassThrough));
        let account = account_type();
        let savings = TypeBuilder::<Savings>::class("Savings")
            .inherit(&account, |s: &Savings| &s.base)
            .default_constructor()
            .build();

        let resolved = factory.proxy_type_for(Some(&account), Some(&savings)).unwrap();
        assert_eq!(resolved.name(), "aspect.Proxy.AccountProxy");
        let acc = resolved.construct(&[]).unwrap();
        let out = acc.invoke("deposit", &mut args![7i64]).unwrap();
        assert_eq!(out.get::<i64>(), Some(7));
    }
}

mod properties {
    use super::*;

    #[derive(Default)]
    struct Settings {
        level: parking_lot::Mutex<u8>,
    }

    #[derive(Default)]
    struct Clamp;

    impl Interceptor for Clamp {
        fn invoke(&self, call: &mut dyn CallContext) -> CallResult<()> {
            if let Some(level) = call.argument::<u8>(0) {
                call.arguments_mut()[0] = Value::new(level.min(5));
            }
            call.invoke().map(|_| ())
        }
    }

    #[test]
    fn test_property_marker_applies_to_both_accessors() {
        let factory = factory_with(Arc::new(Fixed::<0>));
        let clamp = InterceptorMarker::of::<Clamp>("clamp");

        let contract = TypeBuilder::interface("Configurable")
            .property(PropertyBuilder::new("level", TypeRef::of::<u8>()).readable().writable())
            .build();
        let settings = TypeBuilder::<Settings>::class("Settings")
            .implements(&contract)
            .default_constructor()
            .property(
                PropertyBuilder::new("level", TypeRef::of::<u8>())
                    .getter(|s: &Settings| Ok(Value::new(*s.level.lock())))
                    .setter(|s: &Settings, v: Value| {
                        *s.level.lock() = v.get::<u8>().unwrap_or_default();
                        Ok(())
                    })
                    .intercepted_by(&clamp),
            )
            .build();

        let obj = factory
            .proxy_type_for(Some(&contract), Some(&settings))
            .unwrap()
            .construct(&[])
            .unwrap();
        obj.call("set_level", &mut args![9u8]).unwrap();
        let level = obj.invoke("get_level", &mut []).unwrap();
        assert_eq!(level.get::<u8>(), Some(5));
    }

    #[test]
    fn test_accessor_marker_wins_over_property_marker() {
        let factory = factory_with(Arc::new(PassThrough));
        let clamp = InterceptorMarker::of::<Clamp>("clamp");
        let seen = InterceptorMarker::of::<Recording>("recording");

        let settings = TypeBuilder::<Settings>::class("Settings")
            .default_constructor()
            .property(
                PropertyBuilder::new("level", TypeRef::of::<u8>())
                    .getter(|s: &Settings| Ok(Value::new(*s.level.lock())))
                    .setter(|s: &Settings, v: Value| {
                        *s.level.lock() = v.get::<u8>().unwrap_or_default();
                        Ok(())
                    })
                    .intercepted_by(&clamp)
                    .setter_intercepted_by(&seen),
            )
            .build();

        let obj = factory
            .proxy_type_for(Some(&settings), Some(&settings))
            .unwrap()
            .construct(&[])
            .unwrap();
        obj.call("set_level", &mut args![9u8]).unwrap();
        // the setter skipped the clamp
        assert_eq!(obj.invoke("get_level", &mut []).unwrap().get::<u8>(), Some(9));
        assert!(seen.is_instantiated());
    }
}
