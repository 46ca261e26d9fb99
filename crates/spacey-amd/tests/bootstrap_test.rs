// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! End-to-end bootstrap scenarios against simulated hosts

use parking_lot::Mutex;
use spacey_amd::globals::{DEFINE, DO_NOT_INIT_LOADER, MODULE, NODE_REQUIRE, REQUIRE};
use spacey_amd::{
    Bootstrap, GlobalScope, LoaderError, LoaderEventType, ModuleManager, Value, WiringStrategy,
};
use std::sync::Arc;

fn native_require() -> Value {
    Value::function("require", |args| match args.first().and_then(Value::as_str) {
        Some("fs") => Ok(Value::object([("native", Value::Boolean(true))])),
        Some(other) => Err(LoaderError::NativeModuleNotFound(other.to_string())),
        None => Err(LoaderError::type_error("path must be a string")),
    })
}

fn record_stats(require: &Value) {
    require
        .get("config")
        .call(&[Value::object([("recordStats", Value::Boolean(true))])])
        .unwrap();
}

fn stats_kinds(require: &Value) -> Vec<(String, String)> {
    match require.get("getStats").call(&[]).unwrap() {
        Value::Array(events) => events
            .iter()
            .map(|e| (e.get("kind").to_string(), e.get("detail").to_string()))
            .collect(),
        other => panic!("getStats returned {:?}", other),
    }
}

fn collector() -> (Arc<Mutex<Vec<Value>>>, Value) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = Value::function("callback", move |args| {
        sink.lock().extend(args.iter().cloned());
        Ok(Value::Undefined)
    });
    (seen, callback)
}

#[test]
fn test_browser_globals_are_installed() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");

    assert_eq!(loader.strategy(), WiringStrategy::BrowserGlobal);
    assert_eq!(globals.get(DEFINE), *loader.define_func().value());
    assert_eq!(globals.get(REQUIRE), *loader.require_func().value());
    assert!(globals.get(DEFINE).get("amd").to_boolean());
    assert!(globals.get(REQUIRE).get("__$__nodeRequire").is_undefined());
    assert!(loader.node_require().is_none());
}

#[test]
fn test_browser_define_then_sync_require() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    bootstrap.auto_init().unwrap();

    let define = globals.get(DEFINE);
    let require = globals.get(REQUIRE);
    define
        .call(&[
            Value::from("moduleId"),
            Value::function("factory", |_| Ok(Value::from("exported"))),
        ])
        .unwrap();

    assert_eq!(
        require.call(&[Value::from("moduleId")]).unwrap(),
        Value::from("exported")
    );
    assert!(matches!(
        require.call(&[Value::from("other")]),
        Err(LoaderError::UnresolvedModule(_))
    ));
}

#[test]
fn test_preset_global_configuration_is_applied() {
    let globals = GlobalScope::browser();
    globals.set(
        REQUIRE,
        Value::object([
            ("baseUrl", Value::from("lib")),
            ("urlArgs", Value::from("v=2")),
        ]),
    );
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");

    let config = loader.require_func().get_config().unwrap();
    assert_eq!(config.base_url, "lib/");
    assert_eq!(config.url_args, "v=2");
    assert!(globals.get(REQUIRE).is_function());
}

#[test]
fn test_node_exports_require_and_keeps_globals() {
    let native = native_require();
    let globals = GlobalScope::node(native.clone());
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");

    assert_eq!(loader.strategy(), WiringStrategy::NodeModuleExport);
    assert_eq!(
        globals.get(MODULE).get("exports"),
        *loader.require_func().value()
    );
    assert_eq!(globals.get(REQUIRE), native);
    assert!(globals.get(DEFINE).is_undefined());
    assert!(globals.get(NODE_REQUIRE).is_function());
    assert!(loader.require_func().value().get("nodeRequire").is_function());

    loader
        .define()
        .call(&[Value::from("m"), Value::Number(7.0)])
        .unwrap();
    assert_eq!(
        loader.require_func().call(&[Value::from("m")]).unwrap(),
        Value::Number(7.0)
    );
}

#[test]
fn test_node_native_require_records_begin_and_end() {
    let globals = GlobalScope::node(native_require());
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");
    let require = loader.require_func().value().clone();
    record_stats(&require);

    let node_require = globals.get(NODE_REQUIRE);
    let fs = node_require.call(&[Value::from("fs")]).unwrap();
    assert_eq!(fs.get("native"), Value::Boolean(true));

    let err = node_require.call(&[Value::from("nope")]).unwrap_err();
    assert!(matches!(err, LoaderError::NativeModuleNotFound(ref m) if m == "nope"));

    assert_eq!(
        stats_kinds(&require),
        vec![
            ("nodeBeginNativeRequire".to_string(), "fs".to_string()),
            ("nodeEndNativeRequire".to_string(), "fs".to_string()),
            ("nodeBeginNativeRequire".to_string(), "nope".to_string()),
            ("nodeEndNativeRequire".to_string(), "nope".to_string()),
        ]
    );
}

#[test]
fn test_electron_renderer_forwards_define() {
    let globals = GlobalScope::electron_renderer(native_require());
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");

    assert_eq!(loader.strategy(), WiringStrategy::ElectronRendererGlobal);
    let define = globals.get(DEFINE);
    assert!(define.is_function());
    assert_ne!(define, *loader.define_func().value());
    assert!(define.get("amd").to_boolean());

    let require = globals.get(REQUIRE);
    assert_eq!(require, *loader.require_func().value());
    assert!(require.get("__$__nodeRequire").is_function());

    define
        .call(&[Value::from("renderer/main"), Value::from("ok")])
        .unwrap();
    assert_eq!(
        require.call(&[Value::from("renderer/main")]).unwrap(),
        Value::from("ok")
    );
}

#[test]
fn test_second_bootstrap_is_skipped() {
    let globals = GlobalScope::browser();
    let mut first = Bootstrap::new(Arc::clone(&globals));
    let loader = first.auto_init().unwrap().expect("initialized");
    loader
        .require_func()
        .config_value(&Value::object([("baseUrl", Value::from("first"))]), false)
        .unwrap();
    let manager = loader.state().manager().unwrap();

    let mut second = Bootstrap::new(Arc::clone(&globals));
    assert!(second.auto_init().unwrap().is_none());
    assert!(second.loader().is_none());

    let loader = first.loader().unwrap();
    assert!(Arc::ptr_eq(&manager, &loader.state().manager().unwrap()));
    assert_eq!(globals.get(DEFINE), *loader.define_func().value());
    assert_eq!(loader.require_func().get_config().unwrap().base_url, "first/");
}

#[test]
fn test_do_not_init_loader_allows_manual_init() {
    let globals = GlobalScope::browser();
    globals.set(DO_NOT_INIT_LOADER, Value::Boolean(true));
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));

    assert!(bootstrap.auto_init().unwrap().is_none());
    assert!(globals.get(DEFINE).is_undefined());

    bootstrap.init().unwrap();
    assert!(globals.get(DEFINE).is_function());
}

#[test]
fn test_reset_clears_stats_and_config() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    bootstrap.auto_init().unwrap();

    let define = globals.get(DEFINE);
    let require = globals.get(REQUIRE);
    record_stats(&require);
    require
        .get("config")
        .call(&[Value::object([("baseUrl", Value::from("x"))])])
        .unwrap();
    define
        .call(&[Value::from("a"), Value::function("a", |_| Ok(Value::Null))])
        .unwrap();
    assert!(!stats_kinds(&require).is_empty());

    require.get("reset").call(&[]).unwrap();

    assert!(stats_kinds(&require).is_empty());
    let config = require.get("getConfig").call(&[]).unwrap();
    assert_eq!(config.get("baseUrl"), Value::from(""));
    assert!(matches!(
        require.call(&[Value::from("a")]),
        Err(LoaderError::UnresolvedModule(_))
    ));
    assert_eq!(globals.get(DEFINE), define);
    assert_eq!(globals.get(REQUIRE), require);
}

#[test]
fn test_async_require_registers_one_anonymous_module() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");
    let require = globals.get(REQUIRE);
    let (seen, callback) = collector();

    require
        .call(&[Value::string_array(&["a", "b"]), callback])
        .unwrap();

    let pending = loader
        .state()
        .with_manager(|m| m.pending_module_ids())
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].starts_with("===anonymous"));

    let requests = loader.take_script_requests().unwrap();
    let sources: Vec<&str> = requests.iter().map(|r| r.src.as_str()).collect();
    assert_eq!(sources, vec!["a.js", "b.js"]);

    // Each script defines an anonymous module; ids come from load order.
    let define = globals.get(DEFINE);
    define.call(&[Value::function("b", |_| Ok(Value::from("B")))]).unwrap();
    loader.script_loaded("b").unwrap();
    define.call(&[Value::function("a", |_| Ok(Value::from("A")))]).unwrap();
    loader.script_loaded("a").unwrap();

    assert_eq!(*seen.lock(), vec![Value::from("A"), Value::from("B")]);
}

#[test]
fn test_async_require_errback_on_script_failure() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");
    let require = globals.get(REQUIRE);
    let (called, callback) = collector();
    let (errors, errback) = collector();

    require
        .call(&[Value::string_array(&["missing"]), callback, errback])
        .unwrap();
    loader.script_failed("missing", "404 Not Found").unwrap();

    assert!(called.lock().is_empty());
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("missing"));
}

#[test]
fn test_factory_can_reenter_require() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    bootstrap.auto_init().unwrap();
    let define = globals.get(DEFINE);
    let require = globals.get(REQUIRE);

    define.call(&[Value::from("base"), Value::Number(1.0)]).unwrap();
    define
        .call(&[
            Value::from("derived"),
            Value::string_array(&["require"]),
            Value::function("derived", |args| {
                let base = args[0].call(&[Value::from("base")])?;
                Ok(Value::from(format!("derived from {}", base)))
            }),
        ])
        .unwrap();

    assert_eq!(
        require.call(&[Value::from("derived")]).unwrap(),
        Value::from("derived from 1")
    );
}

#[test]
fn test_unrecognized_calls_fail() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    bootstrap.auto_init().unwrap();
    let require = globals.get(REQUIRE);

    assert!(matches!(
        require.call(&[Value::Number(42.0)]),
        Err(LoaderError::UnrecognizedRequireCall)
    ));
    assert!(matches!(
        require.call(&[]),
        Err(LoaderError::UnrecognizedRequireCall)
    ));
}

#[test]
fn test_anonymous_ids_do_not_collide_with_named_modules() {
    let id = ModuleManager::generate_anonymous_module();
    assert!(id.starts_with("===anonymous") && id.ends_with("==="));
}

#[test]
fn test_module_requested_before_reset_is_requested_again() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");
    let define = globals.get(DEFINE);
    let require = globals.get(REQUIRE);

    let (_, callback) = collector();
    require.call(&[Value::string_array(&["a"]), callback]).unwrap();
    assert_eq!(loader.take_script_requests().unwrap().len(), 1);

    require.get("reset").call(&[]).unwrap();

    let (seen, callback) = collector();
    require.call(&[Value::string_array(&["a"]), callback]).unwrap();
    let requests = loader.take_script_requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].src, "a.js");

    define.call(&[Value::function("a", |_| Ok(Value::from("A")))]).unwrap();
    loader.script_loaded("a").unwrap();
    assert_eq!(*seen.lock(), vec![Value::from("A")]);
}

#[test]
fn test_failed_module_does_not_block_unrelated_modules() {
    let globals = GlobalScope::browser();
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    bootstrap.auto_init().unwrap();
    let define = globals.get(DEFINE);
    let require = globals.get(REQUIRE);

    define
        .call(&[Value::from("late"), Value::string_array(&["dep"]), Value::from("L")])
        .unwrap();
    define
        .call(&[Value::from("dep"), Value::string_array(&["bad"]), Value::from("D")])
        .unwrap();
    let err = define
        .call(&[
            Value::from("bad"),
            Value::function("bad", |_| Err(LoaderError::type_error("boom"))),
        ])
        .unwrap_err();
    assert!(matches!(err, LoaderError::TypeError(ref m) if m == "boom"));

    define.call(&[Value::from("ok1"), Value::from("x")]).unwrap();
    assert_eq!(require.call(&[Value::from("ok1")]).unwrap(), Value::from("x"));
    assert!(matches!(
        require.call(&[Value::from("late")]),
        Err(LoaderError::DependencyFailed { ref dependency, .. }) if dependency == "dep"
    ));
}

#[test]
fn test_electron_renderer_applies_preset_configuration() {
    let globals = GlobalScope::electron_renderer(native_require());
    globals.set(
        REQUIRE,
        Value::object([
            ("baseUrl", Value::from("app")),
            ("preferScriptTags", Value::Boolean(true)),
        ]),
    );
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");

    assert_eq!(loader.strategy(), WiringStrategy::ElectronRendererGlobal);
    let config = loader.require_func().get_config().unwrap();
    assert_eq!(config.base_url, "app/");
    assert!(config.prefer_script_tags);
    assert_eq!(globals.get(REQUIRE), *loader.require_func().value());
    assert!(loader.node_require().is_none());
}

#[test]
fn test_native_require_events_follow_reset() {
    let globals = GlobalScope::node(native_require());
    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    let loader = bootstrap.auto_init().unwrap().expect("initialized");
    let require = loader.require_func().value().clone();
    let node_require = globals.get(NODE_REQUIRE);

    record_stats(&require);
    node_require.call(&[Value::from("fs")]).unwrap();
    assert_eq!(stats_kinds(&require).len(), 2);

    require.get("reset").call(&[]).unwrap();
    node_require.call(&[Value::from("fs")]).unwrap();
    assert!(stats_kinds(&require).is_empty());

    record_stats(&require);
    node_require.call(&[Value::from("nope")]).unwrap_err();
    assert_eq!(
        stats_kinds(&require),
        vec![
            ("nodeBeginNativeRequire".to_string(), "nope".to_string()),
            ("nodeEndNativeRequire".to_string(), "nope".to_string()),
        ]
    );
}
