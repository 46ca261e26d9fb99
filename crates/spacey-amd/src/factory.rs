// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The global `define` and `require` entry points.
//!
//! Both close over the shared [`LoaderState`], never over a module manager,
//! so `require.reset()` swaps the manager without changing the identity of
//! either function.

use crate::call::{DefineCall, RequireCall};
use crate::config::{Configuration, ConfigurationOptions};
use crate::error::Result;
use crate::events::LoaderEvent;
use crate::manager::BuildModuleInfo;
use crate::state::LoaderState;
use crate::value::Value;
use std::sync::Arc;

/// The `define` entry point
#[derive(Clone)]
pub struct DefineFunc {
    state: Arc<LoaderState>,
    value: Value,
}

impl DefineFunc {
    /// `define(id?, dependencies?, factory)` with positional arguments
    pub fn call(&self, args: &[Value]) -> Result<()> {
        self.state.define(DefineCall::classify(args))
    }

    /// The function value installed into globals
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// The `require` entry point with its attached methods
#[derive(Clone)]
pub struct RequireFunc {
    state: Arc<LoaderState>,
    value: Value,
}

impl RequireFunc {
    /// `require(...)` with positional arguments
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.state.require(RequireCall::classify(args))
    }

    /// `require.config(options, overwrite)`
    pub fn config(&self, options: ConfigurationOptions, overwrite: bool) -> Result<()> {
        self.state.configure(options, overwrite)
    }

    /// `require.config(...)` with a JavaScript object
    pub fn config_value(&self, options: &Value, overwrite: bool) -> Result<()> {
        self.state.configure_value(options, overwrite)
    }

    /// `require.getConfig()`
    pub fn get_config(&self) -> Result<Configuration> {
        self.state.with_manager(|m| m.get_config())
    }

    /// `require.reset()`
    pub fn reset(&self) -> Result<()> {
        self.state.reset()
    }

    /// `require.getBuildInfo()`
    pub fn get_build_info(&self) -> Result<Vec<BuildModuleInfo>> {
        self.state.with_manager(|m| m.get_build_info())
    }

    /// `require.getStats()`
    pub fn get_stats(&self) -> Result<Vec<LoaderEvent>> {
        self.state.with_manager(|m| m.get_loader_events())
    }

    /// The function value installed into globals
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Build `define` and `require` over `state`.
pub fn create_global_amd_funcs(state: &Arc<LoaderState>) -> Result<(DefineFunc, RequireFunc)> {
    let define = {
        let state = Arc::clone(state);
        Value::function("define", move |args| {
            state.define(DefineCall::classify(args))?;
            Ok(Value::Undefined)
        })
    };
    define.set("amd", Value::object([("jQuery", Value::Boolean(true))]))?;

    let require = {
        let state = Arc::clone(state);
        Value::function("require", move |args| {
            state.require(RequireCall::classify(args))
        })
    };

    let require_func = RequireFunc {
        state: Arc::clone(state),
        value: require.clone(),
    };
    attach_methods(&require_func)?;

    Ok((
        DefineFunc {
            state: Arc::clone(state),
            value: define,
        },
        require_func,
    ))
}

fn attach_methods(require: &RequireFunc) -> Result<()> {
    let target = require.value();

    let this = require.clone();
    target.set(
        "config",
        Value::function("config", move |args| {
            let options = args.first().cloned().unwrap_or_default();
            let overwrite = args.get(1).is_some_and(Value::to_boolean);
            this.config_value(&options, overwrite)?;
            Ok(Value::Undefined)
        }),
    )?;

    let this = require.clone();
    target.set(
        "getConfig",
        Value::function("getConfig", move |_| this.get_config()?.to_value()),
    )?;

    let this = require.clone();
    target.set(
        "reset",
        Value::function("reset", move |_| {
            this.reset()?;
            Ok(Value::Undefined)
        }),
    )?;

    let this = require.clone();
    target.set(
        "getBuildInfo",
        Value::function("getBuildInfo", move |_| {
            let info = this.get_build_info()?;
            Ok(Value::from_json(serde_json::to_value(info)?))
        }),
    )?;

    let this = require.clone();
    target.set(
        "getStats",
        Value::function("getStats", move |_| {
            let events = this.get_stats()?;
            Ok(Value::from_json(serde_json::to_value(events)?))
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::error::LoaderError;
    use crate::manager::ModuleManager;
    use crate::script_loader::create_script_loader;
    use std::time::Instant;

    fn setup() -> (Arc<LoaderState>, DefineFunc, RequireFunc) {
        let state = LoaderState::new();
        let (define, require) = create_global_amd_funcs(&state).unwrap();
        let env = Environment::default();
        state.install(ModuleManager::new(
            env,
            create_script_loader(env),
            define.value().clone(),
            require.value().clone(),
            Instant::now(),
        ));
        (state, define, require)
    }

    #[test]
    fn test_define_carries_amd_marker() {
        let (_, define, _) = setup();
        assert!(define.value().get("amd").to_boolean());
        assert_eq!(define.value().get("amd").get("jQuery"), Value::Boolean(true));
    }

    #[test]
    fn test_require_has_methods() {
        let (_, _, require) = setup();
        for name in ["config", "getConfig", "reset", "getBuildInfo", "getStats"] {
            assert!(require.value().get(name).is_function(), "missing {}", name);
        }
    }

    #[test]
    fn test_entry_points_fail_before_install() {
        let state = LoaderState::new();
        let (_, require) = create_global_amd_funcs(&state).unwrap();
        let err = require.call(&[Value::from("a")]).unwrap_err();
        assert!(matches!(err, LoaderError::NotInitialized));
    }

    #[test]
    fn test_sync_require_defined_module() {
        let (_, define, require) = setup();
        define
            .call(&[
                Value::from("answer"),
                Value::string_array::<&str>(&[]),
                Value::function("factory", |_| Ok(Value::Number(42.0))),
            ])
            .unwrap();
        assert_eq!(
            require.call(&[Value::from("answer")]).unwrap(),
            Value::Number(42.0)
        );
    }

    #[test]
    fn test_sync_require_unresolved() {
        let (_, _, require) = setup();
        let err = require.call(&[Value::from("moduleId")]).unwrap_err();
        assert!(matches!(err, LoaderError::UnresolvedModule(id) if id == "moduleId"));
    }

    #[test]
    fn test_config_call_is_not_a_fetch() {
        let (_, _, require) = setup();
        let result = require
            .call(&[Value::object([("baseUrl", Value::from("x"))])])
            .unwrap();
        assert!(result.is_undefined());
        assert_eq!(require.get_config().unwrap().base_url, "x/");
    }

    #[test]
    fn test_invalid_calls() {
        let (_, _, require) = setup();
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
    fn test_get_config_is_a_snapshot() {
        let (_, _, require) = setup();
        require
            .config_value(&Value::object([("baseUrl", Value::from("a"))]), false)
            .unwrap();

        let snapshot = require.value().get("getConfig").call(&[]).unwrap();
        snapshot.set("baseUrl", Value::from("mutated")).unwrap();

        assert_eq!(require.get_config().unwrap().base_url, "a/");
    }

    #[test]
    fn test_config_method_overwrite_flag() {
        let (_, _, require) = setup();
        let config = require.value().get("config");
        config
            .call(&[Value::object([("baseUrl", Value::from("a"))])])
            .unwrap();
        config
            .call(&[
                Value::object([("urlArgs", Value::from("v=1"))]),
                Value::Boolean(true),
            ])
            .unwrap();

        let effective = require.get_config().unwrap();
        assert_eq!(effective.base_url, "");
        assert_eq!(effective.url_args, "v=1");
    }

    #[test]
    fn test_reset_swaps_manager_keeps_functions() {
        let (state, define, require) = setup();
        let before = state.manager().unwrap();

        require.value().get("reset").call(&[]).unwrap();

        let after = state.manager().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.lock().define_func(), define.value());
        assert_eq!(after.lock().require_func(), require.value());
    }

    #[test]
    fn test_get_build_info_empty_by_default() {
        let (_, define, require) = setup();
        define.call(&[Value::from("a"), Value::Null]).unwrap();
        let info = require.value().get("getBuildInfo").call(&[]).unwrap();
        assert_eq!(info, Value::Array(vec![]));
    }
}
