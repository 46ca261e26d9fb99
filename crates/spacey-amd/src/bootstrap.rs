// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! One-time loader bootstrap.
//!
//! `init` builds the entry points, detects the host, creates the module
//! manager and then wires globals according to a [`WiringStrategy`]:
//!
//! | Strategy | `define` | `require` | native require |
//! |----------|----------|-----------|----------------|
//! | `NodeModuleExport` | local alias only | `module.exports` | global `nodeRequire` |
//! | `ElectronRendererGlobal` | global, forwarding closure | global | `require.__$__nodeRequire` |
//! | `BrowserGlobal` | global | global | none |

use crate::environment::Environment;
use crate::error::Result;
use crate::factory::{DefineFunc, RequireFunc, create_global_amd_funcs};
use crate::globals::{
    DEFINE, DO_NOT_INIT_LOADER, GlobalScope, MODULE, NODE_REQUIRE, QUALIFIED_NODE_REQUIRE, REQUIRE,
};
use crate::interceptor::NativeRequireInterceptor;
use crate::manager::ModuleManager;
use crate::script_loader::{ScriptRequest, create_script_loader};
use crate::state::LoaderState;
use crate::value::Value;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// How the entry points are exposed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WiringStrategy {
    /// Node process: `require` becomes this module's export
    NodeModuleExport,
    /// Electron renderer: browser-style globals, `define` forwarded
    ElectronRendererGlobal,
    /// Browser or web worker: plain globals
    BrowserGlobal,
}

impl WiringStrategy {
    /// Pick the strategy for an environment
    pub fn for_environment(env: &Environment) -> Self {
        if env.is_node && !env.is_electron_renderer {
            WiringStrategy::NodeModuleExport
        } else if env.is_electron_renderer {
            WiringStrategy::ElectronRendererGlobal
        } else {
            WiringStrategy::BrowserGlobal
        }
    }
}

/// An initialized loader
pub struct Loader {
    env: Environment,
    strategy: WiringStrategy,
    state: Arc<LoaderState>,
    define_func: DefineFunc,
    require_func: RequireFunc,
    define: Value,
    node_require: Option<NativeRequireInterceptor>,
}

impl Loader {
    /// Detected environment
    pub fn environment(&self) -> Environment {
        self.env
    }

    /// Strategy used to wire globals
    pub fn strategy(&self) -> WiringStrategy {
        self.strategy
    }

    /// `define` as this bootstrap bound it (may be a forwarding alias)
    pub fn define(&self) -> &Value {
        &self.define
    }

    /// The factory's `define`
    pub fn define_func(&self) -> &DefineFunc {
        &self.define_func
    }

    /// The factory's `require`
    pub fn require_func(&self) -> &RequireFunc {
        &self.require_func
    }

    /// Instrumented native require, in Node-hosted environments
    pub fn node_require(&self) -> Option<&NativeRequireInterceptor> {
        self.node_require.as_ref()
    }

    /// Shared loader state
    pub fn state(&self) -> &Arc<LoaderState> {
        &self.state
    }

    /// Scripts the host should fetch next
    pub fn take_script_requests(&self) -> Result<Vec<ScriptRequest>> {
        self.state.take_script_requests()
    }

    /// Report that the script for `module_id` has been evaluated
    pub fn script_loaded(&self, module_id: &str) -> Result<()> {
        self.state.script_loaded(module_id)
    }

    /// Report that the script for `module_id` could not be loaded
    pub fn script_failed(&self, module_id: &str, reason: &str) -> Result<()> {
        self.state.script_failed(module_id, reason)
    }
}

/// Bootstrap lifecycle
pub enum BootstrapState {
    /// `init` has not run
    Uninitialized,
    /// `init` is running
    Initializing,
    /// `init` completed
    Initialized(Box<Loader>),
}

/// Drives loader initialization against one global scope
pub struct Bootstrap {
    globals: Arc<GlobalScope>,
    state: BootstrapState,
}

impl Bootstrap {
    /// Create a bootstrap for `globals`
    pub fn new(globals: Arc<GlobalScope>) -> Self {
        Self {
            globals,
            state: BootstrapState::Uninitialized,
        }
    }

    /// False when initialization is suppressed or another AMD loader owns
    /// the global `define`.
    pub fn should_auto_init(globals: &GlobalScope) -> bool {
        if !globals.get(DO_NOT_INIT_LOADER).is_undefined() {
            return false;
        }
        let define = globals.get(DEFINE);
        !(define.is_function() && define.get("amd").to_boolean())
    }

    /// Initialize unless [`Bootstrap::should_auto_init`] says otherwise.
    pub fn auto_init(&mut self) -> Result<Option<&Loader>> {
        if matches!(self.state, BootstrapState::Uninitialized)
            && !Self::should_auto_init(&self.globals)
        {
            debug!("Skipping AMD loader initialization");
            return Ok(None);
        }
        self.init().map(Some)
    }

    /// Initialize the loader. Runs at most once per bootstrap; later calls
    /// return the existing loader.
    pub fn init(&mut self) -> Result<&Loader> {
        if matches!(self.state, BootstrapState::Uninitialized) {
            self.state = BootstrapState::Initializing;
            match self.initialize() {
                Ok(loader) => self.state = BootstrapState::Initialized(Box::new(loader)),
                Err(err) => {
                    self.state = BootstrapState::Uninitialized;
                    return Err(err);
                }
            }
        }

        match &self.state {
            BootstrapState::Initialized(loader) => Ok(loader.as_ref()),
            _ => unreachable!("bootstrap left in an intermediate state"),
        }
    }

    /// The loader, once initialized
    pub fn loader(&self) -> Option<&Loader> {
        match &self.state {
            BootstrapState::Initialized(loader) => Some(loader.as_ref()),
            _ => None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    fn initialize(&self) -> Result<Loader> {
        let native_require = Some(self.globals.get(REQUIRE)).filter(Value::is_function);

        let state = LoaderState::new();
        let (define_func, require_func) = create_global_amd_funcs(&state)?;

        let env = Environment::detect(&self.globals);
        let script_loader = create_script_loader(env);
        state.install(ModuleManager::new(
            env,
            script_loader,
            define_func.value().clone(),
            require_func.value().clone(),
            Instant::now(),
        ));

        let strategy = WiringStrategy::for_environment(&env);
        debug!("Initializing AMD loader: {:?} ({:?})", strategy, env);

        let node_require = native_require
            .filter(|_| env.is_node)
            .map(|native| NativeRequireInterceptor::new(native, Arc::clone(&state)));

        let define = match strategy {
            WiringStrategy::NodeModuleExport => {
                self.wire_node(&define_func, &require_func, node_require.as_ref())?
            }
            WiringStrategy::ElectronRendererGlobal | WiringStrategy::BrowserGlobal => self
                .wire_globals(
                    strategy,
                    &define_func,
                    &require_func,
                    node_require.as_ref(),
                )?,
        };

        Ok(Loader {
            env,
            strategy,
            state,
            define_func,
            require_func,
            define,
            node_require,
        })
    }

    fn wire_node(
        &self,
        define: &DefineFunc,
        require: &RequireFunc,
        node_require: Option<&NativeRequireInterceptor>,
    ) -> Result<Value> {
        if let Some(interceptor) = node_require {
            let value = interceptor.to_value();
            self.globals.set(NODE_REQUIRE, value.clone());
            require.value().set("nodeRequire", value)?;
        }

        self.globals
            .get(MODULE)
            .set("exports", require.value().clone())?;

        forwarding_define(define, false)
    }

    fn wire_globals(
        &self,
        strategy: WiringStrategy,
        define: &DefineFunc,
        require: &RequireFunc,
        node_require: Option<&NativeRequireInterceptor>,
    ) -> Result<Value> {
        let preset = self.globals.get(REQUIRE);
        if !preset.is_nullish() && !preset.is_function() {
            debug!("Applying configuration from global require");
            require.config_value(&preset, false)?;
        }

        let binding = match strategy {
            WiringStrategy::ElectronRendererGlobal => forwarding_define(define, true)?,
            _ => define.value().clone(),
        };
        self.globals.set(DEFINE, binding.clone());
        self.globals.set(REQUIRE, require.value().clone());

        if let Some(interceptor) = node_require {
            let value = interceptor.to_value();
            self.globals.set(NODE_REQUIRE, value.clone());
            require.value().set("nodeRequire", value.clone())?;
            require.value().set(QUALIFIED_NODE_REQUIRE, value)?;
        }

        Ok(binding)
    }
}

/// A closure that forwards every argument to the factory's `define`.
/// With `keep_marker`, the `amd` marker is copied so the re-initialization
/// guard still recognizes it.
fn forwarding_define(define: &DefineFunc, keep_marker: bool) -> Result<Value> {
    let target = define.clone();
    let alias = Value::function("define", move |args| {
        target.call(args)?;
        Ok(Value::Undefined)
    });
    if keep_marker {
        alias.set("amd", define.value().get("amd"))?;
    }
    Ok(alias)
}
