// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The live module manager handle.
//!
//! `LoaderState` is created empty when the entry points are built, receives
//! its module manager during bootstrap, has it swapped by `require.reset()`
//! and is never torn down: the entry points it backs live as long as the
//! host's globals do.
//!
//! Locks are only held for bookkeeping. Factories, errbacks and the native
//! require always run with every lock released.

use crate::call::{DefineCall, RequireCall};
use crate::config::ConfigurationOptions;
use crate::error::{LoaderError, Result};
use crate::events::LoaderEventType;
use crate::manager::{ModuleManager, ModuleOptions, ReadyModule, Work};
use crate::script_loader::ScriptRequest;
use crate::value::Value;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared handle to the module manager
pub type SharedManager = Arc<Mutex<ModuleManager>>;

/// Process-wide loader state behind `define` and `require`
#[derive(Default)]
pub struct LoaderState {
    live: RwLock<Option<SharedManager>>,
}

impl LoaderState {
    /// Create an empty state; entry points fail until a manager is installed
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install the first module manager
    pub fn install(&self, manager: ModuleManager) {
        *self.live.write() = Some(Arc::new(Mutex::new(manager)));
    }

    /// The live manager
    pub fn manager(&self) -> Result<SharedManager> {
        self.live.read().clone().ok_or(LoaderError::NotInitialized)
    }

    /// Run `f` against the live manager while holding its lock
    pub fn with_manager<T>(&self, f: impl FnOnce(&mut ModuleManager) -> T) -> Result<T> {
        let manager = self.manager()?;
        let mut guard = manager.lock();
        Ok(f(&mut guard))
    }

    /// Swap the live manager for a fresh one
    pub fn reset(&self) -> Result<()> {
        let mut live = self.live.write();
        let current = live.as_ref().ok_or(LoaderError::NotInitialized)?;
        let fresh = current.lock().reset();
        *live = Some(Arc::new(Mutex::new(fresh)));
        debug!("Module manager reset");
        Ok(())
    }

    /// Record an event on whichever manager is live now
    pub fn record(&self, kind: LoaderEventType, detail: &str) {
        if let Ok(recorder) = self.with_manager(|m| m.get_recorder()) {
            recorder.record(kind, detail);
        }
    }

    /// Dispatch a classified `define` call
    pub fn define(&self, call: DefineCall) -> Result<()> {
        self.with_manager(|m| match call {
            DefineCall::Named {
                id,
                dependencies,
                factory,
            } => m.define_module(id, dependencies, factory, None, ModuleOptions::default()),
            DefineCall::Anonymous {
                dependencies,
                factory,
            } => m.enqueue_define_anonymous_module(dependencies, factory),
        })?;
        self.pump()
    }

    /// Dispatch a classified `require` call
    pub fn require(&self, call: RequireCall) -> Result<Value> {
        match call {
            RequireCall::Config(options) => {
                self.configure_value(&options, false)?;
                Ok(Value::Undefined)
            }
            RequireCall::Sync(id) => self.with_manager(|m| m.synchronous_require(&id))?,
            RequireCall::Async {
                dependencies,
                callback,
                errback,
            } => {
                let id = ModuleManager::generate_anonymous_module();
                self.with_manager(|m| {
                    m.define_module(id, dependencies, callback, errback, ModuleOptions::default())
                })?;
                self.pump()?;
                Ok(Value::Undefined)
            }
            RequireCall::Invalid => Err(LoaderError::UnrecognizedRequireCall),
        }
    }

    /// Apply typed configuration options
    pub fn configure(&self, options: ConfigurationOptions, overwrite: bool) -> Result<()> {
        self.with_manager(|m| m.configure(options, overwrite))
    }

    /// Apply a JavaScript object as configuration options
    pub fn configure_value(&self, options: &Value, overwrite: bool) -> Result<()> {
        self.configure(ConfigurationOptions::from_value(options), overwrite)
    }

    /// Drain script requests for the host
    pub fn take_script_requests(&self) -> Result<Vec<ScriptRequest>> {
        self.with_manager(|m| m.script_loader().take_requests())
    }

    /// The host loaded the script for `module_id`
    pub fn script_loaded(&self, module_id: &str) -> Result<()> {
        self.with_manager(|m| m.on_script_loaded(module_id))?;
        self.pump()
    }

    /// The host failed to load the script for `module_id`
    pub fn script_failed(&self, module_id: &str, reason: &str) -> Result<()> {
        self.with_manager(|m| m.on_script_error(module_id, reason))?;
        self.pump()
    }

    /// Run every factory whose dependencies are satisfied.
    ///
    /// All available work is drained even when a module fails; the first
    /// failure without an errback is returned afterwards.
    pub fn pump(&self) -> Result<()> {
        let mut first_error = None;
        loop {
            let manager = self.manager()?;
            let work = manager.lock().next_work();
            let Some(work) = work else {
                break;
            };

            let outcome = match work {
                Work::Invoke(ready) => match self.invoke(&manager, &ready) {
                    Ok(result) => {
                        manager.lock().resolve(&ready.id, result);
                        Ok(())
                    }
                    Err(error) => {
                        let (errback, catch_error) = {
                            let mut guard = manager.lock();
                            let errback = guard.fail(&ready.id, error.clone());
                            (errback, guard.get_config().catch_error)
                        };
                        report_failure(&ready.id, errback, error, catch_error)
                    }
                },
                Work::Fail(failed) => {
                    report_failure(&failed.id, failed.errback, failed.error, false)
                }
            };

            if let Err(error) = outcome {
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn invoke(&self, manager: &SharedManager, ready: &ReadyModule) -> Result<Value> {
        if !ready.factory.is_function() {
            return Ok(ready.factory.clone());
        }

        let recorder = manager.lock().get_recorder();
        recorder.record(LoaderEventType::BeginInvokeFactory, &ready.id);
        let result = ready.factory.call(&ready.args);
        recorder.record(LoaderEventType::EndInvokeFactory, &ready.id);
        result
    }
}

fn report_failure(
    id: &str,
    errback: Option<Value>,
    error: LoaderError,
    catch_error: bool,
) -> Result<()> {
    match errback {
        Some(errback) => {
            errback.call(&[Value::from(error.to_string())])?;
            Ok(())
        }
        None if catch_error => {
            warn!("Module {} failed: {}", id, error);
            Ok(())
        }
        None => Err(error),
    }
}
