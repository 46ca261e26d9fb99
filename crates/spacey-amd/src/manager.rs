// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! In-memory module manager
//!
//! Keeps the module registry, the anonymous-define queue, configuration,
//! build info and the event recorder. It never runs a factory itself:
//! [`ModuleManager::next_work`] hands out one unit of work at a time and the
//! caller reports the outcome, so factories can re-enter `require` freely.

use crate::call::DEFAULT_DEPENDENCIES;
use crate::config::{Configuration, ConfigurationOptions, ShimConfig};
use crate::environment::Environment;
use crate::error::{LoaderError, Result};
use crate::events::{
    ActiveLoaderEventRecorder, LoaderEvent, LoaderEventRecorder, LoaderEventType,
    NullLoaderEventRecorder,
};
use crate::script_loader::ScriptLoader;
use crate::value::{ObjectRef, Value};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

static NEXT_ANONYMOUS_ID: AtomicUsize = AtomicUsize::new(1);

/// Describes one module for downstream bundling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildModuleInfo {
    /// Module id
    pub id: String,
    /// Script the definition came from, if known
    pub path: Option<String>,
    /// Normalized dependency ids
    pub dependencies: Vec<String>,
    /// Shim applied to the module, if any
    pub shim: Option<ShimConfig>,
}

/// Extra information attached to a definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleOptions {
    /// Script that contained the `define` call
    pub path: Option<String>,
}

#[derive(Debug, Clone)]
enum ModuleState {
    Pending,
    Running,
    Resolved(Value),
    Failed(LoaderError),
}

#[derive(Debug)]
struct ModuleRecord {
    dependencies: Vec<String>,
    factory: Value,
    errback: Option<Value>,
    exports: ObjectRef,
    state: ModuleState,
}

#[derive(Debug)]
struct AnonymousDefinition {
    dependencies: Vec<String>,
    factory: Value,
}

/// A module whose dependencies are all available
#[derive(Debug)]
pub struct ReadyModule {
    /// Module id
    pub id: String,
    /// Factory function, or the export value itself
    pub factory: Value,
    /// Resolved dependency values, in declaration order
    pub args: Vec<Value>,
}

/// A module that can no longer resolve
#[derive(Debug)]
pub struct FailedModule {
    /// Module id
    pub id: String,
    /// Error callback registered with the module
    pub errback: Option<Value>,
    /// Why it failed
    pub error: LoaderError,
}

/// One unit of work handed to the driver
#[derive(Debug)]
pub enum Work {
    /// Run the factory and report with [`ModuleManager::resolve`] or
    /// [`ModuleManager::fail`]
    Invoke(ReadyModule),
    /// Report the failure to the errback or the caller
    Fail(FailedModule),
}

/// The module manager
pub struct ModuleManager {
    env: Environment,
    script_loader: Arc<dyn ScriptLoader>,
    define_func: Value,
    require_func: Value,
    time_origin: Instant,
    config: Configuration,
    recorder: Option<Arc<ActiveLoaderEventRecorder>>,
    modules: HashMap<String, ModuleRecord>,
    definition_order: Vec<String>,
    anonymous_queue: VecDeque<AnonymousDefinition>,
    requested_scripts: HashMap<String, String>,
    failed_scripts: HashMap<String, LoaderError>,
    build_info: Vec<BuildModuleInfo>,
}

impl ModuleManager {
    /// Create a manager bound to the given entry points.
    pub fn new(
        env: Environment,
        script_loader: Arc<dyn ScriptLoader>,
        define_func: Value,
        require_func: Value,
        time_origin: Instant,
    ) -> Self {
        Self {
            env,
            script_loader,
            define_func,
            require_func,
            time_origin,
            config: Configuration::default(),
            recorder: None,
            modules: HashMap::new(),
            definition_order: Vec::new(),
            anonymous_queue: VecDeque::new(),
            requested_scripts: HashMap::new(),
            failed_scripts: HashMap::new(),
            build_info: Vec::new(),
        }
    }

    /// Fresh manager with the same environment, script loader and entry
    /// points; all other state is dropped, including in-flight scripts.
    pub fn reset(&self) -> ModuleManager {
        self.script_loader.reset();
        ModuleManager::new(
            self.env,
            Arc::clone(&self.script_loader),
            self.define_func.clone(),
            self.require_func.clone(),
            Instant::now(),
        )
    }

    /// A fresh id for an anonymous `require([...], cb)` request
    pub fn generate_anonymous_module() -> String {
        format!(
            "===anonymous{}===",
            NEXT_ANONYMOUS_ID.fetch_add(1, Ordering::Relaxed)
        )
    }

    /// The script loader handle
    pub fn script_loader(&self) -> &Arc<dyn ScriptLoader> {
        &self.script_loader
    }

    /// The `define` entry point this manager was created with
    pub fn define_func(&self) -> &Value {
        &self.define_func
    }

    /// The `require` entry point this manager was created with
    pub fn require_func(&self) -> &Value {
        &self.require_func
    }

    /// Register a module definition.
    pub fn define_module(
        &mut self,
        id: String,
        dependencies: Vec<String>,
        factory: Value,
        errback: Option<Value>,
        options: ModuleOptions,
    ) {
        if self.modules.contains_key(&id) {
            if !self.config.is_duplicate_message_ignored(&id) {
                warn!("Duplicate definition of module '{}'", id);
            }
            return;
        }

        let dependencies: Vec<String> = dependencies
            .iter()
            .map(|dep| normalize_dependency(&id, dep))
            .collect();
        debug!("Defining module {} with dependencies {:?}", id, dependencies);

        if self.config.is_build {
            self.build_info.push(BuildModuleInfo {
                id: id.clone(),
                path: options.path,
                dependencies: dependencies.clone(),
                shim: self.config.shim.get(&id).cloned(),
            });
        }

        for dep in &dependencies {
            self.request_if_unknown(dep);
        }

        self.modules.insert(
            id.clone(),
            ModuleRecord {
                dependencies,
                factory,
                errback,
                exports: ObjectRef::new(),
                state: ModuleState::Pending,
            },
        );
        self.definition_order.push(id);
    }

    /// Queue an anonymous definition until its script reports loaded.
    pub fn enqueue_define_anonymous_module(&mut self, dependencies: Vec<String>, factory: Value) {
        self.anonymous_queue.push_back(AnonymousDefinition {
            dependencies,
            factory,
        });
    }

    /// Number of anonymous definitions waiting for a script
    pub fn pending_anonymous_definitions(&self) -> usize {
        self.anonymous_queue.len()
    }

    /// The host finished loading the script requested for `module_id`.
    ///
    /// The oldest queued anonymous definition takes this id, so anonymous
    /// modules are matched in load order.
    pub fn on_script_loaded(&mut self, module_id: &str) {
        let src = self.requested_scripts.get(module_id).cloned();
        if let Some(src) = &src {
            self.script_loader.finished(src);
        }
        self.get_recorder().record(
            LoaderEventType::EndLoadingScriptOk,
            src.as_deref().unwrap_or(module_id),
        );

        if let Some(definition) = self.anonymous_queue.pop_front() {
            self.define_module(
                module_id.to_string(),
                definition.dependencies,
                definition.factory,
                None,
                ModuleOptions { path: src },
            );
        } else if !self.modules.contains_key(module_id) {
            if let Some(shim) = self.config.shim.get(module_id).cloned() {
                debug!("Applying shim for {}", module_id);
                self.define_module(
                    module_id.to_string(),
                    shim.deps,
                    Value::Undefined,
                    None,
                    ModuleOptions { path: src },
                );
            }
        }
    }

    /// The host failed to load the script requested for `module_id`.
    pub fn on_script_error(&mut self, module_id: &str, reason: &str) {
        let src = self.requested_scripts.get(module_id).cloned();
        if let Some(src) = &src {
            self.script_loader.finished(src);
        }
        self.get_recorder().record(
            LoaderEventType::EndLoadingScriptError,
            src.as_deref().unwrap_or(module_id),
        );

        let error = LoaderError::ScriptLoad {
            module: module_id.to_string(),
            reason: reason.to_string(),
        };
        match self.modules.get_mut(module_id) {
            Some(record) if matches!(record.state, ModuleState::Pending) => {
                record.state = ModuleState::Failed(error.clone());
            }
            _ => {}
        }
        self.failed_scripts.insert(module_id.to_string(), error);
    }

    /// Next module that is ready to run or has become unresolvable.
    ///
    /// The module is marked running (or failed) before it is handed out, so
    /// it is never returned twice.
    pub fn next_work(&mut self) -> Option<Work> {
        let work = self.find_work()?;
        let (id, state) = match &work {
            Work::Invoke(ready) => (ready.id.clone(), ModuleState::Running),
            Work::Fail(failed) => (failed.id.clone(), ModuleState::Failed(failed.error.clone())),
        };
        if let Some(record) = self.modules.get_mut(&id) {
            record.state = state;
        }
        Some(work)
    }

    fn find_work(&self) -> Option<Work> {
        for id in &self.definition_order {
            let Some(record) = self.modules.get(id) else {
                continue;
            };
            if !matches!(record.state, ModuleState::Pending) {
                continue;
            }

            if let Some(dependency) = record
                .dependencies
                .iter()
                .find(|dep| self.dependency_failed(dep))
            {
                return Some(Work::Fail(FailedModule {
                    id: id.clone(),
                    errback: record.errback.clone(),
                    error: LoaderError::DependencyFailed {
                        module: id.clone(),
                        dependency: dependency.clone(),
                    },
                }));
            }

            if let Some(args) = self.dependency_values(id, record) {
                return Some(Work::Invoke(ReadyModule {
                    id: id.clone(),
                    factory: record.factory.clone(),
                    args,
                }));
            }
        }
        None
    }

    /// Record a factory's result. `undefined` means "use `exports`".
    pub fn resolve(&mut self, id: &str, result: Value) {
        if let Some(record) = self.modules.get_mut(id) {
            let exports = if result.is_undefined() && record.factory.is_function() {
                Value::Object(record.exports.clone())
            } else {
                result
            };
            record.state = ModuleState::Resolved(exports);
        }
    }

    /// Record a factory failure; returns the module's errback.
    pub fn fail(&mut self, id: &str, error: LoaderError) -> Option<Value> {
        let record = self.modules.get_mut(id)?;
        record.state = ModuleState::Failed(error);
        record.errback.clone()
    }

    /// Merge (or with `overwrite`, replace) the configuration.
    pub fn configure(&mut self, options: ConfigurationOptions, overwrite: bool) {
        self.config = if overwrite {
            Configuration::from_options(options)
        } else {
            self.config.merge(options)
        };
    }

    /// Snapshot of the effective configuration
    pub fn get_config(&self) -> Configuration {
        self.config.clone()
    }

    /// Export of an already-resolved module.
    pub fn synchronous_require(&self, id: &str) -> Result<Value> {
        match self.modules.get(id).map(|record| &record.state) {
            Some(ModuleState::Resolved(exports)) => Ok(exports.clone()),
            Some(ModuleState::Failed(error)) => Err(error.clone()),
            _ => Err(LoaderError::unresolved(id)),
        }
    }

    /// Whether `id` has been defined (resolved or not)
    pub fn is_defined(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Ids of modules still waiting on dependencies, in definition order
    pub fn pending_module_ids(&self) -> Vec<String> {
        self.definition_order
            .iter()
            .filter(|id| {
                self.modules
                    .get(id.as_str())
                    .is_some_and(|record| matches!(record.state, ModuleState::Pending))
            })
            .cloned()
            .collect()
    }

    /// Build info collected while `isBuild` was on
    pub fn get_build_info(&self) -> Vec<BuildModuleInfo> {
        self.build_info.clone()
    }

    /// Events recorded since this manager was created
    pub fn get_loader_events(&self) -> Vec<LoaderEvent> {
        self.recorder
            .as_ref()
            .map(|recorder| recorder.events())
            .unwrap_or_default()
    }

    /// Recorder for new events; a null recorder while `recordStats` is off.
    pub fn get_recorder(&mut self) -> Arc<dyn LoaderEventRecorder> {
        if let Some(recorder) = &self.recorder {
            return Arc::clone(recorder) as Arc<dyn LoaderEventRecorder>;
        }
        if !self.config.record_stats {
            return Arc::new(NullLoaderEventRecorder);
        }
        let recorder = Arc::new(ActiveLoaderEventRecorder::new(self.time_origin));
        self.recorder = Some(Arc::clone(&recorder));
        recorder
    }

    fn request_if_unknown(&mut self, dep: &str) {
        if DEFAULT_DEPENDENCIES.contains(&dep)
            || self.modules.contains_key(dep)
            || self.requested_scripts.contains_key(dep)
        {
            return;
        }

        let Some(src) = self.config.module_id_to_paths(dep).into_iter().next() else {
            return;
        };
        self.get_recorder()
            .record(LoaderEventType::BeginLoadingScript, &src);
        self.script_loader.load(&self.config, &src, dep);
        self.requested_scripts.insert(dep.to_string(), src);
    }

    fn dependency_failed(&self, dep: &str) -> bool {
        match self.modules.get(dep) {
            Some(record) => matches!(record.state, ModuleState::Failed(_)),
            None => self.failed_scripts.contains_key(dep),
        }
    }

    fn dependency_values(&self, id: &str, record: &ModuleRecord) -> Option<Vec<Value>> {
        record
            .dependencies
            .iter()
            .map(|dep| match dep.as_str() {
                "require" => Some(self.require_func.clone()),
                "exports" => Some(Value::Object(record.exports.clone())),
                "module" => Some(self.module_object(id, record)),
                other => match &self.modules.get(other)?.state {
                    ModuleState::Resolved(exports) => Some(exports.clone()),
                    _ => None,
                },
            })
            .collect()
    }

    fn module_object(&self, id: &str, record: &ModuleRecord) -> Value {
        let module_config = Value::from_json(self.config.config_for_module(id));
        Value::object([
            ("id", Value::from(id)),
            ("exports", Value::Object(record.exports.clone())),
            (
                "config",
                Value::function("config", move |_| Ok(module_config.clone())),
            ),
        ])
    }
}

/// Resolve `./` and `../` segments of `dep` against the directory of `parent`.
fn normalize_dependency(parent: &str, dep: &str) -> String {
    if !(dep.starts_with("./") || dep.starts_with("../")) {
        return dep.to_string();
    }

    let mut segments: Vec<&str> = parent.split('/').collect();
    segments.pop();
    for part in dep.split('/') {
        match part {
            "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
