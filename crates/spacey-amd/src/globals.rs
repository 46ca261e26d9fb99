// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host global scope
//!
//! The bootstrap reads and writes a handful of well-known globals:
//! - `define` / `require` - the AMD entry points
//! - `doNotInitLoader` - suppresses automatic initialization
//! - `module` - CommonJS module object of a Node-hosted bootstrap
//! - `process`, `importScripts`, `navigator` - environment probes
//! - `nodeRequire` - the instrumented native require

use crate::value::{ObjectRef, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Global `define` binding
pub const DEFINE: &str = "define";
/// Global `require` binding
pub const REQUIRE: &str = "require";
/// Flag that suppresses automatic initialization when bound
pub const DO_NOT_INIT_LOADER: &str = "doNotInitLoader";
/// Global binding for the instrumented native require
pub const NODE_REQUIRE: &str = "nodeRequire";
/// Property of `require` exposing native require to browser-like hosts
pub const QUALIFIED_NODE_REQUIRE: &str = "__$__nodeRequire";
/// CommonJS module object
pub const MODULE: &str = "module";
/// Node `process` object
pub const PROCESS: &str = "process";
/// Web worker `importScripts`
pub const IMPORT_SCRIPTS: &str = "importScripts";
/// Browser `navigator` object
pub const NAVIGATOR: &str = "navigator";

/// The host's global object, as seen by the loader.
#[derive(Debug, Default)]
pub struct GlobalScope {
    bindings: RwLock<BTreeMap<String, Value>>,
}

impl GlobalScope {
    /// Create an empty global scope
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A plain browser page
    pub fn browser() -> Arc<Self> {
        let scope = Self::new();
        scope.set(
            NAVIGATOR,
            Value::object([("userAgent", Value::from(default_user_agent()))]),
        );
        scope
    }

    /// A web worker (browser-like, `importScripts` present)
    pub fn web_worker() -> Arc<Self> {
        let scope = Self::browser();
        scope.set(
            IMPORT_SCRIPTS,
            Value::function("importScripts", |_| Ok(Value::Undefined)),
        );
        scope
    }

    /// A Node-hosted process whose native require is `native_require`
    pub fn node(native_require: Value) -> Arc<Self> {
        let scope = Self::new();
        scope.set(PROCESS, process_object(None));
        scope.set(
            MODULE,
            Value::object([("exports", Value::Object(ObjectRef::new()))]),
        );
        scope.set(REQUIRE, native_require);
        scope
    }

    /// An Electron renderer with node integration
    pub fn electron_renderer(native_require: Value) -> Arc<Self> {
        let scope = Self::node(native_require);
        scope.set(PROCESS, process_object(Some("renderer")));
        scope.set(
            NAVIGATOR,
            Value::object([("userAgent", Value::from(default_user_agent()))]),
        );
        scope
    }

    /// Get a global, `undefined` when unbound
    pub fn get(&self, name: &str) -> Value {
        self.bindings.read().get(name).cloned().unwrap_or_default()
    }

    /// Bind a global
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.bindings.write().insert(name.into(), value);
    }
}

/// Build a `process` object; `electron_type` adds Electron version info
fn process_object(electron_type: Option<&str>) -> Value {
    let versions = ObjectRef::new();
    versions.set("node", Value::from("20.0.0"));

    let process = ObjectRef::new();
    process.set("platform", Value::from(get_platform()));

    if let Some(kind) = electron_type {
        versions.set("electron", Value::from("33.0.0"));
        process.set("type", Value::from(kind));
    }
    process.set("versions", Value::Object(versions));
    Value::Object(process)
}

fn default_user_agent() -> &'static str {
    if cfg!(windows) {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Spacey"
    } else {
        "Mozilla/5.0 (X11; Linux x86_64) Spacey"
    }
}

/// Node-style platform name for the current OS
fn get_platform() -> &'static str {
    match std::env::consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        other => other,
    }
}
