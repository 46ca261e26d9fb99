// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script loading handle.
//!
//! The loader never fetches or evaluates source text itself. It queues
//! [`ScriptRequest`]s that the host drains, fetches with whatever mechanism
//! the environment offers, and reports back through the loader.

use crate::config::Configuration;
use crate::environment::Environment;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// How the host should fetch a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptLoaderKind {
    /// `<script>` tag injection
    Browser,
    /// Read and evaluate through the Node host
    Node,
    /// `importScripts`
    WebWorker,
}

impl ScriptLoaderKind {
    /// Pick the strategy for an environment
    pub fn select(env: &Environment, config: &Configuration) -> Self {
        if env.is_web_worker {
            ScriptLoaderKind::WebWorker
        } else if env.is_electron_renderer {
            if config.prefer_script_tags {
                ScriptLoaderKind::Browser
            } else {
                ScriptLoaderKind::Node
            }
        } else if env.is_node {
            ScriptLoaderKind::Node
        } else {
            ScriptLoaderKind::Browser
        }
    }
}

/// A script the host must load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequest {
    /// Script URL
    pub src: String,
    /// Module whose definition the script is expected to contain
    pub module_id: String,
    /// Fetch strategy
    pub kind: ScriptLoaderKind,
}

/// Handle the module manager uses to ask for scripts
pub trait ScriptLoader: Send + Sync {
    /// Request `src` on behalf of `module_id`
    fn load(&self, config: &Configuration, src: &str, module_id: &str);

    /// Drain the requests not yet handed to the host
    fn take_requests(&self) -> Vec<ScriptRequest>;

    /// The host finished with `src`, successfully or not
    fn finished(&self, src: &str);

    /// Forget every in-flight and queued request
    fn reset(&self);
}

/// Loader that never has the same URL in flight twice.
///
/// A URL can be requested again once the host reports it finished. The
/// fetch strategy is chosen on first use, so configuration applied
/// after bootstrap (`preferScriptTags`) still takes effect.
pub struct OnlyOnceScriptLoader {
    env: Environment,
    kind: Mutex<Option<ScriptLoaderKind>>,
    in_flight: Mutex<HashSet<String>>,
    queue: Mutex<Vec<ScriptRequest>>,
}

impl OnlyOnceScriptLoader {
    /// Create a loader for `env`
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            kind: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
            queue: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptLoader for OnlyOnceScriptLoader {
    fn load(&self, config: &Configuration, src: &str, module_id: &str) {
        if !self.in_flight.lock().insert(src.to_string()) {
            debug!("Script {} already in flight", src);
            return;
        }

        let kind = *self
            .kind
            .lock()
            .get_or_insert_with(|| ScriptLoaderKind::select(&self.env, config));

        debug!("Requesting script {} for module {} ({:?})", src, module_id, kind);
        self.queue.lock().push(ScriptRequest {
            src: src.to_string(),
            module_id: module_id.to_string(),
            kind,
        });
    }

    fn take_requests(&self) -> Vec<ScriptRequest> {
        std::mem::take(&mut *self.queue.lock())
    }

    fn finished(&self, src: &str) {
        self.in_flight.lock().remove(src);
    }

    fn reset(&self) {
        self.in_flight.lock().clear();
        self.queue.lock().clear();
    }
}

/// Create the script loader for a detected environment
pub fn create_script_loader(env: Environment) -> Arc<dyn ScriptLoader> {
    Arc::new(OnlyOnceScriptLoader::new(env))
}
