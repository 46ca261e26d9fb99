// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration.
//!
//! Callers hand in [`ConfigurationOptions`], where every field is optional.
//! The module manager folds them into an effective [`Configuration`]:
//! `paths`, `shim` and `config` merge key by key, `ignoreDuplicateModules`
//! accumulates, every other option replaces the previous value.

use crate::error::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A `paths` entry: one location or an ordered list of fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathsEntry {
    /// A single location
    One(String),
    /// Fallback locations, tried in order
    Many(Vec<String>),
}

impl PathsEntry {
    fn into_vec(self) -> Vec<String> {
        match self {
            PathsEntry::One(path) => vec![path],
            PathsEntry::Many(paths) => paths,
        }
    }
}

/// Shim for a non-AMD script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Scripts that must load first
    pub deps: Vec<String>,
    /// Global the script leaves behind
    pub exports: Option<String>,
}

/// Options as supplied to `require.config(...)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigurationOptions {
    /// Prefix prepended to relative script locations
    pub base_url: Option<String>,
    /// Module id prefix to location mappings
    pub paths: Option<BTreeMap<String, PathsEntry>>,
    /// Shims for scripts that do not call `define`
    pub shim: Option<BTreeMap<String, ShimConfig>>,
    /// Per-module configuration, exposed through `module.config()`
    pub config: Option<BTreeMap<String, serde_json::Value>>,
    /// Query string appended to every script URL
    pub url_args: Option<String>,
    /// Record loader events for `require.getStats()`
    pub record_stats: Option<bool>,
    /// Track build module info for `require.getBuildInfo()`
    pub is_build: Option<bool>,
    /// Report factory errors to errbacks instead of propagating
    pub catch_error: Option<bool>,
    /// Modules whose duplicate definitions are expected
    pub ignore_duplicate_modules: Option<Vec<String>>,
    /// Modules that must come from the host's native require
    pub node_modules: Option<Vec<String>>,
    /// In an Electron renderer, load scripts with script tags
    pub prefer_script_tags: Option<bool>,
}

impl ConfigurationOptions {
    /// Interpret a JavaScript object as configuration options.
    ///
    /// Options of the wrong type are dropped with a warning and keep their
    /// defaults; anything that is not an object yields no options at all.
    pub fn from_value(value: &Value) -> Self {
        let serde_json::Value::Object(entries) = value.to_json() else {
            warn!("Ignoring loader configuration of type {}", value.type_of());
            return Self::default();
        };

        let mut accepted = serde_json::Map::new();
        for (key, entry) in entries {
            let single = serde_json::Map::from_iter([(key.clone(), entry.clone())]);
            match serde_json::from_value::<Self>(serde_json::Value::Object(single)) {
                Ok(_) => {
                    accepted.insert(key, entry);
                }
                Err(err) => warn!("Ignoring loader option '{}': {}", key, err),
            }
        }
        serde_json::from_value(serde_json::Value::Object(accepted)).unwrap_or_default()
    }
}

/// Effective configuration held by the module manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Configuration {
    /// Prefix for relative locations, always empty or ending in `/`
    pub base_url: String,
    /// Prefix mappings
    pub paths: BTreeMap<String, Vec<String>>,
    /// Shims
    pub shim: BTreeMap<String, ShimConfig>,
    /// Per-module configuration
    pub config: BTreeMap<String, serde_json::Value>,
    /// Query string appended to script URLs
    pub url_args: String,
    /// Whether loader events are recorded
    pub record_stats: bool,
    /// Whether build info is tracked
    pub is_build: bool,
    /// Whether factory errors go to errbacks
    pub catch_error: bool,
    /// Modules allowed to be defined twice
    pub ignore_duplicate_modules: Vec<String>,
    /// Modules served by native require
    pub node_modules: Vec<String>,
    /// Prefer script tags in Electron renderers
    pub prefer_script_tags: bool,
}

impl Configuration {
    /// Effective configuration built from defaults and `options`.
    pub fn from_options(options: ConfigurationOptions) -> Self {
        Self::default().merge(options)
    }

    /// Fold `options` over this configuration.
    pub fn merge(&self, options: ConfigurationOptions) -> Self {
        let mut merged = self.clone();

        if let Some(base_url) = options.base_url {
            merged.base_url = normalize_base_url(base_url);
        }
        if let Some(paths) = options.paths {
            for (prefix, entry) in paths {
                merged.paths.insert(prefix, entry.into_vec());
            }
        }
        if let Some(shim) = options.shim {
            merged.shim.extend(shim);
        }
        if let Some(config) = options.config {
            merged.config.extend(config);
        }
        if let Some(url_args) = options.url_args {
            merged.url_args = url_args;
        }
        if let Some(record_stats) = options.record_stats {
            merged.record_stats = record_stats;
        }
        if let Some(is_build) = options.is_build {
            merged.is_build = is_build;
        }
        if let Some(catch_error) = options.catch_error {
            merged.catch_error = catch_error;
        }
        if let Some(ignored) = options.ignore_duplicate_modules {
            merged.ignore_duplicate_modules.extend(ignored);
        }
        if let Some(node_modules) = options.node_modules {
            merged.node_modules = node_modules;
        }
        if let Some(prefer) = options.prefer_script_tags {
            merged.prefer_script_tags = prefer;
        }

        merged
    }

    /// Whether a duplicate definition of `module_id` is expected.
    pub fn is_duplicate_message_ignored(&self, module_id: &str) -> bool {
        self.ignore_duplicate_modules.iter().any(|m| m == module_id)
    }

    /// Per-module configuration for `module_id` (`{}` when absent).
    pub fn config_for_module(&self, module_id: &str) -> serde_json::Value {
        self.config
            .get(module_id)
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()))
    }

    /// Candidate script URLs for `module_id`, in fallback order.
    pub fn module_id_to_paths(&self, module_id: &str) -> Vec<String> {
        if self.node_modules.iter().any(|m| m == module_id) {
            return if self.is_build {
                vec!["empty:".to_string()]
            } else {
                vec![format!("node|{}", module_id)]
            };
        }

        let results = if !module_id.ends_with(".js") && !is_absolute_path(module_id) {
            self.apply_paths(module_id)
                .into_iter()
                .filter(|path| !(self.is_build && path == "empty:"))
                .map(|path| {
                    let path = if is_absolute_path(&path) {
                        path
                    } else {
                        format!("{}{}", self.base_url, path)
                    };
                    with_js_extension(path)
                })
                .collect()
        } else {
            vec![with_js_extension(module_id.to_string())]
        };

        results
            .into_iter()
            .map(|url| self.add_url_args(url))
            .collect()
    }

    /// Snapshot as a JavaScript object.
    pub fn to_value(&self) -> Result<Value> {
        Ok(Value::from_json(serde_json::to_value(self)?))
    }

    fn apply_paths(&self, module_id: &str) -> Vec<String> {
        let best = self
            .paths
            .iter()
            .filter(|(prefix, _)| module_id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());

        match best {
            Some((prefix, targets)) => targets
                .iter()
                .map(|target| format!("{}{}", target, &module_id[prefix.len()..]))
                .collect(),
            None => vec![module_id.to_string()],
        }
    }

    fn add_url_args(&self, url: String) -> String {
        if self.url_args.is_empty() {
            return url;
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, self.url_args)
    }
}

fn normalize_base_url(base_url: String) -> String {
    if base_url.is_empty() || base_url.ends_with('/') {
        base_url
    } else {
        format!("{}/", base_url)
    }
}

fn is_absolute_path(url: &str) -> bool {
    ["http://", "https://", "file://", "/"]
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

fn with_js_extension(path: String) -> String {
    if path.ends_with(".js") || path.contains('?') {
        path
    } else {
        format!("{}.js", path)
    }
}
