// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Classification of `define` / `require` call shapes.
//!
//! Both entry points accept loosely-typed positional arguments. Each call is
//! normalized into one variant here before anything touches the module
//! manager; the rules are order-sensitive.

use crate::value::Value;

/// Dependencies injected when `define` is given none
pub const DEFAULT_DEPENDENCIES: [&str; 3] = ["require", "exports", "module"];

/// A normalized `define(id?, dependencies?, factory)` call
#[derive(Debug, Clone, PartialEq)]
pub enum DefineCall {
    /// Explicit module id; registered immediately
    Named {
        /// Module id
        id: String,
        /// Dependency ids
        dependencies: Vec<String>,
        /// Factory function or export value
        factory: Value,
    },
    /// No id; the id comes from the script that is loading
    Anonymous {
        /// Dependency ids
        dependencies: Vec<String>,
        /// Factory function or export value
        factory: Value,
    },
}

impl DefineCall {
    /// Normalize positional `define` arguments.
    pub fn classify(args: &[Value]) -> Self {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        let (mut id, mut dependencies, mut factory) = (arg(0), arg(1), arg(2));

        if !id.is_string() {
            factory = dependencies;
            dependencies = id;
            id = Value::Undefined;
        }
        if !dependencies.is_array() {
            factory = dependencies;
            dependencies = Value::Undefined;
        }

        let dependencies = match dependencies.as_array() {
            Some(items) => dependency_ids(items),
            None => DEFAULT_DEPENDENCIES.iter().map(|d| d.to_string()).collect(),
        };

        match id {
            Value::String(id) if !id.is_empty() => DefineCall::Named {
                id,
                dependencies,
                factory,
            },
            _ => DefineCall::Anonymous {
                dependencies,
                factory,
            },
        }
    }

    /// The module id, when named
    pub fn id(&self) -> Option<&str> {
        match self {
            DefineCall::Named { id, .. } => Some(id),
            DefineCall::Anonymous { .. } => None,
        }
    }

    /// The normalized dependency list
    pub fn dependencies(&self) -> &[String] {
        match self {
            DefineCall::Named { dependencies, .. } | DefineCall::Anonymous { dependencies, .. } => {
                dependencies
            }
        }
    }

    /// The factory argument
    pub fn factory(&self) -> &Value {
        match self {
            DefineCall::Named { factory, .. } | DefineCall::Anonymous { factory, .. } => factory,
        }
    }
}

/// A classified `require(...)` call
#[derive(Debug, Clone, PartialEq)]
pub enum RequireCall {
    /// `require({ ... })`
    Config(Value),
    /// `require("id")`
    Sync(String),
    /// `require([deps], callback, errback?)`
    Async {
        /// Dependency ids
        dependencies: Vec<String>,
        /// Receives the resolved dependencies
        callback: Value,
        /// Receives the failure, when given
        errback: Option<Value>,
    },
    /// Anything else
    Invalid,
}

impl RequireCall {
    /// Classify positional `require` arguments.
    pub fn classify(args: &[Value]) -> Self {
        match args {
            [Value::Object(_)] => RequireCall::Config(args[0].clone()),
            [Value::String(id)] => RequireCall::Sync(id.clone()),
            [Value::Array(deps), callback, rest @ ..] if rest.len() <= 1 => RequireCall::Async {
                dependencies: dependency_ids(deps),
                callback: callback.clone(),
                errback: rest.first().filter(|e| !e.is_undefined()).cloned(),
            },
            _ => RequireCall::Invalid,
        }
    }
}

fn dependency_ids(items: &[Value]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
