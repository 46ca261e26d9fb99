// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Instrumented native require for Node-hosted loaders

use crate::error::Result;
use crate::events::LoaderEventType;
use crate::state::LoaderState;
use crate::value::Value;
use std::sync::Arc;
use tracing::trace;

/// Wraps the host's native `require` with begin/end loader events.
#[derive(Clone)]
pub struct NativeRequireInterceptor {
    native: Value,
    state: Arc<LoaderState>,
}

/// Records the end event when dropped, so it fires on every exit path.
struct EndEventGuard<'a> {
    state: &'a LoaderState,
    detail: String,
}

impl Drop for EndEventGuard<'_> {
    fn drop(&mut self) {
        self.state
            .record(LoaderEventType::NodeEndNativeRequire, &self.detail);
    }
}

impl NativeRequireInterceptor {
    /// Wrap `native`, recording on the live manager of `state`
    pub fn new(native: Value, state: Arc<LoaderState>) -> Self {
        Self { native, state }
    }

    /// Forward `args` to the native require; the result or error is
    /// returned unchanged.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let detail = args.first().map(Value::to_string).unwrap_or_default();
        trace!("Native require {}", detail);

        self.state
            .record(LoaderEventType::NodeBeginNativeRequire, &detail);
        let _end = EndEventGuard {
            state: &self.state,
            detail,
        };
        self.native.call(args)
    }

    /// `nodeRequire(path)`
    pub fn require(&self, path: &str) -> Result<Value> {
        self.call(&[Value::from(path)])
    }

    /// The function value installed as `nodeRequire`
    pub fn to_value(&self) -> Value {
        let this = self.clone();
        Value::function("nodeRequire", move |args| this.call(args))
    }
}
