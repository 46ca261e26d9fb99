// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader events and recorders

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Kind of a loader event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoaderEventType {
    /// A script load was requested
    BeginLoadingScript,
    /// A requested script finished loading
    EndLoadingScriptOk,
    /// A requested script failed to load
    EndLoadingScriptError,
    /// A module factory is about to run
    BeginInvokeFactory,
    /// A module factory returned
    EndInvokeFactory,
    /// The host's native require was entered
    NodeBeginNativeRequire,
    /// The host's native require returned or failed
    NodeEndNativeRequire,
}

impl fmt::Display for LoaderEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeginLoadingScript => "BeginLoadingScript",
            Self::EndLoadingScriptOk => "EndLoadingScriptOK",
            Self::EndLoadingScriptError => "EndLoadingScriptError",
            Self::BeginInvokeFactory => "BeginInvokeFactory",
            Self::EndInvokeFactory => "EndInvokeFactory",
            Self::NodeBeginNativeRequire => "NodeBeginNativeRequire",
            Self::NodeEndNativeRequire => "NodeEndNativeRequire",
        };
        f.write_str(name)
    }
}

/// A timestamped loader occurrence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderEvent {
    /// What happened
    pub kind: LoaderEventType,
    /// Subject (module id, script URL or native require path)
    pub detail: String,
    /// Milliseconds since the loader's time origin
    pub timestamp: f64,
}

/// Sink for loader events
pub trait LoaderEventRecorder: Send + Sync {
    /// Append an event
    fn record(&self, kind: LoaderEventType, detail: &str);

    /// All events recorded so far
    fn events(&self) -> Vec<LoaderEvent>;
}

/// Recorder that keeps every event in memory
pub struct ActiveLoaderEventRecorder {
    time_origin: Instant,
    events: Mutex<Vec<LoaderEvent>>,
}

impl ActiveLoaderEventRecorder {
    /// Create a recorder whose timestamps are relative to `time_origin`
    pub fn new(time_origin: Instant) -> Self {
        Self {
            time_origin,
            events: Mutex::new(Vec::new()),
        }
    }
}

impl LoaderEventRecorder for ActiveLoaderEventRecorder {
    fn record(&self, kind: LoaderEventType, detail: &str) {
        let timestamp = self.time_origin.elapsed().as_secs_f64() * 1000.0;
        self.events.lock().push(LoaderEvent {
            kind,
            detail: detail.to_string(),
            timestamp,
        });
    }

    fn events(&self) -> Vec<LoaderEvent> {
        self.events.lock().clone()
    }
}

/// Recorder used while `recordStats` is off
pub struct NullLoaderEventRecorder;

impl LoaderEventRecorder for NullLoaderEventRecorder {
    fn record(&self, _kind: LoaderEventType, _detail: &str) {}

    fn events(&self) -> Vec<LoaderEvent> {
        Vec::new()
    }
}
