// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host environment detection

use crate::globals::{GlobalScope, IMPORT_SCRIPTS, MODULE, NAVIGATOR, PROCESS};
use serde::Serialize;

/// Classification of the host process.
///
/// Computed once per bootstrap and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Host reports a Windows platform
    pub is_windows: bool,
    /// Loaded as a CommonJS module inside a Node-like process
    pub is_node: bool,
    /// Node-hosted Electron renderer; wired like a browser
    pub is_electron_renderer: bool,
    /// Running inside a web worker
    pub is_web_worker: bool,
    /// Electron worker with node integration enabled
    pub is_electron_node_integration_web_worker: bool,
}

impl Environment {
    /// Classify the host from its globals. Has no side effects.
    pub fn detect(globals: &GlobalScope) -> Self {
        let process = globals.get(PROCESS);
        let versions = process.get("versions");
        let has_electron = versions.get("electron").is_string();
        let process_type = process.get("type");

        let is_web_worker = globals.get(IMPORT_SCRIPTS).is_function();

        Self {
            is_windows: detect_windows(globals),
            is_node: !globals.get(MODULE).get("exports").is_nullish(),
            is_electron_renderer: has_electron && process_type.as_str() == Some("renderer"),
            is_web_worker,
            is_electron_node_integration_web_worker: is_web_worker
                && has_electron
                && process_type.as_str() == Some("worker"),
        }
    }
}

fn detect_windows(globals: &GlobalScope) -> bool {
    let user_agent = globals.get(NAVIGATOR).get("userAgent");
    if let Some(ua) = user_agent.as_str() {
        if ua.contains("Windows") {
            return true;
        }
    }
    globals.get(PROCESS).get("platform").as_str() == Some("win32")
}
