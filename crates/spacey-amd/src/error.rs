// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the AMD loader

use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while bootstrapping or driving the loader
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// `require` was called with an argument shape it does not accept
    #[error("Unrecognized require call")]
    UnrecognizedRequireCall,

    /// Synchronous require of a module that has not finished loading
    #[error("Check dependency list! Synchronous require cannot resolve module '{0}'")]
    UnresolvedModule(String),

    /// The host's native require could not find a module
    #[error("Cannot find module '{0}'")]
    NativeModuleNotFound(String),

    /// Configuration could not be converted to or from JSON
    #[error("Invalid loader configuration: {0}")]
    InvalidConfiguration(String),

    /// A script requested by the loader failed to load
    #[error("Failed to load script for module '{module}': {reason}")]
    ScriptLoad {
        /// Module whose script failed
        module: String,
        /// Reason reported by the host
        reason: String,
    },

    /// A dependency of a module failed, so the module can never resolve
    #[error("Module '{module}' failed because dependency '{dependency}' failed")]
    DependencyFailed {
        /// Module that can no longer resolve
        module: String,
        /// The failed dependency
        dependency: String,
    },

    /// Type error (value is not callable, wrong argument type)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// The entry points were used before a module manager was installed
    #[error("AMD loader has not been initialized")]
    NotInitialized,
}

impl LoaderError {
    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create an unresolved-module error
    pub fn unresolved(module: impl Into<String>) -> Self {
        Self::UnresolvedModule(module.into())
    }
}

impl From<serde_json::Error> for LoaderError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}
