// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-amd
//!
//! AMD (`define` / `require`) loader bootstrap for the Spacey runtime.
//!
//! This crate wires the two AMD entry points into a host's global scope:
//!
//! - Overloaded `define(id?, deps?, factory)` and `require(...)` with
//!   `config`, `getConfig`, `reset`, `getBuildInfo` and `getStats`
//! - Host detection (browser, web worker, Node process, Electron renderer)
//! - Per-host global wiring, guarded against double initialization
//! - An instrumented native `require` for Node-hosted processes
//!
//! Fetching and evaluating scripts stays with the host: the loader queues
//! [`ScriptRequest`]s and is told when each script has run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_amd::{Bootstrap, GlobalScope, Value};
//!
//! let globals = GlobalScope::browser();
//! let mut bootstrap = Bootstrap::new(globals.clone());
//! if let Some(loader) = bootstrap.auto_init()? {
//!     let require = globals.get("require");
//!     require.call(&[Value::object([("baseUrl", Value::from("out"))])])?;
//!     for request in loader.take_script_requests()? {
//!         println!("fetch {}", request.src);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod call;
pub mod config;
pub mod environment;
pub mod error;
pub mod events;
pub mod factory;
pub mod globals;
pub mod interceptor;
pub mod manager;
pub mod script_loader;
pub mod state;
pub mod value;

// Re-exports
pub use bootstrap::{Bootstrap, BootstrapState, Loader, WiringStrategy};
pub use call::{DefineCall, RequireCall, DEFAULT_DEPENDENCIES};
pub use config::{Configuration, ConfigurationOptions};
pub use environment::Environment;
pub use error::{LoaderError, Result};
pub use events::{LoaderEvent, LoaderEventType};
pub use factory::{DefineFunc, RequireFunc, create_global_amd_funcs};
pub use globals::GlobalScope;
pub use interceptor::NativeRequireInterceptor;
pub use manager::{BuildModuleInfo, ModuleManager};
pub use script_loader::{ScriptLoaderKind, ScriptRequest};
pub use state::LoaderState;
pub use value::Value;

/// Version of the spacey-amd loader
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
