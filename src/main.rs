// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-loader - inspect the AMD loader bootstrap
//!
//! Simulates a host, bootstraps the loader into it, issues `require` calls
//! and reports the wiring, the scripts the host would have to fetch, the
//! effective configuration and the recorded loader events.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use owo_colors::OwoColorize;
use serde::Serialize;
use spacey_amd::globals::{DO_NOT_INIT_LOADER, REQUIRE};
use spacey_amd::{
    Bootstrap, Configuration, Environment, GlobalScope, Loader, LoaderError, LoaderEvent,
    ScriptRequest, VERSION, Value, WiringStrategy,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Modules the simulated Node host can serve natively
const NATIVE_MODULES: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "net", "os",
    "path", "stream", "url", "util", "zlib",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HostKind {
    Browser,
    WebWorker,
    Node,
    ElectronRenderer,
}

#[derive(Parser)]
#[command(
    name = "spacey-loader",
    about = "Inspect how the Spacey AMD loader bootstraps and maps modules",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Host environment to simulate
    #[arg(long = "env", value_enum, default_value = "browser")]
    host: HostKind,

    /// JSON file with loader configuration
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Module ids to request with `require([...], cb)`
    #[arg(short = 'r', long = "require")]
    modules: Vec<String>,

    /// Record loader events (`recordStats`)
    #[arg(long)]
    stats: bool,

    /// Set `doNotInitLoader` and initialize manually
    #[arg(long)]
    no_auto_init: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    environment: Environment,
    strategy: WiringStrategy,
    script_requests: Vec<ScriptRequest>,
    pending_modules: Vec<String>,
    config: Configuration,
    stats: Vec<LoaderEvent>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_amd=debug,spacey_loader=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_amd=warn")
            .init();
    }

    let globals = host_globals(cli.host);
    if cli.no_auto_init {
        globals.set(DO_NOT_INIT_LOADER, Value::Boolean(true));
    }

    let config = match &cli.config {
        Some(path) => Some(load_config(path).await?),
        None => None,
    };

    // Browser-like hosts pick configuration up from a preset global `require`.
    let browser_like = matches!(cli.host, HostKind::Browser | HostKind::WebWorker);
    if browser_like {
        if let Some(config) = &config {
            globals.set(REQUIRE, config.clone());
        }
    }

    let mut bootstrap = Bootstrap::new(Arc::clone(&globals));
    if bootstrap.auto_init()?.is_none() {
        tracing::debug!("Automatic initialization skipped, initializing manually");
        bootstrap.init()?;
    }
    let loader = bootstrap.loader().context("loader did not initialize")?;

    if !browser_like {
        if let Some(config) = &config {
            loader.require_func().config_value(config, false)?;
        }
    }
    if cli.stats {
        loader
            .require_func()
            .config_value(&Value::object([("recordStats", Value::Boolean(true))]), false)?;
    }

    for module in &cli.modules {
        let id = module.clone();
        let callback = Value::function("callback", move |_| {
            tracing::debug!("Resolved {}", id);
            Ok(Value::Undefined)
        });
        loader
            .require_func()
            .call(&[Value::string_array(&[module]), callback])?;
    }

    let report = build_report(loader)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

/// Globals for the simulated host
fn host_globals(host: HostKind) -> Arc<GlobalScope> {
    match host {
        HostKind::Browser => GlobalScope::browser(),
        HostKind::WebWorker => GlobalScope::web_worker(),
        HostKind::Node => GlobalScope::node(native_require()),
        HostKind::ElectronRenderer => GlobalScope::electron_renderer(native_require()),
    }
}

/// Native require of the simulated Node host: built-in modules and files
fn native_require() -> Value {
    Value::function("require", |args| {
        let specifier = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| LoaderError::type_error("The \"id\" argument must be of type string"))?;
        let name = specifier.strip_prefix("node:").unwrap_or(specifier);

        if NATIVE_MODULES.contains(&name) {
            return Ok(Value::object([("name", Value::from(name))]));
        }
        if Path::new(specifier).exists() {
            return Ok(Value::object([("filename", Value::from(specifier))]));
        }
        Err(LoaderError::NativeModuleNotFound(specifier.to_string()))
    })
}

/// Read a JSON configuration file
async fn load_config(path: &Path) -> anyhow::Result<Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    anyhow::ensure!(json.is_object(), "{} must contain a JSON object", path.display());
    Ok(Value::from_json(json))
}

/// Serve `node|` script requests through the instrumented native require
/// and collect the rest for the report.
fn build_report(loader: &Loader) -> anyhow::Result<Report> {
    let mut script_requests = Vec::new();

    for request in loader.take_script_requests()? {
        let native = request.src.strip_prefix("node|");
        match (native, loader.node_require()) {
            (Some(name), Some(node_require)) => match node_require.require(name) {
                Ok(exports) => {
                    loader.define_func().call(&[Value::from(name), exports])?;
                    loader.script_loaded(&request.module_id)?;
                }
                Err(err) => loader.script_failed(&request.module_id, &err.to_string())?,
            },
            _ => script_requests.push(request),
        }
    }

    let require = loader.require_func();
    Ok(Report {
        environment: loader.environment(),
        strategy: loader.strategy(),
        script_requests,
        pending_modules: loader.state().with_manager(|m| m.pending_module_ids())?,
        config: require.get_config()?,
        stats: require.get_stats()?,
    })
}

fn print_report(report: &Report) {
    println!(
        "{} {}",
        "spacey-loader".cyan().bold(),
        format!("v{}", VERSION).dimmed()
    );
    println!("{}: {:?}", "Wiring".green().bold(), report.strategy);

    let env = &report.environment;
    println!(
        "{}: node={} electron-renderer={} web-worker={} windows={}",
        "Environment".green().bold(),
        env.is_node,
        env.is_electron_renderer,
        env.is_web_worker,
        env.is_windows
    );

    if !report.script_requests.is_empty() {
        println!("{}", "Scripts to load:".green().bold());
        for request in &report.script_requests {
            println!(
                "  {} {} {}",
                request.module_id.cyan(),
                "->".dimmed(),
                request.src
            );
        }
    }

    if !report.pending_modules.is_empty() {
        println!("{}", "Pending modules:".yellow().bold());
        for id in &report.pending_modules {
            println!("  {}", id);
        }
    }

    if !report.config.base_url.is_empty() {
        println!("{}: {}", "Base URL".green().bold(), report.config.base_url);
    }

    if !report.stats.is_empty() {
        println!("{}", "Loader events:".green().bold());
        for event in &report.stats {
            println!(
                "  {:>9.3}ms {} {}",
                event.timestamp,
                event.kind.to_string().magenta(),
                event.detail
            );
        }
    }
}
