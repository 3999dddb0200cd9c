//! Lamina CLI - command line renderer
//!
//! Project-based rendering: configuration comes from an optional
//! `lamina.json` manifest, the view name and data from the command line.
//! Rendered output goes to stdout; logs and error reports go to stderr.

use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

mod config;
mod logging;
mod platform;

use crate::config::{parse_log_level, ProjectManifest};
use crate::logging::parse_log_format;
use crate::platform::print_error_with_source;
use lamina_api::{CacheStatus, Engine, LaminaError, Value};

#[derive(Parser)]
#[command(
    name = "lamina",
    about = "Lamina template engine - compile, cache and render views",
    version = "0.1.0"
)]
struct Cli {
    /// View name in dotted notation (e.g. shop.cart)
    #[arg(value_name = "VIEW")]
    view: String,

    /// JSON file with the render data
    #[arg(long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Inline JSON render data, takes precedence over --data
    #[arg(long, value_name = "JSON")]
    data_json: Option<String>,

    /// Project manifest path (default: ./lamina.json if present)
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Compile and cache the view without rendering it
    #[arg(long)]
    check: bool,

    /// Stream output to stdout instead of buffering the full render
    #[arg(long)]
    print: bool,

    /// Log level: silent, error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log format: pretty, compact, json
    #[arg(long, value_name = "FORMAT", default_value = "compact")]
    log_format: String,
}

fn main() {
    let cli = Cli::parse();

    // Read lamina.json
    let manifest = match load_manifest(cli.config.as_deref()) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    init_logging(&cli, manifest.as_ref());

    let engine = match build_engine(manifest.as_ref()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if cli.check {
        handle_check(&engine, &cli.view);
        return;
    }

    let data = match load_data(&cli) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    handle_render(&engine, &cli.view, data, cli.print);
}

/// Load the project manifest: required when named explicitly, optional at
/// the default path.
fn load_manifest(explicit: Option<&Path>) -> Result<Option<ProjectManifest>, String> {
    match explicit {
        Some(path) => ProjectManifest::load(path).map(Some),
        None => {
            let default = Path::new("lamina.json");
            if default.exists() {
                ProjectManifest::load(default).map(Some)
            } else {
                Ok(None)
            }
        }
    }
}

/// Resolve log settings and install the subscriber; flags override the
/// manifest's `log` section.
fn init_logging(cli: &Cli, manifest: Option<&ProjectManifest>) {
    let mut log_config = manifest
        .map(ProjectManifest::log_config)
        .unwrap_or_default();

    if let Some(name) = cli.log_level.as_deref() {
        match parse_log_level(name) {
            Some(level) => log_config.global = level,
            None => {
                eprintln!("Error: unknown log level '{}'", name);
                process::exit(1);
            }
        }
    }

    let format = match parse_log_format(&cli.log_format) {
        Some(format) => format,
        None => {
            eprintln!("Error: unknown log format '{}'", cli.log_format);
            process::exit(1);
        }
    };

    logging::init(&log_config, format);
}

/// Build the engine from manifest settings.
fn build_engine(manifest: Option<&ProjectManifest>) -> Result<Engine, LaminaError> {
    let config = manifest
        .map(ProjectManifest::engine_config)
        .unwrap_or_default();
    let mut engine = Engine::new(config)?;

    if let Some(manifest) = manifest {
        if let Some(includes) = &manifest.includes {
            for (alias, target) in includes {
                engine.add_include(alias.clone(), target.clone());
            }
        }
        if let Some(globals) = &manifest.globals {
            for (name, value) in globals {
                engine.share(name.clone(), value.clone());
            }
        }
    }

    Ok(engine)
}

/// Load render data from --data-json or --data; null means no data.
fn load_data(cli: &Cli) -> Result<Value, String> {
    if let Some(inline) = &cli.data_json {
        return serde_json::from_str(inline)
            .map_err(|e| format!("cannot parse --data-json: {}", e));
    }
    if let Some(path) = &cli.data {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        return serde_json::from_str(&content)
            .map_err(|e| format!("cannot parse '{}': {}", path.display(), e));
    }
    Ok(Value::Null)
}

fn handle_check(engine: &Engine, view: &str) {
    match engine.compile(view) {
        Ok(output) => {
            let status = match output.cache {
                CacheStatus::Hit => "cache hit",
                CacheStatus::Compiled => "compiled",
            };
            println!("{}: {} ({} ops)", view, status, output.program.ops.len());
        }
        Err(e) => report_failure(engine, view, &e),
    }
}

fn handle_render(engine: &Engine, view: &str, data: Value, stream: bool) {
    if stream {
        // Unbuffered; a late error can leave partial output behind
        if let Err(e) = engine.render_print(view, data) {
            report_failure(engine, view, &e);
        }
    } else {
        match engine.render(view, data) {
            Ok(output) => {
                let mut stdout = io::stdout();
                let _ = stdout.write_all(output.as_bytes());
                let _ = stdout.flush();
            }
            Err(e) => report_failure(engine, view, &e),
        }
    }
}

/// Print the error report with source context and exit non-zero.
fn report_failure(engine: &Engine, view: &str, error: &LaminaError) -> ! {
    let report = error.to_report().for_template(view);
    let source = view_source(engine, view);
    print_error_with_source(&report, source.as_deref());
    process::exit(1);
}

/// Fetch the view's source text for context display.
fn view_source(engine: &Engine, view: &str) -> Option<String> {
    let path = engine.resolve(view).ok()?;
    let bytes = engine.vfs().read_file(&path).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
