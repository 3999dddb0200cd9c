//! Process-wide engine slot
//!
//! CLI-style hosts build one [`Engine`] at startup and park it here;
//! library users should prefer passing an `Engine` explicitly.

use once_cell::sync::OnceCell;

use crate::{Engine, LaminaError};
use lamina_core::Value;

static GLOBAL_ENGINE: OnceCell<Engine> = OnceCell::new();

/// Install the process-wide engine (must be called once, before use).
///
/// # Panics
/// If an engine is already installed.
pub fn init(engine: Engine) {
    if GLOBAL_ENGINE.set(engine).is_err() {
        panic!("Engine already initialized");
    }
}

/// Get the process-wide engine.
///
/// # Panics
/// If no engine is installed.
pub fn get() -> &'static Engine {
    GLOBAL_ENGINE.get().expect("Engine not initialized")
}

/// Whether an engine is installed.
pub fn is_initialized() -> bool {
    GLOBAL_ENGINE.get().is_some()
}

/// Render a view with the process-wide engine.
///
/// # Panics
/// If no engine is installed.
pub fn render(view: &str, data: Value) -> Result<String, LaminaError> {
    get().render(view, data)
}

/// Render a view to stdout with the process-wide engine.
///
/// # Panics
/// If no engine is installed.
pub fn render_print(view: &str, data: Value) -> Result<(), LaminaError> {
    get().render_print(view, data)
}
