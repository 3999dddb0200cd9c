//! Variable scopes
//!
//! Lookup walks loop frames innermost-first, then the render data, then
//! the shared globals. Undefined names are not an error; the evaluator
//! maps them to `Null`.

use std::collections::BTreeMap;

use crate::value::Value;

/// Stack of variable scopes for one template execution.
///
/// Includes get a fresh stack seeded with the globals and the include
/// data only; enclosing locals never leak across an include boundary.
#[derive(Debug)]
pub struct ScopeStack<'a> {
    globals: &'a BTreeMap<String, Value>,
    base: BTreeMap<String, Value>,
    frames: Vec<BTreeMap<String, Value>>,
}

impl<'a> ScopeStack<'a> {
    pub fn new(globals: &'a BTreeMap<String, Value>, data: BTreeMap<String, Value>) -> Self {
        Self {
            globals,
            base: data,
            frames: Vec::new(),
        }
    }

    /// Open a frame for loop-scoped variables.
    pub fn push_frame(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Bind a name in the innermost frame, or in the render data when no
    /// frame is open.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => frame.insert(name.into(), value),
            None => self.base.insert(name.into(), value),
        };
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Some(value);
            }
        }
        self.base.get(name).or_else(|| self.globals.get(name))
    }

    /// Value of a name; undefined names read as `Null`.
    pub fn get(&self, name: &str) -> Value {
        self.lookup(name).cloned().unwrap_or(Value::Null)
    }
}
