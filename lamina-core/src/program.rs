//! Compiled program representation
//!
//! A template compiles to a `Program`: a versioned op tree with embedded
//! expression ASTs. Programs serialize to JSON and are what the cache
//! persists; the executor interprets them directly.

use serde::{Deserialize, Serialize};

use crate::auth::AuthCheck;
use crate::expr::ast::{Expr, ForHead, ForeachHead};
use crate::scan::SourcePos;

/// Artifact format version. Bump on any change to `Program`, `Op`, or
/// the expression AST; loaders treat a mismatch as a cache miss.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Artifact format version
    pub version: u32,
    /// Origin template, dotted name
    pub name: String,
    /// Operations in execution order
    pub ops: Vec<Op>,
}

impl Program {
    pub fn new(name: impl Into<String>, ops: Vec<Op>) -> Self {
        Self {
            version: ARTIFACT_FORMAT_VERSION,
            name: name.into(),
            ops,
        }
    }

    pub fn is_current_version(&self) -> bool {
        self.version == ARTIFACT_FORMAT_VERSION
    }
}

/// One arm of a conditional chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfArm {
    pub cond: Expr,
    pub body: Vec<Op>,
}

/// One case of a switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseArm {
    pub value: Expr,
    pub body: Vec<Op>,
}

/// One arm of an auth chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthArm {
    pub check: AuthCheck,
    pub body: Vec<Op>,
}

/// One executable operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Emit literal text.
    Text(String),
    /// Evaluate and emit through the escape function.
    EchoEscaped { expr: Expr, pos: SourcePos },
    /// Evaluate and emit verbatim.
    EchoRaw { expr: Expr, pos: SourcePos },
    /// First arm with a truthy condition runs; else the fallback.
    If {
        arms: Vec<IfArm>,
        fallback: Option<Vec<Op>>,
    },
    /// First case equal to the subject runs; no fallthrough.
    Switch {
        subject: Expr,
        cases: Vec<CaseArm>,
        default: Option<Vec<Op>>,
    },
    /// Iterate an array or map, binding value (and optionally key) plus
    /// the `loop` metadata variable.
    Foreach { head: ForeachHead, body: Vec<Op> },
    /// Half-open integer range loop.
    For { head: ForHead, body: Vec<Op> },
    /// Condition-tested loop.
    While { cond: Expr, body: Vec<Op> },
    /// Exit the nearest enclosing loop.
    Break,
    /// Skip to the next iteration of the nearest enclosing loop.
    Continue,
    /// Render another template in a fresh scope.
    Include {
        target: Expr,
        data: Option<Expr>,
        pos: SourcePos,
    },
    /// First arm whose principal check passes runs; else the fallback.
    Auth {
        arms: Vec<AuthArm>,
        fallback: Option<Vec<Op>>,
    },
    /// Invoke a run-time directive handler with evaluated arguments and
    /// emit its result raw.
    CallDirective {
        name: String,
        args: Vec<Expr>,
        pos: SourcePos,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn pos() -> SourcePos {
        SourcePos {
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    fn sample_program() -> Program {
        Program::new(
            "shop.cart",
            vec![
                Op::Text("Hello ".to_string()),
                Op::EchoEscaped {
                    expr: Expr::Var("name".to_string()),
                    pos: pos(),
                },
                Op::If {
                    arms: vec![IfArm {
                        cond: Expr::Var("ready".to_string()),
                        body: vec![Op::Text("go".to_string())],
                    }],
                    fallback: Some(vec![Op::Text("wait".to_string())]),
                },
                Op::Foreach {
                    head: ForeachHead {
                        subject: Expr::Var("items".to_string()),
                        key_var: None,
                        value_var: "item".to_string(),
                    },
                    body: vec![Op::EchoRaw {
                        expr: Expr::Var("item".to_string()),
                        pos: pos(),
                    }],
                },
            ],
        )
    }

    #[test]
    fn test_new_program_is_current_version() {
        let program = Program::new("a.b", Vec::new());
        assert_eq!(program.version, ARTIFACT_FORMAT_VERSION);
        assert!(program.is_current_version());
    }

    #[test]
    fn test_version_mismatch_detected() {
        let mut program = Program::new("a.b", Vec::new());
        program.version = ARTIFACT_FORMAT_VERSION + 1;
        assert!(!program.is_current_version());
    }

    #[test]
    fn test_program_json_round_trip() {
        let program = sample_program();
        let json = serde_json::to_string(&program).unwrap();
        let loaded: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, loaded);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let a = serde_json::to_string(&sample_program()).unwrap();
        let b = serde_json::to_string(&sample_program()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_auth_op_round_trip() {
        let program = Program::new(
            "admin.panel",
            vec![Op::Auth {
                arms: vec![AuthArm {
                    check: AuthCheck::Authenticated {
                        role: Some(Expr::str("administrator")),
                    },
                    body: vec![Op::Text("X".to_string())],
                }],
                fallback: None,
            }],
        );
        let json = serde_json::to_string(&program).unwrap();
        let loaded: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, loaded);
    }

    #[test]
    fn test_call_directive_round_trip() {
        let program = Program::new(
            "page",
            vec![Op::CallDirective {
                name: "nonce".to_string(),
                args: vec![Expr::Literal(Value::Int(16))],
                pos: pos(),
            }],
        );
        let json = serde_json::to_string(&program).unwrap();
        let loaded: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, loaded);
    }
}
