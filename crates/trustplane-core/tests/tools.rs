// crates/trustplane-core/tests/tools.rs
// ============================================================================
// Module: Tool Sandbox Tests
// Description: Calculator grammar, injection rejection, registry audit.
// ============================================================================
//! ## Overview
//! Covers arithmetic correctness, operator precedence, unary signs, division
//! by zero, injection attempts, and deterministic call hashing.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::json;
use trustplane_core::HashAlgorithm;
use trustplane_core::runtime::ToolRegistry;
use trustplane_core::runtime::safe_calc;

/// Basic arithmetic evaluates correctly.
#[test]
fn calc_addition() {
    assert_eq!(safe_calc("2 + 3").expect("calc"), 5.0);
}

/// Multiplication binds tighter than addition.
#[test]
fn calc_precedence() {
    assert_eq!(safe_calc("2 + 3 * 4").expect("calc"), 14.0);
}

/// Parentheses override precedence.
#[test]
fn calc_parentheses() {
    assert_eq!(safe_calc("(2 + 3) * 10").expect("calc"), 50.0);
    assert_eq!(safe_calc("((1 + 2) * (3 + 4))").expect("calc"), 21.0);
}

/// Unary signs apply before primaries.
#[test]
fn calc_unary_signs() {
    assert_eq!(safe_calc("-5 + 3").expect("calc"), -2.0);
    assert_eq!(safe_calc("+5").expect("calc"), 5.0);
}

/// Floats parse and divide exactly.
#[test]
fn calc_floats() {
    assert!((safe_calc("3.14 * 2").expect("calc") - 6.28).abs() < 0.01);
    assert!((safe_calc("10 / 4").expect("calc") - 2.5).abs() < 0.001);
}

/// Division by zero is a stable error.
#[test]
fn calc_division_by_zero() {
    assert_eq!(safe_calc("1 / 0"), Err("division_by_zero"));
}

/// Empty expressions are rejected before parsing.
#[test]
fn calc_empty_expression() {
    assert_eq!(safe_calc(""), Err("empty_expr"));
    assert_eq!(safe_calc("   "), Err("empty_expr"));
}

/// Letters, brackets, and underscores never reach the parser.
#[test]
fn calc_rejects_injection_attempts() {
    assert_eq!(safe_calc("__import__('os').system('rm -rf /')"), Err("forbidden_char"));
    assert_eq!(safe_calc("1 + exit()"), Err("forbidden_char"));
    assert_eq!(safe_calc("[1, 2]"), Err("forbidden_char"));
    assert_eq!(safe_calc("1; 2"), Err("forbidden_char"));
}

/// Dangling operators are parse errors.
#[test]
fn calc_rejects_malformed_expressions() {
    assert_eq!(safe_calc("1 +"), Err("parse_error"));
    assert_eq!(safe_calc("(1 + 2"), Err("parse_error"));
    assert_eq!(safe_calc("1 2"), Err("parse_error"));
}

/// Registry calls record a deterministic args hash and reject unknown tools.
#[test]
fn registry_records_hash_and_rejects_unknown_tools() {
    let registry = ToolRegistry::with_builtins();
    let args = json!({ "expr": "(7 + 3) * 12" });

    let first = registry.call(HashAlgorithm::Sha256, "safe_calc", &args).expect("call");
    let second = registry.call(HashAlgorithm::Sha256, "safe_calc", &args).expect("call");
    assert!(first.ok);
    assert_eq!(first.output, json!({ "value": 120.0 }));
    assert_eq!(first.args_hash, second.args_hash);

    let denied = registry.call(HashAlgorithm::Sha256, "shell", &json!({})).expect("call");
    assert!(!denied.ok);
    assert_eq!(denied.output, json!({ "error": "tool_not_allowed" }));
}
