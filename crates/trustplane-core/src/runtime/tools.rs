// crates/trustplane-core/src/runtime/tools.rs
// ============================================================================
// Module: Trustplane Tool Sandbox
// Description: Allow-listed tool registry and the whitelisted calculator.
// Purpose: Let `calc:` / `search:` turns bypass the LLM under audit.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! Tool turns never reach a model. The calculator evaluates a closed
//! arithmetic grammar (addition, subtraction, multiplication, true division,
//! unary signs, parentheses, numeric constants); any other character or
//! construct is rejected before parsing. Every tool call is recorded with a
//! deterministic `{tool, args}` hash for EPACK auditability.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;
use crate::core::hashing::stable_hash;
use crate::interfaces::Tool;
use crate::interfaces::ToolResult;

// ============================================================================
// SECTION: Tool Registry
// ============================================================================

/// Allow-listed tool registry keyed by stable tool name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    /// Registered tools by name.
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.tools.keys()).finish()
    }
}

impl ToolRegistry {
    /// Creates a registry with the built-in calculator registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(SafeCalcTool));
        registry
    }

    /// Registers a tool under its stable name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Whether a tool name is allow-listed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Invokes an allow-listed tool and records the deterministic call hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the argument hash cannot be computed.
    pub fn call(
        &self,
        algorithm: HashAlgorithm,
        name: &str,
        args: &Value,
    ) -> Result<ToolResult, HashError> {
        let args_hash = stable_hash(algorithm, &json!({ "tool": name, "args": args }))?;
        let Some(tool) = self.tools.get(name) else {
            return Ok(ToolResult {
                ok: false,
                tool: name.to_string(),
                args_hash,
                output: json!({ "error": "tool_not_allowed" }),
            });
        };
        let output = tool.call(args);
        let ok = output.get("error").is_none();
        Ok(ToolResult {
            ok,
            tool: name.to_string(),
            args_hash,
            output,
        })
    }
}

// ============================================================================
// SECTION: Calculator Tool
// ============================================================================

/// Whitelisted arithmetic calculator tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeCalcTool;

impl Tool for SafeCalcTool {
    fn name(&self) -> &'static str {
        "safe_calc"
    }

    fn call(&self, args: &Value) -> Value {
        let expr = args.get("expr").and_then(Value::as_str).unwrap_or("");
        match safe_calc(expr) {
            Ok(value) => json!({ "value": value }),
            Err(code) => json!({ "error": code }),
        }
    }
}

/// Evaluates a whitelisted arithmetic expression.
///
/// # Errors
///
/// Returns a stable error code string: `empty_expr`, `forbidden_char`,
/// `parse_error`, `division_by_zero`, or `non_finite`.
pub fn safe_calc(expr: &str) -> Result<f64, &'static str> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err("empty_expr");
    }
    if !trimmed.chars().all(|ch| matches!(ch, '0'..='9' | '.' | '+' | '-' | '*' | '/' | '(' | ')' | ' ' | '\t'))
    {
        return Err("forbidden_char");
    }

    let tokens = tokenize(trimmed)?;
    let mut parser = Parser {
        tokens: &tokens,
        position: 0,
    };
    let value = parser.expression()?;
    if parser.position != tokens.len() {
        return Err("parse_error");
    }
    if !value.is_finite() {
        return Err("non_finite");
    }
    Ok(value)
}

// ============================================================================
// SECTION: Expression Grammar
// ============================================================================

/// Token of the whitelisted arithmetic grammar.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    /// Numeric literal.
    Number(f64),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `(`
    LParen,
    /// `)`
    RParen,
}

/// Tokenizes a prefiltered expression.
fn tokenize(expr: &str) -> Result<Vec<Token>, &'static str> {
    let mut tokens = Vec::new();
    let bytes = expr.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        let ch = bytes[index] as char;
        match ch {
            ' ' | '\t' => index += 1,
            '+' => {
                tokens.push(Token::Plus);
                index += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                index += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                index += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                index += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                index += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                index += 1;
            }
            '0'..='9' | '.' => {
                let start = index;
                while index < bytes.len() && matches!(bytes[index] as char, '0'..='9' | '.') {
                    index += 1;
                }
                let literal = &expr[start..index];
                let value: f64 = literal.parse().map_err(|_| "parse_error")?;
                tokens.push(Token::Number(value));
            }
            _ => return Err("forbidden_char"),
        }
    }
    Ok(tokens)
}

/// Recursive-descent parser over the whitelisted grammar.
///
/// Grammar:
/// `expr := term (('+'|'-') term)*`
/// `term := factor (('*'|'/') factor)*`
/// `factor := ('+'|'-')* primary`
/// `primary := number | '(' expr ')'`
struct Parser<'a> {
    /// Token stream being parsed.
    tokens: &'a [Token],
    /// Cursor into the token stream.
    position: usize,
}

impl Parser<'_> {
    /// Peeks at the current token.
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    /// Consumes and returns the current token.
    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Parses an addition / subtraction chain.
    fn expression(&mut self) -> Result<f64, &'static str> {
        let mut value = self.term()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.position += 1;
                    value += self.term()?;
                }
                Token::Minus => {
                    self.position += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// Parses a multiplication / division chain.
    fn term(&mut self) -> Result<f64, &'static str> {
        let mut value = self.factor()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Star => {
                    self.position += 1;
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.position += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err("division_by_zero");
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// Parses unary signs ahead of a primary.
    fn factor(&mut self) -> Result<f64, &'static str> {
        match self.peek() {
            Some(Token::Plus) => {
                self.position += 1;
                self.factor()
            }
            Some(Token::Minus) => {
                self.position += 1;
                Ok(-self.factor()?)
            }
            _ => self.primary(),
        }
    }

    /// Parses a number or parenthesized expression.
    fn primary(&mut self) -> Result<f64, &'static str> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("parse_error"),
                }
            }
            _ => Err("parse_error"),
        }
    }
}
