// src/expr/mod.rs

//! Numeric expression evaluation on top of the `meval` engine.
//!
//! An [`Evaluator`] is an explicit value: callers build one, optionally add
//! constants, and pass it to whatever needs to evaluate text. There is no
//! shared global instance.

use std::collections::BTreeMap;

use meval::{Context, ContextProvider, Expr, FuncEvalError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EngineError, EngineResult};

/// User-facing categories for evaluation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Division by zero or non-finite result")]
    DivisionByZero,

    /// Reserved for engine failures outside the categories above. `meval`
    /// 0.2 has none.
    #[error("{0}")]
    Other(String),
}

impl From<meval::Error> for EvalError {
    fn from(err: meval::Error) -> Self {
        let message = err.to_string();
        match err {
            meval::Error::UnknownVariable(name) => EvalError::UnknownVariable(name),
            meval::Error::Function(name, FuncEvalError::UnknownFunction) => {
                EvalError::UnknownFunction(name)
            }
            meval::Error::Function(..) | meval::Error::ParseError(_) | meval::Error::RPNError(_) => {
                EvalError::Syntax(message)
            }
        }
    }
}

/// Variable bindings for a single evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    vars: BTreeMap<String, f64>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.vars.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Scope {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Scope {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Rewrites the Unicode operators the equation editor produces into ASCII.
pub fn normalize_operators(text: &str) -> String {
    text.replace('×', "*")
        .replace('·', "*")
        .replace('÷', "/")
        .replace('−', "-")
        .replace("**", "^")
}

/// Expression evaluator with its own constant table.
#[derive(Debug, Clone)]
pub struct Evaluator {
    constants: BTreeMap<String, f64>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        let mut constants = BTreeMap::new();
        constants.insert("pi".to_string(), std::f64::consts::PI);
        constants.insert("e".to_string(), std::f64::consts::E);
        constants.insert("tau".to_string(), std::f64::consts::TAU);
        constants.insert("phi".to_string(), (1.0 + 5f64.sqrt()) / 2.0);
        Evaluator { constants }
    }

    /// Adds or overrides a named constant.
    pub fn with_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }

    /// Parses `expression` once for repeated evaluation.
    pub fn compile(&self, expression: &str) -> EngineResult<CompiledExpr> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(EngineError::EmptyExpression);
        }
        let source = normalize_operators(trimmed);
        let expr: Expr = source.parse().map_err(EvalError::from)?;
        Ok(CompiledExpr {
            context: self.context(),
            expr,
            source,
        })
    }

    /// Evaluates `expression` against `scope`. Never returns a non-finite value.
    pub fn evaluate(&self, expression: &str, scope: &Scope) -> EngineResult<f64> {
        let value = self.compile(expression)?.eval(scope)?;
        if !value.is_finite() {
            return Err(EvalError::DivisionByZero.into());
        }
        tracing::debug!(expression, value, "evaluated expression");
        Ok(value)
    }

    /// Builtins, extra functions and constants. Scope variables are layered
    /// on top at evaluation time.
    fn context(&self) -> Context<'static> {
        let mut ctx = Context::new();
        ctx.func("log", f64::ln)
            .func("log10", f64::log10)
            .func("log2", f64::log2)
            .func("cbrt", f64::cbrt);
        for (name, value) in &self.constants {
            ctx.var(name.as_str(), *value);
        }
        ctx
    }
}

/// Variable lookup that tries `vars` first and falls back to `base`.
struct Layered<'a, V> {
    vars: V,
    base: &'a Context<'static>,
}

impl<V: Fn(&str) -> Option<f64>> ContextProvider for Layered<'_, V> {
    fn get_var(&self, name: &str) -> Option<f64> {
        (self.vars)(name).or_else(|| self.base.get_var(name))
    }

    fn eval_func(&self, name: &str, args: &[f64]) -> Result<f64, FuncEvalError> {
        self.base.eval_func(name, args)
    }
}

/// A parsed expression carrying the evaluator's constants and functions.
///
/// Results are raw: infinities and NaN are returned as-is so numeric
/// methods can decide how to treat them.
pub struct CompiledExpr {
    context: Context<'static>,
    expr: Expr,
    source: String,
}

impl CompiledExpr {
    /// Normalized text of the expression.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn eval_layered(&self, vars: impl Fn(&str) -> Option<f64>) -> Result<f64, EvalError> {
        let ctx = Layered {
            vars,
            base: &self.context,
        };
        self.expr.eval_with_context(ctx).map_err(EvalError::from)
    }

    pub fn eval(&self, scope: &Scope) -> Result<f64, EvalError> {
        self.eval_layered(|name| scope.get(name))
    }

    /// Evaluates with a single variable bound.
    pub fn eval_at(&self, var: &str, value: f64) -> Result<f64, EvalError> {
        self.eval_layered(|name| (name == var).then_some(value))
    }

    pub fn eval_xy(&self, x: f64, y: f64) -> Result<f64, EvalError> {
        self.eval_layered(|name| match name {
            "x" => Some(x),
            "y" => Some(y),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_arithmetic() {
        let evaluator = Evaluator::new();
        let value = evaluator.evaluate("2 + 3 * 4", &Scope::new()).unwrap();
        assert_eq!(value, 14.0);
    }

    #[test]
    fn test_unicode_operators_are_normalized() {
        let evaluator = Evaluator::new();
        assert_eq!(normalize_operators("6 × 2 ÷ 3 − 1"), "6 * 2 / 3 - 1");
        let value = evaluator.evaluate("6 × 2 ÷ 3 − 1", &Scope::new()).unwrap();
        assert!((value - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_scope_variables() {
        let evaluator = Evaluator::new();
        let scope = Scope::new().with("x", 3.0).with("n", 2.0);
        let value = evaluator.evaluate("x^n + 1", &scope).unwrap();
        assert!((value - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_scope_overrides_constant() {
        let evaluator = Evaluator::new();
        let scope = Scope::new().with("e", 2.0);
        assert_eq!(evaluator.evaluate("e", &scope).unwrap(), 2.0);
    }

    #[test]
    fn test_constants_and_extra_functions() {
        let evaluator = Evaluator::new().with_constant("g", 9.81);
        let value = evaluator.evaluate("g * 2", &Scope::new()).unwrap();
        assert!((value - 19.62).abs() < 1e-12);
        let log = evaluator.evaluate("log(e)", &Scope::new()).unwrap();
        assert!((log - 1.0).abs() < 1e-12);
        let log10 = evaluator.evaluate("log10(1000)", &Scope::new()).unwrap();
        assert!((log10 - 3.0).abs() < 1e-12);
        let tau = evaluator.evaluate("tau / 2", &Scope::new()).unwrap();
        assert!((tau - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_empty_expression() {
        let evaluator = Evaluator::new();
        let err = evaluator.evaluate("   ", &Scope::new()).unwrap_err();
        assert!(matches!(err, EngineError::EmptyExpression));
    }

    #[test]
    fn test_division_by_zero_is_classified() {
        let evaluator = Evaluator::new();
        let err = evaluator.evaluate("5/0", &Scope::new()).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvalError::DivisionByZero)));
    }

    #[test]
    fn test_unknown_variable_is_classified() {
        let evaluator = Evaluator::new();
        let err = evaluator.evaluate("x + 1", &Scope::new()).unwrap_err();
        match err {
            EngineError::Evaluation(EvalError::UnknownVariable(name)) => assert_eq!(name, "x"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_function_is_classified() {
        let evaluator = Evaluator::new();
        let err = evaluator.evaluate("frobnicate(2)", &Scope::new()).unwrap_err();
        match err {
            EngineError::Evaluation(EvalError::UnknownFunction(name)) => assert_eq!(name, "frobnicate"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_is_classified() {
        let evaluator = Evaluator::new();
        let err = evaluator.evaluate("2 + * 3", &Scope::new()).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvalError::Syntax(_))));
        let err = evaluator.evaluate("(1 + 2", &Scope::new()).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvalError::Syntax(_))));
    }

    #[test]
    fn test_compiled_expression_reused_across_scopes() {
        let evaluator = Evaluator::new().with_constant("k", 10.0);
        let compiled = evaluator.compile("k * x + y + 1").unwrap();
        assert_eq!(compiled.eval_xy(1.0, 2.0).unwrap(), 13.0);
        assert_eq!(compiled.eval_xy(3.0, 0.5).unwrap(), 31.5);
        // Bindings from one call do not leak into the next.
        assert!(matches!(
            compiled.eval_at("x", 1.0).unwrap_err(),
            EvalError::UnknownVariable(name) if name == "y"
        ));
        let scope = Scope::new().with("x", 2.0).with("y", 1.0).with("k", 0.5);
        assert_eq!(compiled.eval(&scope).unwrap(), 3.0);
    }

    #[test]
    fn test_wrong_argument_count_is_syntax_error() {
        let evaluator = Evaluator::new();
        let err = evaluator.evaluate("sin(1, 2)", &Scope::new()).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvalError::Syntax(_))));
    }

    #[test]
    fn test_compiled_expression_returns_raw_values() {
        let evaluator = Evaluator::new();
        let compiled = evaluator.compile("1 / x").unwrap();
        assert_eq!(compiled.source(), "1 / x");
        assert!(compiled.eval_at("x", 0.0).unwrap().is_infinite());
        assert_eq!(compiled.eval_at("x", 4.0).unwrap(), 0.25);
    }
}
