//! Compiled conditions and their evaluation
//!
//! A [`ConditionExpr`] is a tagged predicate over one entry of the result set
//! of an attempt. Conditions are built once by [`crate::parser`] and evaluated
//! on every attempt by [`ConditionExpr::evaluate`], a pure function of the
//! expression and the results.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use regex::Regex;
use serde_json::Value;
use crate::error::{ErrorKind, RunError};

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    NotContains,
    Matches,
}

impl Operator {
    /// Canonical textual token
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Contains => "contains",
            Operator::NotContains => "not contains",
            Operator::Matches => "matches",
        }
    }

    fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Neq | Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Literal right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    /// A number, with the text it was written as
    Number { value: f64, text: String },
}

impl Operand {
    /// Coerce unquoted operand text: numbers become `Number`, the rest `Text`.
    pub fn coerce(text: &str) -> Self {
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Operand::Number { value, text: text.to_string() },
            _ => Operand::Text(text.to_string()),
        }
    }

    /// String representation used by string comparisons
    pub fn as_text(&self) -> &str {
        match self {
            Operand::Text(s) => s,
            Operand::Number { text, .. } => text,
        }
    }
}

/// One step of a structured path after `result[i]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A compiled condition
///
/// Fields are read-only after [`ConditionExpr::new`]: the regex of a
/// `matches` condition is compiled from the operator and operand there.
#[derive(Debug, Clone)]
pub struct ConditionExpr {
    result_index: usize,
    path: Vec<PathSegment>,
    operator: Operator,
    negate: bool,
    operand: Operand,
    raw: String,
    /// Present exactly when `operator` is `Matches`
    pattern: Option<Regex>,
}

impl ConditionExpr {
    /// Build a condition. For `matches` the operand is compiled as a regex here,
    /// so an invalid pattern fails up front rather than on evaluation.
    pub fn new(
        raw: impl Into<String>,
        result_index: usize,
        path: Vec<PathSegment>,
        operator: Operator,
        negate: bool,
        operand: Operand,
    ) -> Result<Self, RunError> {
        let raw = raw.into();
        let pattern = if operator == Operator::Matches {
            Some(compile_regex(operand.as_text()).map_err(|e| RunError::syntax(&raw, e))?)
        } else {
            None
        };
        Ok(Self { result_index, path, operator, negate, operand, raw, pattern })
    }

    /// Index into the result set of the attempt
    pub fn result_index(&self) -> usize {
        self.result_index
    }

    /// Path into the JSON-decoded result; empty for raw text access
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Set by a `not` modifier in front of the operator
    pub fn is_negated(&self) -> bool {
        self.negate
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Original text, kept for reporting
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Evaluate against the results of one attempt.
    ///
    /// Referencing a result (or a path inside it) that does not exist is an
    /// `IndexOutOfRange` error, never a plain `false`.
    pub fn evaluate(&self, results: &[String]) -> Result<bool, RunError> {
        let raw = results.get(self.result_index).ok_or_else(|| {
            RunError::new(
                ErrorKind::IndexOutOfRange,
                format!(
                    "result[{}] is out of range: {} command result(s) available",
                    self.result_index,
                    results.len()
                ),
            )
            .with_condition(&self.raw)
        })?;

        let value: Cow<'_, str> = if self.path.is_empty() {
            Cow::Borrowed(raw.as_str())
        } else {
            Cow::Owned(self.lookup(raw)?)
        };

        let outcome = match self.operator {
            Operator::Contains => value.contains(self.operand.as_text()),
            Operator::NotContains => !value.contains(self.operand.as_text()),
            Operator::Matches => match self.pattern {
                Some(ref re) => re.is_match(&value),
                None => unreachable!("matches condition built without a pattern"),
            },
            op => {
                debug_assert!(op.is_ordering());
                let ord = compare(&value, &self.operand);
                match op {
                    Operator::Eq => ord == Ordering::Equal,
                    Operator::Neq => ord != Ordering::Equal,
                    Operator::Gt => ord == Ordering::Greater,
                    Operator::Ge => ord != Ordering::Less,
                    Operator::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                }
            }
        };

        Ok(outcome != self.negate)
    }

    fn lookup(&self, raw: &str) -> Result<String, RunError> {
        let not_found = || {
            RunError::new(ErrorKind::IndexOutOfRange, "unable to apply conditional to result")
                .with_condition(&self.raw)
        };

        let root: Value = serde_json::from_str(raw).map_err(|_| not_found())?;
        let mut current = &root;
        for seg in &self.path {
            current = match seg {
                PathSegment::Key(k) => current.get(k.as_str()),
                PathSegment::Index(i) => current.get(*i),
            }
            .ok_or_else(|| not_found())?;
        }

        Ok(match current {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Evaluate `expr` against `results`
pub fn evaluate(expr: &ConditionExpr, results: &[String]) -> Result<bool, RunError> {
    expr.evaluate(results)
}

/// Numeric when both sides are finite numbers, otherwise string ordering.
fn compare(value: &str, operand: &Operand) -> Ordering {
    if let Operand::Number { value: rhs, .. } = operand {
        match value.trim().parse::<f64>() {
            // finite on both sides, so never incomparable
            Ok(lhs) if lhs.is_finite() => return lhs.partial_cmp(rhs).unwrap_or(Ordering::Equal),
            _ => {}
        }
    }
    value.cmp(operand.as_text())
}

/// Compile a pattern with multiline mode and a size limit to
/// mitigate ReDoS (CWE-1333).
fn compile_regex(pattern: &str) -> Result<Regex, String> {
    regex::RegexBuilder::new(&format!("(?m){}", pattern))
        .size_limit(1 << 20)
        .build()
        .map_err(|e| format!("invalid regex: {}", e))
}
