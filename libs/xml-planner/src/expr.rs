//! Expressions bound to mapping-class column slots
//!
//! Every path or column reference of a predicate, criteria or ORDER BY key is
//! resolved at plan time to a [`SlotRef`]; evaluation only needs a
//! [`RowScope`] able to return the current value of a slot.

use crate::error::{PlannerError, Result};
use crate::program::SlotRef;
use regex::Regex;
use std::fmt;
use xmlview_model::{CompareOp, Value};

/// Current rows visible to an expression.
pub trait RowScope {
    /// Value of `slot` in the nearest row of its class, `None` if no such row
    /// is in scope.
    fn value(&self, slot: SlotRef) -> Option<&Value>;
}

/// SQL `LIKE` pattern compiled to an anchored regex.
#[derive(Clone)]
pub struct LikePattern {
    source: String,
    regex: Regex,
}

impl LikePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut re = String::with_capacity(pattern.len() + 8);
        re.push_str("(?s)^");
        for c in pattern.chars() {
            match c {
                '%' => re.push_str(".*"),
                '_' => re.push('.'),
                other => re.push_str(&regex::escape(&other.to_string())),
            }
        }
        re.push('$');
        let regex = Regex::new(&re).map_err(|_| PlannerError::InvalidPattern(pattern.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for LikePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LikePattern({:?})", self.source)
    }
}

#[derive(Debug, Clone)]
pub enum BoundExpr {
    Literal(Value),
    Slot(SlotRef),
    Compare {
        op: CompareOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Like {
        expr: Box<BoundExpr>,
        pattern: LikePattern,
        negated: bool,
    },
    In {
        expr: Box<BoundExpr>,
        list: Vec<BoundExpr>,
        negated: bool,
    },
    IsNull {
        expr: Box<BoundExpr>,
        negated: bool,
    },
    And(Vec<BoundExpr>),
    Or(Vec<BoundExpr>),
    Not(Box<BoundExpr>),
}

impl BoundExpr {
    /// Scalar value of the expression. Boolean operators yield
    /// `Value::Boolean`, or `Value::Null` when unknown.
    pub fn evaluate(&self, scope: &dyn RowScope) -> Value {
        match self {
            BoundExpr::Literal(value) => value.clone(),
            BoundExpr::Slot(slot) => scope.value(*slot).cloned().unwrap_or(Value::Null),
            _ => self.test(scope).map_or(Value::Null, Value::Boolean),
        }
    }

    /// Three-valued truth: `None` is SQL unknown.
    pub fn test(&self, scope: &dyn RowScope) -> Option<bool> {
        match self {
            BoundExpr::Literal(_) | BoundExpr::Slot(_) => self.evaluate(scope).as_bool(),
            BoundExpr::Compare { op, left, right } => {
                let left = left.evaluate(scope);
                let right = right.evaluate(scope);
                left.compare(&right).map(|ordering| op.holds(ordering))
            }
            BoundExpr::Like {
                expr,
                pattern,
                negated,
            } => {
                let text = expr.evaluate(scope).to_text()?;
                Some(pattern.is_match(&text) != *negated)
            }
            BoundExpr::In {
                expr,
                list,
                negated,
            } => {
                let value = expr.evaluate(scope);
                if value.is_null() {
                    return None;
                }
                let mut unknown = false;
                for item in list {
                    match value.compare(&item.evaluate(scope)) {
                        Some(std::cmp::Ordering::Equal) => return Some(!*negated),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(*negated)
                }
            }
            BoundExpr::IsNull { expr, negated } => {
                Some(expr.evaluate(scope).is_null() != *negated)
            }
            BoundExpr::And(operands) => {
                let mut result = Some(true);
                for operand in operands {
                    match operand.test(scope) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => result = None,
                    }
                }
                result
            }
            BoundExpr::Or(operands) => {
                let mut result = Some(false);
                for operand in operands {
                    match operand.test(scope) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => result = None,
                    }
                }
                result
            }
            BoundExpr::Not(operand) => operand.test(scope).map(|b| !b),
        }
    }

    /// All slots read by this expression.
    pub fn slots(&self) -> Vec<SlotRef> {
        let mut out = Vec::new();
        self.collect_slots(&mut out);
        out
    }

    fn collect_slots(&self, out: &mut Vec<SlotRef>) {
        match self {
            BoundExpr::Literal(_) => {}
            BoundExpr::Slot(slot) => out.push(*slot),
            BoundExpr::Compare { left, right, .. } => {
                left.collect_slots(out);
                right.collect_slots(out);
            }
            BoundExpr::Like { expr, .. } | BoundExpr::IsNull { expr, .. } => {
                expr.collect_slots(out)
            }
            BoundExpr::In { expr, list, .. } => {
                expr.collect_slots(out);
                for item in list {
                    item.collect_slots(out);
                }
            }
            BoundExpr::And(operands) | BoundExpr::Or(operands) => {
                for operand in operands {
                    operand.collect_slots(out);
                }
            }
            BoundExpr::Not(operand) => operand.collect_slots(out),
        }
    }
}
