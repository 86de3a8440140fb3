//! Predicate and criteria expressions over document paths and columns
//!
//! Expressions arrive already parsed from the query front end. They reference
//! the mapping tree either through [`TreePath`]s (query predicates, ORDER BY
//! keys) or through [`ColumnRef`]s (criteria declared on mapping nodes).

use crate::error::ModelError;
use crate::name::QualifiedName;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One segment of a [`TreePath`]. `attribute` pins the segment to attributes
/// (written `@name`); otherwise it matches elements and attributes alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub name: String,
    pub attribute: bool,
}

impl PathSegment {
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute: false,
        }
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute: true,
        }
    }

    /// Whether this (query) segment matches a document segment.
    pub fn matches(&self, actual: &PathSegment) -> bool {
        (!self.attribute || actual.attribute) && self.name.eq_ignore_ascii_case(&actual.name)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attribute {
            write!(f, "@{}", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Dotted path of element/attribute names, e.g. `Item.Suppliers.Supplier.SupplierID`.
///
/// Paths match document nodes by suffix, so a bare `SupplierID` refers to any
/// node whose full path ends in that name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath {
    segments: Vec<PathSegment>,
}

impl TreePath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn parse(input: &str) -> Result<Self, ModelError> {
        input.parse()
    }

    /// Split a dotted path without validating it. Empty segments survive and
    /// simply never match a document node.
    pub fn dotted(input: &str) -> Self {
        let segments = input
            .split('.')
            .map(|raw| {
                let raw = raw.trim();
                match raw.strip_prefix('@') {
                    Some(name) => PathSegment::attribute(name),
                    None => PathSegment::element(raw),
                }
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Whether `full` (a complete document path) ends with this path.
    pub fn is_suffix_of(&self, full: &[PathSegment]) -> bool {
        if self.segments.len() > full.len() {
            return false;
        }
        let offset = full.len() - self.segments.len();
        self.segments
            .iter()
            .zip(&full[offset..])
            .all(|(wanted, actual)| wanted.matches(actual))
    }
}

impl FromStr for TreePath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = TreePath::dotted(s);
        if path.segments.iter().any(|segment| segment.name.is_empty()) {
            return Err(ModelError::InvalidPath(s.to_string()));
        }
        Ok(path)
    }
}

impl TryFrom<String> for TreePath {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TreePath> for String {
    fn from(value: TreePath) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Column of a bound group. Without `group` the column belongs to the owning
/// mapping class; with `group` it names the nearest ancestor class bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ColumnRef {
    pub group: Option<QualifiedName>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            group: None,
            column: column.into(),
        }
    }

    pub fn qualified(group: impl Into<QualifiedName>, column: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            column: column.into(),
        }
    }
}

impl From<String> for ColumnRef {
    fn from(value: String) -> Self {
        match value.rsplit_once('.') {
            Some((group, column)) => ColumnRef::qualified(group, column),
            None => ColumnRef::new(value),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(value: &str) -> Self {
        ColumnRef::from(value.to_string())
    }
}

impl From<ColumnRef> for String {
    fn from(value: ColumnRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}.{}", group, self.column),
            None => f.write_str(&self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Ne => ordering != Equal,
            CompareOp::Lt => ordering == Less,
            CompareOp::Le => ordering != Greater,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Ge => ordering != Less,
        }
    }
}

/// Unresolved expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    Literal {
        value: Value,
    },
    /// Reference to the value of an element or attribute in the document.
    Path {
        path: TreePath,
    },
    /// Reference to a column of a bound group.
    Column {
        column: ColumnRef,
    },
    /// `context(scope, target)`: the value of `target`, restricting rows of
    /// the mapping class owning `scope`.
    Context {
        scope: TreePath,
        target: TreePath,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Like {
        expr: Box<Expr>,
        pattern: String,
        #[serde(default)]
        negated: bool,
    },
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        #[serde(default)]
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        #[serde(default)]
        negated: bool,
    },
    And {
        operands: Vec<Expr>,
    },
    Or {
        operands: Vec<Expr>,
    },
    Not {
        operand: Box<Expr>,
    },
    /// `rowlimit(target)` / `rowlimitexception(target)` pseudo-function.
    RowLimit {
        target: TreePath,
        #[serde(default)]
        exception: bool,
    },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    pub fn path(path: &str) -> Self {
        Expr::Path {
            path: TreePath::dotted(path),
        }
    }

    pub fn column(column: impl Into<ColumnRef>) -> Self {
        Expr::Column {
            column: column.into(),
        }
    }

    pub fn context(scope: &str, target: &str) -> Self {
        Expr::Context {
            scope: TreePath::dotted(scope),
            target: TreePath::dotted(target),
        }
    }

    pub fn row_limit(target: &str, limit: i64) -> Self {
        Self::limit_call(target, false).equals(Expr::literal(limit))
    }

    pub fn row_limit_exception(target: &str, limit: i64) -> Self {
        Self::limit_call(target, true).equals(Expr::literal(limit))
    }

    fn limit_call(target: &str, exception: bool) -> Self {
        Expr::RowLimit {
            target: TreePath::dotted(target),
            exception,
        }
    }

    pub fn compare(self, op: CompareOp, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn equals(self, right: Expr) -> Self {
        self.compare(CompareOp::Eq, right)
    }

    pub fn not_equals(self, right: Expr) -> Self {
        self.compare(CompareOp::Ne, right)
    }

    pub fn greater_than(self, right: Expr) -> Self {
        self.compare(CompareOp::Gt, right)
    }

    pub fn less_than(self, right: Expr) -> Self {
        self.compare(CompareOp::Lt, right)
    }

    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: false,
        }
    }

    pub fn in_list(self, list: Vec<Expr>) -> Self {
        Expr::In {
            expr: Box::new(self),
            list,
            negated: false,
        }
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And {
            operands: vec![self, other],
        }
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or {
            operands: vec![self, other],
        }
    }

    pub fn negate(self) -> Self {
        Expr::Not {
            operand: Box::new(self),
        }
    }

    /// Split top-level `AND`s into independent conjuncts.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Expr::And { operands } => {
                for operand in operands {
                    operand.collect_conjuncts(out);
                }
            }
            other => out.push(other),
        }
    }

    /// Visit this expression and every sub-expression, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Compare { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Like { expr, .. } | Expr::IsNull { expr, .. } => expr.walk(visit),
            Expr::In { expr, list, .. } => {
                expr.walk(visit);
                for item in list {
                    item.walk(visit);
                }
            }
            Expr::And { operands } | Expr::Or { operands } => {
                for operand in operands {
                    operand.walk(visit);
                }
            }
            Expr::Not { operand } => operand.walk(visit),
            Expr::Literal { .. }
            | Expr::Path { .. }
            | Expr::Column { .. }
            | Expr::Context { .. }
            | Expr::RowLimit { .. } => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value } => match value {
                Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
                Value::Null => f.write_str("NULL"),
                other => write!(f, "{}", other),
            },
            Expr::Path { path } => write!(f, "{}", path),
            Expr::Column { column } => write!(f, "{}", column),
            Expr::Context { scope, target } => write!(f, "context({}, {})", scope, target),
            Expr::Compare { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} {}LIKE '{}'", expr, not, pattern)
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} {}IN (", expr, not)?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            Expr::IsNull { expr, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} IS {}NULL", expr, not)
            }
            Expr::And { operands } => write_joined(f, operands, " AND "),
            Expr::Or { operands } => write_joined(f, operands, " OR "),
            Expr::Not { operand } => write!(f, "NOT ({})", operand),
            Expr::RowLimit { target, exception } => {
                let function = if *exception {
                    "rowlimitexception"
                } else {
                    "rowlimit"
                };
                write!(f, "{}({})", function, target)
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Expr], separator: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", operand)?;
    }
    f.write_str(")")
}
