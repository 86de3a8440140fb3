//! Resolved query handed to the planner

use serde::{Deserialize, Serialize};
use xmlview_model::{Expr, TreePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub path: TreePath,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderKey {
    pub fn asc(path: &str) -> Self {
        Self {
            path: TreePath::dotted(path),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(path: &str) -> Self {
        Self {
            path: TreePath::dotted(path),
            direction: SortDirection::Desc,
        }
    }
}

/// `SELECT * FROM <document> [WHERE criteria] [ORDER BY keys]`, already parsed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XmlQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderKey>,
}

impl XmlQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, criteria: Expr) -> Self {
        self.criteria = Some(match self.criteria.take() {
            Some(existing) => existing.and(criteria),
            None => criteria,
        });
        self
    }

    pub fn order_by(mut self, key: OrderKey) -> Self {
        self.order_by.push(key);
        self
    }
}
