//! Relational group names and XML namespaces

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub const XSI_PREFIX: &str = "xsi";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Fully-qualified relational group name (`model.group`).
///
/// Group names resolve case-insensitively, so equality and hashing ignore
/// ASCII case while `Display` keeps the declared spelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last dotted segment (`suppliers` for `xmltest.suppliers`).
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Whether `name` equals this group or its short name.
    pub fn matches(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name) || self.short_name().eq_ignore_ascii_case(name)
    }
}

impl PartialEq for QualifiedName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for QualifiedName {}

impl Hash for QualifiedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QualifiedName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.0
    }
}

/// XML namespace binding. The empty prefix denotes the default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(default)]
    pub prefix: String,
    pub uri: String,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }

    pub fn xsi() -> Self {
        Self::new(XSI_PREFIX, XSI_NAMESPACE)
    }

    pub fn is_default(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Qualified form of `local` under this namespace's prefix.
    pub fn qualify(&self, local: &str) -> String {
        if self.prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}:{}", self.prefix, local)
        }
    }
}
