//! Strongly-typed table name wrapper.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Name of a catalog table, optionally schema-qualified ("gold.dimdate").
///
/// Keeps table identities apart from column names and other strings that
/// flow through the merge and dimension builders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Create a new `TableName`, panicking in debug builds if the name is empty.
    ///
    /// Prefer [`try_new`](Self::try_new) when handling untrusted input.
    pub fn new(name: impl Into<String>) -> Self {
        let s = name.into();
        debug_assert!(!s.is_empty(), "TableName must not be empty");
        Self(s)
    }

    /// Try to create a new `TableName`, returning `None` if the name is empty.
    pub fn try_new(name: impl Into<String>) -> Option<Self> {
        let s = name.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema part of a qualified name (`gold` for `gold.dimdate`).
    pub fn schema(&self) -> Option<&str> {
        self.0.rfind('.').map(|pos| &self.0[..pos])
    }

    /// Unqualified table part (`dimdate` for `gold.dimdate`).
    pub fn table(&self) -> &str {
        match self.0.rfind('.') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for TableName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TableName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TableName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<&str> for TableName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unqualified_name() {
        let name = TableName::new("sales_silver");
        assert_eq!(name.schema(), None);
        assert_eq!(name.table(), "sales_silver");
    }

    #[test]
    fn test_qualified_name() {
        let name = TableName::new("gold.dimdate");
        assert_eq!(name.schema(), Some("gold"));
        assert_eq!(name.table(), "dimdate");
        assert_eq!(format!("{}", name), "gold.dimdate");
    }

    #[test]
    fn test_try_new_empty() {
        assert!(TableName::try_new("").is_none());
        assert_eq!(TableName::try_new("t").unwrap(), "t");
    }

    #[test]
    fn test_serde_transparent() {
        let name: TableName = serde_json::from_str("\"factsales_gold\"").unwrap();
        assert_eq!(name, "factsales_gold");
    }
}
