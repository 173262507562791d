//! Row and per-row error types.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An ordered mapping of column name to value.
///
/// The schema belongs to the entity plugin; the codecs treat rows as opaque
/// ordered pairs. Setting an existing column replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Builds a row from `(column, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.set(column, value);
        }
        row
    }

    /// Sets a column value, keeping the column's original position.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(c, _)| *c == column) {
            slot.1 = value;
        } else {
            self.fields.push((column, value));
        }
    }

    /// Sets a column value, returning the row.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    /// Returns the value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the values for `columns` in order, empty for missing ones.
    #[must_use]
    pub fn project<'a>(&'a self, columns: &[String]) -> Vec<&'a str> {
        columns
            .iter()
            .map(|c| self.get(c).unwrap_or(""))
            .collect()
    }

    /// Iterates over `(column, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if every value is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.trim().is_empty())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((column, value)) = access.next_entry::<String, String>()? {
                    row.set(column, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// A row that failed decode, validation, or apply.
///
/// Collected per window and returned to the caller; never dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based position of the data row in the file (header excluded).
    pub row_index: usize,
    /// Why the row was rejected.
    pub reason: String,
}

impl RowError {
    /// Creates a row error.
    #[must_use]
    pub fn new(row_index: usize, reason: impl Into<String>) -> Self {
        Self {
            row_index,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row_index, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_column_order() {
        let row = Row::new().with("name", "Ada").with("id", "1");
        let columns: Vec<_> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["name", "id"]);
    }

    #[test]
    fn test_row_set_replaces_in_place() {
        let mut row = Row::from_pairs([("id", "1"), ("name", "Ada")]);
        row.set("id", "2");
        assert_eq!(row.get("id"), Some("2"));
        assert_eq!(row.len(), 2);
        assert_eq!(row.iter().next(), Some(("id", "2")));
    }

    #[test]
    fn test_row_project_fills_missing() {
        let row = Row::from_pairs([("id", "1")]);
        let columns = vec!["id".to_string(), "email".to_string()];
        assert_eq!(row.project(&columns), vec!["1", ""]);
    }

    #[test]
    fn test_row_json_keeps_order() {
        let row = Row::from_pairs([("z", "last"), ("a", "first")]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"z":"last","a":"first"}"#);

        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_row_blank() {
        assert!(Row::from_pairs([("a", " "), ("b", "")]).is_blank());
        assert!(!Row::from_pairs([("a", "x")]).is_blank());
    }

    #[test]
    fn test_row_error_display() {
        let err = RowError::new(4, "email: must not be empty");
        assert_eq!(err.to_string(), "Row 4: email: must not be empty");
    }
}
