//! Statement and result models shared by every backend.
//!
//! A [`Statement`] is SQL text in one backend's dialect plus positional
//! parameters; drivers always bind the parameters and never splice them into
//! the text. A [`NormalizedResult`] is what every driver hands back,
//! regardless of how its engine reports rows or generated ids.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// Upper bound on rows returned by the quote listing.
pub const MAX_QUOTE_LIST_LIMIT: u32 = 200;

/// A JSON object keyed by column name.
pub type JsonRow = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized statements. Every column the
/// service writes is an integer id or text.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Int(i64),
    String(String),
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Whether a statement reads rows or inserts one and reports its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
}

/// Dialect-specific SQL text with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub kind: StatementKind,
}

impl Statement {
    pub fn select(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            kind: StatementKind::Select,
        }
    }

    pub fn insert(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            kind: StatementKind::Insert,
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = QueryParam>) -> Self {
        self.params.extend(params);
        self
    }
}

/// Rows plus the generated id of an insert, independent of backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResult {
    pub rows: Vec<JsonRow>,
    pub inserted_id: Option<i64>,
}

impl NormalizedResult {
    pub fn from_rows(rows: Vec<JsonRow>) -> Self {
        Self {
            rows,
            inserted_id: None,
        }
    }

    pub fn inserted(id: i64) -> Self {
        Self {
            rows: Vec::new(),
            inserted_id: Some(id),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Deserialize every row into `T`.
    pub fn rows_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        self.rows
            .iter()
            .map(|row| serde_json::from_value(JsonValue::Object(row.clone())))
            .collect()
    }

    /// Deserialize the first row into `T`, if there is one.
    pub fn first_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.rows
            .first()
            .map(|row| serde_json::from_value(JsonValue::Object(row.clone())))
            .transpose()
    }
}
