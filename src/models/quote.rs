//! Quote submission models.
//!
//! Requests arrive in camelCase. `orderTypes` is accepted either as a list or
//! as a single string and stored comma-joined, so list items may not contain
//! a comma. Text fields also accept numbers and booleans, stored as their
//! JSON text. `measurements` is any JSON value and stored as its serialized
//! text. Rows read back use the column names of the `quotes` table.

use crate::models::user::present;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

const ORDER_TYPES_SEPARATOR: &str = ",";

/// `orderTypes` as submitted by the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderTypes {
    List(Vec<String>),
    Single(String),
}

impl OrderTypes {
    /// Stored form: list joined with commas, `None` when empty.
    ///
    /// A list item containing the separator would split apart on read, so it
    /// is rejected.
    pub fn to_column(&self) -> Result<Option<String>, &'static str> {
        let joined = match self {
            Self::List(items) => {
                if items.iter().any(|item| item.contains(ORDER_TYPES_SEPARATOR)) {
                    return Err("orderTypes entries cannot contain commas");
                }
                items.join(ORDER_TYPES_SEPARATOR)
            }
            Self::Single(value) => value.clone(),
        };
        Ok(present(Some(joined)))
    }
}

/// Split a stored `order_types` column back into its items.
pub fn split_order_types(column: &str) -> Vec<String> {
    column
        .split(ORDER_TYPES_SEPARATOR)
        .map(String::from)
        .collect()
}

/// Text field that may arrive as a JSON string, number or boolean.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s)),
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(JsonValue::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(D::Error::custom("expected a string, number or boolean")),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(default, deserialize_with = "scalar_text")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub tag_name: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub po_number: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub delivery: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub size_shape: Option<String>,
    pub order_types: Option<OrderTypes>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub grid_size: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub colour: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub comments: Option<String>,
    #[serde(default)]
    pub measurements: Option<JsonValue>,
}

/// Quote ready for insertion: mandatory fields checked, optional ones
/// normalized to `None` when absent or empty.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuote {
    pub company: String,
    pub tag_name: String,
    pub po_number: Option<String>,
    pub delivery: Option<String>,
    pub size_shape: Option<String>,
    pub order_types: Option<String>,
    pub grid_size: Option<String>,
    pub colour: Option<String>,
    pub comments: Option<String>,
    pub measurements: Option<String>,
}

impl QuoteRequest {
    pub fn validate(self) -> Result<NewQuote, &'static str> {
        let (Some(company), Some(tag_name)) = (present(self.company), present(self.tag_name))
        else {
            return Err("company and tagName are required");
        };

        let order_types = match &self.order_types {
            Some(order_types) => order_types.to_column()?,
            None => None,
        };
        let measurements = match self.measurements {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(value.to_string()),
        };

        Ok(NewQuote {
            company,
            tag_name,
            po_number: present(self.po_number),
            delivery: present(self.delivery),
            size_shape: present(self.size_shape),
            order_types,
            grid_size: present(self.grid_size),
            colour: present(self.colour),
            comments: present(self.comments),
            measurements,
        })
    }
}

/// Columns returned by the quote listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub id: i64,
    pub company: String,
    pub tag_name: String,
    pub grid_size: Option<String>,
    pub colour: Option<String>,
    pub created_at: Option<String>,
}

/// Full `quotes` row as stored.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRecord {
    pub id: i64,
    pub company: String,
    pub tag_name: String,
    pub po_number: Option<String>,
    pub delivery: Option<String>,
    pub size_shape: Option<String>,
    pub order_types: Option<String>,
    pub grid_size: Option<String>,
    pub colour: Option<String>,
    pub comments: Option<String>,
    pub measurements: Option<String>,
    pub created_at: Option<String>,
}

/// A stored quote with `order_types` and `measurements` decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteDetail {
    pub id: i64,
    pub company: String,
    pub tag_name: String,
    pub po_number: Option<String>,
    pub delivery: Option<String>,
    pub size_shape: Option<String>,
    pub order_types: Option<Vec<String>>,
    pub grid_size: Option<String>,
    pub colour: Option<String>,
    pub comments: Option<String>,
    pub measurements: Option<JsonValue>,
    pub created_at: Option<String>,
}

impl From<QuoteRecord> for QuoteDetail {
    fn from(record: QuoteRecord) -> Self {
        // Text that is not valid JSON is passed through as a string.
        let measurements = record.measurements.map(|text| {
            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
        });

        Self {
            id: record.id,
            company: record.company,
            tag_name: record.tag_name,
            po_number: record.po_number,
            delivery: record.delivery,
            size_shape: record.size_shape,
            order_types: record.order_types.as_deref().map(split_order_types),
            grid_size: record.grid_size,
            colour: record.colour,
            comments: record.comments,
            measurements,
            created_at: record.created_at,
        }
    }
}
