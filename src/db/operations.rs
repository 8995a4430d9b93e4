//! Logical operations the handlers run against storage.
//!
//! Each operation renders to a [`Statement`] in the dialect of the active
//! backend. User input only ever reaches a statement as a bound parameter.

use crate::db::dialect::Dialect;
use crate::models::{MAX_QUOTE_LIST_LIMIT, NewQuote, QueryParam, Statement};

const USER_PROFILE_COLUMNS: &str = "id, name, email, created_at";
const QUOTE_SUMMARY_COLUMNS: &str = "id, company, tag_name, grid_size, colour, created_at";
const QUOTE_COLUMNS: &str = "id, company, tag_name, po_number, delivery, size_shape, \
     order_types, grid_size, colour, comments, measurements, created_at";

const QUOTE_INSERT_COLUMNS: [&str; 10] = [
    "company",
    "tag_name",
    "po_number",
    "delivery",
    "size_shape",
    "order_types",
    "grid_size",
    "colour",
    "comments",
    "measurements",
];

#[derive(Debug, Clone)]
pub enum Operation {
    /// Full user row including the password hash.
    FindUserByEmail { email: String },
    /// User row without the password hash.
    FindUserById { id: i64 },
    InsertUser {
        name: String,
        email: String,
        password_hash: String,
    },
    ListUsers,
    InsertQuote(NewQuote),
    /// Newest first; `limit` is capped at [`MAX_QUOTE_LIST_LIMIT`].
    ListQuotes { limit: u32 },
    FindQuoteById { id: i64 },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FindUserByEmail { .. } => "find_user_by_email",
            Self::FindUserById { .. } => "find_user_by_id",
            Self::InsertUser { .. } => "insert_user",
            Self::ListUsers => "list_users",
            Self::InsertQuote(_) => "insert_quote",
            Self::ListQuotes { .. } => "list_quotes",
            Self::FindQuoteById { .. } => "find_quote_by_id",
        }
    }

    pub fn statement(&self, dialect: Dialect) -> Statement {
        let p1 = dialect.placeholder(1);
        match self {
            Self::FindUserByEmail { email } => Statement::select(format!(
                "SELECT id, name, email, password, created_at FROM users WHERE email = {p1}"
            ))
            .with_param(email.as_str()),

            Self::FindUserById { id } => Statement::select(format!(
                "SELECT {USER_PROFILE_COLUMNS} FROM users WHERE id = {p1}"
            ))
            .with_param(*id),

            Self::InsertUser {
                name,
                email,
                password_hash,
            } => Statement::insert(dialect.insert_returning_id(
                "users",
                &["name", "email", "password"],
            ))
            .with_param(name.as_str())
            .with_param(email.as_str())
            .with_param(password_hash.as_str()),

            Self::ListUsers => Statement::select(format!(
                "SELECT {USER_PROFILE_COLUMNS} FROM users ORDER BY id"
            )),

            Self::InsertQuote(quote) => {
                Statement::insert(dialect.insert_returning_id("quotes", &QUOTE_INSERT_COLUMNS))
                    .with_params(quote_params(quote))
            }

            Self::ListQuotes { limit } => Statement::select(dialect.select_limited(
                QUOTE_SUMMARY_COLUMNS,
                "quotes",
                "id DESC",
                1,
            ))
            .with_param(i64::from((*limit).min(MAX_QUOTE_LIST_LIMIT))),

            Self::FindQuoteById { id } => Statement::select(format!(
                "SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = {p1}"
            ))
            .with_param(*id),
        }
    }
}

fn quote_params(quote: &NewQuote) -> Vec<QueryParam> {
    vec![
        quote.company.as_str().into(),
        quote.tag_name.as_str().into(),
        quote.po_number.clone().into(),
        quote.delivery.clone().into(),
        quote.size_shape.clone().into(),
        quote.order_types.clone().into(),
        quote.grid_size.clone().into(),
        quote.colour.clone().into(),
        quote.comments.clone().into(),
        quote.measurements.clone().into(),
    ]
}
