//! Data models for the quote API.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;
pub mod quote;
pub mod user;

// Re-export commonly used types
pub use query::{
    JsonRow, MAX_QUOTE_LIST_LIMIT, NormalizedResult, QueryParam, Statement, StatementKind,
};
pub use quote::{
    NewQuote, OrderTypes, QuoteDetail, QuoteRecord, QuoteRequest, QuoteSummary,
    split_order_types,
};
pub use user::{
    AuthResponse, LoginRequest, MIN_PASSWORD_LEN, NewUser, PublicUser, RegisterRequest,
    UserProfile, UserRecord,
};
