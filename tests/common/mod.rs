//! Shared checks for the server backends. Each backend test file builds a
//! manager from environment variables and skips when they are absent.

use quote_api::DbError;
use quote_api::db::{ConnectionManager, Operation, QueryExecutor};
use quote_api::models::{NewQuote, QuoteDetail, QuoteRecord, QuoteSummary, UserProfile, UserRecord};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Email unique to this run so repeated runs against one server don't collide.
pub fn unique_email(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}-{nanos}@example.com")
}

/// Users and quotes round trip through the executor, including the unique
/// email constraint and reconnect after close.
pub async fn exercise_backend(manager: Arc<ConnectionManager>) {
    manager.initialize().await.unwrap();
    // Creating the schema again must be harmless
    manager.acquire().await.unwrap().ensure_schema().await.unwrap();

    let db = QueryExecutor::new(manager.clone());
    let email = unique_email(&manager.kind().to_string().to_lowercase().replace(' ', "-"));

    let id = db
        .insert(&Operation::InsertUser {
            name: "Alice".into(),
            email: email.clone(),
            password_hash: "hash".into(),
        })
        .await
        .unwrap();
    assert!(id > 0);

    let duplicate = db
        .insert(&Operation::InsertUser {
            name: "Alice again".into(),
            email: email.clone(),
            password_hash: "hash".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(duplicate, DbError::Conflict { .. }), "{duplicate:?}");

    let record: UserRecord = db
        .fetch_optional(&Operation::FindUserByEmail { email: email.clone() })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.password, "hash");

    let profile: UserProfile = db
        .fetch_optional(&Operation::FindUserById { id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.email, email);
    assert!(profile.created_at.unwrap().ends_with('Z'));

    let quote_id = db
        .insert(&Operation::InsertQuote(NewQuote {
            company: "Acme".into(),
            tag_name: "T1".into(),
            po_number: None,
            delivery: None,
            size_shape: None,
            order_types: Some("A,B".into()),
            grid_size: Some("10x10".into()),
            colour: None,
            comments: None,
            measurements: Some(r#"{"w":10}"#.into()),
        }))
        .await
        .unwrap();

    let quotes: Vec<QuoteSummary> = db
        .fetch_all(&Operation::ListQuotes { limit: 200 })
        .await
        .unwrap();
    assert!(quotes.len() <= 200);
    assert_eq!(quotes[0].id, quote_id);

    let record: QuoteRecord = db
        .fetch_optional(&Operation::FindQuoteById { id: quote_id })
        .await
        .unwrap()
        .unwrap();
    let detail = QuoteDetail::from(record);
    assert_eq!(detail.order_types, Some(vec!["A".to_string(), "B".to_string()]));
    assert_eq!(detail.measurements, Some(serde_json::json!({ "w": 10 })));

    manager.acquire().await.unwrap().close().await;
    let users: Vec<UserProfile> = db.fetch_all(&Operation::ListUsers).await.unwrap();
    assert!(users.iter().any(|u| u.id == id));
    assert_eq!(manager.reconnect_count(), 1);

    manager.shutdown().await;
}
