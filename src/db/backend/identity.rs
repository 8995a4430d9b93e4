//! Managed identity access tokens for Azure SQL.
//!
//! On App Service the platform exposes `IDENTITY_ENDPOINT` and
//! `IDENTITY_HEADER`; elsewhere (VMs, container hosts) the instance metadata
//! service answers on a fixed link-local address. Both return an OAuth token
//! for the requested resource plus its expiry in epoch seconds.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Token audience for Azure SQL Database.
pub const AZURE_SQL_RESOURCE: &str = "https://database.windows.net/";

/// Instance metadata token endpoint.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IMDS_API_VERSION: &str = "2018-02-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A bearer token and the instant it stops being accepted.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where to ask for a token.
#[derive(Debug, Clone)]
pub enum IdentitySource {
    AppService { endpoint: String, header: String },
    InstanceMetadata { endpoint: String },
}

impl IdentitySource {
    /// App Service when both endpoint and header are known, otherwise IMDS.
    pub fn resolve(endpoint: Option<&str>, header: Option<&str>) -> Self {
        match (endpoint, header) {
            (Some(endpoint), Some(header)) => Self::AppService {
                endpoint: endpoint.to_string(),
                header: header.to_string(),
            },
            _ => Self::InstanceMetadata {
                endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            },
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::AppService { .. } => "app-service",
            Self::InstanceMetadata { .. } => "instance-metadata",
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_on: ExpiresOn,
}

/// IMDS and newer App Service versions send a numeric string; some hosts
/// send a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresOn {
    Seconds(i64),
    Text(String),
}

impl ExpiresOn {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Seconds(secs) => DateTime::from_timestamp(*secs, 0),
            Self::Text(text) => match text.trim().parse::<i64>() {
                Ok(secs) => DateTime::from_timestamp(secs, 0),
                Err(_) => DateTime::parse_from_rfc3339(text.trim())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            },
        }
    }
}

/// Fetch an Azure SQL access token for the given identity.
///
/// `client_id` selects a user-assigned identity; `None` uses the
/// system-assigned one. Every failure maps to [`DbError::Credential`].
pub async fn fetch_token(
    source: &IdentitySource,
    client_id: Option<&str>,
) -> DbResult<AccessToken> {
    let http = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| credential_error(source, format!("cannot build HTTP client: {e}")))?;

    let mut query: Vec<(&str, &str)> = vec![("resource", AZURE_SQL_RESOURCE)];
    if let Some(id) = client_id {
        query.push(("client_id", id));
    }

    let request = match source {
        IdentitySource::AppService { endpoint, header } => {
            query.push(("api-version", APP_SERVICE_API_VERSION));
            http.get(endpoint.as_str())
                .query(&query)
                .header("X-IDENTITY-HEADER", header.as_str())
        }
        IdentitySource::InstanceMetadata { endpoint } => {
            query.push(("api-version", IMDS_API_VERSION));
            http.get(endpoint.as_str()).query(&query).header("Metadata", "true")
        }
    };

    debug!(source = source.name(), "Requesting managed identity token");

    let response = request
        .send()
        .await
        .map_err(|e| credential_error(source, format!("request failed: {e}")))?
        .error_for_status()
        .map_err(|e| credential_error(source, format!("endpoint rejected request: {e}")))?;

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| credential_error(source, format!("malformed token response: {e}")))?;

    let expires_at = body.expires_on.to_datetime().ok_or_else(|| {
        credential_error(source, "token response has an unreadable expires_on".to_string())
    })?;

    info!(source = source.name(), %expires_at, "Acquired managed identity token");

    Ok(AccessToken {
        token: body.access_token,
        expires_at,
    })
}

fn credential_error(source: &IdentitySource, message: String) -> DbError {
    DbError::credential(
        format!("Managed identity token ({}): {}", source.name(), message),
        "Check that a managed identity is assigned and granted access to the database",
    )
}
