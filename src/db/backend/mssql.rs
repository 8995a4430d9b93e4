//! SQL Server / Azure SQL driver.
//!
//! tiberius exposes a single connection rather than a pool, so the handle is
//! one client behind an async mutex. Statements on the handle are serialized.
//! The handle stops reporting itself connected after `close`, after an I/O
//! level failure, or once its managed identity token is about to expire; the
//! connection manager then replaces it.

use crate::config::{AzureCredentials, AzureSqlConfig};
use crate::db::backend::identity::{self, IdentitySource};
use crate::db::backend::inserted_id_from_rows;
use crate::db::params::bind_mssql_param;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{NormalizedResult, Statement, StatementKind};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

type TdsClient = Client<Compat<TcpStream>>;

/// Treat a token as expired this many seconds before its stated expiry.
const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

pub struct MssqlConnection {
    client: Mutex<Option<TdsClient>>,
    closed: AtomicBool,
    broken: AtomicBool,
    token_expires_at: Option<DateTime<Utc>>,
    target: String,
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("target", &self.target)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("broken", &self.broken.load(Ordering::Relaxed))
            .field("token_expires_at", &self.token_expires_at)
            .finish()
    }
}

impl MssqlConnection {
    /// Authenticate and open the connection.
    pub async fn connect(config: &AzureSqlConfig) -> DbResult<Self> {
        let mut tds = Config::new();
        tds.host(&config.server);
        tds.port(config.port);
        tds.database(&config.database);
        tds.encryption(if config.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::NotSupported
        });
        if config.trust_server_certificate {
            tds.trust_cert();
        }

        let token_expires_at = match &config.credentials {
            AzureCredentials::Password { user, password } => {
                tds.authentication(AuthMethod::sql_server(user, password));
                None
            }
            AzureCredentials::ManagedIdentity {
                client_id,
                identity_endpoint,
                identity_header,
            } => {
                let source = IdentitySource::resolve(
                    identity_endpoint.as_deref(),
                    identity_header.as_deref(),
                );
                let token = identity::fetch_token(&source, client_id.as_deref()).await?;
                tds.authentication(AuthMethod::aad_token(&token.token));
                Some(token.expires_at)
            }
        };

        let target = format!("{}:{}/{}", config.server, config.port, config.database);
        let client = open_client(tds).await?;

        info!(
            target = %target,
            auth = ?config.credentials.mode(),
            "SQL Server connection established"
        );

        Ok(Self {
            client: Mutex::new(Some(client)),
            closed: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            token_expires_at,
            target,
        })
    }

    pub fn is_connected(&self) -> bool {
        if self.closed.load(Ordering::Acquire) || self.broken.load(Ordering::Acquire) {
            return false;
        }
        match self.token_expires_at {
            Some(expires_at) => Utc::now() + TimeDelta::seconds(TOKEN_EXPIRY_SKEW_SECS) < expires_at,
            None => true,
        }
    }

    pub async fn ensure_schema(&self, statements: &[&str]) -> DbResult<()> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(DbError::NotConnected)?;
        for ddl in statements {
            let outcome = match client.simple_query(*ddl).await {
                Ok(stream) => stream.into_results().await.map(|_| ()),
                Err(e) => Err(e),
            };
            self.check(outcome)?;
        }
        Ok(())
    }

    pub async fn execute(&self, statement: &Statement) -> DbResult<NormalizedResult> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(DbError::NotConnected)?;

        let mut query = Query::new(statement.sql.as_str());
        for param in &statement.params {
            bind_mssql_param(&mut query, param);
        }

        let outcome = match query.query(client).await {
            Ok(stream) => stream.into_first_result().await,
            Err(e) => Err(e),
        };
        let rows: Vec<_> = self
            .check(outcome)?
            .iter()
            .map(RowToJson::to_json_map)
            .collect();

        match statement.kind {
            StatementKind::Select => Ok(NormalizedResult::from_rows(rows)),
            // INSERT ... OUTPUT INSERTED.id
            StatementKind::Insert => inserted_id_from_rows(rows),
        }
    }

    /// Close the connection. Later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.close().await {
                debug!(error = %e, target = %self.target, "Error closing SQL Server connection");
            }
        }
    }

    /// Convert a driver result, marking the handle broken on connection loss.
    fn check<T>(&self, outcome: tiberius::Result<T>) -> DbResult<T> {
        outcome.map_err(|e| {
            let err = DbError::from(e);
            if err.is_connection_loss() {
                warn!(error = %err, target = %self.target, "SQL Server connection lost");
                self.broken.store(true, Ordering::Release);
            }
            err
        })
    }
}

async fn open_tcp(config: &Config) -> DbResult<TcpStream> {
    let addr = config.get_addr();
    let tcp = TcpStream::connect(&addr).await.map_err(|e| {
        DbError::connection(
            format!("Cannot reach {}: {}", addr, e),
            "Check AZURE_SQL_SERVER, AZURE_SQL_PORT and firewall rules",
        )
    })?;
    tcp.set_nodelay(true).map_err(|e| {
        DbError::connection(
            format!("Cannot configure socket: {}", e),
            "Retry the connection",
        )
    })?;
    Ok(tcp)
}

/// Connect, following one gateway redirect if Azure asks for it.
async fn open_client(mut config: Config) -> DbResult<TdsClient> {
    let tcp = open_tcp(&config).await?;
    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!(host = %host, port, "SQL Server gateway redirected connection");
            config.host(&host);
            config.port(port);
            let tcp = open_tcp(&config).await?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(login_error)
        }
        Err(e) => Err(login_error(e)),
    }
}

/// Any failure while logging in means the handle could not be created.
fn login_error(err: tiberius::error::Error) -> DbError {
    match DbError::from(err) {
        DbError::Database { message, .. } | DbError::Internal { message } => DbError::connection(
            format!("SQL Server login failed: {}", message),
            "Check AZURE_SQL_USER / AZURE_SQL_PASSWORD or the managed identity's database user",
        ),
        other => other,
    }
}
