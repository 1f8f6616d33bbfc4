use std::time::Duration;

use async_trait::async_trait;
use collider_config::SerialConsistency;
use collider_core::{ConditionalInsert, Connector, Session, Statement, StoreError, WorkerId};
use scylla::frame::response::result::CqlValue;
use scylla::prepared_statement::PreparedStatement;
use scylla::statement::SerialConsistency as CqlSerialConsistency;
use scylla::transport::errors::QueryError;
use scylla::{ExecutionProfile, SessionBuilder};
use tokio::sync::OnceCell;
use tracing::debug;

/// Connection settings for a Cassandra-compatible cluster.
#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    /// Contact points, `host` or `host:port`.
    pub endpoints: Vec<String>,
    /// `(username, password)`; `None` connects anonymously.
    pub credentials: Option<(String, String)>,
    pub serial_consistency: SerialConsistency,
    /// Driver-side request timeout.
    pub request_timeout: Option<Duration>,
}

/// Opens one driver session per worker.
pub struct ScyllaConnector {
    config: ScyllaConfig,
}

impl ScyllaConnector {
    pub fn new(config: ScyllaConfig) -> Self {
        ScyllaConnector { config }
    }
}

#[async_trait]
impl Connector for ScyllaConnector {
    async fn connect(&self, worker: WorkerId) -> Result<Box<dyn Session>, StoreError> {
        let serial = match self.config.serial_consistency {
            SerialConsistency::Serial => CqlSerialConsistency::Serial,
            SerialConsistency::LocalSerial => CqlSerialConsistency::LocalSerial,
        };
        let profile = ExecutionProfile::builder()
            .serial_consistency(Some(serial))
            .request_timeout(self.config.request_timeout)
            .build()
            .into_handle();

        let mut builder = SessionBuilder::new()
            .known_nodes(&self.config.endpoints)
            .default_execution_profile_handle(profile);
        if let Some((user, password)) = &self.config.credentials {
            builder = builder.user(user, password);
        }

        let session = builder
            .build()
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                endpoints: self.config.endpoints.clone(),
                source: Box::new(e),
            })?;
        debug!(worker, "driver session established");

        Ok(Box::new(ScyllaSession {
            session,
            insert: OnceCell::new(),
            endpoints: self.config.endpoints.clone(),
            request_timeout: self.config.request_timeout,
        }))
    }

    fn describe(&self) -> String {
        format!("scylla {}", self.config.endpoints.join(","))
    }
}

pub struct ScyllaSession {
    session: scylla::Session,
    /// The claim statement, prepared on first use.
    insert: OnceCell<PreparedStatement>,
    endpoints: Vec<String>,
    request_timeout: Option<Duration>,
}

impl ScyllaSession {
    fn map_error(&self, statement: &str, e: QueryError) -> StoreError {
        map_query_error(statement, &self.endpoints, self.request_timeout, e)
    }

    async fn prepared_insert(&self, insert: &ConditionalInsert) -> Result<&PreparedStatement, StoreError> {
        let cql = insert.cql();
        self.insert
            .get_or_try_init(|| async {
                self.session
                    .prepare(cql.as_str())
                    .await
                    .map_err(|e| self.map_error(&cql, e))
            })
            .await
    }
}

/// Translate a driver error into the store's error type.
///
/// Lost connections and client-side timeouts are transient. Anything the
/// server answered, including a CAS write timeout, is not.
fn map_query_error(
    statement: &str,
    endpoints: &[String],
    request_timeout: Option<Duration>,
    e: QueryError,
) -> StoreError {
    match e {
        QueryError::RequestTimeout(_) | QueryError::TimeoutError => StoreError::Timeout {
            operation: statement.to_string(),
            elapsed_ms: request_timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
                .unwrap_or(0),
        },
        QueryError::IoError(_)
        | QueryError::BrokenConnection(_)
        | QueryError::ConnectionPoolError(_)
        | QueryError::UnableToAllocStreamId => StoreError::ConnectionFailed {
            endpoints: endpoints.to_vec(),
            source: Box::new(e),
        },
        other => StoreError::Statement(format!("{}: {}", statement, other)),
    }
}

/// Read the `[applied]` flag from the first column of an LWT result row.
fn applied_flag(columns: &[Option<CqlValue>]) -> Result<bool, StoreError> {
    match columns.first() {
        Some(Some(CqlValue::Boolean(applied))) => Ok(*applied),
        other => Err(StoreError::Statement(format!(
            "unexpected [applied] column: {:?}",
            other
        ))),
    }
}

#[async_trait]
impl Session for ScyllaSession {
    async fn execute(&self, statement: &Statement) -> Result<(), StoreError> {
        let text = statement.to_string();
        self.session
            .query_unpaged(text.as_str(), ())
            .await
            .map_err(|e| self.map_error(&text, e))?;
        Ok(())
    }

    async fn insert_if_not_exists(&self, insert: &ConditionalInsert) -> Result<bool, StoreError> {
        let prepared = self.prepared_insert(insert).await?;
        let slot = i32::try_from(insert.slot)
            .map_err(|_| StoreError::Statement(format!("slot {} does not fit an int column", insert.slot)))?;
        let ttl = i32::try_from(insert.ttl_secs)
            .map_err(|_| StoreError::Statement(format!("ttl {} out of range", insert.ttl_secs)))?;

        let result = self
            .session
            .execute_unpaged(prepared, (insert.partition_key, slot, ttl))
            .await
            .map_err(|e| self.map_error(&insert.to_string(), e))?;

        let row = result
            .first_row()
            .map_err(|e| StoreError::Statement(format!("conditional insert returned no row: {}", e)))?;
        applied_flag(&row.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scylla::transport::errors::DbError;
    use std::sync::Arc;

    fn endpoints() -> Vec<String> {
        vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]
    }

    fn map(e: QueryError) -> StoreError {
        map_query_error("INSERT", &endpoints(), Some(Duration::from_secs(12)), e)
    }

    #[test]
    fn test_dropped_connection_is_transient() {
        let err = map(QueryError::IoError(Arc::new(std::io::Error::other("reset by peer"))));
        assert!(err.is_transient());
        match err {
            StoreError::ConnectionFailed { endpoints: hosts, .. } => assert_eq!(hosts, endpoints()),
            other => panic!("expected ConnectionFailed, got {:?}", other),
        }
        assert!(map(QueryError::UnableToAllocStreamId).is_transient());
    }

    #[test]
    fn test_client_timeouts_are_transient() {
        let err = map(QueryError::RequestTimeout("no response".to_string()));
        assert!(matches!(
            err,
            StoreError::Timeout { elapsed_ms: 12_000, .. }
        ));
        assert!(map(QueryError::TimeoutError).is_transient());
    }

    #[test]
    fn test_server_errors_are_not_transient() {
        let err = map(QueryError::DbError(DbError::SyntaxError, "line 1".to_string()));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("INSERT"));
    }

    #[test]
    fn test_applied_flag() {
        assert!(applied_flag(&[Some(CqlValue::Boolean(true))]).unwrap());
        assert!(!applied_flag(&[Some(CqlValue::Boolean(false)), Some(CqlValue::Int(7))]).unwrap());
    }

    #[test]
    fn test_applied_flag_missing_or_mistyped() {
        assert!(matches!(applied_flag(&[]), Err(StoreError::Statement(_))));
        assert!(matches!(applied_flag(&[None]), Err(StoreError::Statement(_))));
        assert!(matches!(
            applied_flag(&[Some(CqlValue::Int(1))]),
            Err(StoreError::Statement(_))
        ));
    }
}
