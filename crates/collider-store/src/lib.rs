mod memory;

#[cfg(feature = "scylla")]
mod scylla;

use std::sync::Arc;

use collider_config::{BackendKind, ColliderConfig};
use collider_core::{ColliderError, Connector, StoreError};

pub use memory::{MemoryConnector, MemorySession, MemoryStats, MemoryStore};

#[cfg(feature = "scylla")]
pub use scylla::{ScyllaConfig, ScyllaConnector, ScyllaSession};

/// Build the connector selected by `config.backend`.
pub fn connector_for(config: &ColliderConfig) -> Result<Arc<dyn Connector>, ColliderError> {
    match config.backend {
        BackendKind::Memory => Ok(Arc::new(MemoryConnector::new())),
        BackendKind::Scylla => {
            #[cfg(feature = "scylla")]
            {
                let connector = ScyllaConnector::new(ScyllaConfig {
                    endpoints: config.endpoints.clone(),
                    credentials: config
                        .credentials
                        .as_ref()
                        .map(|c| (c.username.clone(), c.password.expose().to_string())),
                    serial_consistency: config.serial_consistency,
                    request_timeout: config.op_timeout(),
                });
                Ok(Arc::new(connector) as Arc<dyn Connector>)
            }
            #[cfg(not(feature = "scylla"))]
            {
                Err(ColliderError::Store(StoreError::Unsupported(
                    "Scylla backend requires the 'scylla' feature flag".to_string(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_selected() {
        let config = ColliderConfig {
            backend: BackendKind::Memory,
            ..Default::default()
        };
        let connector = connector_for(&config).unwrap();
        assert_eq!(connector.describe(), "memory");
    }

    #[cfg(not(feature = "scylla"))]
    #[test]
    fn test_scylla_requires_feature() {
        let err = connector_for(&ColliderConfig::default()).err().unwrap();
        assert!(err.to_string().contains("'scylla' feature flag"));
    }
}
