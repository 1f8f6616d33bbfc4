use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage backend the collider runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Scylla/Cassandra cluster over CQL
    #[default]
    Scylla,
    /// In-process linearizable store (dry runs, tests)
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scylla" | "cassandra" | "cql" => Ok(BackendKind::Scylla),
            "memory" | "mem" => Ok(BackendKind::Memory),
            other => Err(format!("Unknown backend: {}", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Scylla => write!(f, "scylla"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

/// Consistency level used for the Paxos round of conditional writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SerialConsistency {
    /// Linearizable across all datacenters
    Serial,
    /// Linearizable within the local datacenter
    #[default]
    LocalSerial,
}

/// Human-readable duration (e.g., "200ms", "12s", "1m").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub std::time::Duration);

impl Default for HumanDuration {
    fn default() -> Self {
        HumanDuration(std::time::Duration::from_secs(0))
    }
}

impl HumanDuration {
    pub fn from_secs(secs: u64) -> Self {
        HumanDuration(std::time::Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        HumanDuration(std::time::Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> std::time::Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let (num_str, unit) = if let Some(n) = s.strip_suffix("ms") {
            (n, "ms")
        } else if let Some(n) = s.strip_suffix('s') {
            (n, "s")
        } else if let Some(n) = s.strip_suffix('m') {
            (n, "m")
        } else if let Some(n) = s.strip_suffix('h') {
            (n, "h")
        } else {
            return Err(format!("Invalid duration format: {}", s));
        };

        let num: u64 = num_str
            .trim()
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        let out_of_range = || format!("Duration out of range: {}", s);
        let duration = match unit {
            "ms" => std::time::Duration::from_millis(num),
            "s" => std::time::Duration::from_secs(num),
            "m" => std::time::Duration::from_secs(num.checked_mul(60).ok_or_else(out_of_range)?),
            "h" => std::time::Duration::from_secs(num.checked_mul(3600).ok_or_else(out_of_range)?),
            _ => return Err(format!("Unknown duration unit: {}", unit)),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();

        if millis % 1000 != 0 {
            write!(f, "{}ms", millis)
        } else if millis % 3_600_000 == 0 && millis > 0 {
            write!(f, "{}h", millis / 3_600_000)
        } else if millis % 60_000 == 0 && millis > 0 {
            write!(f, "{}m", millis / 60_000)
        } else {
            write!(f, "{}s", millis / 1000)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A credential that never prints its value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// Username/password authentication for the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials {
            username: "cassandra".to_string(),
            password: Secret::new("cassandra"),
        }
    }
}

/// Top-level collider run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColliderConfig {
    /// Number of concurrent workers, each with its own session.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Size of the slot identifier space `[0, iterations)`.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Contact points. Entries may themselves be comma-separated lists.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_credentials")]
    pub credentials: Option<Credentials>,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// Partition key shared by every worker, so that all claims contend on one partition.
    #[serde(default = "default_partition_key")]
    pub partition_key: i32,
    /// Expiry of claimed rows. Must be whole seconds.
    #[serde(default = "default_ttl")]
    pub ttl: HumanDuration,
    #[serde(default)]
    pub serial_consistency: SerialConsistency,
    /// Bound on each storage round-trip. `None` lets a hung request hang its worker.
    #[serde(default = "default_op_timeout")]
    pub op_timeout: Option<HumanDuration>,
    /// Extra attempts for a claim that failed with a transient error.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: HumanDuration,
    /// Master seed for the per-worker shuffles.
    #[serde(default)]
    pub seed: Option<u64>,
}

pub(crate) const DEFAULT_WORKERS: usize = 32;
pub(crate) const DEFAULT_ITERATIONS: u32 = 1000;
pub(crate) const DEFAULT_ENDPOINT: &str = "127.0.0.1";

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_endpoints() -> Vec<String> {
    vec![DEFAULT_ENDPOINT.to_string()]
}

fn default_credentials() -> Option<Credentials> {
    Some(Credentials::default())
}

fn default_keyspace() -> String {
    "test".to_string()
}

fn default_table() -> String {
    "test".to_string()
}

fn default_partition_key() -> i32 {
    3
}

fn default_ttl() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_op_timeout() -> Option<HumanDuration> {
    Some(HumanDuration::from_secs(12))
}

fn default_retry_backoff() -> HumanDuration {
    HumanDuration::from_millis(100)
}

impl Default for ColliderConfig {
    fn default() -> Self {
        ColliderConfig {
            workers: default_workers(),
            iterations: default_iterations(),
            endpoints: default_endpoints(),
            backend: BackendKind::default(),
            credentials: default_credentials(),
            keyspace: default_keyspace(),
            table: default_table(),
            partition_key: default_partition_key(),
            ttl: default_ttl(),
            serial_consistency: SerialConsistency::default(),
            op_timeout: default_op_timeout(),
            max_retries: 0,
            retry_backoff: default_retry_backoff(),
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration_parsing() {
        assert_eq!(
            HumanDuration::from_str("200ms").unwrap().as_duration(),
            std::time::Duration::from_millis(200)
        );
        assert_eq!(
            HumanDuration::from_str("12s").unwrap().as_duration(),
            std::time::Duration::from_secs(12)
        );
        assert_eq!(
            HumanDuration::from_str("5m").unwrap().as_duration(),
            std::time::Duration::from_secs(300)
        );
        assert!(HumanDuration::from_str("fast").is_err());
        assert!(HumanDuration::from_str("12x").is_err());
    }

    #[test]
    fn test_human_duration_rejects_overflow() {
        let err = HumanDuration::from_str("307445734561825861m").unwrap_err();
        assert!(err.contains("out of range"));
        assert!(HumanDuration::from_str("99999999999999999h").is_err());
        assert_eq!(
            HumanDuration::from_str("18446744073709551615s").unwrap().as_duration(),
            std::time::Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_human_duration_display_is_exact() {
        assert_eq!(HumanDuration::from_millis(1500).to_string(), "1500ms");
        assert_eq!(HumanDuration::from_secs(60).to_string(), "1m");
        assert_eq!(HumanDuration::from_secs(90).to_string(), "90s");
        assert_eq!(HumanDuration::from_secs(0).to_string(), "0s");
    }

    #[test]
    fn test_secret_is_redacted() {
        let creds = Credentials {
            username: "admin".to_string(),
            password: Secret::new("hunter2"),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"), "{}", debug);
        assert!(debug.contains("***"));
        assert_eq!(creds.password.to_string(), "***");
        assert_eq!(creds.password.expose(), "hunter2");
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!(BackendKind::from_str("cql").unwrap(), BackendKind::Scylla);
        assert_eq!(BackendKind::from_str("Memory").unwrap(), BackendKind::Memory);
        assert!(BackendKind::from_str("postgres").is_err());
    }

    #[test]
    fn test_defaults_match_stock_cluster_run() {
        let config = ColliderConfig::default();
        assert_eq!(config.workers, 32);
        assert_eq!(config.iterations, 1000);
        assert_eq!(config.endpoints, vec!["127.0.0.1".to_string()]);
        assert_eq!(config.partition_key, 3);
        assert_eq!(config.ttl.as_duration().as_secs(), 60);
        assert_eq!(config.serial_consistency, SerialConsistency::LocalSerial);
        assert_eq!(config.max_retries, 0);
    }
}
