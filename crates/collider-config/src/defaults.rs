use crate::types::{ColliderConfig, DEFAULT_ENDPOINT};

impl ColliderConfig {
    /// Apply default inference rules to the configuration.
    /// This mutates the config in place.
    pub fn apply_defaults(&mut self) {
        // 1. Comma-separated contact point lists are split, trimmed and deduplicated
        self.endpoints = normalize_endpoints(&self.endpoints);

        // 2. An empty endpoint list falls back to loopback
        if self.endpoints.is_empty() {
            self.endpoints.push(DEFAULT_ENDPOINT.to_string());
        }

        // 3. Names are case-insensitive in CQL unless quoted
        self.keyspace = self.keyspace.trim().to_lowercase();
        self.table = self.table.trim().to_lowercase();
    }

    /// Returns a new config with all defaults applied.
    pub fn effective(&self) -> ColliderConfig {
        let mut config = self.clone();
        config.apply_defaults();
        config
    }

    /// Fully qualified `keyspace.table` reference.
    pub fn table_ref(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    pub fn op_timeout(&self) -> Option<std::time::Duration> {
        self.op_timeout.map(|t| t.as_duration())
    }

    /// Row expiry in whole seconds, as CQL's `USING TTL` expects.
    pub fn ttl_secs(&self) -> u32 {
        u32::try_from(self.ttl.as_duration().as_secs()).unwrap_or(u32::MAX)
    }
}

/// Split `"a, b,c"` style entries into individual contact points.
fn normalize_endpoints(endpoints: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in endpoints {
        for host in entry.split(',') {
            let host = host.trim();
            if !host.is_empty() && !out.iter().any(|h| h == host) {
                out.push(host.to_string());
            }
        }
    }
    out
}
