use crate::types::ColliderConfig;
use crate::ConfigError;

/// Upper bound on per-claim retries; beyond this a run stops measuring contention.
const MAX_RETRIES_LIMIT: u32 = 10;

impl ColliderConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.workers == 0 {
            errors.push(ConfigError::InvalidValue(
                "workers".to_string(),
                "at least one worker is required".to_string(),
            ));
        }

        if self.iterations == 0 {
            errors.push(ConfigError::InvalidValue(
                "iterations".to_string(),
                "the slot space must not be empty".to_string(),
            ));
        } else if self.iterations > i32::MAX as u32 {
            errors.push(ConfigError::InvalidValue(
                "iterations".to_string(),
                format!("slot ids are stored as int, maximum is {}", i32::MAX),
            ));
        }

        if self.endpoints.iter().all(|e| e.trim().is_empty()) {
            errors.push(ConfigError::InvalidValue(
                "endpoints".to_string(),
                "at least one contact point is required".to_string(),
            ));
        }

        for (field, name) in [("keyspace", &self.keyspace), ("table", &self.table)] {
            if let Err(reason) = check_identifier(name) {
                errors.push(ConfigError::InvalidIdentifier(name.clone(), field, reason));
            }
        }

        let ttl = self.ttl.as_duration();
        if ttl.as_secs() == 0 {
            errors.push(ConfigError::InvalidValue(
                "ttl".to_string(),
                "must be at least 1s".to_string(),
            ));
        } else if ttl.subsec_nanos() != 0 {
            errors.push(ConfigError::InvalidValue(
                "ttl".to_string(),
                format!("must be whole seconds, got {}", self.ttl),
            ));
        }

        if let Some(timeout) = self.op_timeout {
            if timeout.as_duration().is_zero() {
                errors.push(ConfigError::InvalidValue(
                    "op_timeout".to_string(),
                    "must be positive; omit it to disable the timeout".to_string(),
                ));
            }
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            errors.push(ConfigError::InvalidValue(
                "max_retries".to_string(),
                format!("must be at most {}", MAX_RETRIES_LIMIT),
            ));
        }

        if let Some(creds) = &self.credentials {
            if creds.username.trim().is_empty() {
                errors.push(ConfigError::InvalidValue(
                    "credentials.username".to_string(),
                    "must not be empty".to_string(),
                ));
            }
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

/// CQL unquoted identifiers: `^[a-zA-Z][a-zA-Z0-9_]{0,47}$`.
fn check_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.len() > 48 {
        return Err("exceeds maximum length of 48 characters".to_string());
    }
    let valid = name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err("must match ^[a-zA-Z][a-zA-Z0-9_]*$".to_string());
    }
    Ok(())
}
