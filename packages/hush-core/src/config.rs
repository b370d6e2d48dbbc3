//! Runtime configuration for the envelope layer.
//!
//! Every field has a safe default; a host application typically ships a
//! JSON fragment that overrides only what it needs:
//!
//! ```json
//! { "backup_iterations": 400000 }
//! ```

use serde::{Deserialize, Serialize};

use crate::backup::MIN_BACKUP_ITERATIONS;
use crate::error::{Error, Result};

/// Default PBKDF2 iteration count for new backups
pub const DEFAULT_BACKUP_ITERATIONS: u32 = 250_000;

/// Ciphertext size below which a file may be carried inline (5 MiB)
pub const DEFAULT_INLINE_FILE_LIMIT: usize = 5 * 1024 * 1024;

/// Maximum plaintext size of a message body (64 KiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Configuration for Hush Core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// PBKDF2 iterations used when sealing a new backup
    pub backup_iterations: u32,
    /// Largest file ciphertext that may be embedded inline in an envelope
    pub inline_file_limit: usize,
    /// Largest message body accepted by `seal`
    pub max_message_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            backup_iterations: DEFAULT_BACKUP_ITERATIONS,
            inline_file_limit: DEFAULT_INLINE_FILE_LIMIT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl CoreConfig {
    /// Parse and validate a JSON configuration fragment
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is within its allowed range
    pub fn validate(&self) -> Result<()> {
        if self.backup_iterations < MIN_BACKUP_ITERATIONS {
            return Err(Error::InvalidConfig(format!(
                "backup_iterations must be at least {}, got {}",
                MIN_BACKUP_ITERATIONS, self.backup_iterations
            )));
        }
        if self.max_message_size == 0 {
            return Err(Error::InvalidConfig("max_message_size must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.inline_file_limit, 5 * 1024 * 1024);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CoreConfig::from_json(r#"{ "backup_iterations": 400000 }"#).unwrap();
        assert_eq!(config.backup_iterations, 400_000);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_low_iteration_count_rejected() {
        let result = CoreConfig::from_json(r#"{ "backup_iterations": 1000 }"#);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(CoreConfig::from_json("[1, 2"), Err(Error::InvalidConfig(_))));
    }
}
