//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, IndexingStrategy};
use thiserror::Error;

/// Upper bound for `cache_ttl_minutes`: one year.
pub const MAX_CACHE_TTL_MINUTES: u64 = 60 * 24 * 365;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_ttl_minutes` is 0 or longer than a year
    /// - `default.site_name` is empty
    /// - a whitelist entry or the pagination parameter is empty
    /// - an allow/deny pattern contains an empty token or a token without a key
    /// - the conflict guard is enabled with no content types
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_minutes".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.cache_ttl_minutes > MAX_CACHE_TTL_MINUTES {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_minutes".into(),
                reason: format!("must be at most {MAX_CACHE_TTL_MINUTES} (one year)"),
            });
        }

        if self.default.site_name.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "default.site_name".into(), reason: "must not be empty".into() });
        }

        if self.query_whitelist.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "query_whitelist".into(),
                reason: "entries must not be empty".into(),
            });
        }

        if self.indexing.pagination.param.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "indexing.pagination.param".into(),
                reason: "must not be empty".into(),
            });
        }

        validate_patterns("indexing.allowlist", &self.indexing.allowlist)?;
        validate_patterns("indexing.denylist", &self.indexing.denylist)?;

        if self.conflict_guard.enabled && self.conflict_guard.content_types.is_empty() {
            return Err(ConfigError::Invalid {
                field: "conflict_guard.content_types".into(),
                reason: "must list at least one media type while the guard is enabled".into(),
            });
        }

        if self.indexing.strategy == IndexingStrategy::Allowlist && self.indexing.allowlist.is_empty() {
            tracing::warn!("indexing strategy is allowlist with an empty allowlist; no page variant will be indexable");
        }

        let pagination = &self.indexing.pagination.param;
        if !self.query_whitelist.iter().any(|k| k == pagination) {
            tracing::warn!(
                param = %pagination,
                "pagination parameter is not whitelisted and will never reach the indexing policy"
            );
        }

        Ok(())
    }
}

fn validate_patterns(field: &str, patterns: &[Vec<String>]) -> Result<(), ConfigError> {
    for pattern in patterns {
        for token in pattern {
            let key = token.split_once('=').map_or(token.as_str(), |(k, _)| k);
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: format!("pattern token {token:?} has no parameter name"),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = AppConfig { cache_ttl_minutes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_minutes"));
    }

    #[test]
    fn test_validate_ttl_upper_bound() {
        let config = AppConfig { cache_ttl_minutes: MAX_CACHE_TTL_MINUTES, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { cache_ttl_minutes: u64::MAX / 2, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { ref field, .. }) if field == "cache_ttl_minutes"));
    }

    #[test]
    fn test_validate_empty_site_name() {
        let mut config = AppConfig::default();
        config.default.site_name = "  ".into();
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "default.site_name"));
    }

    #[test]
    fn test_validate_empty_whitelist_entry() {
        let config = AppConfig { query_whitelist: vec!["city".into(), String::new()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "query_whitelist"));
    }

    #[test]
    fn test_validate_pattern_without_key() {
        let mut config = AppConfig::default();
        config.indexing.denylist = vec![vec!["city".into(), "=istanbul".into()]];
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "indexing.denylist"));
    }

    #[test]
    fn test_validate_empty_pagination_param() {
        let mut config = AppConfig::default();
        config.indexing.pagination.param = String::new();
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "indexing.pagination.param"));
    }

    #[test]
    fn test_validate_guard_without_content_types() {
        let mut config = AppConfig::default();
        config.conflict_guard.content_types.clear();
        assert!(config.validate().is_err());

        config.conflict_guard.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_allowlist_only_warns() {
        let mut config = AppConfig::default();
        config.indexing.strategy = IndexingStrategy::Allowlist;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_value_tokens() {
        let mut config = AppConfig::default();
        config.indexing.allowlist = vec![vec!["city=istanbul".into(), "district".into()], vec![]];
        assert!(config.validate().is_ok());
    }
}
