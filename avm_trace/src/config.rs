use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides [`TraceConfig::range_check_required`] when set.
pub const RANGE_CHECK_REQUIRED_ENV: &str = "AVM_RANGE_CHECK_REQUIRED";
/// Overrides [`TraceConfig::full_precomputed_tables`] when set.
pub const FULL_PRECOMPUTED_TABLES_ENV: &str = "AVM_FULL_PRECOMPUTED_TABLES";
/// Overrides [`TraceConfig::max_slice_len`] when set.
pub const MAX_SLICE_LEN_ENV: &str = "AVM_MAX_SLICE_LEN";

/// Default bound on the number of cells one instruction may copy or hash.
pub const DEFAULT_MAX_SLICE_LEN: u32 = 1 << 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid trace configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid boolean `{value}` for {var}")]
    InvalidBool { var: &'static str, value: String },
    #[error("invalid integer `{value}` for {var}")]
    InvalidInt { var: &'static str, value: String },
}

/// Options of the trace builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Pad the trace to the full 16-bit range-check table. Turning this off
    /// only makes sense for functional tests.
    pub range_check_required: bool,
    /// Materialize the byte-operation table at its maximum size even if no
    /// bitwise operation ran.
    pub full_precomputed_tables: bool,
    /// Largest memory range a single instruction may read or write. An
    /// affordable instruction going past it stops the execution.
    pub max_slice_len: u32,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            range_check_required: true,
            full_precomputed_tables: false,
            max_slice_len: DEFAULT_MAX_SLICE_LEN,
        }
    }
}

impl TraceConfig {
    /// Configuration for functional tests: small tables, no range-check
    /// padding.
    pub const fn testing() -> Self {
        Self {
            range_check_required: false,
            full_precomputed_tables: false,
            max_slice_len: DEFAULT_MAX_SLICE_LEN,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Applies the environment overrides on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// The default configuration with the environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(RANGE_CHECK_REQUIRED_ENV) {
            self.range_check_required = parse_bool(RANGE_CHECK_REQUIRED_ENV, &value)?;
        }
        if let Some(value) = lookup(FULL_PRECOMPUTED_TABLES_ENV) {
            self.full_precomputed_tables = parse_bool(FULL_PRECOMPUTED_TABLES_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_SLICE_LEN_ENV) {
            self.max_slice_len = value.trim().parse().map_err(|_| ConfigError::InvalidInt {
                var: MAX_SLICE_LEN_ENV,
                value: value.clone(),
            })?;
        }
        Ok(self)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = TraceConfig::from_json(r#"{ "full_precomputed_tables": true }"#).unwrap();
        assert!(config.range_check_required);
        assert!(config.full_precomputed_tables);
        assert!(TraceConfig::from_json("{ nope").is_err());
    }

    #[test]
    fn overrides() {
        let config = TraceConfig::default()
            .with_overrides(|var| (var == RANGE_CHECK_REQUIRED_ENV).then(|| "off".to_owned()))
            .unwrap();
        assert_eq!(config, TraceConfig::testing());

        let err = TraceConfig::default()
            .with_overrides(|_| Some("maybe".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { .. }));
    }

    #[test]
    fn slice_limit_override() {
        let config = TraceConfig::default()
            .with_overrides(|var| (var == MAX_SLICE_LEN_ENV).then(|| " 64 ".to_owned()))
            .unwrap();
        assert_eq!(config.max_slice_len, 64);

        let err = TraceConfig::default()
            .with_overrides(|var| (var == MAX_SLICE_LEN_ENV).then(|| "lots".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInt { .. }));

        let config = TraceConfig::from_json(r#"{ "max_slice_len": 8 }"#).unwrap();
        assert_eq!(config.max_slice_len, 8);
        assert!(config.range_check_required);
    }
}
