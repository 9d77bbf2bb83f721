use crate::error::ConfigError;
use std::time::Duration;

pub const URL_VAR: &str = "SUPABASE_URL";
pub const SERVICE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const FAIL_SOFT_VAR: &str = "SQLREST_FAIL_SOFT";
pub const TIMEOUT_VAR: &str = "SQLREST_TIMEOUT_SECS";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// What a [`Connection`](crate::Connection) does when the store misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Every failure is returned to the caller.
    #[default]
    Strict,
    /// Transport and status failures are logged and degrade to an empty
    /// result; unrecognized predicates in reads are logged and skipped.
    FailSoft,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestConfig {
    /// Project URL without the `/rest/v1` suffix.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub primary_key: String,
    pub policy: ErrorPolicy,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            policy: ErrorPolicy::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base_url = var(URL_VAR).ok_or(ConfigError::MissingVar(URL_VAR))?;
        let api_key = var(SERVICE_KEY_VAR)
            .or_else(|| var(ANON_KEY_VAR))
            .ok_or(ConfigError::MissingVar(SERVICE_KEY_VAR))?;
        let mut config = Self::new(base_url.trim(), api_key.trim());

        if let Some(raw) = var(FAIL_SOFT_VAR) {
            config = config.set_policy(parse_policy(&raw)?);
        }
        if let Some(raw) = var(TIMEOUT_VAR) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidVar {
                    name: TIMEOUT_VAR,
                    value: raw.clone(),
                })?;
            config = config.set_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// `{base_url}/rest/v1/{table}`
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }
}

fn parse_policy(raw: &str) -> Result<ErrorPolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(ErrorPolicy::FailSoft),
        "0" | "false" | "no" | "off" => Ok(ErrorPolicy::Strict),
        _ => Err(ConfigError::InvalidVar {
            name: FAIL_SOFT_VAR,
            value: raw.to_string(),
        }),
    }
}
