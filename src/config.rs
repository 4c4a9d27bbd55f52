use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::AttributionPolicy;
use crate::error::ResolveError;

pub const DEFAULT_CONFIG_FILE: &str = "ttd-resolve.json";
pub const TARGET_DOWNLOAD_FILE: &str = "P1-01-TTD_target_download.txt";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    pub base_url: String,
    pub from_namespace: String,
    pub to_namespace: String,
    pub header_rows: usize,
    pub batch_size: usize,
    pub cooldown_secs: u64,
    pub batch_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub attribution: AttributionPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rest.uniprot.org".to_string(),
            from_namespace: "UniProtKB_AC-ID".to_string(),
            to_namespace: "UniProtKB".to_string(),
            header_rows: 40,
            batch_size: 10,
            cooldown_secs: 5,
            batch_timeout_secs: 300,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            request_timeout_secs: 60,
            attribution: AttributionPolicy::AllOwners,
        }
    }
}

impl ResolverConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    // Delay before retry pass `pass` (1-based): base * 2^(pass - 1).
    pub fn retry_delay(&self, pass: u32) -> Duration {
        let factor = 1u64 << pass.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }

    pub fn validate(self) -> Result<Self, ResolveError> {
        if self.batch_size == 0 {
            return Err(ResolveError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ResolveError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(ResolveError::InvalidConfig("base_url is empty".to_string()));
        }
        Ok(self)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolverConfig, ResolveError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return ResolverConfig::default().validate();
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ResolveError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<ResolverConfig, ResolveError> {
        let config: ResolverConfig = serde_json::from_str(content)
            .map_err(|err| ResolveError::ConfigParse(err.to_string()))?;
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles() {
        let config = ResolverConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(500));
        assert_eq!(config.retry_delay(2), Duration::from_millis(1000));
        assert_eq!(config.retry_delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = ConfigLoader::parse(r#"{"batch_size": 4, "attribution": "last-match"}"#)
            .unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.attribution, AttributionPolicy::LastMatch);
        assert_eq!(config.cooldown_secs, 5);
        assert_eq!(config.header_rows, 40);
    }
}
